use crate::error::Location;
use crate::options::{Alignment, Dimension, StorageClass};
use crate::registry::TypeId;
use super::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AggregateId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggKind {
    Struct,
    Union,
}

/// `ORIGIN <name>` names a member whose offset becomes the aggregate's
/// effective address. `resolved_offset` is set at most once, the first
/// time a descendant member matching `name` is appended (spec §3
/// invariant).
#[derive(Debug, Clone)]
pub struct Origin {
    pub name: String,
    pub resolved_offset: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CommentMember {
    pub text: String,
    pub loc: Location,
}

/// A member of an aggregate's member list: a scalar item, a nested
/// sub-aggregate, or a pass-through comment (spec §3 MEMBER, modeled as
/// a tagged sum per §9 Design Notes rather than a struct with a type
/// discriminant and a union of payloads).
#[derive(Debug, Clone)]
pub enum Member {
    Item(ItemId),
    SubAggregate(AggregateId),
    Comment(CommentMember),
}

/// `top` is true when this member's enclosing list is the top-level
/// AGGREGATE's own list rather than a nested SUBAGGREGATE's — needed
/// because the offset rule for the first member of a nested aggregate
/// inherits the enclosing sub-aggregate's offset instead of defaulting
/// to 0 (spec §3, §4.5 step 3a).
#[derive(Debug, Clone)]
pub struct MemberSlot {
    pub member: Member,
    pub top: bool,
}

/// A STRUCTURE or UNION definition, at any nesting depth (spec §3
/// AGGREGATE / SUBAGGREGATE, unified into one record: a sub-aggregate is
/// simply an `Aggregate` whose `parent` is `Some`). `member_index` is the
/// "self" back-pointer to this sub-aggregate's own slot in the parent's
/// member list, used when the layout engine needs to align the
/// sub-aggregate's offset against its first member (spec §4.5 final
/// bullet).
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub id: AggregateId,
    pub agg_type: AggKind,
    pub type_id: TypeId,
    pub name: String,
    pub prefix: Option<String>,
    pub tag: String,
    pub marker: Option<String>,
    pub based_ptr_name: Option<String>,
    pub origin: Option<Origin>,
    pub alignment: Alignment,
    pub alignment_present: bool,
    pub parent_alignment: Alignment,
    pub dimension: Option<Dimension>,
    /// Running offset/bit-offset cursor while members are still being
    /// appended; frozen into `offset`/`size` at `END`.
    pub current_offset: i64,
    pub current_bit_offset: i64,
    /// This aggregate's own offset within its parent (0 for a top-level
    /// aggregate, since it has no parent to be offset within).
    pub offset: i64,
    pub size: i64,
    pub members: Vec<MemberSlot>,
    pub storage_class: StorageClass,
    pub fill: bool,
    pub unsigned: bool,
    pub parent: Option<AggregateId>,
    pub member_index: Option<usize>,
    pub loc: Location,
}

impl Aggregate {
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// True when this is an "implicit UNION": a UNION declared with a
    /// scalar base type rather than STRUCTURE/UNION shape (spec §4.5
    /// "Aggregate size", GLOSSARY "Implicit UNION").
    pub fn is_implicit_union(&self) -> bool {
        self.agg_type == AggKind::Union && crate::registry::is_base_type(self.type_id.raw())
    }
}
