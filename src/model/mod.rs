//! The semantic data model (spec §3): every record kind the core builds,
//! and the dense-handle arenas they live in.
//!
//! Each table is a `Vec<Record>` (append-only; the index into the vec is
//! the record's id) paired with an `indexmap::IndexMap<String, Id>` name
//! index — insertion order is preserved because emission order is
//! source-text order (spec §5), and lookups by name are O(1). This is the
//! arena-of-handles re-architecture spec §9 calls for in place of the
//! original's intrusively-linked, owner-pointer-chasing C records.

pub mod aggregate;
pub mod constant;
pub mod declare;
pub mod entry;
pub mod item;

pub use aggregate::{Aggregate, AggregateId, AggKind, Member, MemberSlot, Origin};
pub use constant::{Constant, ConstantId, ConstantKind};
pub use declare::{Declare, DeclareId};
pub use entry::{Entry, EntryId, Parameter, PassingMechanism, Returns};
pub use item::{Item, ItemId};

use crate::error::Location;
use crate::options::{Alignment, StorageClass};
use crate::registry::TypeId;
use indexmap::IndexMap;

/// `LOCAL` counter variable (spec §3), used by `CONSTANT ... COUNTER`.
#[derive(Debug, Clone)]
pub struct Local {
    pub id: LocalId,
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumId(pub usize);

#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
    /// True iff the value is non-default relative to the previous member
    /// (i.e. the source supplied an explicit value rather than
    /// "previous + 1").
    pub value_set: bool,
}

#[derive(Debug, Clone)]
pub struct Enum {
    pub id: EnumId,
    pub name: String,
    pub prefix: Option<String>,
    pub tag: String,
    pub type_def: TypeId,
    pub members: Vec<EnumMember>,
    pub loc: Location,
}

/// A simple append-only arena keyed by name, generic over the record and
/// its id newtype. `F` converts a raw index into the caller's id type.
pub struct Table<Id, Record> {
    records: Vec<Record>,
    by_name: IndexMap<String, Id>,
}

impl<Id, Record> Default for Table<Id, Record> {
    fn default() -> Self {
        Table {
            records: Vec::new(),
            by_name: IndexMap::new(),
        }
    }
}

impl<Id, Record> Table<Id, Record>
where
    Id: Copy + From<usize> + Into<usize>,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> Id {
        Id::from(self.records.len())
    }

    pub fn insert(&mut self, name: Option<&str>, record: Record) -> Id {
        let id = self.next_id();
        self.records.push(record);
        if let Some(name) = name {
            self.by_name.insert(name.to_string(), id);
        }
        id
    }

    pub fn get(&self, id: Id) -> Option<&Record> {
        self.records.get(id.into())
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut Record> {
        self.records.get_mut(id.into())
    }

    pub fn by_name(&self, name: &str) -> Option<&Record> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    pub fn id_by_name(&self, name: &str) -> Option<Id> {
        self.by_name.get(name).copied()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Drop every record. Called at MODULE end (spec §3 invariant: "After
    /// `module_end`, every symbol table is empty").
    pub fn clear(&mut self) {
        self.records.clear();
        self.by_name.clear();
    }
}

macro_rules! id_conversions {
    ($($id:ty),* $(,)?) => {
        $(
            impl From<usize> for $id {
                fn from(v: usize) -> Self { <$id>::new_from_usize(v) }
            }
            impl From<$id> for usize {
                fn from(v: $id) -> Self { v.as_usize() }
            }
        )*
    };
}

// Every id newtype is a thin wrapper over `usize`; give each the same
// `new_from_usize`/`as_usize` pair so the macro above can wire up the
// `Table` trait bounds uniformly.
macro_rules! simple_id_accessors {
    ($($id:ty),* $(,)?) => {
        $(
            impl $id {
                fn new_from_usize(v: usize) -> Self { Self(v) }
                fn as_usize(self) -> usize { self.0 }
            }
        )*
    };
}

simple_id_accessors!(LocalId, EnumId, AggregateId, ConstantId, DeclareId, EntryId, ItemId);
id_conversions!(LocalId, EnumId, AggregateId, ConstantId, DeclareId, EntryId, ItemId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Declare,
    Item,
    Aggregate,
    Enum,
    Constant,
    Entry,
}
