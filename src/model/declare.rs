use crate::error::Location;
use crate::registry::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclareId(pub usize);

/// A type-alias binding a name to an underlying size or base type
/// (spec §3 DECLARE record).
#[derive(Debug, Clone)]
pub struct Declare {
    pub id: DeclareId,
    pub name: String,
    pub type_id: TypeId,
    pub prefix: Option<String>,
    pub tag: String,
    pub underlying_type: TypeId,
    pub size: i64,
    pub unsigned: bool,
    pub loc: Location,
}
