use crate::error::Location;
use crate::options::Dimension;
use crate::registry::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassingMechanism {
    ByValue,
    ByRef,
}

#[derive(Debug, Clone)]
pub struct Returns {
    pub type_id: TypeId,
    pub unsigned: bool,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub type_id: TypeId,
    pub type_name: Option<String>,
    pub passing: PassingMechanism,
    pub in_: bool,
    pub out: bool,
    pub optional: bool,
    pub list: bool,
    pub dimension: Option<Dimension>,
    pub bound: Option<i64>,
    pub default: Option<i64>,
    pub has_default: bool,
}

/// A procedure entry point (spec §3 ENTRY record / spec §4.4 "Entry
/// points and parameters"). Built with `begin` / `add_parameter`
/// (repeatable) / `complete`, mirroring `sdl_entry` / `sdl_add_parameter`
/// in `original_source`.
#[derive(Debug, Clone)]
pub struct Entry {
    pub id: EntryId,
    pub name: String,
    pub alias: Option<String>,
    pub linkage: Option<String>,
    pub type_name: Option<String>,
    pub variable: Option<String>,
    pub returns: Option<Returns>,
    pub parameters: Vec<Parameter>,
    pub loc: Location,
}
