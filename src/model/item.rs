use crate::error::Location;
use crate::options::{Alignment, Dimension, StorageClass};
use crate::registry::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(pub usize);

/// A named scalar declaration at module scope, or a scalar member inside
/// an aggregate (spec §3 ITEM record). The same record shape serves both
/// roles; aggregate members additionally carry `offset`/`bit_offset`
/// computed by the layout engine.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub type_id: TypeId,
    pub prefix: Option<String>,
    pub tag: String,
    /// The scalar (or DECLARE/base) type this item holds.
    pub datatype: TypeId,
    /// Machine size in bytes of one element (no dimension/length
    /// multiplier applied — see `layout::effective_stride`).
    pub size: i64,
    pub alignment: Alignment,
    pub dimension: Option<Dimension>,
    pub storage_class: StorageClass,
    /// For ADDR/POINTER items: the type they point to.
    pub addr_subtype: Option<TypeId>,
    /// DECIMAL precision (number of digits) and scale.
    pub precision: i64,
    pub scale: i64,
    /// CHARACTER/CHARACTER VARYING length in bytes.
    pub length: i64,

    // --- bit-field specific fields ---
    pub is_bitfield: bool,
    /// True when the user gave an explicit SubType size rather than
    /// letting the layout engine default/widen it.
    pub sized_bitfield: bool,
    /// Bit-field width in bits.
    pub bit_length: i64,
    pub bit_offset: i64,
    pub mask_requested: bool,

    // --- layout results, filled in by the layout engine ---
    pub offset: i64,

    pub loc: Location,
}

impl Item {
    pub fn is_char_vary(&self) -> bool {
        self.datatype.raw() == crate::registry::CHAR_VARY
    }

    pub fn is_char(&self) -> bool {
        self.datatype.raw() == crate::registry::CHAR
            || self.datatype.raw() == crate::registry::CHAR_VARY
    }

    pub fn is_decimal(&self) -> bool {
        self.datatype.raw() == crate::registry::DECIMAL
    }
}
