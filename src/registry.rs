//! Identifier & type registry (spec §4.1).
//!
//! Assigns dense numeric type IDs in disjoint ranges for DECLAREs, ITEMs,
//! AGGREGATEs and ENUMs, and answers the handful of questions every other
//! component needs about a `TypeId`: its size, its signedness, whether it
//! names an address/pointer family member.

use std::fmt;

/// A word size the target machine uses for address/pointer-sized base
/// types. Selected on the CLI with `--b32`/`--b64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSize {
    Bits32,
    Bits64,
}

impl WordSize {
    pub fn address_size(self) -> i64 {
        match self {
            WordSize::Bits32 => 4,
            WordSize::Bits64 => 8,
        }
    }
}

/// A type reference. Base-type constants are small and fixed; on input a
/// negative raw value denotes the signed flavor of a base integer type,
/// positive denotes unsigned — `is_unsigned` normalizes the value in
/// place the way `original_source`'s `sdl_isUnsigned` does, then returns
/// the signedness bit it read off the sign.
///
/// DECLARE/ITEM/AGGREGATE/ENUM ids are always positive and dense within
/// their own disjoint range; they carry no sign convention of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub i64);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TypeId {
    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn normalized(self) -> TypeId {
        TypeId(self.0.abs())
    }
}

impl Default for TypeId {
    fn default() -> Self {
        TypeId(ANY)
    }
}

macro_rules! base_types {
    ($($name:ident = $val:expr,)*) => {
        $(pub const $name: i64 = $val;)*
    };
}

base_types! {
    BASE_TYPE_MIN = 1,
    BYTE = 1,
    WORD = 2,
    LONG = 3,
    QUAD = 4,
    OCTA = 5,
    TFLT = 6,
    SFLT = 7,
    XFLT = 8,
    FFLT = 9,
    DFLT = 10,
    GFLT = 11,
    HFLT = 12,
    FCOMPLEX = 13,
    DCOMPLEX = 14,
    GCOMPLEX = 15,
    HCOMPLEX = 16,
    DECIMAL = 20,
    BITFIELD_B = 21,
    BITFIELD_W = 22,
    BITFIELD_L = 23,
    BITFIELD_Q = 24,
    BITFIELD_O = 25,
    CHAR = 27,
    CHAR_VARY = 28,
    ADDR = 29,
    ADDR_L = 30,
    ADDR_Q = 31,
    ADDR_HW = 32,
    POINTER = 33,
    POINTER_L = 34,
    POINTER_Q = 35,
    POINTER_HW = 36,
    BOOL = 37,
    ENUM_ELEM = 38,
    ENTRY = 39,
    VOID = 40,
    ANY = 41,
    CONST = 42,
    BASE_TYPE_MAX = 99,

    DECLARE_MIN = 1_000,
    DECLARE_MAX = 999_999,
    ITEM_MIN = 1_000_000,
    ITEM_MAX = 1_999_999,
    AGGREGATE_MIN = 2_000_000,
    AGGREGATE_MAX = 2_999_999,
    ENUM_MIN = 3_000_000,
    ENUM_MAX = 3_999_999,
}

pub fn is_base_type(raw: i64) -> bool {
    (BASE_TYPE_MIN..=BASE_TYPE_MAX).contains(&raw)
}

pub fn is_declare_range(raw: i64) -> bool {
    (DECLARE_MIN..=DECLARE_MAX).contains(&raw)
}

pub fn is_item_range(raw: i64) -> bool {
    (ITEM_MIN..=ITEM_MAX).contains(&raw)
}

pub fn is_aggregate_range(raw: i64) -> bool {
    (AGGREGATE_MIN..=AGGREGATE_MAX).contains(&raw)
}

pub fn is_enum_range(raw: i64) -> bool {
    (ENUM_MIN..=ENUM_MAX).contains(&raw)
}

/// True for every base type whose sign can flip between signed/unsigned,
/// i.e. the plain integer family. Floats, decimals and aggregates are
/// always reported unsigned by the signedness check.
pub fn is_signed_capable(raw: i64) -> bool {
    matches!(raw, BYTE | WORD | LONG | QUAD | OCTA)
}

/// Base type machine sizes, in bytes, for a fixed word size. ADDR/POINTER/
/// HW_ADDR track the machine word size; everything else is fixed.
pub fn base_size(raw: i64, word: WordSize) -> i64 {
    match raw {
        BYTE => 1,
        WORD => 2,
        LONG => 4,
        QUAD => 8,
        OCTA => 16,
        TFLT => 4,
        SFLT => 8,
        XFLT => 16,
        FFLT => 4,
        DFLT => 8,
        GFLT => 8,
        HFLT => 16,
        FCOMPLEX => 8,
        DCOMPLEX => 16,
        GCOMPLEX => 16,
        HCOMPLEX => 32,
        DECIMAL => 1, // per-digit size; callers add length_factor*precision + 1 overhead
        CHAR => 1,
        CHAR_VARY => 1, // per-char size; layout::overhead_bytes adds the 2-byte length prefix
        BITFIELD_B => 1,
        BITFIELD_W => 2,
        BITFIELD_L => 4,
        BITFIELD_Q => 8,
        BITFIELD_O => 16,
        BOOL => 1,
        ADDR | ADDR_HW => word.address_size(),
        ADDR_L => 4,
        ADDR_Q => 8,
        POINTER | POINTER_HW => word.address_size(),
        POINTER_L => 4,
        POINTER_Q => 8,
        ENUM_ELEM => 4,
        ENTRY => word.address_size(),
        VOID | ANY => 0,
        _ => 0,
    }
}

pub fn is_address_base_type(raw: i64) -> bool {
    matches!(
        raw,
        ADDR | ADDR_L | ADDR_Q | ADDR_HW | POINTER | POINTER_L | POINTER_Q | POINTER_HW
    )
}

/// Default tag per base type (GLOSSARY table). One entry per base type,
/// per §9 Open Questions ("the canonical table should enumerate every
/// base type exactly once — the larger, newer table is authoritative").
pub fn default_base_tag(raw: i64) -> &'static str {
    match raw {
        CONST => "K",
        BYTE => "B",
        WORD => "W",
        LONG => "L",
        QUAD => "Q",
        OCTA => "O",
        TFLT => "T",
        SFLT => "S",
        XFLT => "X",
        FFLT => "F",
        DFLT => "D",
        GFLT => "G",
        HFLT => "H",
        FCOMPLEX => "FC",
        DCOMPLEX => "DC",
        GCOMPLEX => "GC",
        HCOMPLEX => "HC",
        DECIMAL => "P",
        BITFIELD_B | BITFIELD_W | BITFIELD_L | BITFIELD_Q | BITFIELD_O => "V",
        CHAR | CHAR_VARY => "C",
        ADDR | ADDR_L | ADDR_Q | ADDR_HW => "A",
        POINTER | POINTER_L | POINTER_Q | POINTER_HW => "PS",
        BOOL => "B",
        ENUM_ELEM => "N",
        ENTRY => "E",
        VOID => "Z",
        _ => "", // ANY and anything unrecognized
    }
}

/// Strip trailing underscores from a user-supplied tag, repeatedly, the
/// way `_sdl_get_tag` does for the "tag is already supplied" branch:
/// `resolve_tag("NAME_") == resolve_tag("NAME")`, and the result is a
/// fixed point under repeated application.
pub fn strip_trailing_underscores(tag: &str) -> &str {
    tag.trim_end_matches('_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_disjoint() {
        assert!(!is_declare_range(BYTE));
        assert!(!is_item_range(DECLARE_MIN));
        assert!(!is_aggregate_range(ITEM_MAX));
        assert!(!is_enum_range(AGGREGATE_MIN));
    }

    #[test]
    fn address_family_is_recognized() {
        for raw in [ADDR, ADDR_L, ADDR_Q, ADDR_HW, POINTER, POINTER_L, POINTER_Q, POINTER_HW] {
            assert!(is_address_base_type(raw));
        }
        assert!(!is_address_base_type(BYTE));
    }

    #[test]
    fn base_sizes_follow_word_size() {
        assert_eq!(base_size(LONG, WordSize::Bits32), 4);
        assert_eq!(base_size(ADDR, WordSize::Bits32), 4);
        assert_eq!(base_size(ADDR, WordSize::Bits64), 8);
        assert_eq!(base_size(OCTA, WordSize::Bits64), 16);
    }

    #[test]
    fn decimal_base_size_is_one_per_digit() {
        // spec §8 boundary case: "DECIMAL with precision p: size equals
        // base_size * p + 1" — requires base_size(DECIMAL) == 1.
        assert_eq!(base_size(DECIMAL, WordSize::Bits64), 1);
    }

    #[test]
    fn trailing_underscore_strip_is_idempotent() {
        let once = strip_trailing_underscores("NAME_");
        let twice = strip_trailing_underscores(once);
        assert_eq!(once, "NAME");
        assert_eq!(once, twice);
    }

    #[test]
    fn default_tag_enumerates_every_base_type_once() {
        assert_eq!(default_base_tag(BYTE), "B");
        assert_eq!(default_base_tag(LONG), "L");
        assert_eq!(default_base_tag(ANY), "");
        assert_eq!(default_base_tag(POINTER), "PS");
    }
}
