//! Derived-constant generator (spec §4.6): after an aggregate's size is
//! finalized, synthesize its SIZE constant and, for each bit-field
//! member, a SIZE constant and (if requested) a MASK constant. Grounded
//! on `_sdl_aggregate_size`'s trailing constant-creation calls in
//! `original_source/library/utility/opensdl_actions.c`.

use crate::model::{Aggregate, Constant, ConstantId, ConstantKind, Item, ItemId, Member, Table};
use crate::options::Radix;
use crate::registry::{self, WordSize};

fn is_all_lower_case(name: &str) -> bool {
    name.chars().any(|c| c.is_alphabetic()) && name.chars().all(|c| !c.is_uppercase())
}

/// The aggregate's own SIZE constant: tag `"S"`, lower-cased to `"s"`
/// when the aggregate's name is itself all lower-case (spec §4.4
/// "Derived constants").
fn aggregate_size_constant(agg: &Aggregate) -> Constant {
    let tag = if is_all_lower_case(&agg.name) { "s" } else { "S" }.to_string();
    Constant {
        id: ConstantId(0), // overwritten by Table::insert's returned id
        name: agg.name.clone(),
        prefix: agg.prefix.clone(),
        tag,
        type_name: None,
        radix: Radix::Decimal,
        kind: ConstantKind::Numeric(agg.size),
        size: agg.size,
        comment: None,
        loc: agg.loc,
    }
}

fn bitfield_size_constant(item: &Item) -> Constant {
    Constant {
        id: ConstantId(0),
        name: item.name.clone(),
        prefix: item.prefix.clone(),
        tag: "S".to_string(),
        type_name: None,
        radix: Radix::Decimal,
        kind: ConstantKind::Numeric(item.bit_length),
        size: item.size,
        comment: None,
        loc: item.loc,
    }
}

/// `((1 << length) - 1) << bitOffset`, typed at the member's container
/// size (spec §4.4, and the testable property in §8).
fn bitfield_mask_constant(item: &Item) -> Constant {
    let value = ((1i64 << item.bit_length) - 1) << item.bit_offset;
    Constant {
        id: ConstantId(0),
        name: item.name.clone(),
        prefix: item.prefix.clone(),
        tag: "M".to_string(),
        type_name: None,
        radix: Radix::Hex,
        kind: ConstantKind::Numeric(value),
        size: item.size,
        comment: None,
        loc: item.loc,
    }
}

/// Derive and link the SIZE/MASK constants for one finished aggregate,
/// returning the ids of every constant created (in generation order: the
/// aggregate's own SIZE constant first, then one SIZE/MASK pair per
/// bit-field member in member order). Called once from
/// `Context::complete_aggregate` immediately after `layout::aggregate_size`.
pub fn derive_constants(
    agg: &Aggregate,
    items: &Table<ItemId, Item>,
    constants: &mut Table<ConstantId, Constant>,
    _word: WordSize,
) -> Vec<ConstantId> {
    let mut created = Vec::new();

    let size_const = aggregate_size_constant(agg);
    created.push(constants.insert(Some(&agg.name), size_const));

    for slot in &agg.members {
        if let Member::Item(id) = &slot.member {
            let item = items.get(*id).unwrap();
            if !item.is_bitfield {
                continue;
            }
            created.push(constants.insert(Some(&item.name), bitfield_size_constant(item)));
            if item.mask_requested {
                let mask_name = format!("{}_MASK", item.name);
                created.push(constants.insert(Some(&mask_name), bitfield_mask_constant(item)));
            }
        }
    }

    created
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Location;
    use crate::model::{AggKind, AggregateId, MemberSlot};
    use crate::options::{Alignment, StorageClass};
    use crate::registry::TypeId;

    fn base_item(name: &str, bit_length: i64, bit_offset: i64, mask: bool) -> Item {
        Item {
            id: ItemId(0),
            name: name.into(),
            type_id: TypeId(0),
            prefix: None,
            tag: "V".into(),
            datatype: TypeId(registry::BITFIELD_B),
            size: 1,
            alignment: Alignment::NoAlign,
            dimension: None,
            storage_class: StorageClass::Typedef,
            addr_subtype: None,
            precision: 0,
            scale: 0,
            length: 0,
            is_bitfield: true,
            sized_bitfield: false,
            bit_length,
            bit_offset,
            mask_requested: mask,
            offset: 0,
            loc: Location::default(),
        }
    }

    fn base_aggregate(name: &str, size: i64, members: Vec<MemberSlot>) -> Aggregate {
        Aggregate {
            id: AggregateId(0),
            agg_type: AggKind::Struct,
            type_id: TypeId(registry::AGGREGATE_MIN),
            name: name.into(),
            prefix: None,
            tag: "R".into(),
            marker: None,
            based_ptr_name: None,
            origin: None,
            alignment: Alignment::NoAlign,
            alignment_present: false,
            parent_alignment: Alignment::NoAlign,
            dimension: None,
            current_offset: 0,
            current_bit_offset: 0,
            offset: 0,
            size,
            members,
            storage_class: StorageClass::Typedef,
            fill: false,
            unsigned: false,
            parent: None,
            member_index: None,
            loc: Location::default(),
        }
    }

    #[test]
    fn aggregate_gets_a_size_constant() {
        let items: Table<ItemId, Item> = Table::new();
        let mut constants: Table<ConstantId, Constant> = Table::new();
        let agg = base_aggregate("REC", 6, vec![]);

        let ids = derive_constants(&agg, &items, &mut constants, WordSize::Bits64);
        assert_eq!(ids.len(), 1);
        let c = constants.get(ids[0]).unwrap();
        assert_eq!(c.tag, "S");
        assert!(matches!(c.kind, ConstantKind::Numeric(6)));
    }

    #[test]
    fn lower_case_aggregate_name_gets_lower_case_tag() {
        let items: Table<ItemId, Item> = Table::new();
        let mut constants: Table<ConstantId, Constant> = Table::new();
        let agg = base_aggregate("rec", 4, vec![]);

        let ids = derive_constants(&agg, &items, &mut constants, WordSize::Bits64);
        assert_eq!(constants.get(ids[0]).unwrap().tag, "s");
    }

    #[test]
    fn masked_bitfield_gets_size_and_mask_constants() {
        let mut items: Table<ItemId, Item> = Table::new();
        let mut constants: Table<ConstantId, Constant> = Table::new();

        let id = items.insert(None, base_item("F1", 3, 2, true));
        let agg = base_aggregate("REC", 1, vec![MemberSlot { member: Member::Item(id), top: true }]);

        let ids = derive_constants(&agg, &items, &mut constants, WordSize::Bits64);
        assert_eq!(ids.len(), 3); // aggregate SIZE + member SIZE + member MASK

        let size_const = constants.get(ids[1]).unwrap();
        assert_eq!(size_const.tag, "S");
        assert!(matches!(size_const.kind, ConstantKind::Numeric(3)));

        let mask_const = constants.get(ids[2]).unwrap();
        assert_eq!(mask_const.tag, "M");
        assert!(matches!(mask_const.radix, Radix::Hex));
        // length 3, bitOffset 2: ((1<<3)-1) << 2 == 0b11100 == 28
        assert!(matches!(mask_const.kind, ConstantKind::Numeric(28)));
    }

    #[test]
    fn unmasked_bitfield_gets_only_size_constant() {
        let mut items: Table<ItemId, Item> = Table::new();
        let mut constants: Table<ConstantId, Constant> = Table::new();

        let id = items.insert(None, base_item("F1", 4, 0, false));
        let agg = base_aggregate("REC", 1, vec![MemberSlot { member: Member::Item(id), top: true }]);

        let ids = derive_constants(&agg, &items, &mut constants, WordSize::Bits64);
        assert_eq!(ids.len(), 2);
    }
}
