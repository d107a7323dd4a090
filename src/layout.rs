//! Layout engine (spec §4.5): per-member offset/bit-offset computation,
//! bit-field packing and widening, filler insertion, and aggregate size
//! finalization. A direct, invariant-preserving port of
//! `_sdl_determine_offsets` / `_sdl_fill_bitfield` / `_sdl_aggregate_size`
//! / `_sdl_check_bitfieldSizes` in `original_source/library/utility/
//! opensdl_actions.c`.

use crate::model::{Aggregate, AggregateId, Item, ItemId, Member, MemberSlot, Table};
use crate::options::Alignment;
use crate::registry::{self, WordSize};

fn length_factor(item: &Item) -> i64 {
    let raw = if item.is_char() {
        item.length
    } else if item.is_decimal() {
        item.precision
    } else {
        1
    };
    if raw == 0 { 1 } else { raw }
}

fn overhead_bytes(item: &Item) -> i64 {
    if item.is_char_vary() {
        2
    } else if item.is_decimal() {
        1
    } else {
        0
    }
}

fn dimension_count(dim: Option<crate::options::Dimension>) -> i64 {
    match dim {
        Some(d) => d.hbound - d.lbound + 1,
        None => 1,
    }
}

/// The end-offset stride spec §4.5 defines for a scalar item: machine
/// size times length factor (CHAR/CHAR_VARY length, DECIMAL precision,
/// else 1), plus varying/decimal overhead, times the dimension count.
/// Kept as a computed property rather than folded into `item.size`
/// (spec §9 "Varying/decimal overhead").
pub fn effective_stride_item(item: &Item) -> i64 {
    let real_size = item.size * length_factor(item) + overhead_bytes(item);
    real_size * dimension_count(item.dimension)
}

pub fn effective_stride_subaggr(agg: &Aggregate) -> i64 {
    agg.size * dimension_count(agg.dimension)
}

fn widen_bitfield_type(raw: i64) -> Option<i64> {
    match raw {
        registry::BITFIELD_B => Some(registry::BITFIELD_W),
        registry::BITFIELD_W => Some(registry::BITFIELD_L),
        registry::BITFIELD_L => Some(registry::BITFIELD_Q),
        registry::BITFIELD_Q => Some(registry::BITFIELD_O),
        _ => None,
    }
}

/// Widen a single bit-field's type, one rung at a time, until its
/// container can hold `bit_length` bits or OCTA is reached. Resolves
/// §9's Open Question about the legacy redundant re-widen guard: this is
/// a single ordered ladder checked once per rung, so `length > 64`
/// legitimately reaches OCTA rather than being silently dropped.
fn widen_to_fit(raw_type: i64, bit_length: i64, word: WordSize) -> i64 {
    let mut current = raw_type;
    loop {
        let capacity = registry::base_size(current, word) * 8;
        if bit_length <= capacity {
            return current;
        }
        match widen_bitfield_type(current) {
            Some(next) => current = next,
            None => return current,
        }
    }
}

/// Bit-field widening walk (spec §4.5): starting from the member
/// immediately preceding `new_item` and scanning backward across
/// contiguous *unsized* bit-fields, accumulate total bit length; if it
/// exceeds the current type's container, widen every member in the run
/// (and `new_item`) to the next size class. A member the user explicitly
/// sized terminates the walk without being widened.
fn check_bitfield_widening(
    items: &mut Table<ItemId, Item>,
    members: &[MemberSlot],
    new_item: ItemId,
    word: WordSize,
) {
    let mut run: Vec<ItemId> = Vec::new();
    for slot in members.iter().rev() {
        match &slot.member {
            Member::Comment(_) => continue,
            Member::Item(id) => {
                let it = items.get(*id).expect("member item must exist");
                if it.is_bitfield && !it.sized_bitfield {
                    run.push(*id);
                } else {
                    break;
                }
            }
            Member::SubAggregate(_) => break,
        }
    }

    let mut total_bits = items.get(new_item).unwrap().bit_length;
    for id in &run {
        total_bits += items.get(*id).unwrap().bit_length;
    }

    let starting_type = items.get(new_item).unwrap().datatype.raw();
    let mut widened = starting_type;
    loop {
        let capacity = registry::base_size(widened, word) * 8;
        if total_bits <= capacity {
            break;
        }
        match widen_bitfield_type(widened) {
            Some(next) => widened = next,
            None => break,
        }
    }

    if widened != starting_type {
        let new_size = registry::base_size(widened, word);
        for id in run.iter().chain(std::iter::once(&new_item)) {
            let it = items.get_mut(*id).unwrap();
            it.datatype = crate::registry::TypeId(widened);
            it.size = new_size;
        }
    }
}

/// Append a filler bit-field member spanning the unused tail bits of
/// `predecessor`, named `filler_NNN` (spec §4.5 "Filler naming"),
/// inheriting its prefix and tag.
fn fill_bitfield(
    items: &mut Table<ItemId, Item>,
    members: &mut Vec<MemberSlot>,
    predecessor: ItemId,
    bits: i64,
    filler_count: &mut u32,
) {
    let pred = items.get(predecessor).unwrap().clone();
    let number = *filler_count;
    *filler_count += 1;
    let mut filler = pred.clone();
    filler.name = format!("filler_{:03}", number);
    filler.mask_requested = false;
    filler.bit_length = bits;
    filler.bit_offset = pred.bit_offset + pred.bit_length;
    filler.offset = pred.offset;
    filler.sized_bitfield = pred.sized_bitfield;
    let id = items.insert(None, filler);
    members.push(MemberSlot {
        member: Member::Item(id),
        top: members.last().map(|s| s.top).unwrap_or(true),
    });
}

#[derive(Clone, Copy)]
enum PrevInfo {
    None,
    Item {
        id: ItemId,
        is_bitfield: bool,
        offset: i64,
        size: i64,
        bit_offset: i64,
        bit_length: i64,
        stride: i64,
    },
    SubAggregate {
        offset: i64,
        stride: i64,
    },
}

fn snapshot_prev(items: &Table<ItemId, Item>, aggs: &Table<AggregateId, Aggregate>, members: &[MemberSlot]) -> PrevInfo {
    for slot in members.iter().rev() {
        match &slot.member {
            Member::Comment(_) => continue,
            Member::Item(id) => {
                let it = items.get(*id).unwrap();
                return PrevInfo::Item {
                    id: *id,
                    is_bitfield: it.is_bitfield,
                    offset: it.offset,
                    size: it.size,
                    bit_offset: it.bit_offset,
                    bit_length: it.bit_length,
                    stride: effective_stride_item(it),
                };
            }
            Member::SubAggregate(id) => {
                let agg = aggs.get(*id).unwrap();
                return PrevInfo::SubAggregate {
                    offset: agg.offset,
                    stride: effective_stride_subaggr(agg),
                };
            }
        }
    }
    PrevInfo::None
}

fn align_offset(offset: i64, alignment: Alignment, member_size: i64) -> i64 {
    match alignment {
        Alignment::NoAlign => offset,
        Alignment::Align => {
            if member_size <= 0 {
                offset
            } else {
                let adjustment = offset % member_size;
                if adjustment == 0 { offset } else { offset + (member_size - adjustment) }
            }
        }
        Alignment::Explicit(a) => {
            if a <= 0 {
                offset
            } else {
                let adjustment = offset % a;
                if adjustment == 0 { offset } else { offset + (a - adjustment) }
            }
        }
    }
}

/// Place one member into `members`, computing its offset (and, for
/// bit-fields, its bit-offset), inserting filler members as needed, and
/// pushing the finished slot. `enclosing_offset` is the enclosing
/// (sub)aggregate's own offset, used only when this is the very first
/// member ever appended to a nested sub-aggregate's list (spec §4.5 step
/// 3a / §3 MEMBER "top" flag).
#[allow(clippy::too_many_arguments)]
pub fn place_member(
    items: &mut Table<ItemId, Item>,
    aggs: &mut Table<AggregateId, Aggregate>,
    members: &mut Vec<MemberSlot>,
    member: Member,
    top: bool,
    parent_is_union: bool,
    enclosing_offset: i64,
    word: WordSize,
    filler_count: &mut u32,
) {
    if let Member::Comment(_) = &member {
        members.push(MemberSlot { member, top });
        return;
    }

    let prev = snapshot_prev(items, aggs, members);
    let new_is_bitfield = matches!(&member, Member::Item(id) if items.get(*id).unwrap().is_bitfield);

    let (mut new_offset, mut new_bit_offset) = (0i64, 0i64);

    if new_is_bitfield {
        let new_id = match &member {
            Member::Item(id) => *id,
            _ => unreachable!(),
        };

        match prev {
            PrevInfo::Item { is_bitfield: true, id: prev_id, offset, size, bit_offset, bit_length, .. } => {
                if !items.get(new_id).unwrap().sized_bitfield {
                    check_bitfield_widening(items, members, new_id, word);
                }
                // re-read: widening may have changed prev's and/or new's size
                let prev_size = items.get(prev_id).unwrap().size;
                let prev_bit_offset = items.get(prev_id).unwrap().bit_offset;
                let prev_bit_length = items.get(prev_id).unwrap().bit_length;
                let new_size = items.get(new_id).unwrap().size;
                let new_len = items.get(new_id).unwrap().bit_length;
                let avail_bits = prev_size * 8 - prev_bit_offset - prev_bit_length;

                if new_size == prev_size && new_len <= avail_bits {
                    new_bit_offset = prev_bit_offset + prev_bit_length;
                    new_offset = offset;
                } else {
                    new_bit_offset = 0;
                    new_offset = offset + prev_size;
                    if avail_bits > 0 && !parent_is_union {
                        fill_bitfield(items, members, prev_id, avail_bits, filler_count);
                    }
                }
                let _ = bit_offset;
                let _ = bit_length;
                let _ = size;
            }
            _ => {
                new_bit_offset = 0;
                new_offset = match prev {
                    PrevInfo::None => if top { 0 } else { enclosing_offset },
                    PrevInfo::Item { offset, stride, .. } => offset + stride,
                    PrevInfo::SubAggregate { offset, stride } => offset + stride,
                };
                let it = items.get_mut(new_id).unwrap();
                if it.sized_bitfield && it.bit_length > it.size * 8 {
                    let widened = widen_to_fit(it.datatype.raw(), it.bit_length, word);
                    it.datatype = crate::registry::TypeId(widened);
                    it.size = registry::base_size(widened, word);
                }
            }
        }
    } else {
        if let PrevInfo::Item { is_bitfield: true, id: prev_id, offset, size, bit_offset, bit_length, .. } = prev {
            let avail_bits = size * 8 - bit_offset - bit_length;
            if avail_bits > 0 && !parent_is_union {
                fill_bitfield(items, members, prev_id, avail_bits, filler_count);
            }
            let _ = offset;
        }

        new_offset = match prev {
            PrevInfo::None => if top { 0 } else { enclosing_offset },
            PrevInfo::Item { offset, stride, .. } => if parent_is_union { offset } else { offset + stride },
            PrevInfo::SubAggregate { offset, stride } => if parent_is_union { offset } else { offset + stride },
        };
    }

    match &member {
        Member::Item(id) => {
            let it = items.get_mut(*id).unwrap();
            it.bit_offset = new_bit_offset;
            it.offset = align_offset(new_offset, it.alignment, it.size);
        }
        Member::SubAggregate(id) => {
            let agg = aggs.get_mut(*id).unwrap();
            agg.offset = new_offset;
        }
        Member::Comment(_) => unreachable!(),
    }

    members.push(MemberSlot { member, top });
}

/// Finalize an aggregate's size once every member has been appended
/// (spec §4.5 "Aggregate size"). Closes a trailing bit-field's unused
/// bits with a filler first (non-UNION only), then computes:
/// - STRUCTURE: `last_member.offset + last_member_effective_stride`
/// - UNION: max over members of effective stride, plus (for an implicit
///   union) a filler of the base type's size if every member is smaller.
pub fn aggregate_size(
    items: &mut Table<ItemId, Item>,
    aggs: &mut Table<AggregateId, Aggregate>,
    agg_id: AggregateId,
    word: WordSize,
    filler_count: &mut u32,
) -> i64 {
    let (agg_type, is_implicit_union, base_type, mut members, is_subaggregate) = {
        let agg = aggs.get(agg_id).unwrap();
        (agg.agg_type, agg.is_implicit_union(), agg.type_id.raw(), agg.members.clone(), agg.parent.is_some())
    };

    // Spec §4.5 final bullet: the first member of a non-top sub-aggregate
    // triggers an alignment adjustment of the sub-aggregate's own offset,
    // using the sub-aggregate's alignment value against the first member's
    // size (or the max-member-size in a union). Grounded on the
    // `subAggr->offset`/`subAggr->self->offset` adjustment block at the top
    // of `_sdl_aggregate_size` in `original_source/library/utility/
    // opensdl_actions.c`. Member offsets already computed against the old
    // sub-aggregate offset are left as-is, matching the legacy behavior;
    // the arena model needs no separate "self" pointer sync (spec §5
    // [EXPANDED] "Resource teardown" — a handle-based arena already avoids
    // a class of bookkeeping the original's owner-pointer pairs needed).
    if is_subaggregate && !members.is_empty() {
        let align_size = match agg_type {
            crate::model::AggKind::Union => {
                let mut max = registry::base_size(base_type, word);
                for slot in &members {
                    let sz = match &slot.member {
                        Member::Item(id) => items.get(*id).unwrap().size,
                        Member::SubAggregate(id) => aggs.get(*id).unwrap().size,
                        Member::Comment(_) => continue,
                    };
                    max = max.max(sz);
                }
                max
            }
            crate::model::AggKind::Struct => {
                let mut sz = registry::base_size(base_type, word);
                for slot in &members {
                    sz = match &slot.member {
                        Member::Comment(_) => continue,
                        Member::Item(id) => items.get(*id).unwrap().size,
                        Member::SubAggregate(id) => aggs.get(*id).unwrap().size,
                    };
                    break;
                }
                sz
            }
        };

        let (agg_alignment, offset) = {
            let agg = aggs.get(agg_id).unwrap();
            (agg.alignment, agg.offset)
        };
        let adjustment = match agg_alignment {
            Alignment::NoAlign => 0,
            Alignment::Align => {
                if align_size <= 0 {
                    0
                } else {
                    let a = offset % align_size;
                    if a == 0 { 0 } else { align_size - a }
                }
            }
            Alignment::Explicit(a) => {
                if a <= 0 {
                    0
                } else {
                    let adj = offset % a;
                    if adj == 0 { 0 } else { a - adj }
                }
            }
        };
        if adjustment != 0 {
            aggs.get_mut(agg_id).unwrap().offset += adjustment;
        }
    }

    // close a trailing bit-field's unused bits (non-UNION only)
    if agg_type == crate::model::AggKind::Struct {
        if let PrevInfo::Item { is_bitfield: true, id, offset: _, size, bit_offset, bit_length, .. } =
            snapshot_prev(items, aggs, &members)
        {
            let avail = size * 8 - bit_offset - bit_length;
            if avail > 0 {
                fill_bitfield(items, &mut members, id, avail, filler_count);
            }
        }
    }

    let size = match agg_type {
        crate::model::AggKind::Struct => match snapshot_prev(items, aggs, &members) {
            PrevInfo::None => 0,
            PrevInfo::Item { offset, stride, .. } => offset + stride,
            PrevInfo::SubAggregate { offset, stride } => offset + stride,
        },
        crate::model::AggKind::Union => {
            let mut max_stride = 0i64;
            for slot in &members {
                let stride = match &slot.member {
                    Member::Item(id) => effective_stride_item(items.get(*id).unwrap()),
                    Member::SubAggregate(id) => effective_stride_subaggr(aggs.get(*id).unwrap()),
                    Member::Comment(_) => 0,
                };
                max_stride = max_stride.max(stride);
            }
            if is_implicit_union {
                let base = registry::base_size(base_type, word);
                if max_stride < base {
                    max_stride = base;
                }
            }
            max_stride
        }
    };

    aggs.get_mut(agg_id).unwrap().members = members;
    aggs.get_mut(agg_id).unwrap().size = size;
    size
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Location;
    use crate::model::{Item, Table};
    use crate::options::StorageClass;
    use crate::registry::TypeId;

    fn make_item(datatype: i64, size: i64) -> Item {
        Item {
            id: ItemId(0),
            name: "x".into(),
            type_id: TypeId(0),
            prefix: None,
            tag: String::new(),
            datatype: TypeId(datatype),
            size,
            alignment: Alignment::NoAlign,
            dimension: None,
            storage_class: StorageClass::Typedef,
            addr_subtype: None,
            precision: 0,
            scale: 0,
            length: 0,
            is_bitfield: false,
            sized_bitfield: false,
            bit_length: 0,
            bit_offset: 0,
            mask_requested: false,
            offset: 0,
            loc: Location::default(),
        }
    }

    #[test]
    fn struct_members_pack_sequentially() {
        let mut items: Table<ItemId, Item> = Table::new();
        let mut aggs: Table<AggregateId, Aggregate> = Table::new();
        let mut members = Vec::new();
        let mut filler = 0u32;

        let l = items.insert(None, make_item(registry::LONG, 4));
        place_member(&mut items, &mut aggs, &mut members, Member::Item(l), true, false, 0, WordSize::Bits64, &mut filler);
        let w = items.insert(None, make_item(registry::WORD, 2));
        place_member(&mut items, &mut aggs, &mut members, Member::Item(w), true, false, 0, WordSize::Bits64, &mut filler);

        assert_eq!(items.get(l).unwrap().offset, 0);
        assert_eq!(items.get(w).unwrap().offset, 4);
    }

    #[test]
    fn union_members_share_offset() {
        let mut items: Table<ItemId, Item> = Table::new();
        let mut aggs: Table<AggregateId, Aggregate> = Table::new();
        let mut members = Vec::new();
        let mut filler = 0u32;

        let a = items.insert(None, make_item(registry::LONG, 4));
        place_member(&mut items, &mut aggs, &mut members, Member::Item(a), true, true, 0, WordSize::Bits64, &mut filler);
        let b = items.insert(None, make_item(registry::QUAD, 8));
        place_member(&mut items, &mut aggs, &mut members, Member::Item(b), true, true, 0, WordSize::Bits64, &mut filler);

        assert_eq!(items.get(a).unwrap().offset, 0);
        assert_eq!(items.get(b).unwrap().offset, 0);
    }

    #[test]
    fn bitfield_run_widens_and_keeps_packing() {
        let mut items: Table<ItemId, Item> = Table::new();
        let mut aggs: Table<AggregateId, Aggregate> = Table::new();
        let mut members = Vec::new();
        let mut filler = 0u32;

        let mut f1 = make_item(registry::BITFIELD_B, 1);
        f1.is_bitfield = true;
        f1.bit_length = 3;
        let mut f2 = make_item(registry::BITFIELD_B, 1);
        f2.is_bitfield = true;
        f2.bit_length = 5;
        let mut f3 = make_item(registry::BITFIELD_B, 1);
        f3.is_bitfield = true;
        f3.bit_length = 2;

        let id1 = items.insert(None, f1);
        place_member(&mut items, &mut aggs, &mut members, Member::Item(id1), true, false, 0, WordSize::Bits64, &mut filler);
        let id2 = items.insert(None, f2);
        place_member(&mut items, &mut aggs, &mut members, Member::Item(id2), true, false, 0, WordSize::Bits64, &mut filler);
        let id3 = items.insert(None, f3);
        place_member(&mut items, &mut aggs, &mut members, Member::Item(id3), true, false, 0, WordSize::Bits64, &mut filler);

        assert_eq!(items.get(id1).unwrap().bit_offset, 0);
        assert_eq!(items.get(id2).unwrap().bit_offset, 3);
        // 3+5+2=10 bits, more than BYTE's 8; the run widens to WORD, so F3
        // shares the same WORD as F1/F2 at bit offset 8 (3+5) instead of
        // starting a new byte.
        assert_eq!(items.get(id3).unwrap().bit_offset, 8);
        assert_eq!(items.get(id3).unwrap().offset, 0);
    }

    #[test]
    fn unsized_bitfield_run_widens_to_word() {
        let mut items: Table<ItemId, Item> = Table::new();
        let mut aggs: Table<AggregateId, Aggregate> = Table::new();
        let mut members = Vec::new();
        let mut filler = 0u32;

        let mut f1 = make_item(registry::BITFIELD_B, 1);
        f1.is_bitfield = true;
        f1.bit_length = 1;
        let mut f2 = make_item(registry::BITFIELD_B, 1);
        f2.is_bitfield = true;
        f2.bit_length = 9;

        let id1 = items.insert(None, f1);
        place_member(&mut items, &mut aggs, &mut members, Member::Item(id1), true, false, 0, WordSize::Bits64, &mut filler);
        let id2 = items.insert(None, f2);
        place_member(&mut items, &mut aggs, &mut members, Member::Item(id2), true, false, 0, WordSize::Bits64, &mut filler);

        assert_eq!(items.get(id1).unwrap().datatype.raw(), registry::BITFIELD_W);
        assert_eq!(items.get(id2).unwrap().datatype.raw(), registry::BITFIELD_W);
        assert_eq!(items.get(id1).unwrap().size, 2);
        assert_eq!(items.get(id2).unwrap().bit_offset, 1);
    }

    #[test]
    fn char_vary_stride_adds_two_byte_overhead() {
        // spec §8 boundary case: "CHAR_VARY: size equals length + 2".
        let mut item = make_item(registry::CHAR_VARY, registry::base_size(registry::CHAR_VARY, WordSize::Bits64));
        item.length = 10;
        assert_eq!(effective_stride_item(&item), 12);
    }

    #[test]
    fn decimal_stride_follows_precision_overhead_formula() {
        // spec §8 boundary case: "DECIMAL with precision p: size equals
        // base_size * p + 1".
        let mut item = make_item(registry::DECIMAL, registry::base_size(registry::DECIMAL, WordSize::Bits64));
        item.precision = 5;
        assert_eq!(effective_stride_item(&item), 1 * 5 + 1);
    }
}
