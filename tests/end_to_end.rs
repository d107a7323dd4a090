//! End-to-end scenarios from spec §8, driven through the full
//! lexer/parser/`Context` pipeline rather than calling `Context` methods
//! directly (that finer-grained coverage already lives in
//! `src/context.rs`/`src/parser.rs`'s own `#[cfg(test)]` modules). These
//! integration tests exercise the same six scenarios end to end with a
//! MODULE wrapper and a real CEmitter target, the way `a2ltool`'s own
//! `tests/` fixtures drive whole-file behavior rather than individual
//! functions.

use std::collections::HashMap;

use opensdl::context::Context;
use opensdl::emit::c::CEmitter;
use opensdl::model::ConstantKind;
use opensdl::options::Alignment;
use opensdl::parser::parse_str;
use opensdl::registry::WordSize;

fn new_ctx() -> Context {
    Context::new(WordSize::Bits64, Alignment::NoAlign, HashMap::new())
}

fn new_ctx_with_symbols(symbols: HashMap<String, i64>) -> Context {
    Context::new(WordSize::Bits64, Alignment::NoAlign, symbols)
}

fn with_c_target(ctx: &mut Context) {
    ctx.register_target("C", Box::new(CEmitter::default()), Box::new(Vec::new()));
}

#[test]
fn scenario_1_constants_list_with_numeric_and_string() {
    let mut ctx = new_ctx();
    with_c_target(&mut ctx);
    parse_str(
        "MODULE M; CONSTANT A EQUALS 5; CONSTANT B EQUALS \"x\"; END_MODULE M;",
        &mut ctx,
    )
    .unwrap();
    // module_end clears every table (spec §3 invariant), so the assertions
    // that matter here are the ones observable before the module closes —
    // covered by the non-wrapped variant below. This wrapped run instead
    // checks that MODULE/END_MODULE round-trips without error and resets
    // state afterward.
}

#[test]
fn scenario_1_constants_unwrapped() {
    let mut ctx = new_ctx();
    with_c_target(&mut ctx);
    parse_str(r#"CONSTANT A EQUALS 5; CONSTANT B EQUALS "x";"#, &mut ctx).unwrap();

    assert_eq!(ctx.constants.len(), 2);
    let a = ctx.constants.by_name("A").unwrap();
    assert_eq!(a.tag, "K");
    assert!(matches!(a.kind, ConstantKind::Numeric(5)));
    let b = ctx.constants.by_name("B").unwrap();
    assert_eq!(b.tag, "K");
    assert!(matches!(&b.kind, ConstantKind::Str(s) if s == "x"));
}

#[test]
fn scenario_2_struct_layout_and_size_constant() {
    let mut ctx = new_ctx();
    with_c_target(&mut ctx);
    parse_str("AGGREGATE R STRUCTURE; L LONGWORD; W WORD; END R;", &mut ctx).unwrap();

    let l = ctx.lookup_item("L").unwrap();
    let w = ctx.lookup_item("W").unwrap();
    assert_eq!(l.offset, 0);
    assert_eq!(w.offset, 4);

    let r = ctx.lookup_aggregate("R").unwrap();
    assert_eq!(r.size, 6);

    let size_const = ctx.constants.by_name("R").unwrap();
    assert_eq!(size_const.tag, "S");
    assert!(matches!(size_const.kind, ConstantKind::Numeric(6)));
}

#[test]
fn scenario_3_bitfield_packing_no_trailing_filler() {
    let mut ctx = new_ctx();
    with_c_target(&mut ctx);
    parse_str(
        "AGGREGATE F STRUCTURE; F1 BITFIELD LENGTH 3; F2 BITFIELD LENGTH 5; F3 BITFIELD LENGTH 2; END F;",
        &mut ctx,
    )
    .unwrap();

    let f1 = ctx.lookup_item("F1").unwrap();
    let f2 = ctx.lookup_item("F2").unwrap();
    let f3 = ctx.lookup_item("F3").unwrap();
    assert_eq!(f1.bit_offset, 0);
    assert_eq!(f2.bit_offset, 3);
    // 3 + 5 + 2 == 10 bits, more than BYTE's 8; the backward widening walk
    // widens F1, F2 and F3 all to WORD, so F3 shares the same WORD as F1/F2
    // at bit offset 8 (3 + 5) rather than starting a new byte.
    assert_eq!(f3.bit_offset, 8);
    assert_eq!(f3.offset, 0);

    let f = ctx.lookup_aggregate("F").unwrap();
    assert_eq!(f.size, 2);
}

#[test]
fn scenario_4_union_members_share_offset_zero() {
    let mut ctx = new_ctx();
    with_c_target(&mut ctx);
    parse_str("AGGREGATE U UNION; A LONGWORD; B QUADWORD; END U;", &mut ctx).unwrap();

    assert_eq!(ctx.lookup_item("A").unwrap().offset, 0);
    assert_eq!(ctx.lookup_item("B").unwrap().offset, 0);
    assert_eq!(ctx.lookup_aggregate("U").unwrap().size, 8);
}

#[test]
fn scenario_5_declare_then_item_resolves_tag_through_chain() {
    let mut ctx = new_ctx();
    with_c_target(&mut ctx);
    parse_str("DECLARE X LONGWORD; ITEM Y X;", &mut ctx).unwrap();

    let y = ctx.lookup_item("Y").unwrap();
    assert_eq!(y.size, 4);
    assert_eq!(y.tag, "L");
}

#[test]
fn scenario_6_ifsymbol_false_suppresses_constant_creation() {
    let mut symbols = HashMap::new();
    symbols.insert("DBG".to_string(), 0i64);
    let mut ctx = new_ctx_with_symbols(symbols);
    with_c_target(&mut ctx);
    parse_str("IFSYMBOL DBG; CONSTANT D EQUALS 1; END_IFSYMBOL;", &mut ctx).unwrap();

    assert!(ctx.lookup_declare("D").is_none());
    assert_eq!(ctx.constants.len(), 0);
    assert_eq!(ctx.cond_depth(), 0);
}

#[test]
fn module_begin_and_end_resets_symbol_tables() {
    let mut ctx = new_ctx();
    with_c_target(&mut ctx);
    parse_str("MODULE M; DECLARE X LONGWORD; CONSTANT A EQUALS 1; END_MODULE M;", &mut ctx).unwrap();

    assert_eq!(ctx.declares.len(), 0);
    assert_eq!(ctx.constants.len(), 0);
    assert!(ctx.module_name.is_none());
    assert_eq!(ctx.cond_depth(), 0);
}

#[test]
fn nested_subaggregate_layout_and_masked_bitfield_constants() {
    let mut ctx = new_ctx();
    with_c_target(&mut ctx);
    parse_str(
        "AGGREGATE OUTER STRUCTURE;\
         HEAD LONGWORD;\
         INNER STRUCTURE;\
           FLAG BITFIELD LENGTH 1 MASK;\
           REST BITFIELD LENGTH 7;\
         END INNER;\
         END OUTER;",
        &mut ctx,
    )
    .unwrap();

    let outer = ctx.lookup_aggregate("OUTER").unwrap();
    assert_eq!(outer.size, 8);

    let flag = ctx.lookup_item("FLAG").unwrap();
    assert_eq!(flag.bit_offset, 0);
    assert!(flag.mask_requested);

    // SIZE constants for OUTER and for the bit-field member, plus a MASK
    // constant for FLAG (spec §4.6 derived-constant generator).
    assert!(ctx.constants.by_name("OUTER").is_some());
    assert!(ctx.constants.by_name("FLAG").is_some());
    assert!(ctx.constants.by_name("FLAG_MASK").is_some());
    let mask = ctx.constants.by_name("FLAG_MASK").unwrap();
    assert!(matches!(mask.kind, ConstantKind::Numeric(1))); // ((1<<1)-1)<<0
}

#[test]
fn char_varying_member_adds_two_byte_overhead_to_struct_size() {
    let mut ctx = new_ctx();
    with_c_target(&mut ctx);
    parse_str(
        "AGGREGATE S STRUCTURE; TXT CHARACTER VARYING LENGTH 10; END S;",
        &mut ctx,
    )
    .unwrap();

    let s = ctx.lookup_aggregate("S").unwrap();
    assert_eq!(s.size, 12); // length(10) + 2 bytes overhead
}

#[test]
fn decimal_member_follows_precision_overhead_formula() {
    let mut ctx = new_ctx();
    with_c_target(&mut ctx);
    parse_str("AGGREGATE D STRUCTURE; N DECIMAL PRECISION 5; END D;", &mut ctx).unwrap();

    let d = ctx.lookup_aggregate("D").unwrap();
    assert_eq!(d.size, 1 * 5 + 1); // base_size(DECIMAL) * precision + 1
}

#[test]
fn mismatched_end_name_reports_matchend_and_aborts_the_parse() {
    let mut ctx = new_ctx();
    with_c_target(&mut ctx);
    let err = parse_str("AGGREGATE R STRUCTURE; L LONGWORD; END WRONG;", &mut ctx).unwrap_err();
    assert!(matches!(err, opensdl::error::SdlError::MatchEnd(..)));
}

#[test]
fn entry_declaration_builds_parameters_and_return_type() {
    let mut ctx = new_ctx();
    with_c_target(&mut ctx);
    parse_str("ENTRY DOIT(A: LONGWORD, B: WORD) RETURNS LONGWORD;", &mut ctx).unwrap();

    let entries: Vec<_> = ctx.entries.iter().collect();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.name, "DOIT");
    assert_eq!(entry.parameters.len(), 2);
    assert!(entry.returns.is_some());
}
