//! `Context` (spec §3): the single process-wide assembly state, and the
//! declaration builders (spec §4.4) that drive it. Every parser action
//! ends up as one call into this module.
//!
//! The "operations (all take a context)" of spec §4.1 (`lookup_declare`,
//! `lookup_item`, `lookup_aggregate_by_id`, `size_of`, `is_unsigned`,
//! `is_address`) live here as `Context` methods rather than free
//! functions, since they need table access that only `Context` owns;
//! `src/registry.rs` supplies the context-free arithmetic they build on
//! (base sizes, default tags, range tests).

use std::collections::HashMap;
use std::io::Write;

use crate::cond::{CondDirective, CondEffects, CondStack};
use crate::derived;
use crate::emit::{AggregateNode, CommentFlags, Emitter};
use crate::error::{Location, SdlError, SdlResult, Status};
use crate::layout;
use crate::model::{
    AggKind, Aggregate, AggregateId, CommentMember, Constant, Declare, DeclareId, Entry, EntryId,
    Enum, EnumId, EnumMember, Item, ItemId, Local, LocalId, Member, MemberSlot, Parameter,
    PassingMechanism, Returns, Table,
};
use crate::options::{Alignment, Dimension, OptionBuffer, OptionEntry, Radix, StorageClass};
use crate::registry::{self, TypeId, WordSize};

/// One target language's output: its emitter callbacks plus the stream
/// they write to (spec §6 "one implementation per output language").
pub struct Target {
    pub name: String,
    pub emitter: Box<dyn Emitter>,
    pub out: Box<dyn Write>,
}

/// What kind of member `aggregate_member` is placing (spec §4.4's
/// `kind ∈ {STRUCTURE, UNION, scalar-item, comment}`). A scalar carries
/// everything the layout engine and emitters need about its datatype
/// that the grammar, not the option buffer, determines directly (spec
/// §3: DECIMAL's precision/scale and a bit-field's length are part of
/// the type specification itself, not an accumulated modifier).
pub enum MemberKind {
    Struct,
    Union,
    Scalar(ScalarSpec),
    Comment(String),
}

#[derive(Debug, Clone, Default)]
pub struct ScalarSpec {
    pub datatype: TypeId,
    pub precision: i64,
    pub scale: i64,
    /// CHARACTER/CHARACTER VARYING length in bytes; `-1` denotes the
    /// unbounded `CHARACTER *` form (spec error `INVUNKLEN`).
    pub length: i64,
    pub bit_length: Option<i64>,
}

/// The single process-wide assembly state (spec §3 Context).
pub struct Context {
    pub declares: Table<DeclareId, Declare>,
    pub items: Table<ItemId, Item>,
    pub aggregates: Table<AggregateId, Aggregate>,
    pub enums: Table<EnumId, Enum>,
    pub constants: Table<ConstantId_, Constant>,
    pub entries: Table<EntryId, Entry>,
    pub locals: Table<LocalId, Local>,

    option_buffer: OptionBuffer,
    cond_stack: CondStack,

    pub processing_enabled: bool,
    pub lang_enable_vec: Vec<bool>,
    language_index: HashMap<String, usize>,
    pub targets: Vec<Target>,

    pub word: WordSize,
    pub default_alignment: Alignment,

    /// Stack of currently-open aggregates; the last entry is "current".
    agg_stack: Vec<AggregateId>,
    filler_count: u32,

    symbols: HashMap<String, i64>,
    pub module_name: Option<String>,

    entry_in_progress: Option<Entry>,
}

// `ConstantId` is imported with an alias below to keep the `use` list
// above readable; re-export the real name.
use crate::model::ConstantId as ConstantId_;

impl Context {
    pub fn new(word: WordSize, default_alignment: Alignment, symbols: HashMap<String, i64>) -> Self {
        Context {
            declares: Table::new(),
            items: Table::new(),
            aggregates: Table::new(),
            enums: Table::new(),
            constants: Table::new(),
            entries: Table::new(),
            locals: Table::new(),
            option_buffer: OptionBuffer::new(),
            cond_stack: CondStack::new(),
            processing_enabled: true,
            lang_enable_vec: Vec::new(),
            language_index: HashMap::new(),
            targets: Vec::new(),
            word,
            default_alignment,
            agg_stack: Vec::new(),
            filler_count: 0,
            symbols,
            module_name: None,
            entry_in_progress: None,
        }
    }

    pub fn register_target(&mut self, name: &str, emitter: Box<dyn Emitter>, out: Box<dyn Write>) {
        let idx = self.targets.len();
        self.language_index.insert(name.to_ascii_uppercase(), idx);
        self.targets.push(Target { name: name.to_string(), emitter, out });
        self.lang_enable_vec.push(true);
    }

    pub fn push_option(&mut self, entry: OptionEntry) {
        self.option_buffer.push(entry);
    }

    /// Emit the file-level banner (spec §6 `header_stars`/`header_created`/
    /// `header_fileinfo`) on every enabled target once, before any
    /// declaration. Gated behind `--header` at the call site in
    /// `src/main.rs`, since a banner is a presentation choice, not a
    /// semantic requirement of the translation.
    pub fn emit_file_headers(&mut self, runtime: &str, input_time: &str, input_path: &str) -> SdlResult<()> {
        self.for_each_enabled(|e, out| {
            e.header_stars(out)?;
            e.header_created(out, runtime)?;
            e.header_fileinfo(out, input_time, input_path)?;
            Ok(())
        })
    }

    // ---- conditional state machine (spec §4.3) --------------------------

    pub fn conditional(&mut self, directive: CondDirective, loc: Location) -> SdlResult<()> {
        let mut effects = CondEffects {
            processing_enabled: &mut self.processing_enabled,
            lang_enable_vec: &mut self.lang_enable_vec,
            language_index: &self.language_index,
            symbols: &self.symbols,
        };
        self.cond_stack.apply(directive, &mut effects, loc)
    }

    pub fn cond_depth(&self) -> usize {
        self.cond_stack.depth()
    }

    // ---- emitter fan-out --------------------------------------------------

    fn for_each_enabled<F>(&mut self, mut f: F) -> SdlResult<()>
    where
        F: FnMut(&mut dyn Emitter, &mut dyn Write) -> SdlResult<()>,
    {
        for (target, enabled) in self.targets.iter_mut().zip(self.lang_enable_vec.iter()) {
            if *enabled {
                f(target.emitter.as_mut(), target.out.as_mut())?;
            }
        }
        Ok(())
    }

    pub fn module_begin(&mut self, name: &str, ident: Option<&str>) -> SdlResult<()> {
        self.module_name = Some(name.to_string());
        let ident = ident.map(|s| s.to_string());
        self.for_each_enabled(|e, out| e.module(out, name, ident.as_deref()))
    }

    /// Spec §3 invariant: "After `module_end`, every symbol table is
    /// empty and module-scoped state is reset."
    pub fn module_end(&mut self, loc: Location) -> SdlResult<Status> {
        if self.cond_depth() != 0 {
            return Err(SdlError::InvCondSt(loc));
        }
        let name = self.module_name.clone().unwrap_or_default();
        self.for_each_enabled(|e, out| e.module_end(out, &name))?;

        self.declares.clear();
        self.items.clear();
        self.aggregates.clear();
        self.enums.clear();
        self.constants.clear();
        self.entries.clear();
        self.locals.clear();
        self.agg_stack.clear();
        self.filler_count = 0;
        self.module_name = None;
        self.processing_enabled = true;

        Ok(Status::Normal)
    }

    pub fn literal_line(&mut self, line: &str) -> SdlResult<()> {
        if !self.processing_enabled {
            return Ok(());
        }
        let line = line.to_string();
        self.for_each_enabled(|e, out| e.literal(out, &line))
    }

    pub fn comment(&mut self, text: &str, flags: CommentFlags) -> SdlResult<()> {
        if !self.processing_enabled {
            return Ok(());
        }
        // A comment encountered while an aggregate is open also becomes a
        // `Member::Comment` so the layout engine's "skip comments when
        // finding the previous non-comment member" rule sees it (spec
        // §4.5 step 1, §3 MEMBER polymorphism).
        if let Some(&agg_id) = self.agg_stack.last() {
            let top = self.aggregates.get(agg_id).unwrap().members.is_empty()
                && self.agg_stack.len() == 1;
            let agg = self.aggregates.get_mut(agg_id).unwrap();
            agg.members.push(MemberSlot {
                member: Member::Comment(CommentMember { text: text.to_string(), loc: Location::default() }),
                top,
            });
        }
        let text = text.to_string();
        self.for_each_enabled(|e, out| e.comment(out, &text, flags))
    }

    // ---- §4.1 identifier & type registry (context-aware operations) -----

    fn declare_id_for_raw(&self, raw: i64) -> Option<DeclareId> {
        if !registry::is_declare_range(raw) {
            return None;
        }
        let idx = (raw - registry::DECLARE_MIN) as usize;
        (idx < self.declares.len()).then_some(DeclareId(idx))
    }

    fn item_id_for_raw(&self, raw: i64) -> Option<ItemId> {
        if !registry::is_item_range(raw) {
            return None;
        }
        let idx = (raw - registry::ITEM_MIN) as usize;
        (idx < self.items.len()).then_some(ItemId(idx))
    }

    fn aggregate_id_for_raw(&self, raw: i64) -> Option<AggregateId> {
        if !registry::is_aggregate_range(raw) {
            return None;
        }
        let idx = (raw - registry::AGGREGATE_MIN) as usize;
        (idx < self.aggregates.len()).then_some(AggregateId(idx))
    }

    fn enum_id_for_raw(&self, raw: i64) -> Option<EnumId> {
        if !registry::is_enum_range(raw) {
            return None;
        }
        let idx = (raw - registry::ENUM_MIN) as usize;
        (idx < self.enums.len()).then_some(EnumId(idx))
    }

    pub fn lookup_declare(&self, name: &str) -> Option<&Declare> {
        self.declares.by_name(name)
    }

    pub fn lookup_item(&self, name: &str) -> Option<&Item> {
        self.items.by_name(name)
    }

    pub fn lookup_aggregate_by_id(&self, type_id: TypeId) -> Option<&Aggregate> {
        self.aggregate_id_for_raw(type_id.raw()).and_then(|id| self.aggregates.get(id))
    }

    pub fn lookup_aggregate(&self, name: &str) -> Option<&Aggregate> {
        self.aggregates.by_name(name)
    }

    pub fn lookup_enum(&self, name: &str) -> Option<&Enum> {
        self.enums.by_name(name)
    }

    /// `sizeof(type)` (spec §4.1 / §4.1 [EXPANDED]): base types return
    /// their machine size at the context's word size; DECLARE/ITEM/
    /// AGGREGATE dereference to their stored size; ENUM returns the
    /// element representation's size.
    pub fn size_of(&self, type_id: TypeId) -> i64 {
        let raw = type_id.raw().abs();
        if registry::is_base_type(raw) {
            return registry::base_size(raw, self.word);
        }
        if let Some(id) = self.declare_id_for_raw(raw) {
            return self.declares.get(id).map(|d| d.size).unwrap_or(0);
        }
        if let Some(id) = self.item_id_for_raw(raw) {
            return self.items.get(id).map(|i| i.size).unwrap_or(0);
        }
        if let Some(id) = self.aggregate_id_for_raw(raw) {
            return self.aggregates.get(id).map(|a| a.size).unwrap_or(0);
        }
        if registry::is_enum_range(raw) {
            return registry::base_size(registry::ENUM_ELEM, self.word);
        }
        0
    }

    /// `isUnsigned(type)`: normalizes `typeID` in place (sign encodes
    /// signedness only for the plain-integer base types) and returns the
    /// signedness bit, recursing through DECLARE/ITEM/ENUM aliasing
    /// (spec §4.1 / [EXPANDED]).
    pub fn is_unsigned(&self, type_id: TypeId) -> (TypeId, bool) {
        let raw = type_id.raw();
        let normalized = TypeId(raw.abs());
        let abs = raw.abs();
        if registry::is_base_type(abs) {
            let unsigned = if registry::is_signed_capable(abs) { raw >= 0 } else { true };
            return (normalized, unsigned);
        }
        if let Some(id) = self.declare_id_for_raw(abs) {
            if let Some(d) = self.declares.get(id) {
                return (normalized, d.unsigned);
            }
        }
        if let Some(id) = self.item_id_for_raw(abs) {
            if let Some(i) = self.items.get(id) {
                return self.is_unsigned(i.datatype);
            }
        }
        if let Some(id) = self.enum_id_for_raw(abs) {
            if let Some(e) = self.enums.get(id) {
                return self.is_unsigned(e.type_def);
            }
        }
        (normalized, true)
    }

    /// `isAddress(type)`: true for the ADDR/POINTER base-type family,
    /// resolving through one level of DECLARE aliasing (spec §4.1
    /// [EXPANDED]: "an address-typed DECLARE is itself address-like").
    pub fn is_address(&self, type_id: TypeId) -> bool {
        let raw = type_id.raw();
        if registry::is_address_base_type(raw) {
            return true;
        }
        if let Some(id) = self.declare_id_for_raw(raw) {
            if let Some(d) = self.declares.get(id) {
                return registry::is_address_base_type(d.underlying_type.raw());
            }
        }
        false
    }

    /// Tag defaulting (spec §4.4 "Tag defaulting"): recurse through
    /// DECLARE/ITEM until a base type is reached; an AGGREGATE or ENUM
    /// terminates the walk at its own fixed GLOSSARY tag (`R`/`N`)
    /// rather than recursing further, since neither carries a further
    /// "underlying type" chain. Falls back to the ANY tag `""` if a
    /// reference dangles.
    pub fn resolve_tag(&self, type_id: TypeId) -> String {
        let raw = type_id.raw().abs();
        if registry::is_base_type(raw) {
            return registry::default_base_tag(raw).to_string();
        }
        if let Some(id) = self.declare_id_for_raw(raw) {
            return match self.declares.get(id) {
                Some(d) => self.resolve_tag(d.underlying_type),
                None => String::new(),
            };
        }
        if let Some(id) = self.item_id_for_raw(raw) {
            return match self.items.get(id) {
                Some(i) => self.resolve_tag(i.datatype),
                None => String::new(),
            };
        }
        if registry::is_aggregate_range(raw) {
            return "R".to_string();
        }
        if registry::is_enum_range(raw) {
            return "N".to_string();
        }
        String::new()
    }

    /// Combine an explicit `Tag` option (trailing-underscore-stripped)
    /// with `resolve_tag`'s default, then lower-case the whole tag when
    /// `name` is itself all lower-case (spec §4.4 "Tag defaulting").
    fn final_tag(&self, name: &str, user_tag: Option<&str>, datatype: TypeId) -> String {
        let tag = match user_tag {
            Some(t) => registry::strip_trailing_underscores(t).to_string(),
            None => self.resolve_tag(datatype),
        };
        if is_all_lower(name) { tag.to_lowercase() } else { tag }
    }

    // ---- §4.4 DECLARE builder --------------------------------------------

    /// DECLARE is silently idempotent: redeclaring an existing name is a
    /// no-op rather than an error (spec §4.4 "Duplicate semantics").
    pub fn declare(&mut self, name: &str, underlying: TypeId, loc: Location) -> SdlResult<Status> {
        let opts = DrainedOptions::collect(self.option_buffer.drain());
        if !self.processing_enabled {
            return Ok(Status::NotCreated);
        }
        if self.declares.contains_name(name) {
            return Ok(Status::NotCreated);
        }

        let unsigned = match opts.signed {
            Some(explicit_signed) => !explicit_signed,
            None => self.is_unsigned(underlying).1,
        };
        let size = self.size_of(underlying);
        let tag = self.final_tag(name, opts.tag.as_deref(), underlying);
        let new_id = self.declares.next_id();
        let type_id = TypeId(registry::DECLARE_MIN + new_id.0 as i64);
        let record = Declare {
            id: new_id,
            name: name.to_string(),
            type_id,
            prefix: opts.prefix,
            tag,
            underlying_type: underlying,
            size,
            unsigned,
            loc,
        };
        let id = self.declares.insert(Some(name), record);
        let snapshot = self.declares.get(id).unwrap().clone();
        self.for_each_enabled(|e, out| e.declare(out, &snapshot))?;
        Ok(Status::Created)
    }

    // ---- §4.4 ITEM builder ------------------------------------------------

    /// ITEM refuses redefinition (spec §4.4 "Duplicate semantics":
    /// `ABORT`).
    pub fn item(&mut self, name: &str, spec: ScalarSpec, loc: Location) -> SdlResult<Status> {
        let opts = DrainedOptions::collect(self.option_buffer.drain());
        if !self.processing_enabled {
            return Ok(Status::NotCreated);
        }
        if self.items.contains_name(name) {
            return Err(SdlError::Abort(loc, name.to_string()));
        }
        if spec.length == -1 {
            return Err(SdlError::InvUnkLen(loc));
        }

        let item = self.build_item_record(name, &spec, &opts, self.default_alignment, loc)?;
        let new_id = self.items.next_id();
        let mut item = item;
        item.id = new_id;
        item.type_id = TypeId(registry::ITEM_MIN + new_id.0 as i64);
        let id = self.items.insert(Some(name), item);
        let snapshot = self.items.get(id).unwrap().clone();
        self.for_each_enabled(|e, out| e.item(out, &snapshot))?;
        Ok(Status::Created)
    }

    fn build_item_record(
        &self,
        name: &str,
        spec: &ScalarSpec,
        opts: &DrainedOptions,
        inherited_alignment: Alignment,
        loc: Location,
    ) -> SdlResult<Item> {
        let storage_class = opts.storage.unwrap_or(StorageClass::Typedef);
        let dimension = opts.dimension;
        // BaseAlign, when present, is applied directly and unconditionally
        // (original_source's `sdl_item_compl`: `myItem->alignment = basealign`),
        // bypassing the Align/NoAlign fallback chain entirely.
        let alignment = match opts.base_align {
            Some(0) => Alignment::NoAlign,
            Some(v) => Alignment::Explicit(v),
            None => opts.align.unwrap_or(inherited_alignment),
        };
        let tag = self.final_tag(name, opts.tag.as_deref(), spec.datatype);

        let is_bitfield = spec.bit_length.is_some();
        let bit_length = spec.bit_length.unwrap_or(0);
        if is_bitfield && bit_length <= 0 {
            return Err(SdlError::ZeroLen(loc, name.to_string()));
        }

        let mut datatype = spec.datatype;
        let sized_bitfield = is_bitfield && opts.subtype.is_some();
        if let Some(subtype_raw) = opts.subtype {
            datatype = TypeId(subtype_raw);
        }
        let mut size = self.size_of(datatype);
        if is_bitfield && sized_bitfield && bit_length > size * 8 {
            // widen a user-sized bit-field that is too small for its own
            // stated length (spec §4.5 step 3a).
            let mut widened = datatype.raw();
            loop {
                let capacity = registry::base_size(widened, self.word) * 8;
                if bit_length <= capacity {
                    break;
                }
                widened = match widened {
                    registry::BITFIELD_B => registry::BITFIELD_W,
                    registry::BITFIELD_W => registry::BITFIELD_L,
                    registry::BITFIELD_L => registry::BITFIELD_Q,
                    registry::BITFIELD_Q => registry::BITFIELD_O,
                    other => other,
                };
                if widened == datatype.raw() {
                    break;
                }
                datatype = TypeId(widened);
            }
            size = registry::base_size(datatype.raw(), self.word);
        }

        Ok(Item {
            id: ItemId(0),
            name: name.to_string(),
            type_id: TypeId(0),
            prefix: opts.prefix.clone(),
            tag,
            datatype,
            size,
            alignment,
            dimension,
            storage_class,
            addr_subtype: opts.subtype.map(TypeId).filter(|_| self.is_address(datatype)),
            precision: spec.precision,
            scale: spec.scale,
            length: spec.length,
            is_bitfield,
            sized_bitfield,
            bit_length,
            bit_offset: 0,
            mask_requested: opts.mask.unwrap_or(false),
            offset: 0,
            loc,
        })
    }

    // ---- §4.4 CONSTANT / ENUM builder ------------------------------------

    /// A single CONSTANT statement may declare a comma-separated list
    /// and/or alternate between CONSTANT and ENUM shape based on the
    /// `Enumerate` option, so one call performs both `begin` and
    /// `complete` (spec §4.4).
    pub fn constant_or_enum(&mut self, id_list: &str, value: ConstantValue, loc: Location) -> SdlResult<Status> {
        let opts = DrainedOptions::collect(self.option_buffer.drain());
        if !self.processing_enabled {
            return Ok(Status::NotCreated);
        }

        let (names, trailing_comment) = crate::model::constant::split_constant_list(id_list);
        if names.is_empty() {
            return Ok(Status::NotCreated);
        }

        if opts.enumerate.unwrap_or(false) {
            return self.build_enum(&names, &opts, loc);
        }

        let radix = opts.radix.unwrap_or(Radix::Decimal);
        let increment = opts.increment.unwrap_or(0);
        let mut numeric = match value {
            ConstantValue::Numeric(v) => Some(v),
            ConstantValue::Str(_) => None,
        };

        for name in &names {
            let kind = match (&value, numeric) {
                (ConstantValue::Str(s), _) => crate::model::ConstantKind::Str(s.clone()),
                (ConstantValue::Numeric(_), Some(v)) => crate::model::ConstantKind::Numeric(v),
                _ => unreachable!(),
            };
            let tag = self.final_tag(name, opts.tag.as_deref(), TypeId(registry::CONST));
            let size = match &kind {
                crate::model::ConstantKind::Numeric(_) => self.size_of(TypeId(registry::LONG)),
                crate::model::ConstantKind::Str(s) => s.len() as i64,
            };
            let record = Constant {
                id: ConstantId_(0),
                name: name.clone(),
                prefix: opts.prefix.clone(),
                tag,
                type_name: opts.type_name.clone(),
                radix,
                kind,
                size,
                comment: trailing_comment.clone(),
                loc,
            };
            let id = self.constants.insert(Some(name), record);
            let snapshot = self.constants.get(id).unwrap().clone();
            self.for_each_enabled(|e, out| e.constant(out, &snapshot))?;

            if let Some(counter_name) = &opts.counter {
                self.advance_counter(counter_name, increment);
            }
            if let Some(v) = numeric {
                numeric = Some(v + increment);
            }
        }

        Ok(Status::Created)
    }

    fn advance_counter(&mut self, name: &str, increment: i64) {
        match self.locals.id_by_name(name) {
            Some(id) => {
                if let Some(local) = self.locals.get_mut(id) {
                    local.value += increment;
                }
            }
            None => {
                // The guard from spec §9/[EXPANDED]: the record is only
                // recorded after it is successfully created, so there is
                // no window where `value` is set on a local that failed
                // to allocate.
                let new_id = self.locals.next_id();
                let local = Local { id: new_id, name: name.to_string(), value: increment };
                self.locals.insert(Some(name), local);
            }
        }
    }

    fn build_enum(&mut self, names: &[String], opts: &DrainedOptions, loc: Location) -> SdlResult<Status> {
        let mut members = Vec::with_capacity(names.len());
        let mut next_value = 0i64;
        for raw_name in names {
            // `NAME = value` form, else default to previous + 1.
            if let Some((member_name, value_str)) = raw_name.split_once('=') {
                let member_name = member_name.trim().to_string();
                let value: i64 = value_str.trim().parse().unwrap_or(next_value);
                members.push(EnumMember { name: member_name, value, value_set: true });
                next_value = value + 1;
            } else {
                members.push(EnumMember { name: raw_name.clone(), value: next_value, value_set: false });
                next_value += 1;
            }
        }

        let enum_name = opts
            .type_name
            .clone()
            .unwrap_or_else(|| names.first().cloned().unwrap_or_default());
        let tag = self.final_tag(&enum_name, opts.tag.as_deref(), TypeId(registry::ENUM_ELEM));
        let new_id = self.enums.next_id();
        let record = Enum {
            id: new_id,
            name: enum_name.clone(),
            prefix: opts.prefix.clone(),
            tag,
            type_def: TypeId(registry::ENUM_ELEM),
            members,
            loc,
        };
        let id = self.enums.insert(Some(&enum_name), record);
        let snapshot = self.enums.get(id).unwrap().clone();
        self.for_each_enabled(|e, out| e.enumerate(out, &snapshot))?;
        Ok(Status::Created)
    }

    // ---- §4.4 AGGREGATE / member builder ----------------------------------

    pub fn aggregate_begin(
        &mut self,
        name: &str,
        agg_type: AggKind,
        datatype: Option<TypeId>,
        loc: Location,
    ) -> SdlResult<()> {
        let opts = DrainedOptions::collect(self.option_buffer.drain());
        if !self.processing_enabled {
            return Ok(());
        }

        // Step 1 (spec §4.4): whatever is sitting in the buffer at this
        // point was accumulated *before* this declaration was recognized,
        // i.e. it belongs to the previous member of the enclosing
        // aggregate (or the enclosing aggregate's own header, if it has no
        // members yet). Grounded on `sdl_aggregate_member`'s options loop,
        // which always resolves against `context->currentAggr`'s last
        // member, never against the new member being allocated.
        self.apply_options_to_last_member(&opts);

        let parent = self.agg_stack.last().copied();
        let (prefix, marker, parent_alignment) = match parent {
            Some(parent_id) => {
                let p = self.aggregates.get(parent_id).unwrap();
                (p.prefix.clone(), p.marker.clone(), p.alignment)
            }
            None => (None, None, self.default_alignment),
        };

        // A new (sub)aggregate's own tag/prefix/alignment/marker are never
        // sourced from the option buffer at creation time — only inherited
        // from the parent, or from type. Any TAG/PREFIX/ALIGN/etc. stated
        // on this aggregate's own header line stay pending in the buffer
        // and land on it later, the first time `apply_options_to_last_member`
        // finds it with no members yet (see the `None` arm there).
        let type_raw = datatype.map(|t| t.raw()).unwrap_or(0);
        let tag = self.final_tag(name, None, TypeId(if type_raw != 0 { type_raw } else { registry::AGGREGATE_MIN }));

        let new_id = self.aggregates.next_id();
        let type_id = TypeId(registry::AGGREGATE_MIN + new_id.0 as i64);
        let record = Aggregate {
            id: new_id,
            agg_type,
            type_id: datatype.unwrap_or(type_id),
            name: name.to_string(),
            prefix,
            tag,
            marker,
            based_ptr_name: None,
            origin: None,
            alignment: parent_alignment,
            alignment_present: false,
            parent_alignment,
            dimension: None,
            current_offset: 0,
            current_bit_offset: 0,
            offset: 0,
            size: 0,
            members: Vec::new(),
            storage_class: StorageClass::Typedef,
            fill: false,
            unsigned: datatype.map(|d| self.is_unsigned(d).1).unwrap_or(true),
            parent,
            member_index: None,
            loc,
        };
        let id = self.aggregates.insert(Some(name), record);

        if let Some(parent_id) = parent {
            let slot_index = self.aggregates.get(parent_id).unwrap().members.len();
            let top = self.agg_stack.len() == 1;
            let parent_is_union = self.aggregates.get(parent_id).unwrap().agg_type == AggKind::Union;
            let enclosing_offset = self.aggregates.get(parent_id).unwrap().offset;
            let mut members = std::mem::take(&mut self.aggregates.get_mut(parent_id).unwrap().members);
            layout::place_member(
                &mut self.items,
                &mut self.aggregates,
                &mut members,
                Member::SubAggregate(id),
                top,
                parent_is_union,
                enclosing_offset,
                self.word,
                &mut self.filler_count,
            );
            self.aggregates.get_mut(parent_id).unwrap().members = members;
            self.aggregates.get_mut(id).unwrap().member_index = Some(slot_index);
        }

        self.agg_stack.push(id);
        let snapshot = self.aggregates.get(id).unwrap().clone();
        self.for_each_enabled(|e, out| e.aggregate_member(out, AggregateNode::Aggregate(&snapshot), false, 0))
    }

    /// Drains the option buffer into whatever is currently "last" inside
    /// the open aggregate (its last member), or the aggregate header
    /// itself if it has no members yet (spec §4.4 "aggregate_member"
    /// step 1, grounded on `sdl_aggregate_member`'s/`sdl_aggregate_compl`'s
    /// options loop in `original_source`).
    fn apply_options_to_last_member(&mut self, opts: &DrainedOptions) {
        let Some(&agg_id) = self.agg_stack.last() else { return };
        let last_member = self.aggregates.get(agg_id).unwrap().members.iter().rev().find_map(|slot| match &slot.member {
            Member::Item(id) => Some(Member::Item(*id)),
            Member::SubAggregate(id) => Some(Member::SubAggregate(*id)),
            Member::Comment(_) => None,
        });

        match last_member {
            Some(Member::Item(item_id)) => {
                let item = self.items.get_mut(item_id).unwrap();
                if let Some(p) = &opts.prefix {
                    item.prefix = Some(p.clone());
                }
                if let Some(t) = &opts.tag {
                    item.tag = registry::strip_trailing_underscores(t).to_string();
                }
                if let Some(m) = opts.mask {
                    item.mask_requested = m;
                }
                if let Some(d) = opts.dimension {
                    item.dimension = Some(d);
                }
                if let Some(a) = opts.align {
                    item.alignment = a;
                }
            }
            Some(Member::SubAggregate(sub_id)) => {
                let sub = self.aggregates.get_mut(sub_id).unwrap();
                if let Some(p) = &opts.prefix {
                    sub.prefix = Some(p.clone());
                }
                if let Some(t) = &opts.tag {
                    sub.tag = registry::strip_trailing_underscores(t).to_string();
                }
                if let Some(b) = &opts.based {
                    sub.based_ptr_name = Some(b.clone());
                }
                if let Some(o) = &opts.origin {
                    sub.origin = Some(crate::model::Origin { name: o.clone(), resolved_offset: None });
                }
            }
            None => {
                // No member yet: these modifiers belong to the
                // aggregate header itself.
                if let Some(&agg_id) = self.agg_stack.last() {
                    let agg = self.aggregates.get_mut(agg_id).unwrap();
                    if let Some(p) = &opts.prefix {
                        agg.prefix = Some(p.clone());
                    }
                    if let Some(t) = &opts.tag {
                        agg.tag = registry::strip_trailing_underscores(t).to_string();
                    }
                    if let Some(a) = opts.align {
                        agg.alignment = a;
                        agg.alignment_present = true;
                    }
                    if let Some(b) = &opts.based {
                        agg.based_ptr_name = Some(b.clone());
                    }
                    if let Some(o) = &opts.origin {
                        agg.origin = Some(crate::model::Origin { name: o.clone(), resolved_offset: None });
                    }
                }
            }
        }
    }

    pub fn aggregate_member(&mut self, name: Option<&str>, kind: MemberKind, loc: Location) -> SdlResult<()> {
        let opts = DrainedOptions::collect(self.option_buffer.drain());
        if !self.processing_enabled {
            return Ok(());
        }
        let Some(&agg_id) = self.agg_stack.last() else {
            return Ok(());
        };

        // Step 1: attach trailing qualifiers from *previous* statements to
        // whatever was declared last, before this new member is created.
        self.apply_options_to_last_member(&opts);

        match kind {
            MemberKind::Struct | MemberKind::Union => {
                let name = name.ok_or(SdlError::InvAggrNam(loc))?;
                let sub_agg_type = if matches!(kind, MemberKind::Union) { AggKind::Union } else { AggKind::Struct };
                self.aggregate_begin(name, sub_agg_type, None, loc)
            }
            MemberKind::Comment(text) => {
                let top = self.aggregates.get(agg_id).unwrap().members.is_empty() && self.agg_stack.len() == 1;
                self.aggregates.get_mut(agg_id).unwrap().members.push(MemberSlot {
                    member: Member::Comment(CommentMember { text, loc }),
                    top,
                });
                Ok(())
            }
            MemberKind::Scalar(spec) => {
                let name = name.ok_or(SdlError::InvAggrNam(loc))?;
                if spec.length == -1 {
                    return Err(SdlError::InvUnkLen(loc));
                }
                let parent_alignment = self.aggregates.get(agg_id).unwrap().alignment;
                // SubType/Mask, unlike every other qualifier, configure the
                // *new* member in the same call that creates it (grounded on
                // `sdl_aggregate_member`'s local `subType`/`mask` variables,
                // populated from this statement's own options and used
                // immediately to build the member it is completing — every
                // other qualifier in that same loop instead writes onto the
                // previous member, handled above by
                // `apply_options_to_last_member`).
                let local_opts = DrainedOptions::for_new_member(&opts);
                let mut item = self.build_item_record(name, &spec, &local_opts, parent_alignment, loc)?;
                if item.is_bitfield && item.bit_length <= 0 {
                    return Err(SdlError::ZeroLen(loc, name.to_string()));
                }
                let new_id = self.items.next_id();
                item.id = new_id;
                item.type_id = TypeId(registry::ITEM_MIN + new_id.0 as i64);
                let id = self.items.insert(Some(name), item);

                let top = self.aggregates.get(agg_id).unwrap().members.is_empty() && self.agg_stack.len() == 1;
                let parent_is_union = self.aggregates.get(agg_id).unwrap().agg_type == AggKind::Union;
                let enclosing_offset = self.aggregates.get(agg_id).unwrap().offset;
                let mut members = std::mem::take(&mut self.aggregates.get_mut(agg_id).unwrap().members);
                layout::place_member(
                    &mut self.items,
                    &mut self.aggregates,
                    &mut members,
                    Member::Item(id),
                    top,
                    parent_is_union,
                    enclosing_offset,
                    self.word,
                    &mut self.filler_count,
                );
                self.aggregates.get_mut(agg_id).unwrap().members = members;

                // ORIGIN resolution: set at most once, to the first
                // descendant matching the requested name (spec §3
                // invariant).
                self.resolve_origin(agg_id, name, self.items.get(id).unwrap().offset);

                let snapshot = self.items.get(id).unwrap().clone();
                self.for_each_enabled(|e, out| e.aggregate_member(out, AggregateNode::Item(&snapshot), false, self.depth_of(agg_id)))
            }
        }
    }

    fn depth_of(&self, mut agg_id: AggregateId) -> usize {
        let mut depth = 0;
        while let Some(parent) = self.aggregates.get(agg_id).and_then(|a| a.parent) {
            depth += 1;
            agg_id = parent;
        }
        depth
    }

    fn resolve_origin(&mut self, agg_id: AggregateId, member_name: &str, offset: i64) {
        let mut current = Some(agg_id);
        while let Some(id) = current {
            let agg = self.aggregates.get_mut(id).unwrap();
            if let Some(origin) = &mut agg.origin {
                if origin.resolved_offset.is_none() && origin.name == member_name {
                    origin.resolved_offset = Some(offset);
                }
            }
            current = agg.parent;
        }
    }

    /// Aggregate completion (spec §4.4 "Aggregate completion"): decrements
    /// depth; at depth 0 finalizes size, derives SIZE/MASK constants, and
    /// fans out the opening/member/closing emitter calls.
    pub fn aggregate_end(&mut self, name: &str, loc: Location) -> SdlResult<Status> {
        let trailing = DrainedOptions::collect(self.option_buffer.drain());
        if !self.processing_enabled {
            return Ok(Status::NotCreated);
        }
        let Some(&agg_id) = self.agg_stack.last() else {
            return Ok(Status::NotCreated);
        };
        self.apply_options_to_last_member(&trailing);

        {
            let agg = self.aggregates.get(agg_id).unwrap();
            if agg.name != name {
                return Err(SdlError::MatchEnd(loc, name.to_string(), agg.name.clone()));
            }
            if agg.members.is_empty() {
                return Err(SdlError::NullStruct(loc, name.to_string()));
            }
            if let Some(based) = &agg.based_ptr_name {
                let _ = based; // presence is sufficient; absence is checked where an ADDR/POINTER item references this aggregate (see `check_based_reference`).
            }
        }

        layout::aggregate_size(&mut self.items, &mut self.aggregates, agg_id, self.word, &mut self.filler_count);
        self.agg_stack.pop();

        if self.agg_stack.is_empty() {
            let snapshot = self.aggregates.get(agg_id).unwrap().clone();
            derived::derive_constants(&snapshot, &self.items, &mut self.constants, self.word);
            self.emit_aggregate_tree(agg_id, 0)?;
        } else {
            // nested sub-aggregate: just close its emitter bracket, the
            // enclosing aggregate's own close happens when *it* reaches
            // depth 0.
            let snapshot = self.aggregates.get(agg_id).unwrap().clone();
            let depth = self.depth_of(agg_id) + 1;
            self.for_each_enabled(|e, out| e.aggregate_member(out, AggregateNode::Aggregate(&snapshot), true, depth))?;
        }

        Ok(Status::Created)
    }

    fn emit_aggregate_tree(&mut self, agg_id: AggregateId, depth: usize) -> SdlResult<()> {
        let members = self.aggregates.get(agg_id).unwrap().members.clone();
        for slot in &members {
            match &slot.member {
                Member::Item(id) => {
                    let item = self.items.get(*id).unwrap().clone();
                    self.for_each_enabled(|e, out| e.aggregate_member(out, AggregateNode::Item(&item), false, depth + 1))?;
                }
                Member::SubAggregate(sub_id) => {
                    self.emit_aggregate_tree(*sub_id, depth + 1)?;
                }
                Member::Comment(c) => {
                    let text = c.text.clone();
                    self.for_each_enabled(|e, out| e.aggregate_member(out, AggregateNode::Comment(&text), false, depth + 1))?;
                }
            }
        }
        let agg = self.aggregates.get(agg_id).unwrap().clone();
        self.for_each_enabled(|e, out| e.aggregate_member(out, AggregateNode::Aggregate(&agg), true, depth))
    }

    /// Validates that every ADDR/POINTER item whose sub-type names an
    /// aggregate references one declared BASED (spec §3 invariant,
    /// error `ADROBJBAS`). Called once per item at `complete` time by
    /// callers that know the sub-type is itself an aggregate id.
    pub fn check_based_reference(&self, subtype: TypeId, loc: Location) -> SdlResult<()> {
        if let Some(agg) = self.lookup_aggregate_by_id(subtype) {
            if agg.based_ptr_name.is_none() {
                return Err(SdlError::AdrObjBas(loc, agg.name.clone()));
            }
        }
        Ok(())
    }

    // ---- §4.4 ENTRY / PARAMETER builder -----------------------------------

    pub fn entry_begin(&mut self, name: &str, loc: Location) {
        self.option_buffer.drain();
        self.entry_in_progress = Some(Entry {
            id: EntryId(0),
            name: name.to_string(),
            alias: None,
            linkage: None,
            type_name: None,
            variable: None,
            returns: None,
            parameters: Vec::new(),
            loc,
        });
    }

    pub fn entry_add_parameter(&mut self, name: &str, type_id: TypeId, type_name: Option<String>) {
        let opts = DrainedOptions::collect(self.option_buffer.drain());
        let passing = if opts.out.unwrap_or(false) && !opts.in_.unwrap_or(true) {
            PassingMechanism::ByRef
        } else {
            PassingMechanism::ByValue
        };
        let parameter = Parameter {
            name: name.to_string(),
            type_id,
            type_name,
            passing,
            in_: opts.in_.unwrap_or(true),
            out: opts.out.unwrap_or(false),
            optional: opts.optional.unwrap_or(false),
            list: opts.list.unwrap_or(false),
            dimension: opts.dimension,
            bound: opts.returns_type,
            default: opts.default_value,
            has_default: opts.default_value.is_some(),
        };
        if let Some(entry) = &mut self.entry_in_progress {
            entry.parameters.push(parameter);
        }
    }

    pub fn entry_complete(&mut self, loc: Location) -> SdlResult<Status> {
        let opts = DrainedOptions::collect(self.option_buffer.drain());
        if !self.processing_enabled {
            self.entry_in_progress = None;
            return Ok(Status::NotCreated);
        }
        let Some(mut entry) = self.entry_in_progress.take() else {
            return Ok(Status::NotCreated);
        };
        entry.alias = opts.alias;
        entry.linkage = opts.linkage;
        entry.variable = opts.variable;
        entry.type_name = opts.type_name;
        if let Some(returns_type) = opts.returns_type {
            let (normalized, unsigned) = self.is_unsigned(TypeId(returns_type));
            entry.returns = Some(Returns { type_id: normalized, unsigned, name: opts.returns_named });
        }
        entry.loc = loc;

        let new_id = self.entries.next_id();
        entry.id = new_id;
        let name = entry.name.clone();
        let id = self.entries.insert(Some(&name), entry);
        let snapshot = self.entries.get(id).unwrap().clone();
        self.for_each_enabled(|e, out| e.entry(out, &snapshot))?;
        Ok(Status::Created)
    }
}

pub enum ConstantValue {
    Numeric(i64),
    Str(String),
}

fn is_all_lower(name: &str) -> bool {
    name.chars().any(|c| c.is_alphabetic()) && name.chars().all(|c| !c.is_uppercase())
}

/// The result of draining the option buffer: one `Option<T>` per option
/// kind (spec §4.2's closed set), consumed by whichever builder is
/// currently completing.
#[derive(Debug, Default, Clone)]
struct DrainedOptions {
    align: Option<Alignment>,
    base_align: Option<i64>,
    prefix: Option<String>,
    tag: Option<String>,
    marker: Option<String>,
    based: Option<String>,
    origin: Option<String>,
    counter: Option<String>,
    type_name: Option<String>,
    increment: Option<i64>,
    radix: Option<Radix>,
    enumerate: Option<bool>,
    storage: Option<StorageClass>,
    fill: Option<bool>,
    mask: Option<bool>,
    signed: Option<bool>,
    subtype: Option<i64>,
    dimension: Option<Dimension>,
    alias: Option<String>,
    linkage: Option<String>,
    variable: Option<String>,
    returns_type: Option<i64>,
    returns_named: Option<String>,
    in_: Option<bool>,
    out: Option<bool>,
    optional: Option<bool>,
    list: Option<bool>,
    default_value: Option<i64>,
}

impl DrainedOptions {
    fn collect(entries: Vec<OptionEntry>) -> Self {
        let mut r = DrainedOptions::default();
        for entry in entries {
            match entry {
                OptionEntry::Align(a) => r.align = Some(a),
                OptionEntry::BaseAlign(v) => r.base_align = Some(v),
                OptionEntry::Prefix(s) => r.prefix = Some(s),
                OptionEntry::Tag(s) => r.tag = Some(s),
                OptionEntry::Marker(s) => r.marker = Some(s),
                OptionEntry::Based(s) => r.based = Some(s),
                OptionEntry::Origin(s) => r.origin = Some(s),
                OptionEntry::Counter(s) => r.counter = Some(s),
                OptionEntry::TypeName(s) => r.type_name = Some(s),
                OptionEntry::Increment(v) => r.increment = Some(v),
                OptionEntry::Radix(v) => r.radix = Some(v),
                OptionEntry::Enumerate(v) => r.enumerate = Some(v),
                OptionEntry::Storage(v) => r.storage = Some(v),
                OptionEntry::Fill(v) => r.fill = Some(v),
                OptionEntry::Mask(v) => r.mask = Some(v),
                OptionEntry::Signed(v) => r.signed = Some(v),
                OptionEntry::Length(_) => {} // consumed directly by the grammar into `ScalarSpec::length`
                OptionEntry::SubType(v) => r.subtype = Some(v),
                OptionEntry::Dimension(v) => r.dimension = Some(v),
                OptionEntry::Alias(s) => r.alias = Some(s),
                OptionEntry::Linkage(s) => r.linkage = Some(s),
                OptionEntry::Variable(s) => r.variable = Some(s),
                OptionEntry::ReturnsType(v) => r.returns_type = Some(v),
                OptionEntry::ReturnsNamed(s) => r.returns_named = Some(s),
                OptionEntry::In(v) => r.in_ = Some(v),
                OptionEntry::Out(v) => r.out = Some(v),
                OptionEntry::Named(_) => {}
                OptionEntry::Default(v) => r.default_value = Some(v),
                OptionEntry::Optional(v) => r.optional = Some(v),
                OptionEntry::List(v) => r.list = Some(v),
            }
        }
        r
    }

    /// An empty `DrainedOptions` for contexts where only the grammar's
    /// explicit `ScalarSpec` matters and a second, already-applied
    /// buffer draining (step 1) must not be double-applied.
    /// The subset of a freshly drained buffer that configures the member
    /// being created in the *same* call, rather than the previous one
    /// (spec §4.4 step 3; see the call site in `aggregate_member`).
    fn for_new_member(drained: &DrainedOptions) -> Self {
        DrainedOptions {
            subtype: drained.subtype,
            mask: drained.mask,
            signed: drained.signed,
            ..DrainedOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::c::CEmitter;

    fn new_ctx() -> Context {
        Context::new(WordSize::Bits64, Alignment::NoAlign, HashMap::new())
    }

    fn with_c_target(ctx: &mut Context) {
        ctx.register_target("C", Box::new(CEmitter::default()), Box::new(Vec::new()));
    }

    #[test]
    fn declare_is_idempotent() {
        let mut ctx = new_ctx();
        with_c_target(&mut ctx);
        let loc = Location::default();
        let s1 = ctx.declare("X", TypeId(registry::LONG), loc).unwrap();
        assert_eq!(s1, Status::Created);
        let s2 = ctx.declare("X", TypeId(registry::LONG), loc).unwrap();
        assert_eq!(s2, Status::NotCreated);
        assert_eq!(ctx.declares.len(), 1);
    }

    #[test]
    fn item_redefinition_aborts() {
        let mut ctx = new_ctx();
        with_c_target(&mut ctx);
        let loc = Location::default();
        let spec = ScalarSpec { datatype: TypeId(registry::LONG), ..Default::default() };
        ctx.item("Y", spec.clone(), loc).unwrap();
        let err = ctx.item("Y", spec, loc).unwrap_err();
        assert!(matches!(err, SdlError::Abort(_, n) if n == "Y"));
    }

    #[test]
    fn declare_then_item_resolves_tag_through_chain() {
        // spec §8 scenario 5: DECLARE X SIZEOF LONGWORD; ITEM Y X;
        let mut ctx = new_ctx();
        with_c_target(&mut ctx);
        let loc = Location::default();
        ctx.declare("X", TypeId(registry::LONG), loc).unwrap();
        let declare_type = ctx.lookup_declare("X").unwrap().type_id;
        let spec = ScalarSpec { datatype: declare_type, ..Default::default() };
        ctx.item("Y", spec, loc).unwrap();
        let y = ctx.lookup_item("Y").unwrap();
        assert_eq!(y.size, 4);
        assert_eq!(y.tag, "L");
    }

    #[test]
    fn constant_list_with_increment() {
        let mut ctx = new_ctx();
        with_c_target(&mut ctx);
        let loc = Location::default();
        ctx.push_option(OptionEntry::Increment(2));
        ctx.constant_or_enum("N1, N2, N3", ConstantValue::Numeric(5), loc).unwrap();
        assert_eq!(ctx.constants.len(), 3);
        let values: Vec<i64> = ["N1", "N2", "N3"]
            .iter()
            .map(|n| match ctx.constants.by_name(n).unwrap().kind {
                crate::model::ConstantKind::Numeric(v) => v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(values, vec![5, 7, 9]);
    }

    #[test]
    fn end_to_end_struct_layout() {
        // spec §8 scenario 2.
        let mut ctx = new_ctx();
        with_c_target(&mut ctx);
        let loc = Location::default();
        ctx.aggregate_begin("R", AggKind::Struct, None, loc).unwrap();
        ctx.aggregate_member(
            Some("L"),
            MemberKind::Scalar(ScalarSpec { datatype: TypeId(registry::LONG), ..Default::default() }),
            loc,
        )
        .unwrap();
        ctx.aggregate_member(
            Some("W"),
            MemberKind::Scalar(ScalarSpec { datatype: TypeId(registry::WORD), ..Default::default() }),
            loc,
        )
        .unwrap();
        ctx.aggregate_end("R", loc).unwrap();

        let r = ctx.lookup_aggregate("R").unwrap();
        assert_eq!(r.size, 6);
        let size_const = ctx.constants.by_name("R").unwrap();
        assert!(matches!(size_const.kind, crate::model::ConstantKind::Numeric(6)));
    }

    #[test]
    fn end_to_end_union_offsets_share_zero() {
        // spec §8 scenario 4.
        let mut ctx = new_ctx();
        with_c_target(&mut ctx);
        let loc = Location::default();
        ctx.aggregate_begin("U", AggKind::Union, None, loc).unwrap();
        ctx.aggregate_member(
            Some("A"),
            MemberKind::Scalar(ScalarSpec { datatype: TypeId(registry::LONG), ..Default::default() }),
            loc,
        )
        .unwrap();
        ctx.aggregate_member(
            Some("B"),
            MemberKind::Scalar(ScalarSpec { datatype: TypeId(registry::QUAD), ..Default::default() }),
            loc,
        )
        .unwrap();
        ctx.aggregate_end("U", loc).unwrap();

        assert_eq!(ctx.lookup_item("A").unwrap().offset, 0);
        assert_eq!(ctx.lookup_item("B").unwrap().offset, 0);
        assert_eq!(ctx.lookup_aggregate("U").unwrap().size, 8);
    }

    #[test]
    fn mismatched_end_name_is_matchend() {
        let mut ctx = new_ctx();
        with_c_target(&mut ctx);
        let loc = Location::default();
        ctx.aggregate_begin("R", AggKind::Struct, None, loc).unwrap();
        ctx.aggregate_member(
            Some("L"),
            MemberKind::Scalar(ScalarSpec { datatype: TypeId(registry::LONG), ..Default::default() }),
            loc,
        )
        .unwrap();
        let err = ctx.aggregate_end("WRONG", loc).unwrap_err();
        assert!(matches!(err, SdlError::MatchEnd(..)));
    }

    #[test]
    fn empty_aggregate_is_nullstruct() {
        let mut ctx = new_ctx();
        with_c_target(&mut ctx);
        let loc = Location::default();
        ctx.aggregate_begin("EMPTY", AggKind::Struct, None, loc).unwrap();
        let err = ctx.aggregate_end("EMPTY", loc).unwrap_err();
        assert!(matches!(err, SdlError::NullStruct(..)));
    }

    #[test]
    fn ifsymbol_gate_suppresses_constant_creation() {
        // spec §8 scenario 6.
        let mut symbols = HashMap::new();
        symbols.insert("DBG".to_string(), 0i64);
        let mut ctx = Context::new(WordSize::Bits64, Alignment::NoAlign, symbols);
        with_c_target(&mut ctx);
        let loc = Location::default();
        ctx.conditional(CondDirective::IfSymbol("DBG".into()), loc).unwrap();
        ctx.constant_or_enum("D", ConstantValue::Numeric(1), loc).unwrap();
        ctx.conditional(CondDirective::EndIfSymbol, loc).unwrap();

        assert_eq!(ctx.constants.len(), 0);
        assert_eq!(ctx.cond_depth(), 0);
    }

    #[test]
    fn module_end_resets_every_table() {
        let mut ctx = new_ctx();
        with_c_target(&mut ctx);
        let loc = Location::default();
        ctx.module_begin("M", None).unwrap();
        ctx.declare("X", TypeId(registry::LONG), loc).unwrap();
        ctx.module_end(loc).unwrap();
        assert_eq!(ctx.declares.len(), 0);
        assert!(ctx.module_name.is_none());
    }
}
