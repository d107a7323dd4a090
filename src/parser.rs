//! Parser / grammar (spec §2 "the grammar and parser that invokes core
//! actions" — out of core, specified only at the interface: "every
//! parser action routes through the conditional state machine", spec
//! §4.3). A small hand-written recursive-descent parser over
//! [`crate::lexer`]'s token stream that calls straight into
//! [`crate::context::Context`] — there is no intermediate AST, matching
//! spec §5's "every parser action routes through... an action either
//! appends to the option buffer or invokes a declaration builder".
//!
//! Concrete keyword/option surface syntax is a free design choice (spec.md
//! fixes semantics, not notation): option modifiers with a payload are
//! written `KEYWORD(value[,value2])`; options with no payload are bare
//! keywords; `LENGTH`/`PRECISION` are grammar-level (consumed directly
//! into the relevant `ScalarSpec`, not through the option buffer) per
//! `src/context.rs`'s `OptionEntry::Length` comment.

use std::collections::HashMap;

use crate::context::{Context, ConstantValue, MemberKind, ScalarSpec};
use crate::emit::CommentFlags;
use crate::error::{Location, SdlError, SdlResult};
use crate::lexer::{Lexer, Spanned, Token};
use crate::model::AggKind;
use crate::options::{Alignment, Dimension, OptionEntry, Radix, StorageClass};
use crate::registry::{self, TypeId};

pub struct Parser<'a> {
    tokens: Vec<Spanned<Token>>,
    pos: usize,
    src_lines: Vec<&'a str>,
    ctx: &'a mut Context,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str, ctx: &'a mut Context) -> Self {
        let tokens = Lexer::new(src).tokenize();
        let src_lines = src.lines().collect();
        Parser { tokens, pos: 0, src_lines, ctx }
    }

    /// Like [`Parser::new`], but source comments are forwarded to every
    /// enabled emitter instead of being discarded (spec [EXPANDED]
    /// comment passthrough, the `--comments` CLI flag).
    pub fn new_with_comments(src: &'a str, ctx: &'a mut Context) -> Self {
        let tokens = Lexer::with_comments(src).tokenize();
        let src_lines = src.lines().collect();
        Parser { tokens, pos: 0, src_lines, ctx }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].value
    }

    fn loc(&self) -> Location {
        self.tokens[self.pos.min(self.tokens.len() - 1)].loc
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].value.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn expect_punct(&mut self, c: char) -> SdlResult<()> {
        match self.bump() {
            Token::Punct(p) if p == c => Ok(()),
            other => Err(SdlError::SyntaxErr(self.loc(), format!("expected '{c}', found {other:?}"))),
        }
    }

    fn expect_ident(&mut self) -> SdlResult<String> {
        match self.bump() {
            Token::Ident(s) => Ok(s),
            other => Err(SdlError::SyntaxErr(self.loc(), format!("expected an identifier, found {other:?}"))),
        }
    }

    fn expect_number(&mut self) -> SdlResult<i64> {
        match self.bump() {
            Token::Number(n) => Ok(n),
            other => Err(SdlError::SyntaxErr(self.loc(), format!("expected a number, found {other:?}"))),
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if let Token::Ident(s) = self.peek() {
            if s.eq_ignore_ascii_case(kw) {
                self.bump();
                return true;
            }
        }
        false
    }

    fn peek_is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s.eq_ignore_ascii_case(kw))
    }

    /// Drive the whole token stream, one MODULE at a time, returning on
    /// the first fatal error (spec §7 propagation policy) or after a
    /// soft error has been recorded and the caller chooses to keep
    /// going within the same MODULE.
    pub fn run(&mut self) -> SdlResult<()> {
        while !self.at_eof() {
            self.statement(false)?;
        }
        Ok(())
    }

    /// Parse one top-level (module-scope) or nested (aggregate-scope)
    /// statement. `in_aggregate` restricts the statement set to what
    /// spec §4.4's `aggregate_member` accepts (a nested STRUCTURE/UNION,
    /// a scalar member, or `END <name>`).
    fn statement(&mut self, in_aggregate: bool) -> SdlResult<bool> {
        if self.at_eof() {
            return Ok(false);
        }

        if in_aggregate && self.peek_is_keyword("END") {
            return Ok(false);
        }

        if let Token::Comment(text, is_block) = self.peek().clone() {
            self.bump();
            self.forward_comment(&text, is_block)?;
            return Ok(true);
        }

        if self.eat_keyword("MODULE") {
            let name = self.expect_ident()?;
            let mut ident = None;
            if self.eat_keyword("IDENT") {
                ident = Some(self.expect_string()?);
            }
            self.expect_punct(';')?;
            self.ctx.module_begin(&name, ident.as_deref())?;
            return Ok(true);
        }
        if self.eat_keyword("END_MODULE") {
            let _name = self.expect_ident()?;
            let loc = self.loc();
            self.expect_punct(';')?;
            self.ctx.module_end(loc)?;
            return Ok(true);
        }
        if self.eat_keyword("DECLARE") {
            return self.declare_stmt();
        }
        if self.eat_keyword("CONSTANT") {
            return self.constant_stmt();
        }
        if self.eat_keyword("AGGREGATE") {
            return self.aggregate_stmt();
        }
        if self.eat_keyword("ENTRY") {
            return self.entry_stmt();
        }
        if self.eat_keyword("LITERAL") {
            return self.literal_stmt();
        }
        if self.eat_keyword("IFSYMBOL") {
            let sym = self.expect_ident()?;
            let loc = self.loc();
            self.expect_punct(';')?;
            self.ctx.conditional(crate::cond::CondDirective::IfSymbol(sym), loc)?;
            return Ok(true);
        }
        if self.eat_keyword("ELSE_IFSYMBOL") {
            let sym = self.expect_ident()?;
            let loc = self.loc();
            self.expect_punct(';')?;
            self.ctx.conditional(crate::cond::CondDirective::ElseIfSymbol(sym), loc)?;
            return Ok(true);
        }
        if self.eat_keyword("IFLANGUAGE") {
            let mut langs = vec![self.expect_ident()?];
            while self.eat_punct(',') {
                langs.push(self.expect_ident()?);
            }
            let loc = self.loc();
            self.expect_punct(';')?;
            self.ctx.conditional(crate::cond::CondDirective::IfLanguage(langs), loc)?;
            return Ok(true);
        }
        if self.peek_is_keyword("ELSE") {
            self.bump();
            let loc = self.loc();
            self.expect_punct(';')?;
            self.ctx.conditional(crate::cond::CondDirective::Else, loc)?;
            return Ok(true);
        }
        if self.eat_keyword("END_IFSYMBOL") {
            let loc = self.loc();
            self.expect_punct(';')?;
            self.ctx.conditional(crate::cond::CondDirective::EndIfSymbol, loc)?;
            return Ok(true);
        }
        if self.eat_keyword("END_IFLANGUAGE") {
            let loc = self.loc();
            self.expect_punct(';')?;
            self.ctx.conditional(crate::cond::CondDirective::EndIfLanguage, loc)?;
            return Ok(true);
        }

        if in_aggregate {
            return self.aggregate_member_stmt();
        }

        // Bare ITEM form: `ITEM name datatype [options]* ;`
        if self.eat_keyword("ITEM") {
            return self.item_stmt();
        }

        Err(SdlError::SyntaxErr(self.loc(), format!("unexpected token {:?}", self.peek())))
    }

    /// Forward a captured comment to every enabled emitter, splitting a
    /// multi-line block comment into one call per line with
    /// start/middle/end flags set the way `sdl_comment_block` walks a
    /// block comment's lines (a single-line comment, block or `--`,
    /// gets `lineFlag` instead).
    fn forward_comment(&mut self, text: &str, is_block: bool) -> SdlResult<()> {
        if !is_block {
            return self.ctx.comment(text, CommentFlags { line: true, ..Default::default() });
        }
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() <= 1 {
            return self.ctx.comment(text.trim(), CommentFlags { line: true, ..Default::default() });
        }
        for (idx, line) in lines.iter().enumerate() {
            let flags = CommentFlags {
                start: idx == 0,
                end: idx + 1 == lines.len(),
                middle: idx != 0 && idx + 1 != lines.len(),
                line: false,
            };
            self.ctx.comment(line.trim(), flags)?;
        }
        Ok(())
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if matches!(self.peek(), Token::Punct(p) if *p == c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_string(&mut self) -> SdlResult<String> {
        match self.bump() {
            Token::Str(s) => Ok(s),
            other => Err(SdlError::SyntaxErr(self.loc(), format!("expected a string, found {other:?}"))),
        }
    }

    // ---- datatype parsing --------------------------------------------

    /// Parse a single base-type keyword with no two-word combination
    /// (used by `SUBTYPE(...)` and `RETURNS ...`, which only ever name a
    /// plain base type or a previously-declared alias).
    fn base_type_single(&self, word: &str) -> Option<i64> {
        use registry::*;
        Some(match word.to_ascii_uppercase().as_str() {
            "BYTE" => BYTE,
            "WORD" => WORD,
            "LONGWORD" => LONG,
            "QUADWORD" => QUAD,
            "OCTAWORD" => OCTA,
            "TFLOAT" => TFLT,
            "SFLOAT" => SFLT,
            "XFLOAT" => XFLT,
            "FFLOAT" => FFLT,
            "DFLOAT" => DFLT,
            "GFLOAT" => GFLT,
            "HFLOAT" => HFLT,
            "DECIMAL" => DECIMAL,
            "CHARACTER" => CHAR,
            "BOOLEAN" => BOOL,
            "ADDRESS" => ADDR,
            "POINTER" => POINTER,
            "VOID" => VOID,
            "ENTRY" => ENTRY,
            _ => return None,
        })
    }

    /// Parse a full datatype reference, including the two-word
    /// `LONGWORD|QUADWORD|HARDWARE ADDRESS|POINTER` combinations, the
    /// grammar-level `LENGTH`/`PRECISION` qualifiers, and references to
    /// previously-declared DECLARE/ITEM/AGGREGATE/ENUM names.
    fn datatype(&mut self) -> SdlResult<ScalarSpec> {
        let loc = self.loc();
        let first = self.expect_ident()?;
        let upper = first.to_ascii_uppercase();

        let mut spec = ScalarSpec::default();

        match upper.as_str() {
            "LONGWORD" if self.peek_is_keyword("ADDRESS") => {
                self.bump();
                spec.datatype = TypeId(registry::ADDR_L);
            }
            "LONGWORD" if self.peek_is_keyword("POINTER") => {
                self.bump();
                spec.datatype = TypeId(registry::POINTER_L);
            }
            "QUADWORD" if self.peek_is_keyword("ADDRESS") => {
                self.bump();
                spec.datatype = TypeId(registry::ADDR_Q);
            }
            "QUADWORD" if self.peek_is_keyword("POINTER") => {
                self.bump();
                spec.datatype = TypeId(registry::POINTER_Q);
            }
            "HARDWARE" if self.peek_is_keyword("ADDRESS") => {
                self.bump();
                spec.datatype = TypeId(registry::ADDR_HW);
            }
            "HARDWARE" if self.peek_is_keyword("POINTER") => {
                self.bump();
                spec.datatype = TypeId(registry::POINTER_HW);
            }
            "CHARACTER" if self.peek_is_keyword("VARYING") => {
                self.bump();
                spec.datatype = TypeId(registry::CHAR_VARY);
                spec.length = 0;
            }
            "CHARACTER" if self.eat_punct('*') => {
                spec.datatype = TypeId(registry::CHAR);
                spec.length = -1;
            }
            "CHARACTER" => {
                spec.datatype = TypeId(registry::CHAR);
                spec.length = 1;
            }
            "BITFIELD" => {
                spec.datatype = TypeId(registry::BITFIELD_B);
                spec.bit_length = Some(1);
            }
            "DECIMAL" => {
                spec.datatype = TypeId(registry::DECIMAL);
                spec.precision = 1;
                spec.scale = 0;
            }
            _ => {
                if let Some(raw) = self.base_type_single(&upper) {
                    spec.datatype = TypeId(raw);
                } else if let Some(d) = self.ctx.lookup_declare(&first) {
                    spec.datatype = d.type_id;
                } else if let Some(i) = self.ctx.lookup_item(&first) {
                    spec.datatype = i.type_id;
                } else if let Some(a) = self.ctx.lookup_aggregate(&first) {
                    spec.datatype = a.type_id;
                } else if let Some(e) = self.ctx.lookup_enum(&first) {
                    spec.datatype = e.type_def;
                } else {
                    return Err(SdlError::SyntaxErr(loc, format!("unknown type \"{first}\"")));
                }
            }
        }

        // Grammar-level qualifiers that are part of the type spec
        // itself, not option-buffer modifiers (context.rs: "DECIMAL's
        // precision/scale and a bit-field's length are part of the type
        // specification itself").
        loop {
            if self.eat_keyword("LENGTH") {
                let n = self.expect_number()?;
                if spec.datatype.raw() == registry::BITFIELD_B
                    || spec.datatype.raw() == registry::BITFIELD_W
                    || spec.datatype.raw() == registry::BITFIELD_L
                    || spec.datatype.raw() == registry::BITFIELD_Q
                    || spec.datatype.raw() == registry::BITFIELD_O
                {
                    spec.bit_length = Some(n);
                } else {
                    spec.length = n;
                }
            } else if self.eat_keyword("PRECISION") {
                spec.precision = self.expect_number()?;
                if self.eat_punct(',') {
                    spec.scale = self.expect_number()?;
                }
            } else {
                break;
            }
        }

        Ok(spec)
    }

    // ---- option parsing -------------------------------------------------

    /// Parse zero or more modifiers up to (not including) the statement's
    /// closing `;`, pushing each into the context's option buffer (spec
    /// §4.2). Returns a side-channel for the one or two qualifiers that
    /// sometimes need to be read back immediately by the caller (`IN`/
    /// `OUT` for an ENTRY parameter's passing mechanism is derived purely
    /// from the buffer, so no side-channel is needed there).
    fn options_until_semicolon(&mut self) -> SdlResult<()> {
        loop {
            match self.peek().clone() {
                Token::Punct(';') => break,
                Token::Ident(word) => {
                    self.bump();
                    self.one_option(&word)?;
                }
                Token::Eof => break,
                other => return Err(SdlError::SyntaxErr(self.loc(), format!("unexpected token {other:?} in option list"))),
            }
        }
        Ok(())
    }

    fn paren_ident(&mut self) -> SdlResult<String> {
        self.expect_punct('(')?;
        let v = self.expect_ident()?;
        self.expect_punct(')')?;
        Ok(v)
    }

    fn paren_number(&mut self) -> SdlResult<i64> {
        self.expect_punct('(')?;
        let v = self.expect_number()?;
        self.expect_punct(')')?;
        Ok(v)
    }

    fn one_option(&mut self, word: &str) -> SdlResult<()> {
        let upper = word.to_ascii_uppercase();
        match upper.as_str() {
            "NOALIGN" => self.ctx.push_option(OptionEntry::Align(Alignment::NoAlign)),
            "ALIGN" => {
                if matches!(self.peek(), Token::Punct('(')) {
                    let n = self.paren_number()?;
                    self.ctx.push_option(OptionEntry::Align(Alignment::Explicit(n)));
                } else {
                    self.ctx.push_option(OptionEntry::Align(Alignment::Align));
                }
            }
            "BASEALIGN" => self.ctx.push_option(OptionEntry::BaseAlign(self.paren_number()?)),
            "PREFIX" => self.ctx.push_option(OptionEntry::Prefix(self.paren_ident()?)),
            "TAG" => self.ctx.push_option(OptionEntry::Tag(self.paren_ident()?)),
            "MARKER" => self.ctx.push_option(OptionEntry::Marker(self.paren_ident()?)),
            "BASED" => self.ctx.push_option(OptionEntry::Based(self.paren_ident()?)),
            "ORIGIN" => self.ctx.push_option(OptionEntry::Origin(self.paren_ident()?)),
            "COUNTER" => self.ctx.push_option(OptionEntry::Counter(self.paren_ident()?)),
            "TYPENAME" => self.ctx.push_option(OptionEntry::TypeName(self.paren_ident()?)),
            "INCREMENT" => self.ctx.push_option(OptionEntry::Increment(self.paren_number()?)),
            "RADIX" => {
                let r = self.paren_ident()?;
                let radix = match r.to_ascii_uppercase().as_str() {
                    "HEX" => Radix::Hex,
                    "OCTAL" => Radix::Octal,
                    _ => Radix::Decimal,
                };
                self.ctx.push_option(OptionEntry::Radix(radix));
            }
            "ENUMERATE" => self.ctx.push_option(OptionEntry::Enumerate(true)),
            "TYPEDEF" => self.ctx.push_option(OptionEntry::Storage(StorageClass::Typedef)),
            "COMMON" => self.ctx.push_option(OptionEntry::Storage(StorageClass::Common)),
            "GLOBAL" => self.ctx.push_option(OptionEntry::Storage(StorageClass::Global)),
            "FILL" => self.ctx.push_option(OptionEntry::Fill(true)),
            "MASK" => self.ctx.push_option(OptionEntry::Mask(true)),
            "SIGNED" => self.ctx.push_option(OptionEntry::Signed(true)),
            "UNSIGNED" => self.ctx.push_option(OptionEntry::Signed(false)),
            "SUBTYPE" => {
                let name = self.paren_ident()?;
                let raw = self.base_type_single(&name).unwrap_or(registry::ANY);
                self.ctx.push_option(OptionEntry::SubType(raw));
            }
            "DIMENSION" => {
                self.expect_punct('(')?;
                let lo = self.expect_number()?;
                self.expect_punct(',')?;
                let hi = self.expect_number()?;
                self.expect_punct(')')?;
                self.ctx.push_option(OptionEntry::Dimension(Dimension { lbound: lo, hbound: hi }));
            }
            "ALIAS" => self.ctx.push_option(OptionEntry::Alias(self.paren_ident()?)),
            "LINKAGE" => self.ctx.push_option(OptionEntry::Linkage(self.paren_ident()?)),
            "VARIABLE" => self.ctx.push_option(OptionEntry::Variable(self.paren_ident()?)),
            "NAMED" => {
                if matches!(self.peek(), Token::Punct('(')) {
                    self.ctx.push_option(OptionEntry::ReturnsNamed(self.paren_ident()?));
                } else {
                    self.ctx.push_option(OptionEntry::Named(true));
                }
            }
            "IN" => self.ctx.push_option(OptionEntry::In(true)),
            "OUT" => self.ctx.push_option(OptionEntry::Out(true)),
            "OPTIONAL" => self.ctx.push_option(OptionEntry::Optional(true)),
            "LIST" => self.ctx.push_option(OptionEntry::List(true)),
            "DEFAULT" => self.ctx.push_option(OptionEntry::Default(self.paren_number()?)),
            other => return Err(SdlError::SyntaxErr(self.loc(), format!("unknown qualifier \"{other}\""))),
        }
        Ok(())
    }

    // ---- statements ------------------------------------------------------

    fn declare_stmt(&mut self) -> SdlResult<bool> {
        let loc = self.loc();
        let name = self.expect_ident()?;
        let spec = self.datatype()?;
        self.options_until_semicolon()?;
        self.expect_punct(';')?;
        self.ctx.declare(&name, spec.datatype, loc)?;
        Ok(true)
    }

    fn item_stmt(&mut self) -> SdlResult<bool> {
        let loc = self.loc();
        let name = self.expect_ident()?;
        let spec = self.datatype()?;
        self.options_until_semicolon()?;
        self.expect_punct(';')?;
        self.ctx.item(&name, spec, loc)?;
        Ok(true)
    }

    fn constant_stmt(&mut self) -> SdlResult<bool> {
        let loc = self.loc();
        let mut id_list = self.expect_ident()?;
        while self.eat_punct(',') {
            id_list.push(',');
            id_list.push_str(&self.expect_ident()?);
        }
        if !self.eat_keyword("EQUALS") {
            self.expect_punct('=')?;
        }
        let value = match self.bump() {
            Token::Number(n) => ConstantValue::Numeric(n),
            Token::Str(s) => ConstantValue::Str(s),
            other => return Err(SdlError::SyntaxErr(self.loc(), format!("expected a constant value, found {other:?}"))),
        };
        self.options_until_semicolon()?;
        self.expect_punct(';')?;
        self.ctx.constant_or_enum(&id_list, value, loc)?;
        Ok(true)
    }

    fn aggregate_stmt(&mut self) -> SdlResult<bool> {
        let loc = self.loc();
        let name = self.expect_ident()?;
        let agg_type = if self.eat_keyword("UNION") {
            AggKind::Union
        } else {
            self.eat_keyword("STRUCTURE");
            AggKind::Struct
        };
        self.options_until_semicolon()?;
        self.expect_punct(';')?;
        self.ctx.aggregate_begin(&name, agg_type, None, loc)?;

        while !self.peek_is_keyword("END") {
            if self.at_eof() {
                return Err(SdlError::SyntaxErr(self.loc(), "unexpected end of input inside AGGREGATE".to_string()));
            }
            self.statement(true)?;
        }
        self.bump(); // consume END
        let end_name = self.expect_ident()?;
        let end_loc = self.loc();
        self.options_until_semicolon()?;
        self.expect_punct(';')?;
        self.ctx.aggregate_end(&end_name, end_loc)?;
        Ok(true)
    }

    fn aggregate_member_stmt(&mut self) -> SdlResult<bool> {
        let loc = self.loc();
        let name = self.expect_ident()?;
        if self.peek_is_keyword("STRUCTURE") || self.peek_is_keyword("UNION") {
            let agg_type = if self.eat_keyword("UNION") {
                AggKind::Union
            } else {
                self.bump();
                AggKind::Struct
            };
            self.options_until_semicolon()?;
            self.expect_punct(';')?;
            self.ctx.aggregate_begin(&name, agg_type, None, loc)?;
            while !self.peek_is_keyword("END") {
                if self.at_eof() {
                    return Err(SdlError::SyntaxErr(self.loc(), "unexpected end of input inside nested aggregate".to_string()));
                }
                self.statement(true)?;
            }
            self.bump();
            let end_name = self.expect_ident()?;
            let end_loc = self.loc();
            self.options_until_semicolon()?;
            self.expect_punct(';')?;
            self.ctx.aggregate_end(&end_name, end_loc)?;
            return Ok(true);
        }

        let spec = self.datatype()?;
        self.options_until_semicolon()?;
        self.expect_punct(';')?;
        self.ctx.aggregate_member(Some(&name), MemberKind::Scalar(spec), loc)?;
        Ok(true)
    }

    fn entry_stmt(&mut self) -> SdlResult<bool> {
        let loc = self.loc();
        let name = self.expect_ident()?;
        self.ctx.entry_begin(&name, loc);

        self.expect_punct('(')?;
        if !self.eat_punct(')') {
            loop {
                let pname = self.expect_ident()?;
                self.expect_punct(':')?;
                let type_word = match self.peek().clone() {
                    Token::Ident(s) => Some(s),
                    _ => None,
                };
                let spec = self.datatype()?;
                self.options_until_semicolon_or_comma()?;
                let type_name = type_word.filter(|_| !registry::is_base_type(spec.datatype.raw().abs()));
                self.ctx.entry_add_parameter(&pname, spec.datatype, type_name);
                if self.eat_punct(',') {
                    continue;
                }
                self.expect_punct(')')?;
                break;
            }
        }

        if self.eat_keyword("RETURNS") {
            let spec = self.datatype()?;
            self.ctx.push_option(OptionEntry::ReturnsType(spec.datatype.raw()));
        }
        self.options_until_semicolon()?;
        let end_loc = self.loc();
        self.expect_punct(';')?;
        self.ctx.entry_complete(end_loc)?;
        Ok(true)
    }

    /// Like `options_until_semicolon`, but also stops at a `,` —
    /// used inside an ENTRY's parameter list, where parameters are
    /// comma-separated and each may carry its own qualifiers.
    fn options_until_semicolon_or_comma(&mut self) -> SdlResult<()> {
        loop {
            match self.peek().clone() {
                Token::Punct(';') | Token::Punct(',') | Token::Punct(')') => break,
                Token::Ident(word) => {
                    self.bump();
                    self.one_option(&word)?;
                }
                Token::Eof => break,
                other => return Err(SdlError::SyntaxErr(self.loc(), format!("unexpected token {other:?} in parameter qualifier list"))),
            }
        }
        Ok(())
    }

    /// `LITERAL ... END_LITERAL;` passes every source line in between
    /// through to every enabled emitter completely unprocessed (spec
    /// [EXPANDED] "Literal passthrough"). Recovered from the original
    /// source text by line range rather than by reassembling tokens,
    /// since the lexer has already discarded whitespace/formatting.
    fn literal_stmt(&mut self) -> SdlResult<bool> {
        let start_line = self.loc().first_line as usize;
        while !self.peek_is_keyword("END_LITERAL") {
            if self.at_eof() {
                return Err(SdlError::SyntaxErr(self.loc(), "unexpected end of input inside LITERAL".to_string()));
            }
            self.bump();
        }
        let end_line = self.loc().first_line as usize;
        self.bump(); // END_LITERAL
        self.expect_punct(';')?;

        for line in self.src_lines.iter().take(end_line.saturating_sub(1)).skip(start_line) {
            self.ctx.literal_line(line)?;
        }
        Ok(true)
    }
}

/// Parse and fully execute one SDL source string against `ctx`,
/// returning the first fatal error encountered (spec §7: "I/O failures
/// and OOM are fatal"; everything else is recorded and execution of the
/// current MODULE continues — callers that want that soft-error
/// behavior should inspect `SdlError::is_fatal` themselves rather than
/// relying on this convenience wrapper, which stops at the first error
/// of either kind).
pub fn parse_str(src: &str, ctx: &mut Context) -> SdlResult<()> {
    let mut parser = Parser::new(src, ctx);
    parser.run()
}

/// Predefined `--symbol NAME=VALUE` CLI arguments, parsed into the map
/// `Context::new` expects (spec §6 CLI surface).
pub fn parse_symbol_defs(defs: &[String]) -> SdlResult<HashMap<String, i64>> {
    let mut map = HashMap::new();
    for def in defs {
        let (name, value) = def
            .split_once('=')
            .ok_or_else(|| SdlError::SyntaxErr(Location::default(), format!("invalid --symbol \"{def}\", expected NAME=VALUE")))?;
        let value: i64 = value
            .parse()
            .map_err(|_| SdlError::SyntaxErr(Location::default(), format!("invalid --symbol value in \"{def}\"")))?;
        map.insert(name.to_string(), value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::c::CEmitter;
    use crate::options::Alignment;
    use crate::registry::WordSize;
    use std::collections::HashMap;

    fn new_ctx() -> Context {
        let mut ctx = Context::new(WordSize::Bits64, Alignment::NoAlign, HashMap::new());
        ctx.register_target("C", Box::new(CEmitter::default()), Box::new(Vec::new()));
        ctx
    }

    #[test]
    fn scenario_1_two_constants() {
        let mut ctx = new_ctx();
        parse_str(r#"CONSTANT A EQUALS 5; CONSTANT B EQUALS "x";"#, &mut ctx).unwrap();
        assert_eq!(ctx.constants.len(), 2);
        assert_eq!(ctx.constants.by_name("A").unwrap().tag, "K");
    }

    #[test]
    fn scenario_2_struct_layout() {
        let mut ctx = new_ctx();
        parse_str("AGGREGATE R STRUCTURE; L LONGWORD; W WORD; END R;", &mut ctx).unwrap();
        let r = ctx.lookup_aggregate("R").unwrap();
        assert_eq!(r.size, 6);
        let size_const = ctx.constants.by_name("R").unwrap();
        assert!(matches!(size_const.kind, crate::model::ConstantKind::Numeric(6)));
    }

    #[test]
    fn scenario_3_bitfield_packing() {
        let mut ctx = new_ctx();
        parse_str(
            "AGGREGATE F STRUCTURE; F1 BITFIELD LENGTH 3; F2 BITFIELD LENGTH 5; F3 BITFIELD LENGTH 2; END F;",
            &mut ctx,
        )
        .unwrap();
        let f = ctx.lookup_aggregate("F").unwrap();
        // 3+5+2=10 bits, more than BYTE's 8 capacity; the backward widening
        // walk widens F1, F2 and F3 all to WORD, so the struct spans 2 bytes
        // with F3 packed into the same WORD as F1/F2, not a separate byte.
        assert_eq!(f.size, 2);
    }

    #[test]
    fn scenario_4_union_layout() {
        let mut ctx = new_ctx();
        parse_str("AGGREGATE U UNION; A LONGWORD; B QUADWORD; END U;", &mut ctx).unwrap();
        let u = ctx.lookup_aggregate("U").unwrap();
        assert_eq!(u.size, 8);
    }

    #[test]
    fn scenario_5_declare_then_item() {
        let mut ctx = new_ctx();
        parse_str("DECLARE X LONGWORD; ITEM Y X;", &mut ctx).unwrap();
        let y = ctx.lookup_item("Y").unwrap();
        assert_eq!(y.size, 4);
        assert_eq!(y.tag, "L");
    }

    #[test]
    fn scenario_6_ifsymbol_gates_creation() {
        let mut ctx = Context::new(
            WordSize::Bits64,
            Alignment::NoAlign,
            [("DBG".to_string(), 0i64)].into_iter().collect(),
        );
        ctx.register_target("C", Box::new(CEmitter::default()), Box::new(Vec::new()));
        parse_str("IFSYMBOL DBG; CONSTANT D EQUALS 1; END_IFSYMBOL;", &mut ctx).unwrap();
        assert!(ctx.lookup_declare("D").is_none());
        assert_eq!(ctx.constants.len(), 0);
        assert_eq!(ctx.cond_depth(), 0);
    }
}
