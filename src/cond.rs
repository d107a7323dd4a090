//! Conditional-compilation state machine (spec §4.3).
//!
//! A stack of per-scope conditional states gates whether declarations are
//! processed (`processing_enabled`) and which output languages are
//! currently enabled (`lang_enable_vec`). The transition table below is
//! the complete, canonical one from spec.md; any combination not listed
//! here is `SdlError::InvCondSt`.

use crate::error::{Location, SdlError, SdlResult};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondState {
    None,
    IfLang,
    IfSymb,
    ElseIf,
    Else,
}

#[derive(Debug, Clone)]
pub enum CondDirective {
    IfSymbol(String),
    IfLanguage(Vec<String>),
    ElseIfSymbol(String),
    Else,
    EndIfSymbol,
    EndIfLanguage,
}

/// The mutable pieces a directive can affect, borrowed from `Context` for
/// the duration of one `apply` call.
pub struct CondEffects<'a> {
    pub processing_enabled: &'a mut bool,
    pub lang_enable_vec: &'a mut [bool],
    /// Maps each enabled language's name to its index in `lang_enable_vec`.
    pub language_index: &'a HashMap<String, usize>,
    /// Predefined symbols from `--symbol NAME=VALUE`; 0 means "off".
    pub symbols: &'a HashMap<String, i64>,
}

#[derive(Debug, Default)]
pub struct CondStack {
    stack: Vec<CondState>,
}

impl CondStack {
    pub fn new() -> Self {
        CondStack { stack: Vec::new() }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn top(&self) -> CondState {
        self.stack.last().copied().unwrap_or(CondState::None)
    }

    fn push(&mut self, state: CondState) {
        self.stack.push(state);
    }

    fn replace_top(&mut self, state: CondState) {
        self.stack.pop();
        self.stack.push(state);
    }

    fn pop(&mut self) {
        self.stack.pop();
    }

    /// Turns `processing_enabled` on or off based on a symbol's predefined
    /// value, exactly as `sdl_conditional`'s `SDL_K_COND_SYMB`/
    /// `SDL_K_COND_ELSEIF` cases do: value 0 disables, non-zero enables.
    fn apply_symbol(
        effects: &mut CondEffects,
        symbol: &str,
        loc: Location,
    ) -> SdlResult<()> {
        match effects.symbols.get(symbol) {
            Some(&value) => {
                *effects.processing_enabled = value != 0;
                Ok(())
            }
            None => Err(SdlError::SymNotDef(loc, symbol.to_string())),
        }
    }

    fn apply_language_list(effects: &mut CondEffects, langs: &[String]) {
        for enabled in effects.lang_enable_vec.iter_mut() {
            *enabled = false;
        }
        for lang in langs {
            if let Some(&idx) = effects.language_index.get(&lang.to_ascii_uppercase()) {
                effects.lang_enable_vec[idx] = true;
            }
        }
    }

    fn enable_all_languages(effects: &mut CondEffects) {
        for enabled in effects.lang_enable_vec.iter_mut() {
            *enabled = true;
        }
    }

    /// Apply one conditional directive, mutating this stack and the
    /// borrowed `CondEffects`. Returns `SdlError::InvCondSt` for any
    /// (current state, directive) pair absent from the table.
    pub fn apply(
        &mut self,
        directive: CondDirective,
        effects: &mut CondEffects,
        loc: Location,
    ) -> SdlResult<()> {
        use CondDirective::*;
        use CondState::*;

        match (self.top(), directive) {
            (None | IfLang | Else, IfSymbol(symbol)) => {
                self.push(IfSymb);
                Self::apply_symbol(effects, &symbol, loc)
            }

            (None | IfLang | IfSymb | ElseIf | Else, IfLanguage(langs)) => {
                self.push(IfLang);
                Self::apply_language_list(effects, &langs);
                Ok(())
            }

            (IfSymb, ElseIfSymbol(symbol)) => {
                self.replace_top(ElseIf);
                Self::apply_symbol(effects, &symbol, loc)
            }

            (IfLang, Else) => {
                self.replace_top(CondState::Else);
                for enabled in effects.lang_enable_vec.iter_mut() {
                    *enabled = !*enabled;
                }
                Ok(())
            }

            (IfSymb | ElseIf, Else) => {
                self.replace_top(CondState::Else);
                *effects.processing_enabled = !*effects.processing_enabled;
                Ok(())
            }

            (IfSymb | ElseIf | CondState::Else, EndIfSymbol) => {
                self.pop();
                *effects.processing_enabled = true;
                Ok(())
            }

            (IfLang | CondState::Else, EndIfLanguage) => {
                self.pop();
                Self::enable_all_languages(effects);
                Ok(())
            }

            _ => Err(SdlError::InvCondSt(loc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effects<'a>(
        processing_enabled: &'a mut bool,
        lang_enable_vec: &'a mut [bool],
        language_index: &'a HashMap<String, usize>,
        symbols: &'a HashMap<String, i64>,
    ) -> CondEffects<'a> {
        CondEffects {
            processing_enabled,
            lang_enable_vec,
            language_index,
            symbols,
        }
    }

    #[test]
    fn ifsymbol_else_end_ifsymbol_round_trip() {
        let mut stack = CondStack::new();
        let mut processing = true;
        let mut langs = vec![true];
        let lang_index = HashMap::new();
        let mut symbols = HashMap::new();
        symbols.insert("DBG".to_string(), 0i64);

        let loc = Location::default();
        stack
            .apply(
                CondDirective::IfSymbol("DBG".into()),
                &mut effects(&mut processing, &mut langs, &lang_index, &symbols),
                loc,
            )
            .unwrap();
        assert_eq!(stack.depth(), 1);
        assert!(!processing);

        stack
            .apply(
                CondDirective::Else,
                &mut effects(&mut processing, &mut langs, &lang_index, &symbols),
                loc,
            )
            .unwrap();
        assert!(processing);

        stack
            .apply(
                CondDirective::EndIfSymbol,
                &mut effects(&mut processing, &mut langs, &lang_index, &symbols),
                loc,
            )
            .unwrap();
        assert_eq!(stack.depth(), 0);
        assert!(processing);
    }

    #[test]
    fn unknown_symbol_is_symnotdef() {
        let mut stack = CondStack::new();
        let mut processing = true;
        let mut langs = vec![true];
        let lang_index = HashMap::new();
        let symbols = HashMap::new();

        let err = stack
            .apply(
                CondDirective::IfSymbol("NOPE".into()),
                &mut effects(&mut processing, &mut langs, &lang_index, &symbols),
                Location::default(),
            )
            .unwrap_err();
        assert!(matches!(err, SdlError::SymNotDef(_, s) if s == "NOPE"));
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut stack = CondStack::new();
        let mut processing = true;
        let mut langs = vec![true];
        let lang_index = HashMap::new();
        let symbols = HashMap::new();

        // ELSE with nothing open is not in the table.
        let err = stack
            .apply(
                CondDirective::Else,
                &mut effects(&mut processing, &mut langs, &lang_index, &symbols),
                Location::default(),
            )
            .unwrap_err();
        assert!(matches!(err, SdlError::InvCondSt(_)));
    }

    #[test]
    fn iflanguage_disables_all_then_enables_listed() {
        let mut stack = CondStack::new();
        let mut processing = true;
        let mut langs = vec![true, true];
        let mut lang_index = HashMap::new();
        lang_index.insert("C".to_string(), 0);
        lang_index.insert("RUST".to_string(), 1);
        let symbols = HashMap::new();

        stack
            .apply(
                CondDirective::IfLanguage(vec!["c".into()]),
                &mut effects(&mut processing, &mut langs, &lang_index, &symbols),
                Location::default(),
            )
            .unwrap();
        assert_eq!(langs, vec![true, false]);

        stack
            .apply(
                CondDirective::EndIfLanguage,
                &mut effects(&mut processing, &mut langs, &lang_index, &symbols),
                Location::default(),
            )
            .unwrap();
        assert_eq!(langs, vec![true, true]);
        assert_eq!(stack.depth(), 0);
    }
}
