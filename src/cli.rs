//! Command-line surface (spec §6 external interface).
//!
//! A `clap` `Parser` derive struct, the same crate and style `a2ltool`
//! uses for its own argument handling. `argfile`'s `@file`
//! response-file expansion is wired here even though `a2ltool` carries
//! the dependency unused — a build system invoking this translator with
//! many repeated `--lang`/`--symbol` flags is the expected use case
//! (mirrored in `opensdl_main.c`'s own response-file argument table).

use std::path::PathBuf;

use clap::Parser;

use crate::error::{Location, SdlError, SdlResult};

#[derive(Parser, Debug)]
#[command(name = "opensdl", version, about = "Translate Structure Definition Language source into target-language declarations")]
pub struct Cli {
    /// SDL source file to translate.
    pub input: PathBuf,

    /// Target language and optional output path, `NAME[=OUTPUT]`.
    /// Repeatable; at least one is required.
    #[arg(long = "lang", value_name = "NAME[=OUTPUT]")]
    pub lang: Vec<String>,

    /// Explicit member alignment in bytes: 0, 1, 2, 4, or 8.
    #[arg(long, value_name = "N")]
    pub align: Option<i64>,

    /// Target a 32-bit word size for ADDRESS/POINTER members.
    #[arg(long, group = "word_size")]
    pub b32: bool,

    /// Target a 64-bit word size for ADDRESS/POINTER members (default).
    #[arg(long, group = "word_size")]
    pub b64: bool,

    /// Carry SDL source comments through into the generated output.
    #[arg(long)]
    pub comments: bool,

    /// Prepend the contents of this file to every generated output file.
    #[arg(long, value_name = "FILE")]
    pub copyright: Option<PathBuf>,

    /// Emit an include guard / header banner in generated output.
    #[arg(long)]
    pub header: bool,

    /// Align every aggregate member to its own natural size.
    #[arg(long = "member-align")]
    pub member_align: bool,

    /// Never apply a PREFIX qualifier to emitted names.
    #[arg(long = "suppress-prefix")]
    pub suppress_prefix: bool,

    /// Never apply a TAG qualifier to emitted names.
    #[arg(long = "suppress-tag")]
    pub suppress_tag: bool,

    /// Write a paginated listing file. With no value, derives the name
    /// from the input file (`foo.sdl` -> `foo.lis`).
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pub listing: Option<String>,

    /// Predefine a conditional-compilation symbol, `NAME=VALUE`.
    /// Repeatable.
    #[arg(long = "symbol", value_name = "NAME=VALUE")]
    pub symbol: Vec<String>,

    /// Increase logging verbosity (`-v` = info, `-vv` = debug).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Parse process arguments, expanding any `@file` response files
    /// first (spec [EXPANDED] CLI surface detail).
    pub fn parse_args() -> Self {
        let args = argfile::expand_args_from(std::env::args_os(), argfile::parse_fromfile, argfile::PREFIX)
            .unwrap_or_else(|err| {
                eprintln!("opensdl: error expanding response file: {err}");
                std::process::exit(1);
            });
        Cli::parse_from(args)
    }

    /// Split each `--lang` argument into its language name and optional
    /// explicit output path.
    pub fn lang_specs(&self) -> Vec<(String, Option<String>)> {
        self.lang
            .iter()
            .map(|spec| match spec.split_once('=') {
                Some((name, out)) => (name.to_string(), Some(out.to_string())),
                None => (spec.clone(), None),
            })
            .collect()
    }

    /// Resolve the listing output path, defaulting to the input's stem
    /// with a `.lis` extension when `--listing` was given with no
    /// explicit value.
    pub fn listing_path(&self) -> Option<PathBuf> {
        match self.listing.as_deref() {
            None => None,
            Some("") => Some(self.input.with_extension("lis")),
            Some(path) => Some(PathBuf::from(path)),
        }
    }

    /// Validate and resolve `--align` into the `0|1|2|4|8` domain the
    /// layout engine accepts.
    pub fn alignment_value(&self) -> SdlResult<Option<i64>> {
        match self.align {
            None => Ok(None),
            Some(n) if matches!(n, 0 | 1 | 2 | 4 | 8) => Ok(Some(n)),
            Some(n) => Err(SdlError::InvAlign(Location::default(), n.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lang_specs_split_name_and_output() {
        let cli = Cli::parse_from(["opensdl", "in.sdl", "--lang", "c=out.h", "--lang", "c"]);
        assert_eq!(
            cli.lang_specs(),
            vec![("c".to_string(), Some("out.h".to_string())), ("c".to_string(), None)]
        );
    }

    #[test]
    fn listing_defaults_to_input_stem() {
        let cli = Cli::parse_from(["opensdl", "in.sdl", "--lang", "c", "--listing"]);
        assert_eq!(cli.listing_path(), Some(PathBuf::from("in.lis")));
    }

    #[test]
    fn listing_honors_explicit_path() {
        let cli = Cli::parse_from(["opensdl", "in.sdl", "--lang", "c", "--listing", "out.lis"]);
        assert_eq!(cli.listing_path(), Some(PathBuf::from("out.lis")));
    }

    #[test]
    fn align_rejects_values_outside_the_allowed_set() {
        let cli = Cli::parse_from(["opensdl", "in.sdl", "--lang", "c", "--align", "3"]);
        assert!(cli.alignment_value().is_err());
    }

    #[test]
    fn b32_and_b64_are_mutually_exclusive() {
        let result = Cli::try_parse_from(["opensdl", "in.sdl", "--lang", "c", "--b32", "--b64"]);
        assert!(result.is_err());
    }
}
