//! `opensdl` binary entry point: wires the CLI surface ([`cli`]) to the
//! lexer/parser ([`lexer`], [`parser`]), the semantic model builder
//! ([`context`]), the emitter fan-out ([`emit`]) and the optional
//! listing file ([`listing`]).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use memmap2::Mmap;
use tracing_subscriber::EnvFilter;

use opensdl::cli::Cli;
use opensdl::context::Context;
use opensdl::emit::c::CEmitter;
use opensdl::emit::Emitter;
use opensdl::error::{Location, SdlError, SdlResult};
use opensdl::listing::{self, Listing};
use opensdl::options::Alignment;
use opensdl::parser::{parse_symbol_defs, Parser};
use opensdl::registry::WordSize;

fn main() {
    let cli = Cli::parse_args();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    if let Err(err) = run(&cli) {
        tracing::error!("{err}");
        eprintln!("opensdl: {err}");
        std::process::exit(1);
    }
}

fn now_stamp() -> String {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    format!("{secs}s since the Unix epoch")
}

fn default_output_path(input: &Path, lang: &str) -> PathBuf {
    let ext = match lang.to_ascii_lowercase().as_str() {
        "c" => "h",
        other => other,
    };
    input.with_extension(ext)
}

fn open_emitter(lang: &str, suppress_prefix: bool, suppress_tag: bool) -> SdlResult<Box<dyn Emitter>> {
    match lang.to_ascii_lowercase().as_str() {
        "c" => Ok(Box::new(CEmitter::new(suppress_prefix, suppress_tag))),
        other => Err(SdlError::InvQual(Location::default(), format!("unknown target language \"{other}\""))),
    }
}

fn run(cli: &Cli) -> SdlResult<()> {
    if cli.lang.is_empty() {
        return Err(SdlError::NoOutput);
    }

    let word = if cli.b32 { WordSize::Bits32 } else { WordSize::Bits64 };
    let alignment = match cli.alignment_value()? {
        Some(0) => Alignment::NoAlign,
        Some(n) => Alignment::Explicit(n),
        None if cli.member_align => Alignment::Align,
        None => Alignment::NoAlign,
    };
    let symbols = parse_symbol_defs(&cli.symbol)?;

    let input_path = &cli.input;
    tracing::debug!(file = %input_path.display(), "opening input");
    let file = std::fs::File::open(input_path).map_err(|e| SdlError::InFilOpn(input_path.display().to_string(), e))?;
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| SdlError::InFilOpn(input_path.display().to_string(), e))?;
    let source = std::str::from_utf8(&mmap)
        .map_err(|_| SdlError::SyntaxErr(Location::default(), "input file is not valid UTF-8".to_string()))?;

    let mut ctx = Context::new(word, alignment, symbols);

    for (lang, output) in cli.lang_specs() {
        let out_path = output.map(PathBuf::from).unwrap_or_else(|| default_output_path(input_path, &lang));
        tracing::debug!(lang = %lang, out = %out_path.display(), "registering target");
        let out_file = std::fs::File::create(&out_path).map_err(|e| SdlError::OutFilOpn(out_path.display().to_string(), e))?;
        let mut writer: Box<dyn Write> = Box::new(std::io::BufWriter::new(out_file));
        if let Some(copyright_path) = &cli.copyright {
            let prelude = std::fs::read(copyright_path)
                .map_err(|e| SdlError::NoCopyFil(copyright_path.display().to_string(), e))?;
            writer
                .write_all(&prelude)
                .map_err(|e| SdlError::OutFilOpn(out_path.display().to_string(), e))?;
        }
        let emitter = open_emitter(&lang, cli.suppress_prefix, cli.suppress_tag)?;
        ctx.register_target(&lang, emitter, writer);
    }

    let runtime = now_stamp();
    if cli.header {
        ctx.emit_file_headers(&runtime, &runtime, &input_path.display().to_string())?;
    }

    let listing_path = cli.listing_path();
    let mut listing = match &listing_path {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|e| SdlError::OutFilOpn(path.display().to_string(), e))?;
            let header = listing::build_header(env!("CARGO_PKG_VERSION"), &runtime, &input_path.display().to_string());
            Some(Listing::new(std::io::BufWriter::new(file), header))
        }
        None => None,
    };

    let mut parser = if cli.comments {
        Parser::new_with_comments(source, &mut ctx)
    } else {
        Parser::new(source, &mut ctx)
    };
    let result = parser.run();

    if let Some(mut listing) = listing.take() {
        for line in source.lines() {
            let _ = listing.write_line(line);
        }
        if let Err(err) = &result {
            let _ = listing.write_error(&err.to_string());
        }
        let _ = listing.close();
    }

    result
}
