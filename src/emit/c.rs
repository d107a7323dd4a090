//! C-family emitter (spec §1 "initially a C-family output"). Grounded on
//! `original_source/src/opensdl_lang_c.c`'s name-formatting tables
//! (`"%s%s_%s"` prefix/tag/name, `#define` for constants, `typedef` for
//! DECLARE, `struct`/`union` for aggregates) translated into calls
//! against a `dyn Write`.

use std::io::Write;

use crate::error::{SdlError, SdlResult};
use crate::model::{AggKind, Constant, ConstantKind, Declare, Entry, Item, PassingMechanism};
use crate::model::{Enum};
use crate::options::Radix;

use super::{AggregateNode, CommentFlags, Emitter};

fn io(e: std::io::Error) -> SdlError {
    // The core only ever sees write failures as an output-file problem;
    // there is no distinct "mid-stream write error" kind in spec §7, so
    // this reuses the one error path that already carries an `io::Error`.
    SdlError::OutFilOpn(String::new(), e)
}

/// `prefix` + `tag` + `name`, joined the way `_names[SDL_NAME_ENT]`
/// (`"%s%s_%s"`) does, omitting the separating `_` when prefix/tag are
/// both absent. `suppress_prefix`/`suppress_tag` implement the CLI's
/// `--suppress-prefix`/`--suppress-tag` (spec §6 "suppression of
/// prefix/tag in emitted names").
fn emitted_name(prefix: Option<&str>, tag: &str, name: &str, suppress_prefix: bool, suppress_tag: bool) -> String {
    let prefix = if suppress_prefix { "" } else { prefix.unwrap_or("") };
    let tag = if suppress_tag { "" } else { tag };
    if prefix.is_empty() && tag.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}{tag}_{name}")
    }
}

fn c_base_type_name(raw: i64) -> &'static str {
    use crate::registry::*;
    match raw {
        BYTE => "char",
        WORD => "short",
        LONG => "int",
        QUAD => "long long",
        OCTA => "__int128",
        TFLT | FFLT => "float",
        SFLT | DFLT | GFLT => "double",
        XFLT | HFLT => "long double",
        CHAR | CHAR_VARY => "char",
        BOOL => "int",
        VOID => "void",
        ADDR | ADDR_L | ADDR_Q | ADDR_HW | POINTER | POINTER_L | POINTER_Q | POINTER_HW => "void *",
        _ => "int",
    }
}

/// The initial (and currently only) target-language backend.
#[derive(Debug, Default)]
pub struct CEmitter {
    pub suppress_prefix: bool,
    pub suppress_tag: bool,
}

impl CEmitter {
    pub fn new(suppress_prefix: bool, suppress_tag: bool) -> Self {
        CEmitter { suppress_prefix, suppress_tag }
    }

    fn name(&self, prefix: Option<&str>, tag: &str, name: &str) -> String {
        emitted_name(prefix, tag, name, self.suppress_prefix, self.suppress_tag)
    }
}

impl Emitter for CEmitter {
    fn header_stars(&mut self, out: &mut dyn Write) -> SdlResult<()> {
        writeln!(out, "/*{}*/", "*".repeat(74)).map_err(io)
    }

    fn header_created(&mut self, out: &mut dyn Write, runtime: &str) -> SdlResult<()> {
        writeln!(out, "/* Created: {runtime} */").map_err(io)
    }

    fn header_fileinfo(&mut self, out: &mut dyn Write, input_time: &str, input_path: &str) -> SdlResult<()> {
        writeln!(out, "/* Source: {input_path}, {input_time} */").map_err(io)
    }

    fn comment(&mut self, out: &mut dyn Write, text: &str, flags: CommentFlags) -> SdlResult<()> {
        if flags.line {
            writeln!(out, "/*{text} */").map_err(io)
        } else if flags.start {
            writeln!(out, "/*\n * {text}").map_err(io)
        } else if flags.end {
            writeln!(out, " * {text}\n */").map_err(io)
        } else {
            writeln!(out, " * {text}").map_err(io)
        }
    }

    fn module(&mut self, out: &mut dyn Write, name: &str, ident: Option<&str>) -> SdlResult<()> {
        match ident {
            Some(ident) => writeln!(out, "\n/*** MODULE {name} IDENT = {ident} ***/").map_err(io),
            None => writeln!(out, "\n/*** MODULE {name} ***/").map_err(io),
        }?;
        writeln!(out, "#ifndef _{name}_\n#define _{name}_ 1\n#ifdef __cplusplus\nextern \"C\" {{\n#endif").map_err(io)
    }

    fn module_end(&mut self, out: &mut dyn Write, name: &str) -> SdlResult<()> {
        writeln!(out, "#ifdef __cplusplus\n}}\n#endif\n#endif /* _{name}_ */").map_err(io)
    }

    fn literal(&mut self, out: &mut dyn Write, line: &str) -> SdlResult<()> {
        writeln!(out, "{line}").map_err(io)
    }

    fn declare(&mut self, out: &mut dyn Write, d: &Declare) -> SdlResult<()> {
        let name = self.name(d.prefix.as_deref(), &d.tag, &d.name);
        let sign = if d.unsigned { "unsigned " } else { "" };
        writeln!(out, "typedef {sign}{} {name};", c_base_type_name(d.underlying_type.raw())).map_err(io)
    }

    fn item(&mut self, out: &mut dyn Write, i: &Item) -> SdlResult<()> {
        let name = self.name(i.prefix.as_deref(), &i.tag, &i.name);
        let base = c_base_type_name(i.datatype.raw());
        match i.dimension {
            Some(dim) => writeln!(out, "{base} {name}[{}];", dim.hbound - dim.lbound + 1).map_err(io),
            None if i.is_bitfield => writeln!(out, "{base} {name} : {};", i.bit_length).map_err(io),
            None => writeln!(out, "{base} {name};").map_err(io),
        }
    }

    fn constant(&mut self, out: &mut dyn Write, c: &Constant) -> SdlResult<()> {
        let name = self.name(c.prefix.as_deref(), &c.tag, &c.name);
        match &c.kind {
            ConstantKind::Numeric(value) => {
                let rendered = match c.radix {
                    Radix::Decimal => format!("{value}"),
                    Radix::Hex => format!("0x{value:x}"),
                    Radix::Octal => format!("0{value:o}"),
                };
                writeln!(out, "#define {name}\t{rendered}").map_err(io)
            }
            ConstantKind::Str(s) => writeln!(out, "#define {name}\t\"{s}\"").map_err(io),
        }
    }

    fn enumerate(&mut self, out: &mut dyn Write, e: &Enum) -> SdlResult<()> {
        let name = self.name(e.prefix.as_deref(), &e.tag, &e.name);
        writeln!(out, "typedef enum {name} {{").map_err(io)?;
        for (idx, member) in e.members.iter().enumerate() {
            let comma = if idx + 1 == e.members.len() { "" } else { "," };
            writeln!(out, "    {} = {}{comma}", member.name, member.value).map_err(io)?;
        }
        writeln!(out, "}} {name};").map_err(io)
    }

    fn entry(&mut self, out: &mut dyn Write, e: &Entry) -> SdlResult<()> {
        let ret = e
            .returns
            .as_ref()
            .map(|r| c_base_type_name(r.type_id.raw()))
            .unwrap_or("void");
        write!(out, "{ret} {}(", e.alias.as_deref().unwrap_or(&e.name)).map_err(io)?;
        for (idx, p) in e.parameters.iter().enumerate() {
            if idx > 0 {
                write!(out, ", ").map_err(io)?;
            }
            let base = p.type_name.as_deref().unwrap_or_else(|| c_base_type_name(p.type_id.raw()));
            match p.passing {
                PassingMechanism::ByValue => write!(out, "{base} {}", p.name).map_err(io)?,
                PassingMechanism::ByRef => write!(out, "{base} *{}", p.name).map_err(io)?,
            }
        }
        writeln!(out, ");").map_err(io)
    }

    fn aggregate_member(&mut self, out: &mut dyn Write, node: AggregateNode<'_>, ending: bool, depth: usize) -> SdlResult<()> {
        let indent = "    ".repeat(depth);
        match node {
            AggregateNode::Aggregate(agg) if !ending => {
                let keyword = match agg.agg_type {
                    AggKind::Struct => "struct",
                    AggKind::Union => "union",
                };
                if depth == 0 {
                    writeln!(out, "typedef {keyword} {{").map_err(io)
                } else {
                    writeln!(out, "{indent}{keyword} {{").map_err(io)
                }
            }
            AggregateNode::Aggregate(agg) => {
                let name = self.name(agg.prefix.as_deref(), &agg.tag, &agg.name);
                if depth == 0 {
                    writeln!(out, "}} {name};").map_err(io)
                } else {
                    writeln!(out, "{indent}}} {name};").map_err(io)
                }
            }
            AggregateNode::Item(item) => {
                let name = self.name(item.prefix.as_deref(), &item.tag, &item.name);
                let base = c_base_type_name(item.datatype.raw());
                if item.is_bitfield {
                    writeln!(out, "{indent}{base} {name} : {};", item.bit_length).map_err(io)
                } else {
                    writeln!(out, "{indent}{base} {name};").map_err(io)
                }
            }
            AggregateNode::Comment(text) => writeln!(out, "{indent}/* {text} */").map_err(io),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitted_name_joins_prefix_tag_name() {
        assert_eq!(emitted_name(Some("SDL"), "K", "FOO", false, false), "SDLK_FOO");
        assert_eq!(emitted_name(None, "", "FOO", false, false), "FOO");
    }

    #[test]
    fn emitted_name_honors_suppression_flags() {
        assert_eq!(emitted_name(Some("SDL"), "K", "FOO", true, false), "K_FOO");
        assert_eq!(emitted_name(Some("SDL"), "K", "FOO", false, true), "SDL_FOO");
        assert_eq!(emitted_name(Some("SDL"), "K", "FOO", true, true), "FOO");
    }

    #[test]
    fn numeric_constant_renders_by_radix() {
        let mut buf = Vec::new();
        let mut emitter = CEmitter::default();
        let c = Constant {
            id: crate::model::ConstantId(0),
            name: "A".into(),
            prefix: None,
            tag: "K".into(),
            type_name: None,
            radix: Radix::Hex,
            kind: ConstantKind::Numeric(255),
            size: 4,
            comment: None,
            loc: crate::error::Location::default(),
        };
        emitter.constant(&mut buf, &c).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "#define K_A\t0xff\n");
    }
}
