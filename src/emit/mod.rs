//! Emitter fan-out (spec §6 "External Interfaces"). One `Emitter`
//! implementation per target output language; `Context` holds a list of
//! `(LanguageId, Box<dyn Emitter>)` and calls out to whichever are
//! currently enabled in `lang_enable_vec`, mirroring the teacher's
//! pattern of a trait-object list of active backends fanned out to
//! uniformly.

pub mod c;

use std::io::Write;

use crate::error::SdlResult;
use crate::model::{Constant, Declare, Entry, Enum, Item};

/// Line-bracketing flags for a pass-through comment (spec §6
/// `emit_comment`'s `lineFlag, startFlag, middleFlag, endFlag`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentFlags {
    pub line: bool,
    pub start: bool,
    pub middle: bool,
    pub end: bool,
}

/// Which kind of aggregate-tree node `Emitter::aggregate_member` is being
/// called for, and its payload — spec §6's
/// `emit_aggregate(out, node, nodeKind, ending, depth, context)`.
pub enum AggregateNode<'a> {
    Aggregate(&'a crate::model::Aggregate),
    Item(&'a Item),
    Comment(&'a str),
}

/// One target language's output callback set. Every method takes the
/// open output stream and (where relevant) a reference into the
/// just-completed record, returning `SdlResult<()>` so a `Status::Abort`
/// equivalent propagates like any other builder error.
pub trait Emitter {
    fn header_stars(&mut self, out: &mut dyn Write) -> SdlResult<()>;
    fn header_created(&mut self, out: &mut dyn Write, runtime: &str) -> SdlResult<()>;
    fn header_fileinfo(&mut self, out: &mut dyn Write, input_time: &str, input_path: &str) -> SdlResult<()>;
    fn comment(&mut self, out: &mut dyn Write, text: &str, flags: CommentFlags) -> SdlResult<()>;
    fn module(&mut self, out: &mut dyn Write, name: &str, ident: Option<&str>) -> SdlResult<()>;
    fn module_end(&mut self, out: &mut dyn Write, name: &str) -> SdlResult<()>;
    fn literal(&mut self, out: &mut dyn Write, line: &str) -> SdlResult<()>;
    fn declare(&mut self, out: &mut dyn Write, d: &Declare) -> SdlResult<()>;
    fn item(&mut self, out: &mut dyn Write, i: &Item) -> SdlResult<()>;
    fn constant(&mut self, out: &mut dyn Write, c: &Constant) -> SdlResult<()>;
    fn enumerate(&mut self, out: &mut dyn Write, e: &Enum) -> SdlResult<()>;
    fn entry(&mut self, out: &mut dyn Write, e: &Entry) -> SdlResult<()>;
    fn aggregate_member(&mut self, out: &mut dyn Write, node: AggregateNode<'_>, ending: bool, depth: usize) -> SdlResult<()>;
}
