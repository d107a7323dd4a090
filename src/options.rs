//! Option buffer (spec §4.2).
//!
//! A transient, ordered list of modifiers accumulated between a
//! declaration's opening and its completion, drained exactly once by the
//! completer. Modeled as an ordered `Vec` of a tagged-variant enum (one
//! variant per option kind) rather than a record with a kind discriminant
//! and a grab-bag of nullable fields, per §9 Design Notes.

/// `ALIGN <n>` / `NOALIGN` / a bare `ALIGN` (round up to the member's own
/// size) — the three alignment policies the layout engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    NoAlign,
    Align,
    Explicit(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Decimal,
    Hex,
    Octal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    pub lbound: i64,
    pub hbound: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Common,
    Global,
    Typedef,
}

/// One entry accumulated in the option buffer. Each variant carries only
/// the payload its option kind actually needs.
#[derive(Debug, Clone)]
pub enum OptionEntry {
    Align(Alignment),
    BaseAlign(i64),
    Prefix(String),
    Tag(String),
    Marker(String),
    Based(String),
    Origin(String),
    Counter(String),
    TypeName(String),
    Increment(i64),
    Radix(Radix),
    Enumerate(bool),
    Storage(StorageClass),
    Fill(bool),
    Mask(bool),
    Signed(bool),
    Length(i64),
    SubType(i64),
    Dimension(Dimension),
    Alias(String),
    Linkage(String),
    Variable(String),
    ReturnsType(i64),
    ReturnsNamed(String),
    In(bool),
    Out(bool),
    Named(bool),
    Default(i64),
    Optional(bool),
    List(bool),
}

/// The per-declaration option accumulator. At most one declaration is in
/// construction at a time, so there is exactly one of these live per
/// `Context`; it is emptied by `drain` before the next declaration opens.
#[derive(Debug, Default)]
pub struct OptionBuffer {
    entries: Vec<OptionEntry>,
}

impl OptionBuffer {
    pub fn new() -> Self {
        OptionBuffer::default()
    }

    pub fn push(&mut self, entry: OptionEntry) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drain every accumulated entry for the completer to interpret. The
    /// buffer is empty again as soon as this returns, which is what makes
    /// "exactly one declaration in construction at a time" structural
    /// rather than merely documented: there is no way to hold a live
    /// reference into the buffer across two declarations.
    pub fn drain(&mut self) -> Vec<OptionEntry> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_buffer_exactly_once() {
        let mut buf = OptionBuffer::new();
        buf.push(OptionEntry::Prefix("FOO".into()));
        buf.push(OptionEntry::Tag("X".into()));
        assert_eq!(buf.len(), 2);

        let drained = buf.drain();
        assert_eq!(drained.len(), 2);
        assert!(buf.is_empty());

        // draining an already-empty buffer yields nothing
        assert!(buf.drain().is_empty());
    }
}
