//! Listing file generation (spec §6 external interface, `--listing`).
//!
//! Grounded on `opensdl_listing.c`'s four entry points: `sdl_open_listing`
//! builds a two-line page header (timestamp, version, input path);
//! `sdl_write_list` paginates source text onto numbered lines, inserting a
//! form feed every `PAGE_LENGTH` lines; `sdl_write_err` interleaves error
//! text at the point it was detected; `sdl_close_listing` flushes
//! whatever is left in the line buffer. The original drives this byte by
//! byte off the lexer's read buffer; the parser here already works one
//! source line at a time, so `Listing::write_line` takes a whole line
//! per call instead of reproducing that byte-oriented buffering.
//!
//! Date/time stamping is supplied by the caller as a preformatted string
//! rather than computed here, since nothing else in this crate's
//! dependency stack does calendar math.

use std::io::{self, Write};

/// Page geometry, unchanged from `opensdl_listing.c`'s `SDL_PAGE_WIDTH`/
/// `SDL_PAGE_LENGTH`.
pub const PAGE_WIDTH: usize = 132;
pub const PAGE_LENGTH: u32 = 66;

/// Build the two header lines printed at the top of every listing page.
pub fn build_header(version: &str, timestamp: &str, input_path: &str) -> [String; 2] {
    [
        format!("{:58}OpenSDL {version}\t\t\tPage", ""),
        format!("{:60} {timestamp}\t{input_path}", ""),
    ]
}

pub struct Listing<W> {
    out: W,
    header: [String; 2],
    list_line: u32,
    page_line: u32,
    page_no: u32,
}

impl<W: Write> Listing<W> {
    pub fn new(out: W, header: [String; 2]) -> Self {
        Listing { out, header, list_line: 1, page_line: 1, page_no: 1 }
    }

    fn emit_page_header(&mut self) -> io::Result<()> {
        if self.list_line > 1 {
            write!(self.out, "\x0c")?;
        }
        writeln!(self.out, "{}{:4}", self.header[0], self.page_no)?;
        writeln!(self.out, "{}", self.header[1])?;
        self.page_line += 2;
        Ok(())
    }

    /// Write one line of source text, prefixed with its running line
    /// number, paginating as needed.
    pub fn write_line(&mut self, text: &str) -> io::Result<()> {
        if self.page_line == 1 {
            self.emit_page_header()?;
        }
        let mut line = format!("{:7} {}", self.list_line, text);
        if line.len() > PAGE_WIDTH {
            line.truncate(PAGE_WIDTH);
        }
        writeln!(self.out, "{line}")?;
        self.list_line += 1;
        self.page_line += 1;
        if self.page_line > PAGE_LENGTH {
            self.page_no += 1;
            self.page_line = 1;
        }
        Ok(())
    }

    /// Write an error message immediately following the line that
    /// produced it (spec §7, `sdl_write_err`'s interleaving contract).
    pub fn write_error(&mut self, msg: &str) -> io::Result<()> {
        writeln!(self.out, "%OPENSDL-E, {msg}")
    }

    pub fn close(mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_prints_the_page_header() {
        let header = build_header("V3.9-0", "28-JUL-2026 10:00:00", "in.sdl");
        let mut listing = Listing::new(Vec::new(), header);
        listing.write_line("MODULE foo;").unwrap();
        let text = String::from_utf8(listing.out).unwrap();
        assert!(text.contains("OpenSDL"));
        assert!(text.contains("      1 MODULE foo;"));
    }

    #[test]
    fn page_rolls_over_after_page_length_lines() {
        let header = build_header("V3.9-0", "28-JUL-2026 10:00:00", "in.sdl");
        let mut listing = Listing::new(Vec::new(), header);
        for _ in 0..PAGE_LENGTH {
            listing.write_line("X;").unwrap();
        }
        assert_eq!(listing.page_no, 2);
        assert_eq!(listing.page_line, 1);
    }

    #[test]
    fn error_lines_are_flagged() {
        let header = build_header("V3.9-0", "28-JUL-2026 10:00:00", "in.sdl");
        let mut listing = Listing::new(Vec::new(), header);
        listing.write_error("unknown qualifier").unwrap();
        let text = String::from_utf8(listing.out).unwrap();
        assert!(text.starts_with("%OPENSDL-E,"));
    }
}
