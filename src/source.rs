//! The input-stream boundary.
//!
//! Reading source text is an external collaborator (spec.md §1); this
//! module only fixes the interface the lexer and Pass-1 assembler
//! consume it through, plus the per-line origin record that flows
//! through every later stage.

use std::io;
use std::io::BufRead;

/// Origin of one input line.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SourceLine {
    /// Usually a file path; the main file or a `$`-included file.
    pub source: String,
    /// 1-based line number within `source`.
    pub line_number: u32,
    /// Page number in effect when this line was read, advanced by
    /// `## Page N` remarks.
    pub page: u32,
    pub text: String,
}

/// Supplies the text of a named source file.
///
/// Implementations own whatever filesystem or in-memory backing the
/// caller prefers; the assembler only ever asks for files by the name
/// written after a `$` insertion line (or the initial main-file name).
pub trait SourceReader {
    fn open(&self, path: &str) -> io::Result<Box<dyn BufRead>>;
}

/// An in-memory [`SourceReader`] backed by a fixed set of named
/// buffers, used throughout this crate's own tests.
#[derive(Debug, Default, Clone)]
pub struct MapSourceReader {
    files: std::collections::HashMap<String, String>,
}

impl MapSourceReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }
}

impl SourceReader for MapSourceReader {
    fn open(&self, path: &str) -> io::Result<Box<dyn BufRead>> {
        match self.files.get(path) {
            Some(contents) => Ok(Box::new(io::Cursor::new(contents.clone().into_bytes()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such source file: {path}"),
            )),
        }
    }
}
