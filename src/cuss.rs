//! Diagnostics ("cusses", in the original YUL nomenclature).
//!
//! A cuss never aborts the pipeline. It attaches to whatever card or
//! symbol produced it and accumulates alongside everything else that
//! ran in the same pass, so one run can report every problem in a
//! source file instead of stopping at the first.

use std::fmt;
use std::io;

/// One-byte diagnostic code, stable across assembler versions.
///
/// The numeric values are the serials spec.md §7 enumerates. They are
/// not derived from anything at runtime; they're a fixed lookup key
/// into [`SEVERITY`] and [`MESSAGE`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct CussSerial(pub u8);

impl CussSerial {
    pub const SPURIOUS_COMPLEMENT: CussSerial = CussSerial(0x01);
    pub const MISSING_STORE_OPERAND: CussSerial = CussSerial(0x09);
    pub const OPERAND_STACK_NOT_PUSH_DOWN: CussSerial = CussSerial(0x0E);
    pub const OPERAND_STACK_INDEXED: CussSerial = CussSerial(0x0F);
    pub const STADR_NOT_FOLLOWED_BY_STORE: CussSerial = CussSerial(0x11);
    pub const INTERPRETIVE_OPERATOR_ERROR_1: CussSerial = CussSerial(0x14);
    pub const INTERPRETIVE_OPERATOR_ERROR_2: CussSerial = CussSerial(0x15);
    pub const INDEX_REGISTER_SUFFIX: CussSerial = CussSerial(0x17);
    pub const INVERTED_RANGE: CussSerial = CussSerial(0x1E);
    pub const DECIMAL_WITHOUT_D: CussSerial = CussSerial(0x21);
    pub const PAGE_OUT_OF_ORDER: CussSerial = CussSerial(0x27);
    pub const STRUCTURAL_IO: CussSerial = CussSerial(0x2A);
    pub const SPURIOUS_OPERAND: CussSerial = CussSerial(0x2B);
    pub const UNRESOLVED_PASS2: CussSerial = CussSerial(0x2C);
    pub const UNRESOLVED_PASS1: CussSerial = CussSerial(0x2D);
    /// `ERASE`'s own range form given in reverse order; a companion to
    /// [`Self::INVERTED_RANGE`] at the clerical-directive layer rather
    /// than the address-field grammar layer.
    pub const ERASE_RANGE_ORDER: CussSerial = CussSerial(0x2F);
    pub const MULTIPLY_DEFINED: CussSerial = CussSerial(0x31);
    pub const NO_LOCATION_COUNTER: CussSerial = CussSerial(0x35);
    pub const BAD_ADDRESS_FIELD: CussSerial = CussSerial(0x3D);
    pub const NUMERIC_OVERFLOW: CussSerial = CussSerial(0x3F);
    pub const SPURIOUS_INDEX: CussSerial = CussSerial(0x40);
    pub const UNKNOWN_MNEMONIC: CussSerial = CussSerial(0x41);
    pub const MISSING_EXTEND: CussSerial = CussSerial(0x43);
    pub const SPURIOUS_EXTEND: CussSerial = CussSerial(0x44);
    pub const BLANK_LOCATION: CussSerial = CussSerial(0x47);
    pub const NUMERIC_LOCATION: CussSerial = CussSerial(0x4A);
    pub const LOCATION_TOO_LONG: CussSerial = CussSerial(0x4B);
    pub const BANK_EXHAUSTED: CussSerial = CussSerial(0x4F);
    pub const MISSING_OPERAND: CussSerial = CussSerial(0x56);

    fn template(self) -> &'static str {
        match self.0 {
            0x01 => "spurious complement prefix `-`",
            0x09 => "missing store operand",
            0x0E => "interpretive operand stack entry is not push-down",
            0x0F => "interpretive operand stack entry was indexed",
            0x11 => "STADR was not followed by a store operation",
            0x14 => "interpretive operator error",
            0x15 => "interpretive operator error",
            0x17 => "missing or forbidden index register suffix",
            0x1E => "inverted range",
            0x21 => "decimal constant without `D` suffix",
            0x27 => "page number out of order",
            0x2A => "structural or I/O failure",
            0x2B => "spurious operand",
            0x2C => "unresolved symbol",
            0x2D => "unresolved symbol",
            0x2F => "ERASE range given in reverse order",
            0x31 => "symbol multiply defined",
            0x35 => "no location counter in effect",
            0x3D => "malformed address field",
            0x3F => "numeric overflow or invalid bank",
            0x40 => "spurious index prefix `*`",
            0x41 => "unknown mnemonic",
            0x43 => "missing EXTEND",
            0x44 => "spurious EXTEND",
            0x47 => "blank location field",
            0x4A => "location field parses as numeric",
            0x4B => "location field longer than 8 characters",
            0x4F => "memory bank exhausted",
            0x56 => "missing operand",
            _ => "unclassified diagnostic",
        }
    }

    pub fn severity(self) -> Severity {
        match self.0 {
            0x0E | 0x11 | 0x27 | 0x44 => Severity::Warning,
            _ => Severity::Fatal,
        }
    }
}

/// Whether a cuss fails the assembly (per spec.md §6's exit-status rule).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Severity {
    Warning,
    Fatal,
}

/// A diagnostic record attached to a card or symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Cuss {
    pub serial: CussSerial,
    pub severity: Severity,
    pub context: Vec<String>,
    /// Set only for [`CussSerial::STRUCTURAL_IO`]; the original I/O failure.
    pub captured_error: Option<CapturedIoError>,
}

/// `io::Error` is not `Clone`, but `Cuss` needs to be (an `AssembledCard`
/// may be read and reported many times); this carries just enough of
/// the original error to display it.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedIoError {
    pub kind: io::ErrorKind,
    pub message: String,
}

impl From<&io::Error> for CapturedIoError {
    fn from(error: &io::Error) -> Self {
        CapturedIoError {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl Cuss {
    pub fn new(serial: CussSerial) -> Self {
        Cuss {
            serial,
            severity: serial.severity(),
            context: Vec::new(),
            captured_error: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn io_failure(path: impl Into<String>, error: &io::Error) -> Self {
        Cuss::new(CussSerial::STRUCTURAL_IO)
            .with_context(path)
            .with_captured(error)
    }

    fn with_captured(mut self, error: &io::Error) -> Self {
        self.captured_error = Some(error.into());
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl fmt::Display for Cuss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}: {}", self.serial.0, self.serial.template())?;
        if !self.context.is_empty() {
            write!(f, " ({})", self.context.join(", "))?;
        }
        if let Some(captured) = &self.captured_error {
            write!(f, ": {}", captured.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_fixed_per_serial() {
        assert_eq!(CussSerial::BANK_EXHAUSTED.severity(), Severity::Fatal);
        assert_eq!(CussSerial::PAGE_OUT_OF_ORDER.severity(), Severity::Warning);
        assert_eq!(
            CussSerial::STADR_NOT_FOLLOWED_BY_STORE.severity(),
            Severity::Warning
        );
    }

    #[test]
    fn display_includes_serial_and_context() {
        let cuss = Cuss::new(CussSerial::UNRESOLVED_PASS2).with_context("FOO");
        let text = cuss.to_string();
        assert!(text.starts_with("2C:"));
        assert!(text.contains("FOO"));
    }

    #[test]
    fn io_failure_captures_the_original_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let cuss = Cuss::io_failure("SUB.agc", &io_err);
        assert_eq!(cuss.serial, CussSerial::STRUCTURAL_IO);
        assert!(cuss.is_fatal());
        assert_eq!(
            cuss.captured_error.unwrap().kind,
            io::ErrorKind::NotFound
        );
    }
}
