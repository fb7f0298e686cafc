//! Cards: one classified, not-yet-assembled unit of source, one per
//! instruction line (or clerical directive, or insertion, or remark).
//!
//! `Card` is the output of the parser (`parser.rs`) and the input to
//! both assembler passes. It keeps the raw parsed pieces rather than
//! anything resolved — resolution against the symbol table is Pass-2's
//! job, not the parser's.

use crate::address_field::ParsedAddress;
use crate::cuss::Cuss;
use crate::operation::Operation;
use crate::source::SourceLine;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OperationField {
    pub operation: &'static Operation,
    /// `-` prefix on a basic instruction (spec.md §4.2).
    pub complemented: bool,
    /// `*` prefix, indexing the operation itself rather than its operand.
    pub indexed: bool,
}

/// The right-hand side of an [`Card::InterpretiveInstruction`] card.
///
/// spec.md §4.4: an interpretive card may carry a second operator
/// token in the same line (`rhs` names another interpretive mnemonic),
/// or an address directly (when the left operator's first operand spec
/// is not push-down, e.g. `GOTO FOO`, or when the left operator is a
/// Store writing straight to its target), or nothing at all (a
/// push-down operator whose operand word(s) arrive on later lines).
#[derive(Debug, Clone, PartialEq)]
pub enum InterpretiveRhs {
    None,
    Operation(OperationField),
    Address(ParsedAddress),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Card {
    Insertion {
        source: SourceLine,
        file_name: String,
    },
    Remark {
        source: SourceLine,
        text: String,
    },
    /// A line whose operation field named no known mnemonic. Carries
    /// whatever cusses the parser raised rather than being silently
    /// dropped or crashing the pipeline.
    Invalid {
        source: SourceLine,
        cusses: Vec<Cuss>,
    },
    Clerical {
        source: SourceLine,
        location: Option<String>,
        operation: OperationField,
        address: Option<ParsedAddress>,
        cusses: Vec<Cuss>,
    },
    BasicInstruction {
        source: SourceLine,
        location: Option<String>,
        operation: OperationField,
        address: ParsedAddress,
        cusses: Vec<Cuss>,
    },
    InterpretiveInstruction {
        source: SourceLine,
        location: Option<String>,
        lhs: OperationField,
        rhs: InterpretiveRhs,
        cusses: Vec<Cuss>,
    },
    NumericConstant {
        source: SourceLine,
        location: Option<String>,
        operation: OperationField,
        /// Second word of a double-precision literal (`2DEC`'s first
        /// token), `None` for single-word constants.
        high_word: Option<String>,
        low_word: String,
        cusses: Vec<Cuss>,
    },
    AddressConstant {
        source: SourceLine,
        location: Option<String>,
        operation: OperationField,
        address: ParsedAddress,
        /// Index into the assembled-card list of the interpretive
        /// operator this address word was popped from the operand
        /// stack for, `None` for a standalone address constant
        /// (`BBCON`, `ADRES`, `2CADR`) that never touched the stack.
        /// This is a relationship, not ownership (spec.md §9): the
        /// operator card is owned by the assembled-cards list itself.
        interpretive: Option<usize>,
        cusses: Vec<Cuss>,
    },
}

impl Card {
    pub fn source(&self) -> &SourceLine {
        match self {
            Card::Insertion { source, .. }
            | Card::Remark { source, .. }
            | Card::Invalid { source, .. }
            | Card::Clerical { source, .. }
            | Card::BasicInstruction { source, .. }
            | Card::InterpretiveInstruction { source, .. }
            | Card::NumericConstant { source, .. }
            | Card::AddressConstant { source, .. } => source,
        }
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            Card::Clerical { location, .. }
            | Card::BasicInstruction { location, .. }
            | Card::InterpretiveInstruction { location, .. }
            | Card::NumericConstant { location, .. }
            | Card::AddressConstant { location, .. } => location.as_deref(),
            Card::Insertion { .. } | Card::Remark { .. } | Card::Invalid { .. } => None,
        }
    }

    pub fn cusses(&self) -> &[Cuss] {
        match self {
            Card::Invalid { cusses, .. }
            | Card::Clerical { cusses, .. }
            | Card::BasicInstruction { cusses, .. }
            | Card::InterpretiveInstruction { cusses, .. }
            | Card::NumericConstant { cusses, .. }
            | Card::AddressConstant { cusses, .. } => cusses,
            Card::Insertion { .. } | Card::Remark { .. } => &[],
        }
    }

    /// Appends a cuss discovered after parsing (Pass 1's own
    /// redefinition/conflict checks, say) to whichever variant carries
    /// a cuss list; a no-op for `Insertion`/`Remark`.
    pub fn push_cuss(&mut self, cuss: Cuss) {
        match self {
            Card::Invalid { cusses, .. }
            | Card::Clerical { cusses, .. }
            | Card::BasicInstruction { cusses, .. }
            | Card::InterpretiveInstruction { cusses, .. }
            | Card::NumericConstant { cusses, .. }
            | Card::AddressConstant { cusses, .. } => cusses.push(cuss),
            Card::Insertion { .. } | Card::Remark { .. } => {}
        }
    }

    /// How many true-address cells this card's operation claims, for
    /// Pass-1 reservation. Clerical directives are handled specially
    /// by Pass 1 (they move the location counter, they don't claim
    /// cells by word count), so this only covers word-emitting cards.
    pub fn word_count(&self) -> u8 {
        match self {
            Card::BasicInstruction { operation, .. }
            | Card::InterpretiveInstruction { lhs: operation, .. }
            | Card::NumericConstant { operation, .. }
            | Card::AddressConstant { operation, .. } => operation.operation.words,
            Card::Clerical { .. } | Card::Insertion { .. } | Card::Remark { .. } | Card::Invalid { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation;
    use crate::target::Target;

    fn source() -> SourceLine {
        SourceLine {
            source: "MAIN.agc".into(),
            line_number: 1,
            page: 0,
            text: String::new(),
        }
    }

    #[test]
    fn location_is_none_for_cardless_variants() {
        let card = Card::Remark {
            source: source(),
            text: "hello".into(),
        };
        assert_eq!(card.location(), None);
        assert!(card.cusses().is_empty());
    }

    #[test]
    fn location_surfaces_for_instruction_cards() {
        let target = Target::block2_gap();
        let ca = operation::lookup("CA", &target).unwrap();
        let card = Card::BasicInstruction {
            source: source(),
            location: Some("FOO".into()),
            operation: OperationField {
                operation: ca,
                complemented: false,
                indexed: false,
            },
            address: ParsedAddress::Field(crate::address_field::AddressField::omitted()),
            cusses: Vec::new(),
        };
        assert_eq!(card.location(), Some("FOO"));
        assert_eq!(card.word_count(), 1);
    }
}
