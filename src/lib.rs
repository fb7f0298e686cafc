//! A Block II Apollo-style column-source assembler: lex, parse,
//! resolve symbols across two passes, and compose odd-parity 15-bit
//! words into a cell grid.
//!
//! Front ends call [`assemble`] with a [`SourceReader`] over their
//! source tree and a [`Target`] describing the assembler variant, and
//! get back the assembled cards plus every cuss raised along the way.
//! Nothing here aborts on a bad card — cusses accumulate on the card
//! or symbol that raised them so one run reports everything wrong with
//! a source file, not just the first problem.

pub use crate::address_field::{AddressField, AddressValue, ParsedAddress};
pub use crate::assembled_card::AssembledCard;
pub use crate::assembler::{assemble, Pass1Assembler, Pass1Output, Pass2Assembler, Pass2Output};
pub use crate::card::{Card, InterpretiveRhs, OperationField};
pub use crate::cell::{CellGrid, ClaimOutcome};
pub use crate::cuss::{Cuss, CussSerial};
pub use crate::operation::{lookup, Operation, OperationType};
pub use crate::source::{MapSourceReader, SourceLine, SourceReader};
pub use crate::symbol_table::{Health, Pass1Table, Pass2Table};
pub use crate::target::{AssemblerVariant, Block, Origin, Target, YulRevision};

mod address_field;
mod assembled_card;
mod assembler;
mod card;
mod cell;
mod cuss;
mod lexer;
mod memory;
mod operation;
mod parser;
mod source;
mod symbol_table;
mod target;
