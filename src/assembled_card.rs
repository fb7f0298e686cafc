//! The final per-card output of Pass 2: a card's source, the cells it
//! claimed, and every cuss raised against it across both passes.

use crate::cuss::Cuss;
use crate::source::SourceLine;

#[derive(Debug, Clone)]
pub struct AssembledCard {
    pub source: SourceLine,
    pub location: Option<String>,
    /// The true address of the first word this card emitted, if any
    /// (clerical directives with no operand word have none).
    pub first_address: Option<i64>,
    pub words: Vec<i64>,
    /// The erasable bank (`EBANK=`) in force when this card was placed.
    pub e_bank: Option<i64>,
    /// The super bank (`SBANK=`) in force when this card was placed.
    pub s_bank: Option<i64>,
    pub cusses: Vec<Cuss>,
}

impl AssembledCard {
    pub fn is_fatal(&self) -> bool {
        self.cusses.iter().any(Cuss::is_fatal)
    }
}
