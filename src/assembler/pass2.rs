//! Pass 2: walks Pass 1's placed cards in source order, resolves every
//! symbol reference against the frozen symbol table, and composes each
//! card's final word(s) — order code, operand address, odd parity.

use log::trace;

use crate::address_field::{AddressValue, ParsedAddress};
use crate::assembled_card::AssembledCard;
use crate::card::{Card, InterpretiveRhs, OperationField};
use crate::cell::CellGrid;
use crate::cuss::{Cuss, CussSerial};
use crate::memory::{self, MemoryKind};
use crate::symbol_table::Pass2Table;
use crate::target::Target;

use super::pass1::{Pass1Output, PlacedCard};

/// Pass 2's complete output: the assembled cards (for the listing), the
/// frozen symbol table (for cross-reference), the cell grid now holding
/// every composed word (for the octal listing / memory summary), and
/// every cuss raised across both passes (spec.md §6's four external
/// outputs).
pub struct Pass2Output {
    pub cards: Vec<AssembledCard>,
    pub symbols: Pass2Table,
    pub cells: CellGrid,
    pub cusses: Vec<Cuss>,
}

const ADDRESS_MASK: i64 = 0xFFF;
const ORDER_CODE_SHIFT: u32 = 12;
const PARITY_BIT: i64 = 0x8000;
const WORD_MASK: i64 = 0x7FFF;

/// A resolved true address that still remembers how much of its value
/// came from a literal offset on the address field itself, rather than
/// from the symbol it named — so a symbolic base and a plain number
/// that happen to land on the same cell are never conflated upstream
/// of word composition (spec.md §9's numeric-vs-symbolic open
/// question, resolved in DESIGN.md by keeping the two separate all the
/// way to the point a word is actually built).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct TrueAddress {
    address: i64,
    offset: i64,
}

impl TrueAddress {
    fn plain(address: i64) -> Self {
        TrueAddress { address, offset: 0 }
    }
}

pub struct Pass2Assembler {
    target: Target,
}

impl Pass2Assembler {
    pub fn new(target: Target) -> Self {
        Pass2Assembler { target }
    }

    pub fn run(&self, pass1: Pass1Output) -> Pass2Output {
        let (symbols, mut cusses) = pass1.symbols.resolve_all();
        let mut cells = pass1.cells;

        let cards = pass1
            .cards
            .iter()
            .filter_map(|placed| self.assemble_card(placed, &symbols))
            .inspect(|card| write_words_into_cells(card, &mut cells, &mut cusses))
            .collect();

        Pass2Output { cards, symbols, cells, cusses }
    }

    fn assemble_card(&self, placed: &PlacedCard, symbols: &Pass2Table) -> Option<AssembledCard> {
        let mut cusses = placed.card.cusses().to_vec();

        let here = placed.address;
        trace!("composing card at {here:?}: {:?}", placed.card.location());
        let words = match &placed.card {
            Card::Insertion { .. } | Card::Remark { .. } => return None,
            Card::Invalid { .. } | Card::Clerical { .. } => Vec::new(),
            Card::BasicInstruction { operation, address, .. } => {
                vec![self.basic_word(operation, address, here, symbols, &mut cusses)]
            }
            Card::InterpretiveInstruction { lhs, rhs, .. } => self.interpretive_words(lhs, rhs, here, symbols, &mut cusses),
            Card::NumericConstant { operation, high_word, low_word, .. } => {
                self.numeric_words(operation, high_word.as_deref(), low_word, &mut cusses)
            }
            Card::AddressConstant { operation, address, .. } => {
                self.address_words(operation, address, here, symbols, &mut cusses)
            }
        };

        Some(AssembledCard {
            source: placed.card.source().clone(),
            location: placed.card.location().map(str::to_string),
            first_address: placed.address,
            words: words.into_iter().map(apply_parity).collect(),
            e_bank: placed.e_bank,
            s_bank: placed.s_bank,
            cusses,
        })
    }

    fn basic_word(
        &self,
        operation: &OperationField,
        address: &ParsedAddress,
        here: Option<i64>,
        symbols: &Pass2Table,
        cusses: &mut Vec<Cuss>,
    ) -> i64 {
        let resolved = self.resolve(address, here, symbols, cusses);
        self.check_addressable(&resolved, cusses);
        let word = compose_address_word(operation.operation.order_code, resolved.address, operation.complemented);
        apply_word_offset(word, resolved.offset)
    }

    fn interpretive_words(
        &self,
        lhs: &OperationField,
        rhs: &InterpretiveRhs,
        here: Option<i64>,
        symbols: &Pass2Table,
        cusses: &mut Vec<Cuss>,
    ) -> Vec<i64> {
        match rhs {
            InterpretiveRhs::None => vec![compose_address_word(lhs.operation.order_code, 0, lhs.complemented)],
            InterpretiveRhs::Address(address) => {
                let resolved = self.resolve(address, here, symbols, cusses);
                self.check_addressable(&resolved, cusses);
                let word = compose_address_word(lhs.operation.order_code, resolved.address, lhs.complemented);
                vec![apply_word_offset(word, resolved.offset)]
            }
            InterpretiveRhs::Operation(rhs_op) => {
                // Both operators share this one card's word (spec.md
                // §4.4's same-card LHS+RHS combo): the LHS's code
                // occupies the high bits, the RHS's the low bits,
                // matching the shape every other word here uses
                // (order code above, operand-ish value below).
                let high = (lhs.operation.order_code as i64) << ORDER_CODE_SHIFT;
                let low = rhs_op.operation.order_code as i64 & ADDRESS_MASK;
                vec![high | low]
            }
        }
    }

    fn numeric_words(&self, operation: &OperationField, high_word: Option<&str>, low_word: &str, cusses: &mut Vec<Cuss>) -> Vec<i64> {
        let mut words = Vec::new();
        if let Some(high) = high_word {
            words.push(self.parse_literal(operation, high, cusses));
        }
        words.push(self.parse_literal(operation, low_word, cusses));
        words
    }

    /// `OCT` literals are octal, `DEC`/`2DEC` are decimal; negative
    /// values are stored one's-complemented, matching the hardware's
    /// own arithmetic (the one historically-grounded encoding choice
    /// in this module — everything else here is this crate's own
    /// invention, see DESIGN.md).
    fn parse_literal(&self, operation: &OperationField, token: &str, cusses: &mut Vec<Cuss>) -> i64 {
        let negative = token.starts_with('-');
        let unsigned = token.trim_start_matches(['+', '-']);
        let digits = unsigned.strip_suffix('D').unwrap_or(unsigned);
        let radix = if operation.operation.mnemonic == "OCT" { 8 } else { 10 };

        let magnitude = match i64::from_str_radix(digits, radix) {
            Ok(value) => value,
            Err(_) => {
                cusses.push(Cuss::new(CussSerial::BAD_ADDRESS_FIELD).with_context(token));
                0
            }
        };

        if negative {
            !magnitude & WORD_MASK
        } else {
            magnitude & WORD_MASK
        }
    }

    fn address_words(
        &self,
        operation: &OperationField,
        address: &ParsedAddress,
        here: Option<i64>,
        symbols: &Pass2Table,
        cusses: &mut Vec<Cuss>,
    ) -> Vec<i64> {
        let resolved = self.resolve(address, here, symbols, cusses);
        self.check_addressable(&resolved, cusses);

        if operation.operation.words >= 2 {
            // `2CADR`'s two words split bank and in-bank offset, the
            // same split `memory.rs` already defines for true
            // addresses (this crate's own invented layout; see
            // DESIGN.md). The numeric/symbolic offset distinction only
            // has a "whole word" to apply to for single-word address
            // constants, so a two-word constant folds its offset into
            // the address before the bank/offset split instead.
            let address = resolved.address + resolved.offset;
            let bank = memory::fixed_bank_number(address).unwrap_or(0);
            let offset = memory::memory_offset(address);
            vec![bank & WORD_MASK, offset & WORD_MASK]
        } else {
            vec![apply_word_offset(resolved.address & WORD_MASK, resolved.offset)]
        }
    }

    /// Resolves an address field to a true address against the symbol
    /// table and, where the field means "relative to here" (an absent
    /// operand, or a standalone signed literal), the card's own
    /// location counter `here`.
    ///
    /// Implements spec.md §4.6's four rules, including the numeric-vs-
    /// symbolic offset distinction from §9: a literal's own `offset`
    /// addend is returned separately (to be applied to the whole
    /// composed word by the caller) rather than folded into `address`,
    /// while a symbol's offset is folded into `address` and the
    /// returned offset is zero.
    fn resolve(&self, address: &ParsedAddress, here: Option<i64>, symbols: &Pass2Table, cusses: &mut Vec<Cuss>) -> TrueAddress {
        let field = match address {
            ParsedAddress::Range(low, _) => return TrueAddress::plain(*low),
            ParsedAddress::Field(field) => field,
        };

        match &field.value {
            AddressValue::Omitted => match here {
                Some(loc) => TrueAddress::plain(loc),
                None => {
                    cusses.push(Cuss::new(CussSerial::NO_LOCATION_COUNTER));
                    TrueAddress::plain(0)
                }
            },
            AddressValue::Signed(n) => match here {
                Some(loc) => TrueAddress { address: loc + n, offset: field.offset.unwrap_or(0) },
                None => {
                    cusses.push(Cuss::new(CussSerial::NO_LOCATION_COUNTER));
                    TrueAddress { address: *n, offset: field.offset.unwrap_or(0) }
                }
            },
            AddressValue::Unsigned(n) => TrueAddress { address: *n, offset: field.offset.unwrap_or(0) },
            AddressValue::Symbol(name) => {
                let base = match symbols.address_of(name) {
                    Ok(address) => address,
                    Err(cuss) => {
                        trace!("{name} did not resolve: {cuss:?}");
                        cusses.push(cuss);
                        0
                    }
                };
                TrueAddress { address: base + field.offset.unwrap_or(0), offset: 0 }
            }
        }
    }

    fn check_addressable(&self, address: &TrueAddress, cusses: &mut Vec<Cuss>) {
        if memory::classify(address.address) == MemoryKind::Nonexistent {
            cusses.push(
                Cuss::new(CussSerial::NUMERIC_OVERFLOW)
                    .with_context(format!("{:o} addresses no memory", address.address)),
            );
        }
    }
}

/// Writes a card's composed words into the cell grid at the addresses
/// Pass 1 already claimed for it (spec.md §4.8 step 4: "store the word
/// with parity in the Cell at the card's refAddress"). A card with no
/// `first_address` (a clerical directive, or one that never got a
/// location counter) has nothing to write.
fn write_words_into_cells(card: &AssembledCard, cells: &mut CellGrid, cusses: &mut Vec<Cuss>) {
    let Some(base) = card.first_address else { return };
    for (offset, word) in card.words.iter().enumerate() {
        if !cells.set_value(base + offset as i64, *word) {
            cusses.push(
                Cuss::new(CussSerial::BANK_EXHAUSTED)
                    .with_context(format!("{:o} ran past addressable memory", base + offset as i64)),
            );
        }
    }
}

fn compose_address_word(order_code: u16, address: i64, complemented: bool) -> i64 {
    let bits = (if complemented { !address } else { address }) & ADDRESS_MASK;
    (((order_code as i64) << ORDER_CODE_SHIFT) | bits) & WORD_MASK
}

/// Applies a literal's own offset addend to the *whole* composed word
/// (spec.md §9): unlike a symbol's offset, which is folded into the
/// address bits before the opcode is OR'd in, a numeric literal's
/// offset is added after composition and can carry into the opcode
/// bits. A zero offset (the symbolic case, always) is a no-op.
fn apply_word_offset(word: i64, offset: i64) -> i64 {
    if offset == 0 {
        word
    } else {
        (word + offset) & WORD_MASK
    }
}

fn apply_parity(word: i64) -> i64 {
    let payload = word & WORD_MASK;
    if payload.count_ones() % 2 == 0 {
        payload | PARITY_BIT
    } else {
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::pass1::Pass1Assembler;
    use crate::source::MapSourceReader;

    fn card_line(field1: &str, field2: &str, field3: &str) -> String {
        let mut s = String::new();
        s.push_str(field1);
        while s.len() < 15 {
            s.push(' ');
        }
        s.push_str(field2);
        while s.len() < 25 {
            s.push(' ');
        }
        s.push_str(field3);
        s
    }

    fn assemble(text: &str) -> (Vec<AssembledCard>, Vec<Cuss>) {
        let reader = MapSourceReader::new().with_file("MAIN.agc", text.to_string());
        let target = Target::block2_gap();
        let pass1 = Pass1Assembler::new(&reader, target).run("MAIN.agc");
        let output = Pass2Assembler::new(target).run(pass1);
        (output.cards, output.cusses)
    }

    #[test]
    fn composed_words_land_in_the_cell_grid_too() {
        let reader = MapSourceReader::new()
            .with_file("MAIN.agc", format!("{}\n", card_line("FOO", "DEC", "5")));
        let pass1 = Pass1Assembler::new(&reader, Target::block2_gap()).run("MAIN.agc");
        let output = Pass2Assembler::new(Target::block2_gap()).run(pass1);
        let card = &output.cards[0];
        let address = card.first_address.unwrap();
        assert_eq!(output.cells.get(address).unwrap().value, Some(card.words[0]));
        assert_eq!(output.symbols.address_of("FOO").unwrap(), address);
    }

    #[test]
    fn encoded_word_has_odd_parity() {
        let (cards, _) = assemble(&format!("{}\n{}\n", card_line("FOO", "CA", "BAR"), card_line("BAR", "DEC", "0")));
        for card in &cards {
            for word in &card.words {
                assert_eq!(word.count_ones() % 2, 1, "word {word:o} is not odd parity");
            }
        }
    }

    #[test]
    fn basic_instruction_resolves_its_symbol() {
        let (cards, cusses) = assemble(&format!("{}\n{}\n", card_line("FOO", "CA", "BAR"), card_line("BAR", "DEC", "0")));
        assert!(cusses.is_empty());
        let ca_word = cards[0].words[0] & WORD_MASK;
        assert_eq!(ca_word & ADDRESS_MASK, 1);
    }

    #[test]
    fn unresolved_symbol_is_a_cuss_on_the_card() {
        let (cards, _) = assemble(&card_line("FOO", "CA", "MISSING"));
        assert!(cards[0].cusses.iter().any(|c| c.serial == CussSerial::UNRESOLVED_PASS2));
    }

    #[test]
    fn literal_offset_is_not_folded_into_a_symbols_own_value() {
        let (cards, cusses) =
            assemble(&format!("{}\n{}\n", card_line("BASE", "CA", "BASE"), card_line("", "CA", "BASE +2")));
        assert!(cusses.iter().all(|c| !c.is_fatal()));
        let first = cards[0].words[0] & ADDRESS_MASK;
        let second = cards[1].words[0] & ADDRESS_MASK;
        assert_eq!(second, first + 2);
    }

    #[test]
    fn e_bank_and_s_bank_are_recorded_from_the_clerical_directives_in_force() {
        let text = format!(
            "{}\n{}\n{}\n",
            card_line("", "EBANK=", "3"),
            card_line("", "SBANK=", "1"),
            card_line("FOO", "CA", "FOO"),
        );
        let (cards, _) = assemble(&text);
        let instruction = cards.iter().find(|c| c.location.as_deref() == Some("FOO")).unwrap();
        assert_eq!(instruction.e_bank, Some(3));
        assert_eq!(instruction.s_bank, Some(1));
    }

    #[test]
    fn double_precision_decimal_splits_into_two_words() {
        let (cards, cusses) = assemble(&card_line("PI", "2DEC", "3 14159D"));
        assert!(cusses.is_empty());
        assert_eq!(cards[0].words.len(), 2);
    }

    #[test]
    fn octal_literal_is_read_in_base_eight() {
        let (cards, _) = assemble(&card_line("X", "OCT", "17"));
        assert_eq!(cards[0].words[0] & ADDRESS_MASK, 0o17);
    }

    /// spec.md §9: "numeric + signed-numeric modifies the whole
    /// opcode-plus-address word". A literal near the top of the
    /// 12-bit address field plus its own offset carries into the
    /// opcode bits instead of wrapping within the address field.
    #[test]
    fn numeric_literal_offset_carries_into_the_opcode_bits() {
        let (cards, cusses) = assemble(&card_line("", "TC", "4094D +4"));
        assert!(cusses.iter().all(|c| !c.is_fatal()));
        let word = cards[0].words[0] & WORD_MASK;
        // TC's own order code is 6; the whole-word carry bumps it to 7.
        assert_eq!(word, 0x7002);
    }

    /// spec.md §9: "symbol + signed-numeric modifies only the
    /// address" — the same arithmetic overflow, but via a symbol's
    /// value, wraps inside the address field and leaves the opcode
    /// bits exactly as the operation's own order code set them.
    #[test]
    fn symbolic_offset_wraps_within_the_address_field_only() {
        let text = format!(
            "{}\n{}\n{}\n",
            card_line("", "SETLOC", "4094D"),
            card_line("BASE", "CA", "BASE"),
            card_line("", "TC", "BASE +4"),
        );
        let (cards, cusses) = assemble(&text);
        assert!(cusses.iter().all(|c| !c.is_fatal()));
        let tc_word = cards[2].words[0] & WORD_MASK;
        // Order code 6 untouched; address bits wrap 4094+4 mod 4096 = 2.
        assert_eq!(tc_word, 0x6002);
    }
}
