//! The state-machine parser: turns classified [`LexedLine`]s into
//! [`Card`]s, tracking the two one-instruction latches (`EXTEND`,
//! `STADR`), page order, and the interpretive operand stack across the
//! stream.
//!
//! A small amount of cross-instruction state plus per-category
//! dispatch on the "opcode" is the same shape as a CPU's instruction
//! dispatch with a status register; here the "opcode" categories are
//! the five [`OperationType`] variants and the persistent state is the
//! two latches plus the operand stack instead of a status register.

use log::debug;

use crate::address_field::{self, AddressField, IndexNecessity, ParsedAddress};
use crate::card::{Card, InterpretiveRhs, OperationField};
use crate::cuss::{Cuss, CussSerial};
use crate::lexer::{LexedLine, LineVariant};
use crate::operation::{self, ExtendEffect, Necessity, OperandSpec, Operation};
use crate::target::Target;

/// Largest magnitude an address field or numeric literal may take.
/// Invented for internal consistency; see DESIGN.md.
pub const MAX_ADDRESS_VALUE: i64 = 0o777_777;

/// A slot on the interpretive operand stack: the operand spec a
/// pending operator pushed, plus the index of the card (in the
/// eventual assembled-card list) that pushed it — spec.md §9's
/// "relationship, not ownership" back-reference.
#[derive(Debug, Copy, Clone)]
struct StackSlot {
    operator_card_index: usize,
    spec: OperandSpec,
}

#[derive(Debug)]
pub struct Parser {
    target: Target,
    extend_latch: bool,
    stadr_latch: bool,
    operand_stack: Vec<StackSlot>,
    last_page: u32,
    /// Set when a pagination gap was seen but there was no card yet to
    /// attach the cuss to; consumed by the next instruction card.
    pending_page_cuss: Option<Cuss>,
    /// Index this card will occupy once the driver appends it to the
    /// assembled-card list (every card but `Insertion` is appended;
    /// see `assembler::pass1`).
    next_card_index: usize,
}

impl Parser {
    pub fn new(target: Target) -> Self {
        Parser {
            target,
            extend_latch: false,
            stadr_latch: false,
            operand_stack: Vec::new(),
            last_page: 0,
            pending_page_cuss: None,
            next_card_index: 0,
        }
    }

    /// Parses one lexed line into a card, or `None` for lines that
    /// carry no card (pagination lines update parser state but never
    /// themselves become a card).
    pub fn parse(&mut self, line: &LexedLine) -> Option<Card> {
        let card = match line.variant {
            LineVariant::Pagination => {
                self.note_page(line.source.page);
                return None;
            }
            LineVariant::Insertion => Card::Insertion {
                source: line.source.clone(),
                file_name: line.field1.clone().unwrap_or_default(),
            },
            LineVariant::Remark => Card::Remark {
                source: line.source.clone(),
                text: line.remark.clone().unwrap_or_default(),
            },
            LineVariant::Instruction => self.parse_instruction(line),
        };

        // Insertion cards are consumed by the driver's recursion and
        // never occupy a slot in the assembled-card list.
        if !matches!(card, Card::Insertion { .. }) {
            self.next_card_index += 1;
        }
        Some(card)
    }

    fn note_page(&mut self, page: u32) {
        if self.last_page != 0 && page != self.last_page + 1 {
            self.pending_page_cuss = Some(
                Cuss::new(CussSerial::PAGE_OUT_OF_ORDER)
                    .with_context(format!("expected page {} but got {page}", self.last_page + 1)),
            );
        }
        self.last_page = page;
    }

    fn parse_instruction(&mut self, line: &LexedLine) -> Card {
        let mut cusses: Vec<Cuss> = self.pending_page_cuss.take().into_iter().collect();

        let mnemonic_field = line.field2.as_deref().unwrap_or("");
        let complemented = mnemonic_field.starts_with('-');
        let indexed = mnemonic_field.ends_with('*');
        let mnemonic = mnemonic_field.trim_start_matches('-').trim_end_matches('*');

        if mnemonic.is_empty() {
            return self.implicit_operand_card(line, cusses);
        }

        let Some(mut operation) = operation::lookup(mnemonic, &self.target) else {
            debug!("{}:{}: {mnemonic} not found for {:?}", line.source.source, line.source.line_number, self.target.block);
            cusses.push(Cuss::new(CussSerial::UNKNOWN_MNEMONIC).with_context(mnemonic));
            return self.validated(line, Card::Invalid { source: line.source.clone(), cusses });
        };

        operation = operation::check_extended_index(operation, self.extend_latch);
        operation = operation::check_indexed_store(operation, indexed);

        if complemented && operation.complement_necessity == Necessity::Forbidden {
            cusses.push(Cuss::new(CussSerial::SPURIOUS_COMPLEMENT).with_context(mnemonic));
        }
        let star_is_legal = operation.is_store() || operation.mnemonic == "INDEX" || operation.mnemonic == "BBCON";
        if indexed && !star_is_legal {
            cusses.push(Cuss::new(CussSerial::SPURIOUS_INDEX).with_context(mnemonic));
        }

        let stadr_was_active = self.stadr_latch;
        self.apply_extend_latch(operation, &mut cusses, mnemonic);
        self.apply_stadr_latch(operation, &mut cusses, mnemonic);

        // A store preceded by STADR rounds its destination (spec.md
        // §4.2's "implicit complement"); fold that into the field here
        // rather than threading the latch's prior state downstream.
        let complemented = complemented || (stadr_was_active && operation.is_store());
        let operation_field = OperationField { operation, complemented, indexed };

        let card = match operation.operation_type {
            operation::OperationType::Basic => self.basic_card(line, operation_field, cusses),
            operation::OperationType::Clerical => self.clerical_card(line, operation_field, cusses),
            operation::OperationType::Interpretive => self.interpretive_card(line, operation_field, cusses),
            operation::OperationType::Numeric => self.numeric_card(line, operation_field, cusses),
            operation::OperationType::Address => self.address_card(line, operation_field, cusses),
        };
        self.validated(line, card)
    }

    /// Validates the LOCATION field shared by every dispatch arm
    /// (spec.md §4.4's closing paragraph), appending any cuss to
    /// whichever card variant carries one.
    fn validated(&self, line: &LexedLine, card: Card) -> Card {
        let Some(location) = line.field1.as_deref().filter(|s| !s.is_empty()) else {
            return card;
        };

        let mut extra = Vec::new();
        if location.len() > 8 {
            extra.push(Cuss::new(CussSerial::LOCATION_TOO_LONG).with_context(location));
        }
        if location.chars().all(|c| c.is_ascii_digit()) {
            extra.push(Cuss::new(CussSerial::NUMERIC_LOCATION).with_context(location));
        }
        if location.chars().all(char::is_whitespace) {
            extra.push(Cuss::new(CussSerial::BLANK_LOCATION).with_context(location));
        }
        if extra.is_empty() {
            return card;
        }
        with_extra_cusses(card, extra)
    }

    fn apply_extend_latch(&mut self, operation: &'static Operation, cusses: &mut Vec<Cuss>, mnemonic: &str) {
        match operation.extend_effect {
            ExtendEffect::Sets => self.extend_latch = true,
            ExtendEffect::RequiresAndClears => {
                if !self.extend_latch {
                    cusses.push(Cuss::new(CussSerial::MISSING_EXTEND).with_context(mnemonic));
                }
                self.extend_latch = false;
            }
            ExtendEffect::RequiresAndPreserves => {
                if !self.extend_latch {
                    cusses.push(Cuss::new(CussSerial::MISSING_EXTEND).with_context(mnemonic));
                }
            }
            ExtendEffect::None if self.extend_latch && matches!(mnemonic, "EBANK=" | "SBANK=") => {
                // spec.md §4.4: tolerated between EXTEND and its target,
                // with a warning, and the latch survives.
                cusses.push(
                    Cuss::new(CussSerial::SPURIOUS_EXTEND)
                        .with_context(format!("{mnemonic} between EXTEND and its target")),
                );
            }
            ExtendEffect::None => {
                if self.extend_latch {
                    cusses.push(Cuss::new(CussSerial::SPURIOUS_EXTEND).with_context(mnemonic));
                }
                self.extend_latch = false;
            }
        }
    }

    fn apply_stadr_latch(&mut self, operation: &'static Operation, cusses: &mut Vec<Cuss>, mnemonic: &str) {
        if self.stadr_latch {
            if !operation.is_store() {
                cusses.push(Cuss::new(CussSerial::STADR_NOT_FOLLOWED_BY_STORE).with_context(mnemonic));
            }
            self.stadr_latch = false;
        }
        if operation.mnemonic == "STADR" {
            self.stadr_latch = true;
        }
    }

    fn basic_card(&mut self, line: &LexedLine, operation: OperationField, mut cusses: Vec<Cuss>) -> Card {
        self.discard_operand_stack_slot(&mut cusses);

        let index_necessity = index_necessity_for(&operation);
        let operand = line.field3.as_deref().unwrap_or("");
        let address = self.parse_one_address(operand, index_necessity, false, &mut cusses);

        Card::BasicInstruction {
            source: line.source.clone(),
            location: line.field1.clone().filter(|s| !s.is_empty()),
            operation,
            address,
            cusses,
        }
    }

    fn clerical_card(&mut self, line: &LexedLine, operation: OperationField, mut cusses: Vec<Cuss>) -> Card {
        self.discard_operand_stack_slot(&mut cusses);

        let operand = line.field3.as_deref().unwrap_or("");
        let range_allowed = matches!(operation.operation.mnemonic, "ERASE" | "MEMORY");

        let address = if operation.operation.address_necessity == Necessity::Forbidden {
            None
        } else {
            Some(self.parse_one_address(operand, IndexNecessity::Never, range_allowed, &mut cusses))
        };

        if operation.operation.address_necessity == Necessity::Required
            && operand.trim().is_empty()
        {
            cusses.push(Cuss::new(CussSerial::MISSING_OPERAND).with_context(operation.operation.mnemonic));
        }

        Card::Clerical {
            source: line.source.clone(),
            location: line.field1.clone().filter(|s| !s.is_empty()),
            operation,
            address,
            cusses,
        }
    }

    /// Pops exactly one pending slot and discards it ("push-up") when a
    /// non-interpretive card interrupts an unfinished interpretive
    /// sequence, per spec.md §4.4.
    fn discard_operand_stack_slot(&mut self, cusses: &mut Vec<Cuss>) {
        if let Some(slot) = self.operand_stack.pop() {
            if !slot.spec.push_down {
                cusses.push(Cuss::new(CussSerial::OPERAND_STACK_NOT_PUSH_DOWN));
            }
            if !slot.spec.indexable {
                cusses.push(Cuss::new(CussSerial::OPERAND_STACK_INDEXED));
            }
        }
    }

    fn interpretive_card(&mut self, line: &LexedLine, operation: OperationField, mut cusses: Vec<Cuss>) -> Card {
        let op = operation.operation;

        if op.is_store() {
            return self.store_card(line, operation, cusses);
        }

        let field3 = line.field3.as_deref().filter(|s| !s.trim().is_empty());
        let lhs_is_immediate = !op.operand1.is_some_and(|spec| spec.push_down);

        if lhs_is_immediate {
            // e.g. GOTO, BPL, DMP: the operand is an address, inline on
            // this same card, not a deferred stack push.
            let address = self.parse_one_address(field3.unwrap_or(""), IndexNecessity::Optional, false, &mut cusses);
            return Card::InterpretiveInstruction {
                source: line.source.clone(),
                location: line.field1.clone().filter(|s| !s.is_empty()),
                lhs: operation,
                rhs: InterpretiveRhs::Address(address),
                cusses,
            };
        }

        // Push-down operator: field3, if present, must name a second
        // (RHS) interpretive operator on the same card (spec.md §4.4).
        let rhs = match field3 {
            None => InterpretiveRhs::None,
            Some(token) => match operation::lookup(token, &self.target) {
                Some(rhs_op) if rhs_op.operation_type == operation::OperationType::Interpretive => {
                    InterpretiveRhs::Operation(OperationField {
                        operation: rhs_op,
                        complemented: false,
                        indexed: false,
                    })
                }
                _ => {
                    cusses.push(Cuss::new(CussSerial::SPURIOUS_OPERAND).with_context(token));
                    InterpretiveRhs::None
                }
            },
        };

        // Push RHS's slots first so LHS's pop first (spec.md §4.4 scenario 3).
        if let InterpretiveRhs::Operation(rhs_op) = &rhs {
            self.push_operand_specs(rhs_op.operation);
        }
        self.push_operand_specs(op);

        Card::InterpretiveInstruction {
            source: line.source.clone(),
            location: line.field1.clone().filter(|s| !s.is_empty()),
            lhs: operation,
            rhs,
            cusses,
        }
    }

    fn push_operand_specs(&mut self, operation: &'static Operation) {
        let card_index = self.next_card_index;
        if let Some(operand2) = operation.operand2 {
            self.operand_stack.push(StackSlot { operator_card_index: card_index, spec: operand2 });
        }
        if let Some(operand1) = operation.operand1 {
            self.operand_stack.push(StackSlot { operator_card_index: card_index, spec: operand1 });
        }
    }

    fn store_card(&mut self, line: &LexedLine, operation: OperationField, mut cusses: Vec<Cuss>) -> Card {
        let index_necessity = index_necessity_for(&operation);
        let operand = line.field3.as_deref().unwrap_or("");
        let address = self.parse_one_address(operand, index_necessity, false, &mut cusses);

        if matches!(&address, ParsedAddress::Field(f) if f.value == address_field::AddressValue::Omitted) {
            cusses.push(Cuss::new(CussSerial::MISSING_STORE_OPERAND).with_context(operation.operation.mnemonic));
        }

        Card::InterpretiveInstruction {
            source: line.source.clone(),
            location: line.field1.clone().filter(|s| !s.is_empty()),
            lhs: operation,
            rhs: InterpretiveRhs::Address(address),
            cusses,
        }
    }

    fn numeric_card(&mut self, line: &LexedLine, operation: OperationField, mut cusses: Vec<Cuss>) -> Card {
        self.discard_operand_stack_slot(&mut cusses);

        let operand = line.field3.as_deref().unwrap_or("");
        let tokens: Vec<&str> = operand.split_whitespace().collect();
        let (high_word, low_word) = if operation.operation.words >= 2 && tokens.len() >= 2 {
            (Some(tokens[0].to_string()), tokens[1].to_string())
        } else {
            (None, tokens.first().copied().unwrap_or("").to_string())
        };

        if low_word.is_empty() {
            cusses.push(Cuss::new(CussSerial::MISSING_OPERAND).with_context(operation.operation.mnemonic));
        }

        Card::NumericConstant {
            source: line.source.clone(),
            location: line.field1.clone().filter(|s| !s.is_empty()),
            operation,
            high_word,
            low_word,
            cusses,
        }
    }

    fn address_card(&mut self, line: &LexedLine, operation: OperationField, mut cusses: Vec<Cuss>) -> Card {
        let op = operation.operation;

        // BBCON* is a checksum sentinel with no address field at all.
        if op.mnemonic == "BBCON" && operation.indexed {
            return Card::AddressConstant {
                source: line.source.clone(),
                location: line.field1.clone().filter(|s| !s.is_empty()),
                operation,
                address: ParsedAddress::Field(AddressField::omitted()),
                interpretive: None,
                cusses,
            };
        }

        let pops_stack = op.mnemonic == "P";
        let popped = if pops_stack { self.operand_stack.pop() } else { None };
        if pops_stack && popped.is_none() {
            cusses.push(Cuss::new(CussSerial::MISSING_STORE_OPERAND).with_context(op.mnemonic));
        }

        let index_necessity = match popped {
            Some(slot) if slot.spec.indexable => IndexNecessity::Optional,
            Some(_) => IndexNecessity::Never,
            None if op.has_indexed_form => IndexNecessity::Optional,
            None => IndexNecessity::Never,
        };

        let operand = line.field3.as_deref().unwrap_or("");
        let address = if op.address_necessity == Necessity::Forbidden {
            ParsedAddress::Field(AddressField::omitted())
        } else {
            self.parse_one_address(operand, index_necessity, false, &mut cusses)
        };

        Card::AddressConstant {
            source: line.source.clone(),
            location: line.field1.clone().filter(|s| !s.is_empty()),
            operation,
            address,
            interpretive: popped.map(|slot| slot.operator_card_index),
            cusses,
        }
    }

    /// A line with no operator mnemonic at all: a bare continuation of
    /// an interpretive sequence (spec.md §4.4's implicit IAW form), or
    /// nothing useful to say about if the operand stack is empty.
    fn implicit_operand_card(&mut self, line: &LexedLine, mut cusses: Vec<Cuss>) -> Card {
        let Some(operand) = line.field3.as_deref().filter(|s| !s.trim().is_empty()) else {
            cusses.push(Cuss::new(CussSerial::UNKNOWN_MNEMONIC).with_context("(blank operator field)"));
            return self.validated(line, Card::Invalid { source: line.source.clone(), cusses });
        };

        let Some(slot) = self.operand_stack.pop() else {
            cusses.push(Cuss::new(CussSerial::SPURIOUS_OPERAND).with_context(operand));
            return self.validated(line, Card::Invalid { source: line.source.clone(), cusses });
        };

        let index_necessity = if slot.spec.indexable { IndexNecessity::Optional } else { IndexNecessity::Never };
        let address = self.parse_one_address(operand, index_necessity, false, &mut cusses);

        static IMPLICIT_OPERAND: Operation = operation_for_implicit_operand();
        let operation = OperationField { operation: &IMPLICIT_OPERAND, complemented: false, indexed: false };

        let card = Card::AddressConstant {
            source: line.source.clone(),
            location: line.field1.clone().filter(|s| !s.is_empty()),
            operation,
            address,
            interpretive: Some(slot.operator_card_index),
            cusses,
        };
        self.validated(line, card)
    }

    fn parse_one_address(
        &self,
        operand: &str,
        index_necessity: IndexNecessity,
        range_allowed: bool,
        cusses: &mut Vec<Cuss>,
    ) -> ParsedAddress {
        match address_field::parse_address_field(operand, index_necessity, range_allowed, MAX_ADDRESS_VALUE, &self.target) {
            Ok(result) => {
                cusses.extend(result.cusses);
                result.address
            }
            Err(cuss) => {
                cusses.push(cuss);
                ParsedAddress::Field(AddressField::omitted())
            }
        }
    }
}

/// A synthetic catalog entry for implicit interpretive-operand
/// continuation lines (spec.md §4.4): they carry no mnemonic of their
/// own, just an address word popped off the stack.
const fn operation_for_implicit_operand() -> Operation {
    Operation {
        mnemonic: "(IAW)",
        operation_type: operation::OperationType::Address,
        words: 1,
        location_necessity: Necessity::Optional,
        address_necessity: Necessity::Required,
        complement_necessity: Necessity::Forbidden,
        index_necessity: Necessity::Optional,
        extend_effect: ExtendEffect::None,
        has_indexed_form: true,
        operand1: None,
        operand2: None,
        store_sub_type: None,
        order_code: 0,
    }
}

fn index_necessity_for(operation: &OperationField) -> IndexNecessity {
    match operation.operation.index_necessity {
        Necessity::Required => IndexNecessity::Required,
        Necessity::Optional => IndexNecessity::Optional,
        Necessity::Forbidden => IndexNecessity::Never,
    }
}

/// Appends extra cusses to whichever variant of `card` carries a
/// `cusses` vector (every variant but `Insertion`/`Remark`, which don't
/// take a LOCATION field in the first place).
fn with_extra_cusses(card: Card, extra: Vec<Cuss>) -> Card {
    match card {
        Card::Clerical { source, location, operation, address, mut cusses } => {
            cusses.extend(extra);
            Card::Clerical { source, location, operation, address, cusses }
        }
        Card::BasicInstruction { source, location, operation, address, mut cusses } => {
            cusses.extend(extra);
            Card::BasicInstruction { source, location, operation, address, cusses }
        }
        Card::InterpretiveInstruction { source, location, lhs, rhs, mut cusses } => {
            cusses.extend(extra);
            Card::InterpretiveInstruction { source, location, lhs, rhs, cusses }
        }
        Card::NumericConstant { source, location, operation, high_word, low_word, mut cusses } => {
            cusses.extend(extra);
            Card::NumericConstant { source, location, operation, high_word, low_word, cusses }
        }
        Card::AddressConstant { source, location, operation, address, interpretive, mut cusses } => {
            cusses.extend(extra);
            Card::AddressConstant { source, location, operation, address, interpretive, cusses }
        }
        Card::Invalid { source, mut cusses } => {
            cusses.extend(extra);
            Card::Invalid { source, cusses }
        }
        other @ (Card::Insertion { .. } | Card::Remark { .. }) => other,
    }
}
