//! Pass 1: walks the source (following `$`-insertions recursively),
//! assigns every symbol an address or a deferred expression, and
//! reserves cells in the grid as the location counter advances.

use std::io::BufRead;

use log::trace;

use crate::address_field::{AddressValue, ParsedAddress};
use crate::card::Card;
use crate::cell::{CellGrid, ClaimOutcome};
use crate::cuss::{Cuss, CussSerial};
use crate::lexer::Lexer;
use crate::memory;
use crate::parser::Parser;
use crate::source::{SourceLine, SourceReader};
use crate::symbol_table::Pass1Table;
use crate::target::Target;

/// Total addressable true-address space this crate's invented memory
/// map covers (see `memory.rs`): enough fixed-memory banks for a
/// representative program without claiming historical exactness.
pub const CELL_COUNT: usize = 0o10000;

/// How many `$`-insertions may nest before Pass 1 gives up and cusses
/// rather than recursing forever on a file that includes itself.
const MAX_INSERTION_DEPTH: u32 = 20;

/// One card plus the true address its first word (if any) was
/// assigned, as seen by the location counter at the moment Pass 1
/// processed it, plus the erasable/super bank in force at that point
/// (for the listing to report, even though this crate's listing
/// printers are out of scope).
#[derive(Debug, Clone)]
pub struct PlacedCard {
    pub card: Card,
    pub address: Option<i64>,
    pub e_bank: Option<i64>,
    pub s_bank: Option<i64>,
}

pub struct Pass1Output {
    pub cards: Vec<PlacedCard>,
    pub symbols: Pass1Table,
    pub cells: CellGrid,
    pub cusses: Vec<Cuss>,
}

pub struct Pass1Assembler<'a, R: SourceReader> {
    reader: &'a R,
    target: Target,
}

struct Context {
    lexer: Lexer,
    parser: Parser,
    table: Pass1Table,
    cells: CellGrid,
    cusses: Vec<Cuss>,
    cards: Vec<PlacedCard>,
    /// `None` when no location counter is currently in effect (bank
    /// exhaustion, or before the first `SETLOC`/`BANK`/`BLOCK`).
    location: Option<i64>,
    /// The fixed bank last named by `BANK`/`BLOCK`, reused when either
    /// directive appears again with no explicit bank number.
    current_bank: Option<i64>,
    current_e_bank: Option<i64>,
    current_s_bank: Option<i64>,
}

impl<'a, R: SourceReader> Pass1Assembler<'a, R> {
    pub fn new(reader: &'a R, target: Target) -> Self {
        Pass1Assembler { reader, target }
    }

    pub fn run(&self, main_file: &str) -> Pass1Output {
        let mut ctx = Context {
            lexer: Lexer::new(),
            parser: Parser::new(self.target),
            table: Pass1Table::new(),
            cells: CellGrid::new(CELL_COUNT),
            cusses: Vec::new(),
            cards: Vec::new(),
            location: Some(0),
            current_bank: None,
            current_e_bank: None,
            current_s_bank: None,
        };

        self.process_file(main_file, 0, &mut ctx);

        Pass1Output { cards: ctx.cards, symbols: ctx.table, cells: ctx.cells, cusses: ctx.cusses }
    }

    fn process_file(&self, path: &str, depth: u32, ctx: &mut Context) {
        trace!("entering {path} at insertion depth {depth}");
        if depth > MAX_INSERTION_DEPTH {
            ctx.cusses.push(Cuss::new(CussSerial::STRUCTURAL_IO).with_context(format!(
                "insertion nesting exceeded {MAX_INSERTION_DEPTH} levels at {path}"
            )));
            return;
        }

        let reader = match self.reader.open(path) {
            Ok(reader) => reader,
            Err(error) => {
                ctx.cusses.push(Cuss::io_failure(path, &error));
                return;
            }
        };

        for (index, line) in reader.lines().enumerate() {
            let line_number = index as u32 + 1;
            let text = match line {
                Ok(text) => text,
                Err(error) => {
                    ctx.cusses.push(Cuss::io_failure(path, &error));
                    continue;
                }
            };

            let Some(lexed) = ctx.lexer.lex(path, line_number, &text) else { continue };
            let Some(card) = ctx.parser.parse(&lexed) else { continue };

            if let Card::Insertion { file_name, .. } = &card {
                let file_name = file_name.clone();
                self.process_file(&file_name, depth + 1, ctx);
                continue;
            }

            self.ingest(card, ctx);
        }
    }

    fn ingest(&self, mut card: Card, ctx: &mut Context) {
        let address = match &card {
            Card::Clerical { .. } => {
                self.ingest_clerical(&mut card, ctx);
                None
            }
            Card::BasicInstruction { .. }
            | Card::InterpretiveInstruction { .. }
            | Card::NumericConstant { .. }
            | Card::AddressConstant { .. } => self.ingest_word_emitting(&mut card, ctx),
            Card::Insertion { .. } | Card::Remark { .. } | Card::Invalid { .. } => None,
        };

        ctx.cards.push(PlacedCard { card, address, e_bank: ctx.current_e_bank, s_bank: ctx.current_s_bank });
    }

    fn ingest_word_emitting(&self, card: &mut Card, ctx: &mut Context) -> Option<i64> {
        let words = card.word_count() as i64;
        let source = card.source().clone();
        let location = card.location().map(str::to_string);
        let start = ctx.location;

        match start {
            Some(loc) => {
                for offset in 0..words {
                    match ctx.cells.assign_definition(loc + offset, source.clone()) {
                        ClaimOutcome::Claimed => {}
                        ClaimOutcome::Conflict => {
                            card.push_cuss(Cuss::new(CussSerial::BANK_EXHAUSTED).with_context("cell already claimed"));
                        }
                        ClaimOutcome::OutOfRange => {
                            trace!("location counter ran past addressable memory at {:o}", loc + offset);
                            card.push_cuss(
                                Cuss::new(CussSerial::BANK_EXHAUSTED)
                                    .with_context("location counter ran past addressable memory"),
                            );
                            ctx.location = None;
                        }
                    }
                }
                if let Some(loc) = ctx.location {
                    ctx.location = Some(loc + words);
                }
            }
            None => card.push_cuss(Cuss::new(CussSerial::NO_LOCATION_COUNTER).with_context("no location counter in effect")),
        }

        if let Some(name) = location {
            self.assign_label(Some(name), start, card, ctx, &source);
        }

        start
    }

    fn ingest_clerical(&self, card: &mut Card, ctx: &mut Context) {
        let (mnemonic, address, location) = match &*card {
            Card::Clerical { operation, address, location, .. } => {
                (operation.operation.mnemonic, address.clone(), location.clone())
            }
            _ => unreachable!("ingest_clerical called on a non-Clerical card"),
        };
        let source = card.source().clone();

        match mnemonic {
            "SETLOC" => {
                match address.as_ref().and_then(field_value) {
                    Some(value) => ctx.location = Some(value),
                    None => card.push_cuss(Cuss::new(CussSerial::MISSING_OPERAND).with_context("SETLOC")),
                }
                self.assign_label(location, ctx.location, card, ctx, &source);
            }
            "BANK" | "BLOCK" => {
                let requested = address.as_ref().and_then(field_value);
                let bank_number = requested.or(ctx.current_bank);
                match bank_number {
                    Some(bank_number) => {
                        ctx.current_bank = Some(bank_number);
                        let range = memory::fixed_bank_range(bank_number);
                        match first_unassigned_cell(&ctx.cells, range.low, range.high) {
                            Some(addr) => ctx.location = Some(addr),
                            None => {
                                card.push_cuss(
                                    Cuss::new(CussSerial::BANK_EXHAUSTED)
                                        .with_context(format!("bank {bank_number:o} exhausted")),
                                );
                                ctx.location = None;
                            }
                        }
                    }
                    None => {
                        card.push_cuss(Cuss::new(CussSerial::BANK_EXHAUSTED).with_context("no bank number in effect"));
                        ctx.location = None;
                    }
                }
                self.assign_label(location, ctx.location, card, ctx, &source);
            }
            "ERASE" => self.ingest_erase(address, location, card, ctx, &source),
            "EQUALS" | "=MINUS" | "=PLUS" => {
                if let (Some(name), Some(ParsedAddress::Field(mut field))) = (location, address) {
                    if mnemonic == "=MINUS" {
                        match field.value {
                            AddressValue::Unsigned(n) => field.value = AddressValue::Signed(-n),
                            AddressValue::Signed(n) => field.value = AddressValue::Signed(-n),
                            _ => {}
                        }
                    }
                    let redefined = ctx.table.assign_field(&name, field, source.clone());
                    if redefined {
                        card.push_cuss(Cuss::new(CussSerial::MULTIPLY_DEFINED).with_context(name));
                    }
                }
            }
            "EBANK=" => {
                ctx.current_e_bank = address.as_ref().and_then(field_value).or(ctx.current_e_bank);
                self.assign_label(location, ctx.location, card, ctx, &source);
            }
            "SBANK=" => {
                ctx.current_s_bank = address.as_ref().and_then(field_value).or(ctx.current_s_bank);
                self.assign_label(location, ctx.location, card, ctx, &source);
            }
            // MEMORY declares the usable extent of a memory kind and
            // SUBRO/BNKSUM are bookkeeping markers; neither moves the
            // counter, so only the generic label-at-current-location
            // fallback applies (spec.md §4.7's "generic... fallback").
            _ => self.assign_label(location, ctx.location, card, ctx, &source),
        }
    }

    fn ingest_erase(
        &self,
        address: Option<ParsedAddress>,
        location: Option<String>,
        card: &mut Card,
        ctx: &mut Context,
        source: &SourceLine,
    ) {
        let (start, count) = match address {
            Some(ParsedAddress::Range(low, high)) => {
                if high < low {
                    card.push_cuss(Cuss::new(CussSerial::ERASE_RANGE_ORDER).with_context(format!("{low:o} - {high:o}")));
                }
                (low, (high - low + 1).max(0))
            }
            Some(ParsedAddress::Field(field)) => {
                let count = match field.value {
                    AddressValue::Unsigned(n) | AddressValue::Signed(n) => (n + field.offset.unwrap_or(0)).max(1),
                    _ => 1,
                };
                (ctx.location.unwrap_or(0), count)
            }
            None => (ctx.location.unwrap_or(0), 1),
        };

        if !memory::is_erasable(memory::classify(start)) {
            card.push_cuss(Cuss::new(CussSerial::NUMERIC_OVERFLOW).with_context("ERASE outside erasable memory"));
        }

        for offset in 0..count {
            match ctx.cells.assign_definition(start + offset, source.clone()) {
                ClaimOutcome::Claimed => {}
                ClaimOutcome::Conflict => {
                    card.push_cuss(Cuss::new(CussSerial::BANK_EXHAUSTED).with_context("ERASE cell already claimed"));
                }
                ClaimOutcome::OutOfRange => {
                    card.push_cuss(Cuss::new(CussSerial::BANK_EXHAUSTED).with_context("ERASE ran past addressable memory"));
                }
            }
        }
        ctx.location = Some(start + count);

        self.assign_label(location, Some(start), card, ctx, source);
    }

    /// The shared "if this card has a LOCATION field, give it `at` as
    /// its address (or `ERROR_WORD` if `at` is `None`), flagging a
    /// redefinition on the card itself" step every clerical arm and
    /// every word-emitting card needs (spec.md §4.5/§4.7).
    fn assign_label(&self, location: Option<String>, at: Option<i64>, card: &mut Card, ctx: &mut Context, source: &SourceLine) {
        let Some(name) = location else { return };
        let redefined = ctx.table.assign_address_or_badly_defined(&name, at, source.clone());
        if redefined {
            card.push_cuss(Cuss::new(CussSerial::MULTIPLY_DEFINED).with_context(name));
        }
    }
}

fn first_unassigned_cell(cells: &CellGrid, low: i64, high: i64) -> Option<i64> {
    (low..=high).find(|&addr| !cells.is_claimed(addr))
}

fn field_value(address: &ParsedAddress) -> Option<i64> {
    match address {
        ParsedAddress::Field(field) => match field.value {
            AddressValue::Unsigned(n) | AddressValue::Signed(n) => Some(n + field.offset.unwrap_or(0)),
            _ => None,
        },
        ParsedAddress::Range(low, _) => Some(*low),
    }
}
