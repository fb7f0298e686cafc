//! Two-pass symbol resolution.
//!
//! Pass 1 builds a [`Pass1Table`] while scanning source top to bottom:
//! every symbol either gets a concrete address straight away
//! (`assign_address`, from a location field) or a deferred expression
//! (`assign_field`, from `EQUALS`/`=MINUS`/`=PLUS` aliasing another
//! symbol). Pass 2 freezes that table into a [`Pass2Table`] by walking
//! every deferred entry to a number, failing closed on cycles rather
//! than looping.

use std::collections::HashMap;

use crate::address_field::AddressField;
use crate::cuss::{Cuss, CussSerial};
use crate::source::SourceLine;

/// How trustworthy a symbol's definition is. Ordered so that merging
/// observations of the same symbol can just take the max: spec.md §7
/// pins `MultiplyDefined` as overriding `BadlyDefined` as overriding
/// no health issue at all; `Conflict` (a cell clash) and `MiscTrouble`
/// are slotted in between by this crate's own choice, recorded as an
/// Open Question resolution in DESIGN.md.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum Health {
    Undefined,
    Defined,
    BadlyDefined,
    Conflict,
    MiscTrouble,
    MultiplyDefined,
}

/// The frozen value a symbol resolves to when its defining card never
/// got a location (bank exhaustion, structural failure). spec.md §3
/// names this sentinel `ERROR_WORD`; it is this crate's own choice of
/// magnitude (distinct from any legal 15-bit true address and is never
/// confused with a zero-valued but otherwise healthy symbol) and is
/// documented as such in DESIGN.md.
pub const ERROR_WORD: i64 = -1;

#[derive(Debug, Clone)]
enum Definition {
    Number(i64),
    Deferred(AddressField),
}

#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub health: Health,
    pub defined_at: SourceLine,
    definition: Definition,
}

/// The mutable table Pass 1 builds up.
#[derive(Debug, Default)]
pub struct Pass1Table {
    symbols: HashMap<String, SymbolEntry>,
}

impl Pass1Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolEntry> {
        self.symbols.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    /// Gives `symbol` a concrete numeric address. A second assignment
    /// to the same name marks it `MultiplyDefined` rather than
    /// overwriting it silently — the redefinition itself replaces the
    /// stored value (spec.md §3: "the new definition replaces the
    /// old"), with only the `MultiplyDefined` health flag left behind
    /// as a trace that the first one ever existed.
    ///
    /// Returns `true` iff this assignment was itself a redefinition, so
    /// the caller can attach Cuss 0x31 to the specific card that caused
    /// it (spec.md §3: "records a Cuss on the new one").
    pub fn assign_address(&mut self, symbol: &str, address: i64, defined_at: SourceLine) -> bool {
        self.assign(symbol, Definition::Number(address), defined_at)
    }

    /// As `assign_address`, but for a card whose location counter was
    /// undefined at the moment it needed one (spec.md §3: "if refAddress
    /// missing, value = ERROR_WORD and health = BadlyDefined").
    pub fn assign_address_or_badly_defined(&mut self, symbol: &str, address: Option<i64>, defined_at: SourceLine) -> bool {
        match address {
            Some(address) => self.assign_address(symbol, address, defined_at),
            None => {
                let redefined = self.assign(symbol, Definition::Number(ERROR_WORD), defined_at);
                if let Some(entry) = self.symbols.get_mut(symbol) {
                    if entry.health < Health::BadlyDefined {
                        entry.health = Health::BadlyDefined;
                    }
                }
                redefined
            }
        }
    }

    /// Gives `symbol` a deferred expression (an `EQUALS`-style alias)
    /// to be resolved once every symbol it may reference is known.
    ///
    /// Returns `true` iff this assignment was a redefinition.
    pub fn assign_field(&mut self, symbol: &str, field: AddressField, defined_at: SourceLine) -> bool {
        self.assign(symbol, Definition::Deferred(field), defined_at)
    }

    fn assign(&mut self, symbol: &str, definition: Definition, defined_at: SourceLine) -> bool {
        match self.symbols.get_mut(symbol) {
            Some(entry) => {
                entry.health = Health::MultiplyDefined;
                entry.definition = definition;
                entry.defined_at = defined_at;
                true
            }
            None => {
                self.symbols.insert(
                    symbol.to_string(),
                    SymbolEntry { health: Health::Defined, defined_at, definition },
                );
                false
            }
        }
    }

    /// Resolves one symbol to a number, following `Deferred` chains
    /// and failing on a reference cycle or an unknown symbol.
    pub fn resolve(&self, symbol: &str) -> Result<i64, Cuss> {
        let mut visited = std::collections::HashSet::new();
        self.resolve_inner(symbol, &mut visited)
    }

    fn resolve_inner(&self, symbol: &str, visited: &mut std::collections::HashSet<String>) -> Result<i64, Cuss> {
        if !visited.insert(symbol.to_string()) {
            // spec.md §4.5/§7: self-reference shares serial 0x35 with a
            // missing location counter, not the "unresolved" serials.
            return Err(Cuss::new(CussSerial::NO_LOCATION_COUNTER)
                .with_context(format!("cyclic reference through {symbol}")));
        }

        let entry = self
            .symbols
            .get(symbol)
            .ok_or_else(|| Cuss::new(CussSerial::UNRESOLVED_PASS1).with_context(symbol))?;

        match &entry.definition {
            Definition::Number(value) => Ok(*value),
            Definition::Deferred(field) => {
                let base = match &field.value {
                    crate::address_field::AddressValue::Unsigned(n) => *n,
                    crate::address_field::AddressValue::Signed(n) => *n,
                    crate::address_field::AddressValue::Symbol(inner) => self.resolve_inner(inner, visited)?,
                    crate::address_field::AddressValue::Omitted => {
                        return Err(Cuss::new(CussSerial::UNRESOLVED_PASS1).with_context(symbol))
                    }
                };
                Ok(base + field.offset.unwrap_or(0))
            }
        }
    }

    /// Resolves every symbol, returning the frozen table plus every
    /// cuss raised along the way (unresolved references, cycles,
    /// multiple definitions). Never aborts partway: a symbol that
    /// fails to resolve is simply absent from the result table.
    pub fn resolve_all(self) -> (Pass2Table, Vec<Cuss>) {
        let mut resolved = HashMap::new();
        let mut cusses = Vec::new();

        let names: Vec<String> = self.symbols.keys().cloned().collect();
        for name in names {
            let entry = &self.symbols[&name];
            if entry.health == Health::MultiplyDefined {
                cusses.push(Cuss::new(CussSerial::MULTIPLY_DEFINED).with_context(&name));
            }
            match self.resolve(&name) {
                Ok(address) => {
                    resolved.insert(name.clone(), ResolvedSymbol { address, defined_at: entry.defined_at.clone() });
                }
                Err(cuss) => cusses.push(cuss),
            }
        }

        (Pass2Table { symbols: resolved }, cusses)
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedSymbol {
    pub address: i64,
    pub defined_at: SourceLine,
}

/// The read-only table Pass 2 consumes. Every entry is a plain number;
/// all deferred expressions were walked to ground during `resolve_all`.
#[derive(Debug, Default)]
pub struct Pass2Table {
    symbols: HashMap<String, ResolvedSymbol>,
}

impl Pass2Table {
    pub fn get(&self, symbol: &str) -> Option<&ResolvedSymbol> {
        self.symbols.get(symbol)
    }

    pub fn address_of(&self, symbol: &str) -> Result<i64, Cuss> {
        self.get(symbol)
            .map(|entry| entry.address)
            .ok_or_else(|| Cuss::new(CussSerial::UNRESOLVED_PASS2).with_context(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_field::AddressValue;

    fn source() -> SourceLine {
        SourceLine { source: "MAIN.agc".into(), line_number: 1, page: 0, text: String::new() }
    }

    #[test]
    fn assigns_and_resolves_a_plain_address() {
        let mut table = Pass1Table::new();
        table.assign_address("FOO", 0o100, source());
        assert_eq!(table.resolve("FOO").unwrap(), 0o100);
    }

    #[test]
    fn redefinition_is_flagged_and_replaces_the_old_value() {
        let mut table = Pass1Table::new();
        table.assign_address("FOO", 0o100, source());
        table.assign_address("FOO", 0o200, source());
        assert_eq!(table.get("FOO").unwrap().health, Health::MultiplyDefined);
        assert_eq!(table.resolve("FOO").unwrap(), 0o200);
    }

    #[test]
    fn deferred_field_resolves_through_another_symbol() {
        let mut table = Pass1Table::new();
        table.assign_address("BASE", 0o100, source());
        table.assign_field(
            "ALIAS",
            AddressField { value: AddressValue::Symbol("BASE".into()), offset: Some(5), index_register: None },
            source(),
        );
        assert_eq!(table.resolve("ALIAS").unwrap(), 0o105);
    }

    #[test]
    fn cyclic_reference_is_a_cuss_not_an_infinite_loop() {
        let mut table = Pass1Table::new();
        table.assign_field(
            "A",
            AddressField { value: AddressValue::Symbol("B".into()), offset: None, index_register: None },
            source(),
        );
        table.assign_field(
            "B",
            AddressField { value: AddressValue::Symbol("A".into()), offset: None, index_register: None },
            source(),
        );
        let err = table.resolve("A").unwrap_err();
        assert_eq!(err.serial, CussSerial::NO_LOCATION_COUNTER);
    }

    #[test]
    fn missing_location_counter_produces_error_word_and_badly_defined() {
        let mut table = Pass1Table::new();
        table.assign_address_or_badly_defined("FOO", None, source());
        assert_eq!(table.get("FOO").unwrap().health, Health::BadlyDefined);
        assert_eq!(table.resolve("FOO").unwrap(), ERROR_WORD);
    }

    #[test]
    fn resolve_all_collects_every_cuss_without_aborting() {
        let mut table = Pass1Table::new();
        table.assign_address("FOO", 0o100, source());
        table.assign_field(
            "GHOST",
            AddressField { value: AddressValue::Symbol("MISSING".into()), offset: None, index_register: None },
            source(),
        );
        let (pass2, cusses) = table.resolve_all();
        assert_eq!(pass2.address_of("FOO").unwrap(), 0o100);
        assert!(pass2.address_of("GHOST").is_err());
        assert!(!cusses.is_empty());
    }
}
