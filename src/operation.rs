//! The operations catalog: a frozen table of every mnemonic, how many
//! words it emits, which fields it accepts, and (for interpretive
//! operators) its operand specs.
//!
//! The table itself is a flat `&'static [Operation]` scanned linearly
//! on lookup rather than a hash map — the catalog is small enough, and
//! fixed at compile time, that a hash table would only add
//! indirection.

use crate::target::Target;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OperationType {
    Basic,
    Interpretive,
    Numeric,
    Address,
    Clerical,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Necessity {
    Required,
    Optional,
    Forbidden,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OperandSpec {
    pub push_down: bool,
    pub indexable: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StoreSubType {
    Store,
    Other,
}

/// Which effect processing this operation has on the EXTEND latch.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ExtendEffect {
    /// No interaction with the latch (most instructions).
    None,
    /// Sets the latch (`EXTEND` itself).
    Sets,
    /// Requires the latch to already be set; clears it once processed.
    RequiresAndClears,
    /// Requires the latch to already be set; leaves it set (the
    /// extended form of `INDEX`, so `EXTEND` `INDEX` doesn't need a
    /// second `EXTEND` before the instruction it's indexing).
    RequiresAndPreserves,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Operation {
    pub mnemonic: &'static str,
    pub operation_type: OperationType,
    pub words: u8,
    pub location_necessity: Necessity,
    pub address_necessity: Necessity,
    pub complement_necessity: Necessity,
    pub index_necessity: Necessity,
    pub extend_effect: ExtendEffect,
    pub has_indexed_form: bool,
    pub operand1: Option<OperandSpec>,
    pub operand2: Option<OperandSpec>,
    pub store_sub_type: Option<StoreSubType>,
    /// 3-bit order code occupying bits 12-14 of a Basic-instruction
    /// word (see SPEC_FULL.md §4.8). Meaningless outside
    /// [`OperationType::Basic`]; EXTEND-latched instructions reuse the
    /// same small code space as their unextended counterparts, since
    /// the latch is assembler-time state, not a word bit.
    pub order_code: u16,
    /// `true` for a mnemonic that only exists in Block II's enlarged
    /// instruction set: anything gated behind `EXTEND` (Block I has no
    /// extended-instruction mechanism at all), the whole interpretive
    /// layer, and the address-constant family that leans on Block II's
    /// banked fixed memory. `false` (the default) covers Block I's
    /// core arithmetic/transfer/clerical vocabulary, which both blocks
    /// share. Concrete per-mnemonic membership is this crate's own
    /// invented partition — nothing retrieved pinned an authoritative
    /// Block I mnemonic list — chosen for internal consistency with
    /// the EXTEND-latch mechanics `parser.rs` already models rather
    /// than historical exactness; see DESIGN.md.
    pub block2_only: bool,
}

const fn op(mnemonic: &'static str, operation_type: OperationType, words: u8) -> Operation {
    Operation {
        mnemonic,
        operation_type,
        words,
        location_necessity: Necessity::Optional,
        address_necessity: Necessity::Required,
        complement_necessity: Necessity::Forbidden,
        index_necessity: Necessity::Forbidden,
        extend_effect: ExtendEffect::None,
        has_indexed_form: false,
        operand1: None,
        operand2: None,
        store_sub_type: None,
        order_code: 0,
        block2_only: false,
    }
}

const fn basic(mnemonic: &'static str, order_code: u16) -> Operation {
    Operation {
        complement_necessity: Necessity::Optional,
        order_code,
        ..op(mnemonic, OperationType::Basic, 1)
    }
}

const fn extended_basic(mnemonic: &'static str, order_code: u16) -> Operation {
    Operation {
        extend_effect: ExtendEffect::RequiresAndClears,
        block2_only: true,
        ..basic(mnemonic, order_code)
    }
}

/// Interpretive operators get their own small order-code space,
/// distinct from Basic's (spec.md §4.8's encoding is this crate's own
/// invention; see DESIGN.md), so every interpretive mnemonic's word can
/// be told apart from every other's rather than all sharing code 0.
const fn interpretive(mnemonic: &'static str, order_code: u16, operand1: OperandSpec) -> Operation {
    Operation {
        operand1: Some(operand1),
        store_sub_type: Some(StoreSubType::Other),
        order_code,
        block2_only: true,
        ..op(mnemonic, OperationType::Interpretive, 1)
    }
}

const fn interpretive2(mnemonic: &'static str, order_code: u16, operand1: OperandSpec, operand2: OperandSpec) -> Operation {
    Operation {
        operand2: Some(operand2),
        ..interpretive(mnemonic, order_code, operand1)
    }
}

const fn store(mnemonic: &'static str, order_code: u16) -> Operation {
    Operation {
        index_necessity: Necessity::Optional,
        store_sub_type: Some(StoreSubType::Store),
        operand1: Some(OperandSpec { push_down: true, indexable: false }),
        order_code,
        block2_only: true,
        ..op(mnemonic, OperationType::Interpretive, 1)
    }
}

const fn address_constant(mnemonic: &'static str, words: u8) -> Operation {
    Operation {
        location_necessity: Necessity::Optional,
        address_necessity: Necessity::Required,
        block2_only: true,
        ..op(mnemonic, OperationType::Address, words)
    }
}

const fn numeric_constant(mnemonic: &'static str, words: u8) -> Operation {
    Operation {
        address_necessity: Necessity::Forbidden,
        ..op(mnemonic, OperationType::Numeric, words)
    }
}

const fn clerical(mnemonic: &'static str, address_necessity: Necessity, words: u8) -> Operation {
    Operation {
        address_necessity,
        ..op(mnemonic, OperationType::Clerical, words)
    }
}

const PUSH_DOWN: OperandSpec = OperandSpec { push_down: true, indexable: true };
const NOT_PUSH_DOWN: OperandSpec = OperandSpec { push_down: false, indexable: true };

/// `EXTEND INDEX` leaves the latch set instead of clearing it.
pub const INDEX: Operation = Operation {
    index_necessity: Necessity::Optional,
    ..basic("INDEX", 7)
};

pub const INDEX_EXTENDED: Operation = Operation {
    extend_effect: ExtendEffect::RequiresAndPreserves,
    ..INDEX
};

/// `STODL`/`STOVL`/`STORE` admit an indexed first word (`,[12]`)
/// without the `*` suffix; once `*` is present the suffix is required.
pub const STORE_INDEXED_REQUIRED: Operation = Operation {
    index_necessity: Necessity::Required,
    ..store("STORE", 1)
};

static CATALOG: &[Operation] = &[
    // Basic.
    op("EXTEND", OperationType::Basic, 0).with_extend(ExtendEffect::Sets).with_block2_only(),
    basic("CA", 0),
    basic("CS", 1),
    basic("TS", 2),
    basic("AD", 3),
    basic("ADS", 4),
    basic("MASK", 5),
    basic("TC", 6),
    extended_basic("TCF", 6),
    extended_basic("DCA", 0),
    extended_basic("DXCH", 1),
    extended_basic("DDOUBLE", 2),
    extended_basic("DOUBLE", 3),
    extended_basic("COM", 4),
    extended_basic("XCH", 5),
    basic("CCS", 1),
    basic("INCR", 2),
    basic("AUG", 3),
    basic("DIM", 4),
    basic("NOOP", 5),
    basic("RELINT", 6),
    basic("INHINT", 7),
    basic("RESUME", 0),
    INDEX,
    // Interpretive.
    interpretive2("DLOAD", 0, PUSH_DOWN, PUSH_DOWN),
    interpretive("SLOAD", 1, PUSH_DOWN),
    interpretive2("VLOAD", 2, PUSH_DOWN, PUSH_DOWN),
    interpretive2("PDVL", 3, PUSH_DOWN, PUSH_DOWN),
    interpretive("DMP", 4, NOT_PUSH_DOWN),
    interpretive2("DAD", 5, PUSH_DOWN, PUSH_DOWN),
    interpretive("SQRT", 6, NOT_PUSH_DOWN),
    interpretive("BPL", 7, NOT_PUSH_DOWN),
    interpretive("BMN", 0, NOT_PUSH_DOWN),
    interpretive("GOTO", 1, NOT_PUSH_DOWN),
    interpretive("RTB", 2, NOT_PUSH_DOWN),
    interpretive("VXM", 3, PUSH_DOWN),
    op("STADR", OperationType::Interpretive, 0),
    store("STORE", 0),
    store("STODL", 1),
    store("STOVL", 2),
    // Address constant.
    address_constant("P", 1).with_indexed_form(),
    address_constant("BBCON", 1),
    address_constant("ADRES", 1),
    address_constant("VN", 1),
    address_constant("2CADR", 2),
    // Numeric constant.
    numeric_constant("DEC", 1),
    numeric_constant("2DEC", 2),
    numeric_constant("OCT", 1),
    // Clerical.
    clerical("SETLOC", Necessity::Required, 0),
    clerical("BANK", Necessity::Optional, 0),
    clerical("BLOCK", Necessity::Required, 0),
    clerical("ERASE", Necessity::Optional, 0),
    clerical("MEMORY", Necessity::Required, 0),
    clerical("EQUALS", Necessity::Optional, 0),
    clerical("=MINUS", Necessity::Required, 0),
    clerical("=PLUS", Necessity::Required, 0),
    clerical("SUBRO", Necessity::Forbidden, 0),
    clerical("BNKSUM", Necessity::Forbidden, 0),
    // EBANK=/SBANK= reset the current erasable/super bank; the parser
    // tolerates them appearing between EXTEND and its target (spec.md
    // §4.4) without breaking the latch.
    clerical("EBANK=", Necessity::Required, 0),
    clerical("SBANK=", Necessity::Required, 0),
];

impl Operation {
    const fn with_extend(mut self, effect: ExtendEffect) -> Self {
        self.extend_effect = effect;
        self
    }

    const fn with_indexed_form(mut self) -> Self {
        self.has_indexed_form = true;
        self
    }

    const fn with_block2_only(mut self) -> Self {
        self.block2_only = true;
        self
    }

    pub fn is_store(&self) -> bool {
        matches!(self.store_sub_type, Some(StoreSubType::Store))
    }
}

/// Looks up a mnemonic in the frozen catalog, narrowed to what `target`
/// admits. A Block II-only entry (`block2_only`) is invisible to a
/// Block I target: the lookup misses exactly as if the mnemonic didn't
/// exist, so the parser's usual Cuss 0x41 `UNKNOWN_MNEMONIC` covers a
/// Block I card that names extended, interpretive, or address-constant
/// vocabulary without a second code path.
pub fn lookup(mnemonic: &str, target: &Target) -> Option<&'static Operation> {
    CATALOG
        .iter()
        .find(|entry| entry.mnemonic == mnemonic && (!entry.block2_only || target.is_block2()))
}

/// Swaps `INDEX` for its extended variant when the EXTEND latch is
/// set, so that `EXTEND` `INDEX` doesn't clear the latch before the
/// instruction `INDEX` is indexing runs.
pub fn check_extended_index(operation: &'static Operation, extend_latch: bool) -> &'static Operation {
    if operation.mnemonic == "INDEX" && extend_latch {
        &INDEX_EXTENDED
    } else {
        operation
    }
}

/// Swaps a STORE-family operation for its indexed variant once `*`
/// is present, making the `,[12]` suffix mandatory rather than merely
/// permitted.
pub fn check_indexed_store(operation: &'static Operation, starred: bool) -> &'static Operation {
    if starred && operation.is_store() {
        &STORE_INDEXED_REQUIRED
    } else {
        operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target::block2_gap()
    }

    #[test]
    fn looks_up_every_mnemonic_named_in_the_spec() {
        for mnemonic in [
            "CA", "TC", "INDEX", "EXTEND", "STADR", "STORE", "P", "BBCON", "ERASE", "MEMORY",
            "SETLOC", "BANK", "BLOCK", "EQUALS", "=MINUS", "=PLUS", "SUBRO", "BNKSUM", "DCA",
            "DEC", "STODL", "STOVL", "DLOAD", "PDVL", "VN",
        ] {
            assert!(lookup(mnemonic, &target()).is_some(), "missing {mnemonic}");
        }
    }

    #[test]
    fn unknown_mnemonic_is_absent() {
        assert!(lookup("FROBNICATE", &target()).is_none());
    }

    #[test]
    fn extend_plus_index_preserves_the_latch() {
        let index = lookup("INDEX", &target()).unwrap();
        let swapped = check_extended_index(index, true);
        assert_eq!(swapped.extend_effect, ExtendEffect::RequiresAndPreserves);

        let unswapped = check_extended_index(index, false);
        assert_eq!(unswapped.extend_effect, ExtendEffect::None);
    }

    #[test]
    fn starred_store_requires_the_index_suffix() {
        let store = lookup("STORE", &target()).unwrap();
        assert_eq!(store.index_necessity, Necessity::Optional);

        let starred = check_indexed_store(store, true);
        assert_eq!(starred.index_necessity, Necessity::Required);
    }

    #[test]
    fn dca_requires_extend() {
        let dca = lookup("DCA", &target()).unwrap();
        assert_eq!(dca.extend_effect, ExtendEffect::RequiresAndClears);
    }

    #[test]
    fn block1_target_rejects_block2_only_mnemonics() {
        let block1 = Target { block: crate::target::Block::Block1, ..Target::block2_gap() };
        for mnemonic in ["EXTEND", "DCA", "SLOAD", "STORE", "2CADR"] {
            assert!(lookup(mnemonic, &block1).is_none(), "{mnemonic} should not be visible to Block I");
        }
        // Core vocabulary both blocks share is untouched.
        assert!(lookup("CA", &block1).is_some());
        assert!(lookup("TC", &block1).is_some());
    }
}
