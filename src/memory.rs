//! The banked memory model: classification of address ranges and the
//! conversions between a "true address" (the flat space the assembler
//! reasons in) and the bank-relative addresses the hardware actually
//! uses.
//!
//! Classification dispatches by matching the incoming address against
//! a handful of disjoint ranges rather than building a page table;
//! that shape fits a fixed, small memory map like the AGC's.
//!
//! The concrete bank boundaries below are this crate's own invention —
//! nothing in the retrieved material gave a wire format to transcribe
//! them from — chosen to be internally consistent (bank size is fixed,
//! banks tile the space with no gaps) rather than historically exact;
//! see DESIGN.md.

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MemoryKind {
    Hardware,
    Nonexistent,
    SpecialErasable,
    UnswitchedBankedErasable,
    SwitchedErasable,
    FixedFixed,
    VariableFixed,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryRange {
    pub kind: MemoryKind,
    pub low: i64,
    pub high: i64, // inclusive
}

pub const ERASABLE_BANK_SIZE: i64 = 0o400; // 256 words
pub const FIXED_BANK_SIZE: i64 = 0o2000; // 1024 words

const HARDWARE_LOW: i64 = 0;
const HARDWARE_HIGH: i64 = 0o7;
const SPECIAL_ERASABLE_LOW: i64 = 0o10;
const SPECIAL_ERASABLE_HIGH: i64 = 0o57;
const UNSWITCHED_ERASABLE_LOW: i64 = 0o60;
const UNSWITCHED_ERASABLE_HIGH: i64 = 0o1377;
const SWITCHED_ERASABLE_LOW: i64 = 0o1400;
const SWITCHED_ERASABLE_HIGH: i64 = 0o1777;
const FIXED_FIXED_LOW: i64 = 0o2000;
const FIXED_FIXED_HIGH: i64 = 0o3777;
const VARIABLE_FIXED_LOW: i64 = 0o4000;
const VARIABLE_FIXED_HIGH: i64 = 0o7777;

/// The fixed, target-independent table of memory ranges that
/// `classify` and `memory_ranges` both work from.
pub fn memory_ranges() -> &'static [MemoryRange] {
    &[
        MemoryRange { kind: MemoryKind::Hardware, low: HARDWARE_LOW, high: HARDWARE_HIGH },
        MemoryRange { kind: MemoryKind::SpecialErasable, low: SPECIAL_ERASABLE_LOW, high: SPECIAL_ERASABLE_HIGH },
        MemoryRange {
            kind: MemoryKind::UnswitchedBankedErasable,
            low: UNSWITCHED_ERASABLE_LOW,
            high: UNSWITCHED_ERASABLE_HIGH,
        },
        MemoryRange { kind: MemoryKind::SwitchedErasable, low: SWITCHED_ERASABLE_LOW, high: SWITCHED_ERASABLE_HIGH },
        MemoryRange { kind: MemoryKind::FixedFixed, low: FIXED_FIXED_LOW, high: FIXED_FIXED_HIGH },
        MemoryRange { kind: MemoryKind::VariableFixed, low: VARIABLE_FIXED_LOW, high: VARIABLE_FIXED_HIGH },
    ]
}

/// Classifies a true address, or `Nonexistent` when it falls in none
/// of the known ranges.
pub fn classify(true_address: i64) -> MemoryKind {
    memory_ranges()
        .iter()
        .find(|range| (range.low..=range.high).contains(&true_address))
        .map(|range| range.kind)
        .unwrap_or(MemoryKind::Nonexistent)
}

pub fn is_erasable(kind: MemoryKind) -> bool {
    matches!(
        kind,
        MemoryKind::SpecialErasable | MemoryKind::UnswitchedBankedErasable | MemoryKind::SwitchedErasable
    )
}

pub fn is_fixed(kind: MemoryKind) -> bool {
    matches!(kind, MemoryKind::FixedFixed | MemoryKind::VariableFixed)
}

pub fn is_banked(kind: MemoryKind) -> bool {
    matches!(kind, MemoryKind::SwitchedErasable | MemoryKind::VariableFixed)
}

/// The fixed bank number a variable-fixed true address belongs to
/// (spec.md's "fixed bank"), or `None` outside variable-fixed memory.
pub fn fixed_bank_number(true_address: i64) -> Option<i64> {
    if classify(true_address) != MemoryKind::VariableFixed {
        return None;
    }
    Some((true_address - VARIABLE_FIXED_LOW) / FIXED_BANK_SIZE)
}

/// The true-address range occupied by a given fixed bank number.
pub fn fixed_bank_range(bank: i64) -> MemoryRange {
    let low = VARIABLE_FIXED_LOW + bank * FIXED_BANK_SIZE;
    MemoryRange { kind: MemoryKind::VariableFixed, low, high: low + FIXED_BANK_SIZE - 1 }
}

/// The erasable bank number a switched-erasable true address belongs to.
pub fn erasable_bank_number(true_address: i64) -> Option<i64> {
    if classify(true_address) != MemoryKind::SwitchedErasable {
        return None;
    }
    Some((true_address - SWITCHED_ERASABLE_LOW) / ERASABLE_BANK_SIZE)
}

/// Offset of a true address within its bank (fixed or erasable alike).
pub fn memory_offset(true_address: i64) -> i64 {
    match classify(true_address) {
        MemoryKind::VariableFixed => (true_address - VARIABLE_FIXED_LOW) % FIXED_BANK_SIZE,
        MemoryKind::SwitchedErasable => (true_address - SWITCHED_ERASABLE_LOW) % ERASABLE_BANK_SIZE,
        _ => true_address,
    }
}

/// The true address for a given fixed bank and in-bank offset.
pub fn memory_address(bank: i64, offset: i64) -> i64 {
    VARIABLE_FIXED_LOW + bank * FIXED_BANK_SIZE + offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_every_named_range() {
        assert_eq!(classify(0o3), MemoryKind::Hardware);
        assert_eq!(classify(0o30), MemoryKind::SpecialErasable);
        assert_eq!(classify(0o100), MemoryKind::UnswitchedBankedErasable);
        assert_eq!(classify(0o1500), MemoryKind::SwitchedErasable);
        assert_eq!(classify(0o2500), MemoryKind::FixedFixed);
        assert_eq!(classify(0o5000), MemoryKind::VariableFixed);
        assert_eq!(classify(0o10000), MemoryKind::Nonexistent);
    }

    #[test]
    fn fixed_bank_round_trips_with_memory_address() {
        let bank = 3;
        let offset = 0o17;
        let address = memory_address(bank, offset);
        assert_eq!(fixed_bank_number(address), Some(bank));
        assert_eq!(memory_offset(address), offset);
    }

    #[test]
    fn fixed_bank_range_is_contiguous_and_bank_sized() {
        let range = fixed_bank_range(2);
        assert_eq!(range.high - range.low + 1, FIXED_BANK_SIZE);
        assert_eq!(fixed_bank_number(range.low), Some(2));
        assert_eq!(fixed_bank_number(range.high), Some(2));
    }

    #[test]
    fn erasable_bank_number_only_applies_to_switched_erasable() {
        assert_eq!(erasable_bank_number(0o1500), Some(1));
        assert_eq!(erasable_bank_number(0o100), None);
    }
}
