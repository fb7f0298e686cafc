//! Dialect configuration.
//!
//! Rather than a subclass per YUL/GAP/Block I/Block II combination,
//! every component that needs dialect-specific behaviour takes a
//! `Target` and asks it a capability question.

/// Assembler lineage: the pre-1967 YUL assembler and its post-1967 GAP
/// successor disagree about a handful of leniencies.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AssemblerVariant {
    Yul(YulRevision),
    Gap,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum YulRevision {
    Y1965,
    Y1966,
    Y1966L,
    Y1966E,
    Y1967,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Block {
    Block1,
    Block2,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Origin {
    Mit,
    Raytheon,
}

/// Full dialect selection for one assembly run.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Target {
    pub assembler: AssemblerVariant,
    pub block: Block,
    pub origin: Origin,
    /// Emulate the off-by-one page-tracking bug in the YUL66 xref
    /// printer (see SPEC_FULL.md §9 Open Question). This crate never
    /// reads the flag itself; it exists so a front end that rebuilds
    /// the xref report can find it attached to the `Target` it
    /// supplied.
    pub reproduce_xref_page_bug: bool,
}

impl Target {
    pub const fn block2_gap() -> Self {
        Target {
            assembler: AssemblerVariant::Gap,
            block: Block::Block2,
            origin: Origin::Mit,
            reproduce_xref_page_bug: false,
        }
    }

    pub fn is_yul(&self) -> bool {
        matches!(self.assembler, AssemblerVariant::Yul(_))
    }

    pub fn is_gap(&self) -> bool {
        matches!(self.assembler, AssemblerVariant::Gap)
    }

    pub fn is_raytheon(&self) -> bool {
        self.origin == Origin::Raytheon
    }

    pub fn is_block1(&self) -> bool {
        self.block == Block::Block1
    }

    pub fn is_block2(&self) -> bool {
        self.block == Block::Block2
    }

    /// Raytheon-origin source may write a decimal literal without the
    /// `D` suffix (spec.md §4.3); everyone else gets Cuss 0x21.
    pub fn decimal_without_d_is_error(&self) -> bool {
        !self.is_raytheon()
    }
}

impl Default for Target {
    fn default() -> Self {
        Target::block2_gap()
    }
}
