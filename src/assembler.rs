//! The two-pass assembler driver.
//!
//! Split into `pass1` (location-counter walk, symbol table, cell
//! reservation, `$`-insertion recursion) and `pass2` (symbol
//! resolution, word composition, parity) as category submodules
//! wired together from this parent module, one file per concern.

mod pass1;
mod pass2;

pub use pass1::{Pass1Assembler, Pass1Output};
pub use pass2::{Pass2Assembler, Pass2Output};

use log::debug;

use crate::source::SourceReader;
use crate::target::Target;

/// Runs both passes over `main_file` and returns the assembled cards,
/// the frozen symbol table, the populated cell grid, and every cuss
/// raised across the whole pipeline — the four outputs spec.md §6 says
/// the external printing collaborators consume. A front end that needs
/// the intermediate Pass-1 state (for a cross-reference listing, say)
/// should call [`Pass1Assembler`] and [`Pass2Assembler`] directly
/// instead.
pub fn assemble<R: SourceReader>(reader: &R, main_file: &str, target: Target) -> Pass2Output {
    debug!("pass 1: {main_file} ({target:?})");
    let pass1_output = Pass1Assembler::new(reader, target).run(main_file);
    debug!("pass 1 done: {} cards, {} cusses", pass1_output.cards.len(), pass1_output.cusses.len());
    let pass1_cusses = pass1_output.cusses.clone();

    debug!("pass 2: {main_file}");
    let mut output = Pass2Assembler::new(target).run(pass1_output);
    debug!("pass 2 done: {} cards, {} cusses", output.cards.len(), output.cusses.len());

    let mut cusses = pass1_cusses;
    cusses.append(&mut output.cusses);
    output.cusses = cusses;
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MapSourceReader;

    #[test]
    fn assembles_a_trivial_program_end_to_end() {
        let reader = MapSourceReader::new().with_file(
            "MAIN.agc",
            "FOO            CA      BAR\n\
             BAR            DEC     5\n",
        );
        let output = assemble(&reader, "MAIN.agc", Target::block2_gap());
        assert!(output.cusses.iter().all(|c| !c.is_fatal()), "unexpected fatal cusses: {:?}", output.cusses);
        assert_eq!(output.cards.len(), 2);
        assert_eq!(output.cards[0].location.as_deref(), Some("FOO"));
        assert_eq!(output.cards[0].words.len(), 1);
        assert!(output.cells.is_assigned(0));
    }
}
