//! Whole-pipeline tests: lex, parse, resolve, encode, without peeking
//! at any intermediate stage the way the unit tests in `src/` do.
//! Fixture programs are small enough to hand-check the expected words.

use agc_assembler::{assemble, CussSerial, MapSourceReader, Target};

const WORD_MASK: i64 = 0x7fff;
const ADDRESS_MASK: i64 = 0xfff;

/// `env_logger::init()` panics if the global logger is already set, and
/// this file runs many `#[test]` functions in one binary, so each grabs
/// the logger with `try_init` instead and ignores the "already
/// initialized" case.
fn init_logging() {
    let _ = env_logger::try_init();
}

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

#[test]
fn a_small_program_assembles_with_no_cusses() {
    init_logging();
    let text = format!(
        "{}\n{}\n{}\n{}\n",
        card_line("", "SETLOC", "100"),
        card_line("START", "CA", "COUNT"),
        card_line("", "TC", "START"),
        card_line("COUNT", "DEC", "5"),
    );
    let reader = MapSourceReader::new().with_file("MAIN.agc", text);
    let output = assemble(&reader, "MAIN.agc", Target::block2_gap());
    let (cards, cusses) = (output.cards, output.cusses);

    assert!(cusses.is_empty(), "unexpected cusses: {cusses:?}");
    assert_eq!(cards.len(), 3);

    assert_eq!(cards[0].location.as_deref(), Some("START"));
    assert_eq!(cards[0].first_address, Some(0o100));
    let ca_word = cards[0].words[0] & WORD_MASK;
    assert_eq!(ca_word & ADDRESS_MASK, 0o102, "CA should address COUNT at 0o102");

    let tc_word = cards[1].words[0] & WORD_MASK;
    assert_eq!(tc_word & ADDRESS_MASK, 0o100, "TC should address START at 0o100");

    for card in &cards {
        for word in &card.words {
            assert_eq!(word.count_ones() % 2, 1, "word {word:o} is not odd parity");
        }
    }

    // The same words the listing would print also land in the cell grid.
    assert_eq!(output.cells.get(0o100).unwrap().value, Some(cards[0].words[0]));
    assert_eq!(output.symbols.address_of("COUNT").unwrap(), 0o102);
}

#[test]
fn extend_dca_and_index_latch_survive_a_whole_program() {
    init_logging();
    let text = format!(
        "{}\n{}\n{}\n{}\n{}\n",
        card_line("", "SETLOC", "200"),
        card_line("", "EXTEND", ""),
        card_line("", "INDEX", "1"),
        card_line("", "DCA", "PAIR"),
        card_line("PAIR", "2DEC", "2 0"),
    );
    let reader = MapSourceReader::new().with_file("MAIN.agc", text);
    let output = assemble(&reader, "MAIN.agc", Target::block2_gap());
    let (cards, cusses) = (output.cards, output.cusses);

    assert!(cusses.iter().all(|c| !c.is_fatal()), "unexpected fatal cusses: {cusses:?}");
    // EXTEND, INDEX, DCA, 2DEC (1 card with 2 words).
    assert_eq!(cards.len(), 4);
    assert_eq!(cards[3].words.len(), 2);
}

#[test]
fn interpretive_store_sequence_pushes_and_resolves_its_operand() {
    init_logging();
    let text = format!(
        "{}\n{}\n{}\n{}\n{}\n",
        card_line("", "SLOAD", ""),
        card_line("", "", "SOURCE"),
        card_line("", "STORE", "DEST"),
        card_line("SOURCE", "DEC", "0"),
        card_line("DEST", "DEC", "0"),
    );
    let reader = MapSourceReader::new().with_file("MAIN.agc", text);
    let output = assemble(&reader, "MAIN.agc", Target::block2_gap());
    let (cards, cusses) = (output.cards, output.cusses);

    assert!(cusses.iter().all(|c| !c.is_fatal()), "unexpected fatal cusses: {cusses:?}");
    assert!(cards.iter().any(|c| c.location.as_deref() == Some("SOURCE")));
    assert!(cards.iter().any(|c| c.location.as_deref() == Some("DEST")));
}

#[test]
fn two_cadr_splits_the_named_symbols_bank_and_offset_not_its_own() {
    init_logging();
    let text = format!(
        "{}\n{}\n{}\n{}\n",
        card_line("", "SETLOC", "4000"),
        card_line("TARGET", "CA", "TARGET"),
        card_line("", "SETLOC", "6000"),
        card_line("PTR", "2CADR", "TARGET"),
    );
    let reader = MapSourceReader::new().with_file("MAIN.agc", text);
    let output = assemble(&reader, "MAIN.agc", Target::block2_gap());
    let (cards, cusses) = (output.cards, output.cusses);

    assert!(cusses.iter().all(|c| !c.is_fatal()), "unexpected fatal cusses: {cusses:?}");
    let ptr = cards.iter().find(|c| c.location.as_deref() == Some("PTR")).unwrap();
    assert_eq!(ptr.words.len(), 2);
    // TARGET lives at 0o4000, the first cell of fixed bank 0, at
    // offset 0 — not PTR's own location (0o6000, bank 1) and not an
    // empty address field.
    assert_eq!(ptr.words[0] & ADDRESS_MASK, 0, "bank word should name TARGET's bank, not PTR's");
    assert_eq!(ptr.words[1] & ADDRESS_MASK, 0, "offset word should name TARGET's in-bank offset");
}

#[test]
fn dollar_insertion_pulls_in_a_symbol_from_another_file() {
    init_logging();
    let main = "$SUBROUTINE.agc\n".to_string();
    let subroutine = format!("{}\n", card_line("ENTRY", "TC", "ENTRY"));
    let reader = MapSourceReader::new().with_file("MAIN.agc", main).with_file("SUBROUTINE.agc", subroutine);
    let output = assemble(&reader, "MAIN.agc", Target::block2_gap());
    let (cards, cusses) = (output.cards, output.cusses);

    assert!(cusses.iter().all(|c| !c.is_fatal()), "unexpected fatal cusses: {cusses:?}");
    let instruction = cards.iter().find(|c| c.location.as_deref() == Some("ENTRY")).unwrap();
    assert_eq!(instruction.first_address, Some(0));
}

#[test]
fn unresolved_symbol_reports_a_cuss_but_still_assembles_the_rest() {
    init_logging();
    let text = format!(
        "{}\n{}\n",
        card_line("", "CA", "NOWHERE"),
        card_line("HERE", "CA", "HERE"),
    );
    let reader = MapSourceReader::new().with_file("MAIN.agc", text);
    let output = assemble(&reader, "MAIN.agc", Target::block2_gap());
    let (cards, cusses) = (output.cards, output.cusses);

    assert_eq!(cards.len(), 2);
    assert!(cards[0].cusses.iter().any(|c| c.serial == CussSerial::UNRESOLVED_PASS2));
    // The second card, unrelated to the bad reference, still resolves cleanly.
    assert!(cards[1].cusses.is_empty());
    assert!(cusses.iter().any(|c| c.serial == CussSerial::UNRESOLVED_PASS2));
}

#[test]
fn missing_insertion_file_is_a_structural_cuss_not_a_panic() {
    init_logging();
    let main = "$NOWHERE.agc\n".to_string();
    let reader = MapSourceReader::new().with_file("MAIN.agc", main);
    let cusses = assemble(&reader, "MAIN.agc", Target::block2_gap()).cusses;

    assert!(cusses.iter().any(|c| c.serial == CussSerial::STRUCTURAL_IO));
}
