//! Splits raw source lines into classified, column-delimited records.
//!
//! Column positions are 1-indexed in spec.md's prose; internally this
//! module works with 0-indexed character offsets into a tab-expanded
//! copy of the line, which is where all of the column arithmetic
//! below comes from.

use log::trace;

use crate::source::SourceLine;

const FIELD1_START: usize = 0; // column 1
const FIELD1_END: usize = 14; // column 14, exclusive upper bound
const FIELD2_START: usize = 15; // column 16
const FIELD2_END: usize = 24; // column 24, exclusive upper bound (one past)
const FIELD3_START: usize = 25; // column 26

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LineVariant {
    Insertion,
    Pagination,
    Remark,
    Instruction,
}

/// A classified source line. `field1..3` are only ever populated for
/// [`LineVariant::Instruction`] and [`LineVariant::Insertion`] (which
/// uses `field1` for the included file name); `remark` carries
/// whatever trailing comment survived stripping.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LexedLine {
    pub variant: LineVariant,
    pub source: SourceLine,
    pub field1: Option<String>,
    pub field2: Option<String>,
    pub field3: Option<String>,
    pub remark: Option<String>,
}

/// Tracks the running page number across a stream of lines; every
/// other piece of lexer state is passed in per call.
#[derive(Debug, Default)]
pub struct Lexer {
    page: u32,
}

impl Lexer {
    pub fn new() -> Self {
        Lexer { page: 0 }
    }

    pub fn current_page(&self) -> u32 {
        self.page
    }

    /// Lex one physical line. Returns `None` when the line carries no
    /// observable content at all (spec.md §4.1 step 3).
    pub fn lex(&mut self, source_name: &str, line_number: u32, raw_text: &str) -> Option<LexedLine> {
        let raw_text = raw_text.trim_end_matches(['\r', '\n']);
        let expanded = expand_tabs(raw_text);

        if let Some(page) = parse_page_directive(&expanded) {
            trace!("{source_name}:{line_number}: page {page}");
            self.page = page;
            return Some(LexedLine {
                variant: LineVariant::Pagination,
                source: self.source_line(source_name, line_number, raw_text),
                field1: None,
                field2: None,
                field3: None,
                remark: None,
            });
        }

        let chars: Vec<char> = expanded.chars().collect();
        let hash_idx = chars.iter().position(|&c| c == '#');
        let (code_chars, raw_remark): (&[char], Option<String>) = match hash_idx {
            Some(i) => (&chars[..i], Some(chars[i + 1..].iter().collect())),
            None => (&chars[..], None),
        };

        let is_main_aggregator = source_name.ends_with("MAIN.agc");
        let remark = raw_remark.and_then(|text| {
            if is_main_aggregator || text.starts_with('#') {
                None
            } else {
                Some(expand_tabs(&text))
            }
        });

        let code_text: String = code_chars.iter().collect();
        if code_text.trim().is_empty() {
            return self.remark_or_nothing(source_name, line_number, raw_text, remark);
        }

        if code_text.trim_start().starts_with('$') {
            let file = code_text.trim_start().trim_start_matches('$').trim().to_string();
            return Some(LexedLine {
                variant: LineVariant::Insertion,
                source: self.source_line(source_name, line_number, raw_text),
                field1: Some(file),
                field2: None,
                field3: None,
                remark,
            });
        }

        let (field1, field2, field3) = split_fields(code_chars);
        if field1.is_none() && field2.is_none() && field3.is_none() {
            return self.remark_or_nothing(source_name, line_number, raw_text, remark);
        }

        Some(LexedLine {
            variant: LineVariant::Instruction,
            source: self.source_line(source_name, line_number, raw_text),
            field1,
            field2,
            field3,
            remark,
        })
    }

    fn remark_or_nothing(
        &self,
        source_name: &str,
        line_number: u32,
        raw_text: &str,
        remark: Option<String>,
    ) -> Option<LexedLine> {
        remark.map(|remark| LexedLine {
            variant: LineVariant::Remark,
            source: self.source_line(source_name, line_number, raw_text),
            field1: Some(String::new()),
            field2: None,
            field3: None,
            remark: Some(remark),
        })
    }

    fn source_line(&self, source_name: &str, line_number: u32, raw_text: &str) -> SourceLine {
        SourceLine {
            source: source_name.to_string(),
            line_number,
            page: self.page,
            text: raw_text.to_string(),
        }
    }
}

fn parse_page_directive(expanded: &str) -> Option<u32> {
    let rest = expanded.strip_prefix("## Page ")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn expand_tabs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut col = 0usize;
    for ch in text.chars() {
        if ch == '\t' {
            let advance = 8 - (col % 8);
            for _ in 0..advance {
                out.push(' ');
            }
            col += advance;
        } else {
            out.push(ch);
            col += 1;
        }
    }
    out
}

fn trimmed(chars: &[char]) -> Option<String> {
    let text: String = chars.iter().collect();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Implements spec.md §4.1's column rules, including the "whitespace
/// before column 25 terminates field2 early" loosening.
fn split_fields(chars: &[char]) -> (Option<String>, Option<String>, Option<String>) {
    let len = chars.len();

    let field1 = trimmed(&chars[FIELD1_START.min(len)..FIELD1_END.min(len)]);

    let mut field2_start = FIELD2_START;
    while field2_start < len && chars[field2_start].is_whitespace() {
        field2_start += 1;
    }

    let mut field2_end = field2_start;
    let mut terminated_early = false;
    while field2_end < len && field2_end < FIELD2_END {
        if chars[field2_end].is_whitespace() {
            terminated_early = true;
            break;
        }
        field2_end += 1;
    }

    let field2 = if field2_start < field2_end {
        Some(chars[field2_start..field2_end].iter().collect::<String>())
    } else {
        None
    };

    let field3_start = if terminated_early {
        let mut j = field2_end;
        while j < len && chars[j].is_whitespace() {
            j += 1;
        }
        j
    } else {
        FIELD3_START
    };

    let field3 = if field3_start < len {
        trimmed(&chars[field3_start..len])
    } else {
        None
    };

    (field1, field2, field3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_one(text: &str) -> Option<LexedLine> {
        Lexer::new().lex("SUB.agc", 1, text)
    }

    /// Builds a line with `field1` at column 1, `field2` at column 16
    /// and `field3` at column 26, with a single-space gap substituted
    /// for `field2` when it's empty (to exercise the early-termination
    /// rule instead of the fixed-column one).
    fn card_line(field1: &str, field2: &str, field3: &str) -> String {
        let mut s = String::new();
        s.push_str(field1);
        while s.len() < FIELD2_START {
            s.push(' ');
        }
        s.push_str(field2);
        while s.len() < FIELD3_START {
            s.push(' ');
        }
        s.push_str(field3);
        s
    }

    #[test]
    fn empty_line_emits_nothing() {
        assert!(lex_one("").is_none());
        assert!(lex_one("          ").is_none());
    }

    #[test]
    fn page_directive_updates_page_and_emits_pagination() {
        let mut lexer = Lexer::new();
        let line = lexer.lex("SUB.agc", 1, "## Page 1").unwrap();
        assert_eq!(line.variant, LineVariant::Pagination);
        assert_eq!(line.source.page, 1);
        assert_eq!(lexer.current_page(), 1);
    }

    #[test]
    fn insertion_line_captures_file_name() {
        let line = lex_one("$foo.agc").unwrap();
        assert_eq!(line.variant, LineVariant::Insertion);
        assert_eq!(line.field1.as_deref(), Some("foo.agc"));
    }

    #[test]
    fn standard_three_field_instruction_line() {
        let line = lex_one(&card_line("FOO", "CA", "BAR")).unwrap();
        assert_eq!(line.variant, LineVariant::Instruction);
        assert_eq!(line.field1.as_deref(), Some("FOO"));
        assert_eq!(line.field2.as_deref(), Some("CA"));
        assert_eq!(line.field3.as_deref(), Some("BAR"));
    }

    #[test]
    fn loose_single_space_separated_fields_still_split() {
        // OPERATOR ends with a space well before column 25, so OPERAND
        // starts immediately after the gap rather than at column 26.
        let text = format!("{}CA BAR", " ".repeat(FIELD2_START));
        let line = lex_one(&text).unwrap();
        assert_eq!(line.field2.as_deref(), Some("CA"));
        assert_eq!(line.field3.as_deref(), Some("BAR"));
    }

    #[test]
    fn remark_after_main_aggregator_is_dropped() {
        let mut lexer = Lexer::new();
        let text = format!("{}   # not kept", card_line("FOO", "CA", "BAR"));
        let line = lexer.lex("PROJECT/MAIN.agc", 1, &text).unwrap();
        assert!(line.remark.is_none());
    }

    #[test]
    fn remark_is_preserved_outside_main_aggregator() {
        let text = format!("{}   # kept", card_line("FOO", "CA", "BAR"));
        let line = lex_one(&text).unwrap();
        assert_eq!(line.remark.as_deref(), Some(" kept"));
    }

    #[test]
    fn double_hash_remark_is_always_dropped() {
        let text = format!("{}   ## internal", card_line("FOO", "CA", "BAR"));
        let line = lex_one(&text).unwrap();
        assert!(line.remark.is_none());
    }

    #[test]
    fn remark_only_line_uses_blank_field1_sentinel() {
        let line = lex_one("      # just a comment").unwrap();
        assert_eq!(line.variant, LineVariant::Remark);
        assert_eq!(line.field1.as_deref(), Some(""));
        assert_eq!(line.remark.as_deref(), Some(" just a comment"));
    }

    #[test]
    fn tabs_expand_to_next_multiple_of_eight() {
        assert_eq!(expand_tabs("A\tB"), format!("A{}B", " ".repeat(7)));
        assert_eq!(expand_tabs("AB\tC"), format!("AB{}C", " ".repeat(6)));
        assert_eq!(expand_tabs("A\t\tB"), format!("A{}B", " ".repeat(15)));
    }

    #[test]
    fn remark_tabs_expand_independently_of_the_code_columns() {
        let text = format!("{}   #a\tb", card_line("FOO", "CA", "BAR"));
        let line = lex_one(&text).unwrap();
        assert_eq!(line.remark.as_deref(), Some(format!("a{}b", " ".repeat(7)).as_str()));
    }
}
