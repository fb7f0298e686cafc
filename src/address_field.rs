//! The address-field sub-parser shared by the card parser and the
//! Pass-1 clerical directives (`ERASE`/`MEMORY` need the range form).

use crate::cuss::{Cuss, CussSerial};
use crate::target::Target;

/// How strongly an operand position requires the `,[12]` index suffix.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IndexNecessity {
    Never,
    Optional,
    Required,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AddressValue {
    Unsigned(i64),
    Signed(i64),
    Symbol(String),
    /// No operand at all: "the current location counter".
    Omitted,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AddressField {
    pub value: AddressValue,
    pub offset: Option<i64>,
    pub index_register: Option<u8>,
}

impl AddressField {
    pub fn omitted() -> Self {
        AddressField {
            value: AddressValue::Omitted,
            offset: None,
            index_register: None,
        }
    }
}

/// Either a plain address field, or (only with `range_allowed`) the
/// `N - M` closed range form used by `ERASE`/`MEMORY`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ParsedAddress {
    Field(AddressField),
    Range(i64, i64),
}

/// A successful parse, plus any non-fatal diagnostics raised along the
/// way (e.g. a decimal literal written without its `D` suffix). The
/// parse still produced a usable value in that case; the pipeline
/// never aborts on a cuss.
pub struct AddressFieldResult {
    pub address: ParsedAddress,
    pub cusses: Vec<Cuss>,
}

pub fn parse_address_field(
    operand: &str,
    index_necessity: IndexNecessity,
    range_allowed: bool,
    max_value: i64,
    target: &Target,
) -> Result<AddressFieldResult, Cuss> {
    let operand = operand.trim();
    if operand.is_empty() {
        return Ok(AddressFieldResult {
            address: ParsedAddress::Field(AddressField::omitted()),
            cusses: Vec::new(),
        });
    }

    let words: Vec<&str> = operand.split_whitespace().collect();

    if range_allowed && words.len() == 3 && words[1] == "-" {
        let (low, mut cusses) = parse_unsigned_literal(words[0], target)?;
        let (high, high_cusses) = parse_unsigned_literal(words[2], target)?;
        cusses.extend(high_cusses);
        if high < low {
            return Err(Cuss::new(CussSerial::INVERTED_RANGE).with_context(operand));
        }
        if low > max_value || high > max_value {
            return Err(Cuss::new(CussSerial::NUMERIC_OVERFLOW).with_context(operand));
        }
        return Ok(AddressFieldResult {
            address: ParsedAddress::Range(low, high),
            cusses,
        });
    }

    let (token, index_register) = split_index_suffix(words[0])?;

    match (index_register, index_necessity) {
        (Some(_), IndexNecessity::Never) => {
            return Err(Cuss::new(CussSerial::INDEX_REGISTER_SUFFIX).with_context(operand))
        }
        (None, IndexNecessity::Required) => {
            return Err(Cuss::new(CussSerial::INDEX_REGISTER_SUFFIX).with_context(operand))
        }
        _ => {}
    }

    let (value, mut cusses) = classify_token(token, target)?;

    if let AddressValue::Unsigned(n) = value {
        if n > max_value {
            return Err(Cuss::new(CussSerial::NUMERIC_OVERFLOW).with_context(operand));
        }
    }

    let offset = if words.len() > 1 {
        let (offset, offset_cusses) = parse_signed_literal(words[1])?;
        cusses.extend(offset_cusses);
        Some(offset)
    } else {
        None
    };

    Ok(AddressFieldResult {
        address: ParsedAddress::Field(AddressField {
            value,
            offset,
            index_register,
        }),
        cusses,
    })
}

fn split_index_suffix(token: &str) -> Result<(&str, Option<u8>), Cuss> {
    match token.split_once(',') {
        Some((left, "1")) => Ok((left, Some(1))),
        Some((left, "2")) => Ok((left, Some(2))),
        Some(_) => Err(Cuss::new(CussSerial::BAD_ADDRESS_FIELD).with_context(token)),
        None => Ok((token, None)),
    }
}

fn classify_token(token: &str, target: &Target) -> Result<(AddressValue, Vec<Cuss>), Cuss> {
    if let Some(rest) = token.strip_prefix(['+', '-']) {
        let digits = rest.strip_suffix('D').unwrap_or(rest);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            let (magnitude, cusses) = parse_signed_literal(token)?;
            return Ok((AddressValue::Signed(magnitude), cusses));
        }
    }

    if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit() || c == 'D') {
        let (value, cusses) = parse_unsigned_literal(token, target)?;
        return Ok((AddressValue::Unsigned(value), cusses));
    }

    Ok((AddressValue::Symbol(token.to_string()), Vec::new()))
}

/// Parses an unsigned TOKEN per spec.md §4.3's octal/decimal rule,
/// returning any non-fatal diagnostic (decimal-without-`D`) alongside
/// the best-effort value.
pub(crate) fn parse_unsigned_literal(token: &str, target: &Target) -> Result<(i64, Vec<Cuss>), Cuss> {
    let has_d = token.ends_with('D');
    let digits = if has_d { &token[..token.len() - 1] } else { token };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Cuss::new(CussSerial::BAD_ADDRESS_FIELD).with_context(token));
    }

    if has_d {
        let value = digits
            .parse::<i64>()
            .map_err(|_| Cuss::new(CussSerial::NUMERIC_OVERFLOW).with_context(token))?;
        return Ok((value, Vec::new()));
    }

    if digits.len() <= 7 {
        if digits.chars().all(|c| c <= '7') {
            let value = i64::from_str_radix(digits, 8)
                .map_err(|_| Cuss::new(CussSerial::NUMERIC_OVERFLOW).with_context(token))?;
            Ok((value, Vec::new()))
        } else {
            Err(Cuss::new(CussSerial::BAD_ADDRESS_FIELD).with_context(token))
        }
    } else {
        let value = digits
            .parse::<i64>()
            .map_err(|_| Cuss::new(CussSerial::NUMERIC_OVERFLOW).with_context(token))?;
        let cusses = if target.decimal_without_d_is_error() {
            vec![Cuss::new(CussSerial::DECIMAL_WITHOUT_D).with_context(token)]
        } else {
            Vec::new()
        };
        Ok((value, cusses))
    }
}

pub(crate) fn parse_signed_literal(token: &str) -> Result<(i64, Vec<Cuss>), Cuss> {
    let negative = token.starts_with('-');
    let rest = token.trim_start_matches(['+', '-']);
    let digits = rest.strip_suffix('D').unwrap_or(rest);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Cuss::new(CussSerial::BAD_ADDRESS_FIELD).with_context(token));
    }

    let magnitude: i64 = digits
        .parse()
        .map_err(|_| Cuss::new(CussSerial::NUMERIC_OVERFLOW).with_context(token))?;

    Ok((if negative { -magnitude } else { magnitude }, Vec::new()))
}
