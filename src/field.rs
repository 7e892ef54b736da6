//! Fixed-width field encoding for capture lines
use super::config::OverflowPolicy;
use super::error::CaptureError;
use chrono::NaiveDate;
use std::fmt;

/// Base digits covered by the check digit.
pub const BASE_LEN: usize = 26;
/// Full code length, base plus check digit.
pub const LINE_LEN: usize = 27;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Entity,
    Concept,
    Reference,
    Amount,
    Validity,
    CheckDigit,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Entity,
        Field::Concept,
        Field::Reference,
        Field::Amount,
        Field::Validity,
        Field::CheckDigit,
    ];

    pub fn width(self) -> usize {
        match self {
            Field::Entity | Field::Concept => 2,
            Field::Reference | Field::Amount => 8,
            Field::Validity => 6,
            Field::CheckDigit => 1,
        }
    }
    pub fn offset(self) -> usize {
        match self {
            Field::Entity => 0,
            Field::Concept => 2,
            Field::Reference => 4,
            Field::Amount => 12,
            Field::Validity => 20,
            Field::CheckDigit => 26,
        }
    }
    /// Slice this field out of a 27-digit code.
    pub fn slice(self, line: &str) -> &str {
        &line[self.offset()..self.offset() + self.width()]
    }
    pub fn name(self) -> &'static str {
        match self {
            Field::Entity => "entity",
            Field::Concept => "concept",
            Field::Reference => "reference",
            Field::Amount => "amount",
            Field::Validity => "validity",
            Field::CheckDigit => "check digit",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Zero-pads `value` to the field width.
///
/// A value with more digits than the field keeps only its low-order digits
/// under [`OverflowPolicy::Truncate`] and is refused under
/// [`OverflowPolicy::Reject`].
pub fn fit_number(field: Field, value: u64, policy: OverflowPolicy) -> Result<String, CaptureError> {
    fit_digits_unchecked(field, &value.to_string(), policy)
}

/// Same as [`fit_number`] for codes given as digit strings, e.g. `"9"` or `"0901"`.
pub fn fit_digits(field: Field, code: &str, policy: OverflowPolicy) -> Result<String, CaptureError> {
    let code = code.trim();
    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CaptureError::InvalidFieldCode {
            field,
            value: code.to_string(),
        });
    }
    fit_digits_unchecked(field, code, policy)
}

fn fit_digits_unchecked(
    field: Field,
    digits: &str,
    policy: OverflowPolicy,
) -> Result<String, CaptureError> {
    let width = field.width();
    if digits.len() <= width {
        return Ok(format!("{digits:0>width$}"));
    }

    match policy {
        OverflowPolicy::Reject => Err(CaptureError::EncodingOverflow {
            field,
            value: digits.to_string(),
            width,
        }),
        OverflowPolicy::Truncate => {
            let kept = &digits[digits.len() - width..];
            tracing::warn!(%field, value = digits, kept, "field overflow truncated to low-order digits");
            Ok(kept.to_string())
        }
    }
}

/// Folds a free-form reference (plate, folio) into an integer.
///
/// Everything but ASCII letters and digits is dropped, letters are
/// uppercased, and each remaining character code is multiplied by its
/// 1-based position before summing.
pub fn fold_reference(reference: &str) -> u64 {
    reference
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .enumerate()
        .fold(0u64, |acc, (i, c)| {
            acc.saturating_add((c as u64).saturating_mul(i as u64 + 1))
        })
}

/// Converts major currency units to cents, rounding half away from zero.
pub fn amount_to_cents(amount: f64) -> Result<u64, CaptureError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(CaptureError::InvalidAmount(amount));
    }
    let cents = (amount * 100.0).round();
    if cents > u64::MAX as f64 {
        return Err(CaptureError::InvalidAmount(amount));
    }
    Ok(cents as u64)
}

pub fn cents_to_major(cents: u64) -> f64 {
    cents as f64 / 100.0
}

pub fn encode_validity(date: NaiveDate) -> String {
    date.format("%y%m%d").to_string()
}

/// Cents held in an 8-digit amount field. Non-digit input decodes as zero.
pub fn decode_amount(field: &str) -> u64 {
    field.parse().unwrap_or(0)
}

/// Reads a `YYMMDD` field as a date in the 2000s.
///
/// Returns `None` when the digits don't name a real calendar day.
pub fn decode_validity(field: &str) -> Option<NaiveDate> {
    if field.len() != Field::Validity.width() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = field[0..2].parse().ok()?;
    let month: u32 = field[2..4].parse().ok()?;
    let day: u32 = field[4..6].parse().ok()?;

    NaiveDate::from_ymd_opt(2000 + year, month, day)
}
