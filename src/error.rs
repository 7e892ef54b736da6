use super::field::Field;
use super::lifecycle::LineState;
use chrono::NaiveDate;

/// Errors raised by the codec and the lifecycle transition function.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("invalid input: {reason}")]
    Format { reason: String },
    #[error("invalid code: check digit is {found}, expected {expected}")]
    Checksum { expected: u8, found: u8 },
    #[error("cannot apply '{event}' to a line that is {current}")]
    InvalidStateTransition {
        current: LineState,
        event: &'static str,
    },
    #[error("{field} value {value} does not fit in {width} digits")]
    EncodingOverflow {
        field: Field,
        value: String,
        width: usize,
    },
    #[error("amount must be a finite, non-negative number (got {0})")]
    InvalidAmount(f64),
    #[error("{field} code must be decimal digits (got {value:?})")]
    InvalidFieldCode { field: Field, value: String },
    #[error("entity code {0} is not configured")]
    UnknownEntity(String),
    #[error("concept code {0} is not configured")]
    UnknownConcept(String),
}

/// Errors raised by the ledger service while driving a stored line.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("capture line {0} not found")]
    NotFound(String),
    #[error("capture line {0} was already used")]
    AlreadyUsed(String),
    #[error("capture line {0} was cancelled")]
    Cancelled(String),
    #[error("capture line {code} expired on {expires_on}")]
    Expired { code: String, expires_on: NaiveDate },
    #[error("capture line {0} already exists")]
    DuplicateCode(String),
    #[error("could not generate a unique code after {attempts} attempts")]
    UniqueCodeExhausted { attempts: usize },
    #[error("batch of {requested} lines exceeds the maximum of {max}")]
    BatchTooLarge { requested: usize, max: usize },
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {key} has an invalid value {value:?}")]
    InvalidValue { key: &'static str, value: String },
}
