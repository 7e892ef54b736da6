//! Capture line codec
//!
//! A capture line is 27 decimal digits laid out as
//! `EE CC RRRRRRRR IIIIIIII YYMMDD V`: entity, concept, reference, amount in
//! cents, validity date and a MOD 11 check digit over the first 26 digits.
use super::calendar::add_calendar_days;
use super::checksum::mod11_check_digit;
use super::config::CaptureConfig;
use super::error::CaptureError;
use super::field::{self, BASE_LEN, Field, LINE_LEN};
use chrono::{DateTime, NaiveDate, Utc};
use rand::{Rng, RngCore};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const REFERENCE_SPACE: u64 = 100_000_000;

/// A well-formed 27-digit code with a correct check digit.
///
/// Only the codec builds these, so holding one means the layout and the
/// check digit have been verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaptureLine(String);

/// Parameters for a new capture line. Unset fields fall back to the codec's
/// configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineRequest {
    entity: Option<String>,
    concept: Option<String>,
    reference: Option<String>,
    amount: f64,
    validity_days: Option<u32>,
}

/// Fields recovered from a validated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLine {
    pub line: CaptureLine,
    pub entity: String,
    pub concept: String,
    pub reference: String,
    pub amount_cents: u64,
    pub validity: String,
    pub check_digit: u8,
}

/// Component view of a code for display. Built without checking the check digit.
#[derive(Debug, Clone, PartialEq)]
pub struct LineBreakdown {
    pub entity: String,
    pub concept: String,
    pub reference: String,
    pub amount: f64,
    pub amount_cents: u64,
    pub validity: String,
    pub validity_date: Option<NaiveDate>,
    pub check_digit: u8,
    pub formatted: String,
}

#[derive(Debug, Clone, Default)]
pub struct Codec {
    config: CaptureConfig,
}

impl LineRequest {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_entity(mut self, code: &str) -> Self {
        self.entity = Some(code.into());
        self
    }
    pub fn set_concept(mut self, code: &str) -> Self {
        self.concept = Some(code.into());
        self
    }
    /// Free-form reference such as a licence plate. Empty means "random".
    pub fn set_reference(mut self, reference: &str) -> Self {
        self.reference = Some(reference.into());
        self
    }
    pub fn set_amount(mut self, amount: f64) -> Self {
        self.amount = amount;
        self
    }
    pub fn set_validity_days(mut self, days: u32) -> Self {
        self.validity_days = Some(days);
        self
    }
    pub fn amount(&self) -> f64 {
        self.amount
    }
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref().filter(|r| !r.is_empty())
    }
    /// Same request with the reference cleared, so the codec draws one.
    pub fn without_reference(mut self) -> Self {
        self.reference = None;
        self
    }
}

impl Codec {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Builds the code for `request` as issued at `issued_at`.
    ///
    /// `rng` is only drawn from when the request has no reference. Equal
    /// inputs with a reference always produce equal codes.
    pub fn encode<R: RngCore>(
        &self,
        request: &LineRequest,
        issued_at: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<CaptureLine, CaptureError> {
        let policy = self.config.overflow;

        let entity_code = request.entity.as_deref().unwrap_or(&self.config.default_entity);
        let entity = field::fit_digits(Field::Entity, entity_code, policy)?;
        if self.enforces(&self.config.entities) && !self.config.entities.contains_key(&entity) {
            return Err(CaptureError::UnknownEntity(entity));
        }

        let concept_code = request.concept.as_deref().unwrap_or(&self.config.default_concept);
        let concept = field::fit_digits(Field::Concept, concept_code, policy)?;
        if self.enforces(&self.config.concepts) && !self.config.concepts.contains_key(&concept) {
            return Err(CaptureError::UnknownConcept(concept));
        }

        let reference = match request.reference() {
            Some(text) => field::fit_number(Field::Reference, field::fold_reference(text), policy)?,
            None => {
                let drawn = rng.gen_range(0..REFERENCE_SPACE);
                field::fit_number(Field::Reference, drawn, policy)?
            }
        };

        let cents = field::amount_to_cents(request.amount)?;
        let amount = field::fit_number(Field::Amount, cents, policy)?;

        let days = request.validity_days.unwrap_or(self.config.default_validity_days);
        let validity = field::encode_validity(add_calendar_days(issued_at, days));

        let base = format!("{entity}{concept}{reference}{amount}{validity}");
        let check = mod11_check_digit(&base);
        let line = CaptureLine(format!("{base}{check}"));

        tracing::debug!(code = %line, random_reference = request.reference().is_none(), "encoded capture line");

        Ok(line)
    }

    pub fn decode(&self, candidate: &str) -> Result<DecodedLine, CaptureError> {
        decode(candidate)
    }

    fn enforces(&self, table: &BTreeMap<String, String>) -> bool {
        self.config.enforce_code_tables && !table.is_empty()
    }
}

impl CaptureLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn into_string(self) -> String {
        self.0
    }
    /// The 26 digits covered by the check digit.
    pub fn base(&self) -> &str {
        &self.0[..BASE_LEN]
    }
    pub fn field(&self, field: Field) -> &str {
        field.slice(&self.0)
    }
    pub fn check_digit(&self) -> u8 {
        self.0.as_bytes()[BASE_LEN] - b'0'
    }
    /// `EE CC RRRRRRRR IIIIIIII YYMMDD V`
    pub fn formatted(&self) -> String {
        Field::ALL
            .iter()
            .map(|f| self.field(*f))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CaptureLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CaptureLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CaptureLine {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s).map(|decoded| decoded.line)
    }
}

impl DecodedLine {
    pub fn amount(&self) -> f64 {
        field::cents_to_major(self.amount_cents)
    }
    pub fn validity_date(&self) -> Option<NaiveDate> {
        field::decode_validity(&self.validity)
    }
}

/// Removes the whitespace and hyphen separators people type into codes.
pub fn strip_separators(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Parses and verifies a candidate code.
///
/// Separators are stripped first. Wrong length or non-digit characters give
/// [`CaptureError::Format`]; a wrong trailing digit gives
/// [`CaptureError::Checksum`].
pub fn decode(candidate: &str) -> Result<DecodedLine, CaptureError> {
    let digits = strip_separators(candidate);

    let len = digits.chars().count();
    if len != LINE_LEN {
        return Err(CaptureError::Format {
            reason: format!("expected {LINE_LEN} digits, got {len}"),
        });
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CaptureError::Format {
            reason: "code must contain only digits".into(),
        });
    }

    let expected = mod11_check_digit(&digits[..BASE_LEN]);
    let found = digits.as_bytes()[BASE_LEN] - b'0';
    if expected != found {
        return Err(CaptureError::Checksum { expected, found });
    }

    let line = CaptureLine(digits);
    Ok(DecodedLine {
        entity: line.field(Field::Entity).to_string(),
        concept: line.field(Field::Concept).to_string(),
        reference: line.field(Field::Reference).to_string(),
        amount_cents: field::decode_amount(line.field(Field::Amount)),
        validity: line.field(Field::Validity).to_string(),
        check_digit: found,
        line,
    })
}

/// Spaces a code into its fields. Anything that isn't 27 characters after
/// stripping separators comes back unchanged.
pub fn format_display(input: &str) -> String {
    let digits = strip_separators(input);
    if digits.len() != LINE_LEN || !digits.is_ascii() {
        return input.to_string();
    }
    Field::ALL
        .iter()
        .map(|f| f.slice(&digits))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits a code into display components without verifying the check digit.
pub fn breakdown(input: &str) -> Option<LineBreakdown> {
    let digits = strip_separators(input);
    if digits.len() != LINE_LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let amount_cents = field::decode_amount(Field::Amount.slice(&digits));
    let validity = Field::Validity.slice(&digits).to_string();

    Some(LineBreakdown {
        entity: Field::Entity.slice(&digits).to_string(),
        concept: Field::Concept.slice(&digits).to_string(),
        reference: Field::Reference.slice(&digits).to_string(),
        amount: field::cents_to_major(amount_cents),
        amount_cents,
        validity_date: field::decode_validity(&validity),
        validity,
        check_digit: digits.as_bytes()[BASE_LEN] - b'0',
        formatted: format_display(&digits),
    })
}
