//! Service layer API for issuing and settling capture lines
use super::calendar::{Clock, SystemClock, add_business_days};
use super::config::CaptureConfig;
use super::error::{CaptureError, LedgerError};
use super::field::Field;
use super::lifecycle::{LineEvent, LineState, Usage, expiry_due};
use super::line::{CaptureLine, Codec, LineRequest, strip_separators};
use super::record::{LineRecord, TimeStamp};
use super::store::LineStore;
use super::utils;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::HashSet;
use std::sync::Mutex;

const BATCH_CONCEPT: &str = "pre-generated line";

pub struct LineService<S, C = SystemClock, R = StdRng> {
    store: S,
    codec: Codec,
    clock: C,
    rng: Mutex<R>,
}

impl<S: LineStore> LineService<S> {
    /// Service backed by the system clock and an entropy-seeded RNG.
    pub fn new(store: S, config: CaptureConfig) -> Self {
        Self::with_parts(store, config, SystemClock, StdRng::from_entropy())
    }
}

impl<S: LineStore, C: Clock, R: RngCore> LineService<S, C, R> {
    pub fn with_parts(store: S, config: CaptureConfig, clock: C, rng: R) -> Self {
        Self {
            store,
            codec: Codec::new(config),
            clock,
            rng: Mutex::new(rng),
        }
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }
    pub fn store(&self) -> &S {
        &self.store
    }
    fn config(&self) -> &CaptureConfig {
        self.codec.config()
    }

    fn draw(&self, request: &LineRequest, now: DateTime<Utc>) -> anyhow::Result<CaptureLine> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| anyhow::anyhow!("random source lock poisoned"))?;
        Ok(self.codec.encode(request, now, &mut *rng)?)
    }

    fn describe_concept(&self, line: &CaptureLine) -> String {
        self.config()
            .concept_name(line.field(Field::Concept))
            .unwrap_or("capture line payment")
            .to_string()
    }

    /// Issue a new line and store it as available.
    ///
    /// The request's reference (plate, folio) is kept on the record as the
    /// external reference, while the code itself always carries a random
    /// reference. Two fines for the same plate and amount on the same day
    /// therefore get distinct codes. Codes that already exist are redrawn up
    /// to `max_issue_attempts` times.
    pub fn issue(
        &self,
        request: LineRequest,
        concept: Option<String>,
    ) -> anyhow::Result<LineRecord> {
        if request.amount().is_nan() || request.amount() <= 0.0 {
            return Err(LedgerError::NonPositiveAmount.into());
        }

        let now = self.clock.now();
        let expires_on = add_business_days(now, self.config().expiry_business_days);
        let attempts = self.config().max_issue_attempts;
        let external_reference = request.reference().map(str::to_string);
        let request = request.without_reference();

        for attempt in 1..=attempts {
            let line = self.draw(&request, now)?;

            if self.store.exists(line.as_str())? {
                tracing::warn!(attempt, code = %line, "capture line collision on lookup");
                continue;
            }

            let concept = concept.clone().unwrap_or_else(|| self.describe_concept(&line));
            let record = LineRecord::new(
                line.into_string(),
                super::field::amount_to_cents(request.amount())?,
                concept,
                now.into(),
                expires_on,
            )
            .set_external_reference(external_reference.clone());

            match self.store.insert(&record) {
                Ok(()) => {
                    tracing::info!(code = %record.code, amount_cents = record.amount_cents, expires_on = %expires_on, "issued capture line");
                    return Ok(record);
                }
                // another issuer stored the same code between lookup and insert
                Err(err) if is_duplicate(&err) => {
                    tracing::warn!(attempt, code = %record.code, "capture line collision on insert");
                }
                Err(err) => return Err(err),
            }
        }

        Err(LedgerError::UniqueCodeExhausted { attempts }.into())
    }

    /// Pre-generate `count` lines with random references (default 10).
    pub fn issue_batch(
        &self,
        count: Option<usize>,
        default_amount: f64,
    ) -> anyhow::Result<Vec<LineRecord>> {
        let count = count.unwrap_or(self.config().default_batch_size);
        let max = self.config().max_batch_size;
        if count > max {
            return Err(LedgerError::BatchTooLarge {
                requested: count,
                max,
            }
            .into());
        }

        let now = self.clock.now();
        let expires_on = add_business_days(now, self.config().expiry_business_days);
        let batch_id = utils::new_batch_id()?;
        let request = LineRequest::new().set_amount(default_amount);
        let attempts = self.config().max_issue_attempts;

        let mut seen = HashSet::with_capacity(count);
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            let mut drawn = None;
            for _ in 0..attempts {
                let line = self.draw(&request, now)?;
                if !seen.contains(&line) && !self.store.exists(line.as_str())? {
                    drawn = Some(line);
                    break;
                }
            }
            let line = drawn.ok_or(LedgerError::UniqueCodeExhausted { attempts })?;
            seen.insert(line.clone());

            let record = LineRecord::new(
                line.into_string(),
                super::field::amount_to_cents(default_amount)?,
                BATCH_CONCEPT.to_string(),
                now.into(),
                expires_on,
            )
            .set_batch_id(batch_id.clone());
            records.push(record);
        }

        self.store.insert_batch(&records)?;
        tracing::info!(%batch_id, generated = records.len(), "issued capture line batch");

        Ok(records)
    }

    /// Available, unexpired lines oldest first (default 10).
    pub fn list_available(&self, limit: Option<usize>) -> anyhow::Result<Vec<LineRecord>> {
        let limit = limit.unwrap_or(self.config().default_list_limit);
        self.store.list_available(limit, self.clock.today())
    }

    /// Check a code before accepting a payment for it.
    ///
    /// The code must pass the codec checks and exist in the store in the
    /// `available` state. A line found past its expiry date is moved to
    /// `expired` before the error is returned.
    pub fn validate_for_payment(&self, code: &str) -> anyhow::Result<LineRecord> {
        let decoded = self.codec.decode(code)?;
        let key = decoded.line.as_str();

        let record = self
            .store
            .find_by_code(key)?
            .ok_or_else(|| LedgerError::NotFound(key.to_string()))?;

        if let Some(refused) = refusal(&record, record.state) {
            return Err(refused.into());
        }

        let today = self.clock.today();
        if expiry_due(record.state, record.expires_on(), today) {
            if let Err(err) = self.store.update_state(key, &LineEvent::Expire) {
                // settled or cancelled by another caller after the read above
                let raced = match err.downcast_ref::<CaptureError>() {
                    Some(CaptureError::InvalidStateTransition { current, .. }) => {
                        refusal(&record, *current)
                    }
                    _ => None,
                };
                return Err(raced.map(anyhow::Error::from).unwrap_or(err));
            }
            tracing::info!(code = key, expires_on = %record.expires_on(), "capture line expired");
            return Err(LedgerError::Expired {
                expires_on: record.expires_on(),
                code: record.code,
            }
            .into());
        }

        Ok(record)
    }

    /// Mark a line as used once its payment is confirmed.
    ///
    /// Fails with `LedgerError::NotFound` for unknown codes and with
    /// `CaptureError::InvalidStateTransition`, carrying the current state,
    /// when the line is not available.
    pub fn mark_used(
        &self,
        code: &str,
        payment_reference: Option<String>,
        paid_by: Option<String>,
    ) -> anyhow::Result<LineRecord> {
        let key = strip_separators(code);
        let usage = Usage {
            paid_by,
            payment_reference,
            at: TimeStamp::from(self.clock.now()),
        };
        let record = self.store.update_state(&key, &LineEvent::Use(usage))?;
        tracing::info!(code = %record.code, "capture line marked as used");

        Ok(record)
    }

    pub fn lookup(&self, code: &str) -> anyhow::Result<LineRecord> {
        let key = strip_separators(code);
        match self.store.find_by_code(&key)? {
            Some(record) => Ok(record),
            None => Err(LedgerError::NotFound(key).into()),
        }
    }
}

/// Why a line in `state` can't be paid, if it can't.
fn refusal(record: &LineRecord, state: LineState) -> Option<LedgerError> {
    match state {
        LineState::Available => None,
        LineState::Used => Some(LedgerError::AlreadyUsed(record.code.clone())),
        LineState::Cancelled => Some(LedgerError::Cancelled(record.code.clone())),
        LineState::Expired => Some(LedgerError::Expired {
            code: record.code.clone(),
            expires_on: record.expires_on(),
        }),
    }
}

fn is_duplicate(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<LedgerError>(),
        Some(LedgerError::DuplicateCode(_))
    )
}
