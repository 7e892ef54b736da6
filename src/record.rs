//! Persisted capture line record and its timestamp types
use super::error::CaptureError;
use super::lifecycle::{LineEvent, LineState, Usage};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

/// A calendar date without time, stored as days since the common era.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct DateStamp(NaiveDate);

// Key is the 27-digit code
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    #[n(0)]
    pub code: String,
    #[n(1)]
    pub amount_cents: u64,
    #[n(2)]
    pub concept: String, // human description, not the 2-digit code
    #[n(3)]
    pub external_reference: Option<String>, // plate, folio
    #[n(4)]
    pub issued_at: TimeStamp<Utc>,
    #[n(5)]
    pub expires_on: DateStamp, // business-day expiry, independent of the code's validity field
    #[n(6)]
    pub state: LineState,
    #[n(7)]
    pub used_by: Option<String>,
    #[n(8)]
    pub used_at: Option<TimeStamp<Utc>>,
    #[n(9)]
    pub payment_reference: Option<String>,
    #[n(10)]
    pub batch_id: Option<String>,
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl DateStamp {
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for DateStamp {
    fn from(value: NaiveDate) -> Self {
        DateStamp(value)
    }
}

impl LineRecord {
    /// A fresh record in the `available` state.
    pub fn new(
        code: String,
        amount_cents: u64,
        concept: String,
        issued_at: TimeStamp<Utc>,
        expires_on: NaiveDate,
    ) -> Self {
        Self {
            code,
            amount_cents,
            concept,
            external_reference: None,
            issued_at,
            expires_on: expires_on.into(),
            state: LineState::Available,
            used_by: None,
            used_at: None,
            payment_reference: None,
            batch_id: None,
        }
    }
    pub fn set_external_reference(mut self, reference: Option<String>) -> Self {
        self.external_reference = reference;
        self
    }
    pub fn set_batch_id(mut self, batch_id: String) -> Self {
        self.batch_id = Some(batch_id);
        self
    }
    pub fn amount(&self) -> f64 {
        super::field::cents_to_major(self.amount_cents)
    }
    pub fn expires_on(&self) -> NaiveDate {
        self.expires_on.date()
    }

    /// Runs the lifecycle transition and records usage metadata on success.
    pub fn apply(&mut self, event: &LineEvent) -> Result<LineState, CaptureError> {
        let next = self.state.apply(event)?;
        self.state = next;
        if let LineEvent::Use(usage) = event {
            self.record_usage(usage);
        }
        Ok(next)
    }

    pub(crate) fn record_usage(&mut self, usage: &Usage) {
        self.used_by = usage.paid_by.clone();
        self.payment_reference = usage.payment_reference.clone();
        self.used_at = Some(usage.at.clone());
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

impl<C> minicbor::Encode<C> for DateStamp {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i32(self.0.num_days_from_ce())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for DateStamp {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .map(DateStamp)
            .ok_or(minicbor::decode::Error::message(
                "failed to convert day count to a calendar date",
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LineRecord {
        LineRecord::new(
            "090100001932001500002611035".into(),
            150_000,
            "Multa de tránsito".into(),
            TimeStamp::new_with(2026, 10, 19, 9, 30, 0).unwrap(),
            NaiveDate::from_ymd_opt(2026, 11, 9).unwrap(),
        )
    }

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn record_encoding() {
        let mut record = sample().set_external_reference(Some("ABC-123".into()));
        record
            .apply(&LineEvent::Use(Usage {
                paid_by: Some("ventanilla 4".into()),
                payment_reference: None,
                at: TimeStamp::new(),
            }))
            .unwrap();

        let encoding = minicbor::to_vec(&record).unwrap();
        let decode: LineRecord = minicbor::decode(&encoding).unwrap();

        assert_eq!(record, decode);
        assert_eq!(decode.expires_on(), NaiveDate::from_ymd_opt(2026, 11, 9).unwrap());
    }

    #[test]
    fn apply_records_usage_once() {
        let mut record = sample();
        let usage = Usage {
            paid_by: Some("BBVA".into()),
            payment_reference: Some("REF-9".into()),
            at: TimeStamp::new_with(2026, 10, 20, 8, 0, 0).unwrap(),
        };

        assert_eq!(record.apply(&LineEvent::Use(usage.clone())), Ok(LineState::Used));
        assert_eq!(record.used_by.as_deref(), Some("BBVA"));
        assert_eq!(record.payment_reference.as_deref(), Some("REF-9"));
        assert_eq!(record.used_at, Some(usage.at.clone()));

        // the second attempt leaves the first payment untouched
        let again = Usage {
            paid_by: Some("HSBC".into()),
            ..usage
        };
        assert!(record.apply(&LineEvent::Use(again)).is_err());
        assert_eq!(record.used_by.as_deref(), Some("BBVA"));
    }

    #[test]
    fn amount_in_major_units() {
        assert_eq!(sample().amount(), 1500.0);
    }
}
