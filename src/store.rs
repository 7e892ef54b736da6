//! Persistence collaborator for issued capture lines
use super::error::LedgerError;
use super::lifecycle::{LineEvent, LineState};
use super::record::LineRecord;
use chrono::NaiveDate;
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError};
use std::sync::Arc;

const LINES_TREE: &str = "capture_lines";

/// What the ledger needs from storage. Records are keyed by the 27-digit code.
pub trait LineStore {
    fn exists(&self, code: &str) -> anyhow::Result<bool>;

    /// Fails with [`LedgerError::DuplicateCode`] if the code is already stored.
    fn insert(&self, record: &LineRecord) -> anyhow::Result<()>;

    /// All-or-nothing insert of a batch.
    fn insert_batch(&self, records: &[LineRecord]) -> anyhow::Result<()>;

    fn find_by_code(&self, code: &str) -> anyhow::Result<Option<LineRecord>>;

    /// Moves the stored line through `event` and returns the updated record.
    /// Usage metadata travels inside [`LineEvent::Use`].
    fn update_state(&self, code: &str, event: &LineEvent) -> anyhow::Result<LineRecord>;

    /// Available lines whose expiry is on or after `as_of`, oldest issue first.
    fn list_available(&self, limit: usize, as_of: NaiveDate) -> anyhow::Result<Vec<LineRecord>>;
}

pub struct SledStore {
    instance: Arc<sled::Db>,
    lines: sled::Tree,
}

impl SledStore {
    pub fn new(instance: Arc<sled::Db>) -> anyhow::Result<Self> {
        let lines = instance.open_tree(LINES_TREE)?;
        Ok(Self { instance, lines })
    }

    pub fn flush(&self) -> anyhow::Result<()> {
        self.instance.flush()?;
        Ok(())
    }

    fn decode(bytes: &[u8]) -> anyhow::Result<LineRecord> {
        Ok(minicbor::decode(bytes)?)
    }
}

impl LineStore for SledStore {
    fn exists(&self, code: &str) -> anyhow::Result<bool> {
        Ok(self.lines.contains_key(code.as_bytes())?)
    }

    fn insert(&self, record: &LineRecord) -> anyhow::Result<()> {
        let cbor = minicbor::to_vec(record)?;

        // only write when the key is absent
        self.lines
            .compare_and_swap(record.code.as_bytes(), None as Option<&[u8]>, Some(cbor))?
            .map_err(|_| LedgerError::DuplicateCode(record.code.clone()))?;

        Ok(())
    }

    fn insert_batch(&self, records: &[LineRecord]) -> anyhow::Result<()> {
        let encoded = records
            .iter()
            .map(|record| -> anyhow::Result<(String, Vec<u8>)> {
                Ok((record.code.clone(), minicbor::to_vec(record)?))
            })
            .collect::<anyhow::Result<Vec<(String, Vec<u8>)>>>()?;

        let result = self
            .lines
            .transaction(|tx| -> ConflictableTransactionResult<(), LedgerError> {
                for (code, cbor) in &encoded {
                    if tx.get(code.as_bytes())?.is_some() {
                        return Err(ConflictableTransactionError::Abort(
                            LedgerError::DuplicateCode(code.clone()),
                        ));
                    }
                    tx.insert(code.as_bytes(), cbor.as_slice())?;
                }
                Ok(())
            });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(err)) => Err(err.into()),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    fn find_by_code(&self, code: &str) -> anyhow::Result<Option<LineRecord>> {
        match self.lines.get(code.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn update_state(&self, code: &str, event: &LineEvent) -> anyhow::Result<LineRecord> {
        loop {
            let Some(current) = self.lines.get(code.as_bytes())? else {
                return Err(LedgerError::NotFound(code.to_string()).into());
            };

            let mut record = Self::decode(&current)?;
            record.apply(event)?;
            let updated = minicbor::to_vec(&record)?;

            // a concurrent writer changed the record between read and write; re-read
            // and let the lifecycle decide again
            if self
                .lines
                .compare_and_swap(code.as_bytes(), Some(current), Some(updated))?
                .is_ok()
            {
                return Ok(record);
            }
        }
    }

    fn list_available(&self, limit: usize, as_of: NaiveDate) -> anyhow::Result<Vec<LineRecord>> {
        let mut available = Vec::new();
        for entry in self.lines.iter() {
            let (_, bytes) = entry?;
            let record = Self::decode(&bytes)?;
            if record.state == LineState::Available && record.expires_on() >= as_of {
                available.push(record);
            }
        }

        available.sort_by(|a, b| {
            a.issued_at
                .to_datetime_utc()
                .cmp(&b.issued_at.to_datetime_utc())
                .then_with(|| a.code.cmp(&b.code))
        });
        available.truncate(limit);

        Ok(available)
    }
}
