//! Immutable configuration handed to the codec and the ledger service
use super::error::ConfigError;
use std::collections::BTreeMap;

/// What to do when a value has more digits than its field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Keep the low-order digits. Matches codes already in circulation.
    #[default]
    Truncate,
    /// Fail the encode with `CaptureError::EncodingOverflow`.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// entity code -> issuing authority
    pub entities: BTreeMap<String, String>,
    /// concept code -> obligation type
    pub concepts: BTreeMap<String, String>,
    /// refuse entity/concept codes missing from the tables above
    pub enforce_code_tables: bool,
    pub default_entity: String,
    pub default_concept: String,
    /// calendar days embedded in the code's validity field
    pub default_validity_days: u32,
    /// business days used for the persisted expiry date
    pub expiry_business_days: u32,
    pub default_batch_size: usize,
    pub max_batch_size: usize,
    pub default_list_limit: usize,
    pub max_issue_attempts: usize,
    pub overflow: OverflowPolicy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            entities: BTreeMap::from([("09".to_string(), "Ciudad de México".to_string())]),
            concepts: BTreeMap::from([("01".to_string(), "Multa de tránsito".to_string())]),
            enforce_code_tables: false,
            default_entity: "09".into(),
            default_concept: "01".into(),
            default_validity_days: 15,
            expiry_business_days: 15,
            default_batch_size: 10,
            max_batch_size: 100,
            default_list_limit: 10,
            max_issue_attempts: 5,
            overflow: OverflowPolicy::Truncate,
        }
    }
}

impl CaptureConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_entity(mut self, code: &str, name: &str) -> Self {
        self.entities.insert(code.into(), name.into());
        self
    }
    pub fn with_concept(mut self, code: &str, name: &str) -> Self {
        self.concepts.insert(code.into(), name.into());
        self
    }
    /// Only codes present in the entity and concept tables are encoded.
    pub fn with_code_table_enforcement(mut self) -> Self {
        self.enforce_code_tables = true;
        self
    }
    /// Drops both code tables, so no names are known and nothing is enforced.
    pub fn without_code_tables(mut self) -> Self {
        self.entities.clear();
        self.concepts.clear();
        self
    }
    pub fn with_validity_days(mut self, days: u32) -> Self {
        self.default_validity_days = days;
        self
    }
    pub fn with_expiry_business_days(mut self, days: u32) -> Self {
        self.expiry_business_days = days;
        self
    }
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = max;
        self
    }
    pub fn with_max_issue_attempts(mut self, attempts: usize) -> Self {
        self.max_issue_attempts = attempts;
        self
    }
    pub fn with_overflow(mut self, policy: OverflowPolicy) -> Self {
        self.overflow = policy;
        self
    }

    /// Defaults overridden by `CAPTURE_*` environment variables.
    ///
    /// Recognised keys: `CAPTURE_VALIDITY_DAYS`, `CAPTURE_EXPIRY_BUSINESS_DAYS`,
    /// `CAPTURE_MAX_BATCH` and `CAPTURE_OVERFLOW` (`truncate` or `reject`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(days) = parse_var(&lookup, "CAPTURE_VALIDITY_DAYS")? {
            config.default_validity_days = days;
        }
        if let Some(days) = parse_var(&lookup, "CAPTURE_EXPIRY_BUSINESS_DAYS")? {
            config.expiry_business_days = days;
        }
        if let Some(max) = parse_var(&lookup, "CAPTURE_MAX_BATCH")? {
            config.max_batch_size = max;
        }
        if let Some(raw) = lookup("CAPTURE_OVERFLOW") {
            config.overflow = match raw.trim().to_ascii_lowercase().as_str() {
                "truncate" => OverflowPolicy::Truncate,
                "reject" => OverflowPolicy::Reject,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "CAPTURE_OVERFLOW",
                        value: raw,
                    });
                }
            };
        }

        tracing::debug!(
            validity_days = config.default_validity_days,
            expiry_business_days = config.expiry_business_days,
            max_batch = config.max_batch_size,
            overflow = ?config.overflow,
            "loaded capture configuration"
        );

        Ok(config)
    }

    pub fn entity_name(&self, code: &str) -> Option<&str> {
        self.entities.get(code).map(String::as_str)
    }
    pub fn concept_name(&self, code: &str) -> Option<&str> {
        self.concepts.get(code).map(String::as_str)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_running_service() {
        let config = CaptureConfig::default();
        assert_eq!(config.default_validity_days, 15);
        assert_eq!(config.max_batch_size, 100);
        assert_eq!(config.max_issue_attempts, 5);
        assert_eq!(config.overflow, OverflowPolicy::Truncate);
        assert!(!config.enforce_code_tables);
        assert_eq!(config.entity_name("09"), Some("Ciudad de México"));
        assert_eq!(config.concept_name("01"), Some("Multa de tránsito"));
    }

    #[test]
    fn env_overrides_apply() {
        let config = CaptureConfig::from_lookup(lookup_from(&[
            ("CAPTURE_VALIDITY_DAYS", "30"),
            ("CAPTURE_MAX_BATCH", " 50 "),
            ("CAPTURE_OVERFLOW", "Reject"),
        ]))
        .unwrap();

        assert_eq!(config.default_validity_days, 30);
        assert_eq!(config.max_batch_size, 50);
        assert_eq!(config.overflow, OverflowPolicy::Reject);
        assert_eq!(config.expiry_business_days, 15);
    }

    #[test]
    fn env_rejects_garbage() {
        let err = CaptureConfig::from_lookup(lookup_from(&[("CAPTURE_MAX_BATCH", "lots")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "CAPTURE_MAX_BATCH",
                value: "lots".into()
            }
        );

        let err = CaptureConfig::from_lookup(lookup_from(&[("CAPTURE_OVERFLOW", "wrap")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "CAPTURE_OVERFLOW", .. }));
    }
}
