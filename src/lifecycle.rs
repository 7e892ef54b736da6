//! Lifecycle of an issued capture line
//!
//! ```text
//! available --use-->    used       (terminal)
//! available --expire--> expired    (terminal)
//! available --cancel--> cancelled  (terminal)
//! ```
//!
//! The transition function is pure. Whoever holds the persisted record is
//! responsible for writing the new state exactly once.
use super::error::CaptureError;
use super::record::TimeStamp;
use chrono::{NaiveDate, Utc};
use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineState {
    #[n(0)]
    #[default]
    Available,
    #[n(1)]
    Used,
    #[n(2)]
    Expired,
    #[n(3)]
    Cancelled,
}

/// Payment details recorded when a line is used.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Usage {
    #[n(0)]
    pub paid_by: Option<String>,
    #[n(1)]
    pub payment_reference: Option<String>,
    #[n(2)]
    pub at: TimeStamp<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    Use(Usage),
    Expire,
    Cancel,
}

impl LineState {
    pub fn as_str(self) -> &'static str {
        match self {
            LineState::Available => "available",
            LineState::Used => "used",
            LineState::Expired => "expired",
            LineState::Cancelled => "cancelled",
        }
    }
    pub fn is_terminal(self) -> bool {
        self != LineState::Available
    }
    pub fn apply(self, event: &LineEvent) -> Result<LineState, CaptureError> {
        transition(self, event)
    }
}

impl fmt::Display for LineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LineState {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(LineState::Available),
            "used" => Ok(LineState::Used),
            "expired" => Ok(LineState::Expired),
            "cancelled" => Ok(LineState::Cancelled),
            other => Err(CaptureError::Format {
                reason: format!("unknown line state {other:?}"),
            }),
        }
    }
}

impl LineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LineEvent::Use(_) => "use",
            LineEvent::Expire => "expire",
            LineEvent::Cancel => "cancel",
        }
    }
    pub fn target(&self) -> LineState {
        match self {
            LineEvent::Use(_) => LineState::Used,
            LineEvent::Expire => LineState::Expired,
            LineEvent::Cancel => LineState::Cancelled,
        }
    }
}

/// `(current, event) -> next`. Only an available line moves.
pub fn transition(current: LineState, event: &LineEvent) -> Result<LineState, CaptureError> {
    match current {
        LineState::Available => Ok(event.target()),
        LineState::Used | LineState::Expired | LineState::Cancelled => {
            Err(CaptureError::InvalidStateTransition {
                current,
                event: event.name(),
            })
        }
    }
}

/// True when an available line's expiry date is strictly before `today`.
/// Used, cancelled and already expired lines are never re-evaluated.
pub fn expiry_due(state: LineState, expires_on: NaiveDate, today: NaiveDate) -> bool {
    state == LineState::Available && expires_on < today
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage() -> LineEvent {
        LineEvent::Use(Usage {
            paid_by: Some("BANORTE".into()),
            payment_reference: Some("PAY-001".into()),
            at: TimeStamp::new(),
        })
    }

    #[test]
    fn available_accepts_every_event() {
        assert_eq!(transition(LineState::Available, &usage()), Ok(LineState::Used));
        assert_eq!(transition(LineState::Available, &LineEvent::Expire), Ok(LineState::Expired));
        assert_eq!(transition(LineState::Available, &LineEvent::Cancel), Ok(LineState::Cancelled));
    }

    #[test]
    fn terminal_states_reject_everything() {
        for state in [LineState::Used, LineState::Expired, LineState::Cancelled] {
            assert!(state.is_terminal());
            for event in [usage(), LineEvent::Expire, LineEvent::Cancel] {
                let err = state.apply(&event).unwrap_err();
                assert_eq!(
                    err,
                    CaptureError::InvalidStateTransition {
                        current: state,
                        event: event.name()
                    }
                );
            }
        }
    }

    #[test]
    fn second_use_fails_with_current_state() {
        let used = LineState::Available.apply(&usage()).unwrap();
        let err = used.apply(&usage()).unwrap_err();
        assert_eq!(err.to_string(), "cannot apply 'use' to a line that is used");
    }

    #[test]
    fn expiry_only_for_available() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let yesterday = today.pred_opt().unwrap();

        assert!(expiry_due(LineState::Available, yesterday, today));
        assert!(!expiry_due(LineState::Available, today, today));
        assert!(!expiry_due(LineState::Used, yesterday, today));
        assert!(!expiry_due(LineState::Cancelled, yesterday, today));
        assert!(!expiry_due(LineState::Expired, yesterday, today));
    }

    #[test]
    fn state_names_round_trip() {
        for state in [
            LineState::Available,
            LineState::Used,
            LineState::Expired,
            LineState::Cancelled,
        ] {
            assert_eq!(state.to_string().parse::<LineState>(), Ok(state));
        }
        assert!("disponible".parse::<LineState>().is_err());
    }

    #[test]
    fn state_cbor_encoding() {
        let encoded = minicbor::to_vec(LineState::Cancelled).unwrap();
        let decoded: LineState = minicbor::decode(&encoded).unwrap();
        assert_eq!(decoded, LineState::Cancelled);
    }
}
