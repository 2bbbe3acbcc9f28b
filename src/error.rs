// =============================================================================
// Scan Errors — per-instrument failure taxonomy
// =============================================================================
//
// None of these are fatal to the process.  The scan loop turns every variant
// into a log line and moves on to the next instrument:
//
//   DataUnavailable  — fetch failed or returned an unusable payload
//   ComputationGap   — not enough warm-up data for a defined trailing pair
//   Delivery         — the notification transport rejected or dropped a signal
//   Timeout          — a network stage exceeded its guard timeout
// =============================================================================

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("market data unavailable for {instrument}: {reason}")]
    DataUnavailable { instrument: String, reason: String },

    #[error("indicator gap: {reason}")]
    ComputationGap { reason: String },

    #[error("delivery failed for {instrument}: {reason}")]
    Delivery { instrument: String, reason: String },

    #[error("{stage} timed out for {instrument} after {after:?}")]
    Timeout {
        stage: Stage,
        instrument: String,
        after: Duration,
    },
}

impl ScanError {
    pub fn data_unavailable(instrument: impl Into<String>, reason: impl ToString) -> Self {
        Self::DataUnavailable {
            instrument: instrument.into(),
            reason: reason.to_string(),
        }
    }

    pub fn delivery(instrument: impl Into<String>, reason: impl ToString) -> Self {
        Self::Delivery {
            instrument: instrument.into(),
            reason: reason.to_string(),
        }
    }
}

/// Network stage an error originated from.  Used for log context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Deliver,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Deliver => write!(f, "deliver"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_instrument_and_cause() {
        let err = ScanError::data_unavailable("BTCUSDT", "HTTP 400");
        assert_eq!(
            err.to_string(),
            "market data unavailable for BTCUSDT: HTTP 400"
        );

        let err = ScanError::Timeout {
            stage: Stage::Deliver,
            instrument: "ETHUSDT".into(),
            after: Duration::from_secs(10),
        };
        assert_eq!(err.to_string(), "deliver timed out for ETHUSDT after 10s");
    }
}
