// =============================================================================
// Signals Module
// =============================================================================
//
// `evaluator` applies the EMA-cross / RSI / volume-spike rule to the last two
// indicator rows; `levels` turns a direction and a reference price into the
// entry band, take-profit ladder and stop-loss published with the signal.

pub mod evaluator;
pub mod levels;

pub use evaluator::{Evaluation, SignalEvaluator, SignalParams};
pub use levels::Target;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::Direction;

/// A directional trade signal ready for publication.  Never persisted.
#[derive(Debug, Clone)]
pub struct Signal {
    /// Correlates log lines for one signal (UUID v4).
    pub id: Uuid,
    pub instrument: String,
    pub direction: Direction,
    /// Close of the candle the signal fired on.
    pub reference_price: f64,
    pub entry_low: f64,
    pub entry_high: f64,
    pub take_profits: [Target; 4],
    pub stop_loss: Target,
    /// Display range, e.g. "10-20x".
    pub leverage: String,
    pub reason: String,
    /// Fixed heuristic score in percent.
    pub confidence: u8,
    /// Decimal places the prices were rounded to.
    pub precision: u32,
    pub generated_at: DateTime<Utc>,
}
