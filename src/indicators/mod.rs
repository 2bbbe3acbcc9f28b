// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators the scanner reads.
// Every series function returns `Vec<Option<f64>>` aligned with its input so
// callers are forced to handle warm-up gaps and numerical edge cases.

pub mod ema;
pub mod frame;
pub mod rsi;
pub mod volume;

pub use frame::{IndicatorEngine, IndicatorFrame, IndicatorParams, IndicatorRow};
