// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
//   alpha = 2 / (span + 1),  decay = 1 - alpha
//
// Two weightings are supported:
//
//   Adjusted  (default)
//     EMA_t = sum_{j<=t} decay^j * close_{t-j}  /  sum_{j<=t} decay^j
//     The early values are bias-corrected averages of everything seen so
//     far, which is what the legacy scanner reported.
//
//   Recursive
//     EMA_0 = close_0
//     EMA_t = close_t * alpha + EMA_{t-1} * decay
//
// Both are seeded from the first close, so every index is defined.  The two
// agree once decay^t becomes negligible.
// =============================================================================

use serde::{Deserialize, Serialize};

/// Weighting scheme used by [`ema_series`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EmaWeighting {
    #[default]
    Adjusted,
    Recursive,
}

/// Compute the EMA of `values` with smoothing `span`, aligned index-for-index
/// with the input.
///
/// # Edge cases
/// - `span == 0` => every entry is `None`
/// - Once a non-finite value enters the recurrence, that index and all later
///   ones are `None`; a broken series is not trusted downstream.
pub fn ema_series(values: &[f64], span: usize, weighting: EmaWeighting) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if span == 0 || values.is_empty() {
        return out;
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;

    match weighting {
        EmaWeighting::Adjusted => {
            let mut num = 0.0_f64;
            let mut den = 0.0_f64;
            for (slot, &v) in out.iter_mut().zip(values) {
                num = v + decay * num;
                den = 1.0 + decay * den;
                let ema = num / den;
                if !ema.is_finite() {
                    break;
                }
                *slot = Some(ema);
            }
        }
        EmaWeighting::Recursive => {
            let mut prev: Option<f64> = None;
            for (slot, &v) in out.iter_mut().zip(values) {
                let ema = match prev {
                    None => v,
                    Some(p) => v * alpha + p * decay,
                };
                if !ema.is_finite() {
                    break;
                }
                *slot = Some(ema);
                prev = Some(ema);
            }
        }
    }

    out
}
