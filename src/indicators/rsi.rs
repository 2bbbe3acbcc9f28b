// =============================================================================
// Relative Strength Index (RSI) — rolling simple averages
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Deltas: delta_0 = 0, delta_t = close_t - close_{t-1}.
// Step 2 — gain_t = max(delta_t, 0), loss_t = max(-delta_t, 0).
// Step 3 — avg_gain / avg_loss = simple mean over the trailing `period`
//          samples (no Wilder smoothing).
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// The first defined value sits at index `period - 1`.  Because delta_0 is
// counted as a flat move, that window holds only `period - 1` real deltas.
//
// Thresholds:  RSI > 70 => OVERBOUGHT,  RSI < 30 => OVERSOLD.
// =============================================================================

/// Compute the RSI series for `closes`, aligned index-for-index with it.
///
/// # Edge cases
/// - `period == 0` => every entry is `None`
/// - indices before `period - 1` => `None`
/// - any non-finite close inside a window => `None` for that window
/// - average loss zero, average gain positive => 100.0
/// - both averages zero (flat window) => 50.0
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return out;
    }

    // --- Compute price deltas ------------------------------------------------
    let mut deltas = Vec::with_capacity(closes.len());
    deltas.push(0.0);
    deltas.extend(closes.windows(2).map(|w| w[1] - w[0]));

    let period_f = period as f64;
    for end in (period - 1)..closes.len() {
        let window = &deltas[end + 1 - period..=end];
        if window.iter().any(|d| !d.is_finite()) {
            continue;
        }

        let (sum_gain, sum_loss) = window.iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

        out[end] = rsi_from_averages(sum_gain / period_f, sum_loss / period_f);
    }

    out
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// - If both averages are zero, RSI is 50.0 (no movement).
/// - If average loss is zero (only gains), RSI is 100.0.
/// - Returns `None` when the result is non-finite.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi.clamp(0.0, 100.0))
    } else {
        None
    }
}
