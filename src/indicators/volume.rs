// =============================================================================
// Rolling Volume Average
// =============================================================================
//
// Simple moving average of traded volume over a fixed window.  Used as the
// baseline for volume-spike detection:
//
//   spike  <=>  volume_t > multiplier * SMA(volume, window)_t
// =============================================================================

/// Simple moving average of `values`, aligned index-for-index with the input.
///
/// Entries before `window - 1` are `None`, as are windows that contain a
/// non-finite value.
pub fn sma_series(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }

    let window_f = window as f64;
    for (end, slot) in out.iter_mut().enumerate().skip(window - 1) {
        let sum: f64 = values[end + 1 - window..=end].iter().sum();
        if sum.is_finite() {
            *slot = Some(sum / window_f);
        }
    }

    out
}

/// Whether `volume` exceeds `multiplier` times `average`.
pub fn is_volume_spike(volume: f64, average: f64, multiplier: f64) -> bool {
    volume > average * multiplier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_warm_up_and_values() {
        let vols: Vec<f64> = (1..=5).map(|x| x as f64).collect();
        let out = sma_series(&vols, 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(2.0));
        assert_eq!(out[3], Some(3.0));
        assert_eq!(out[4], Some(4.0));
    }

    #[test]
    fn sma_short_input_all_undefined() {
        assert!(sma_series(&[1.0; 19], 20).iter().all(Option::is_none));
    }

    #[test]
    fn sma_twentieth_sample_defined() {
        let out = sma_series(&[100.0; 20], 20);
        assert_eq!(out[19], Some(100.0));
        assert!(out[18].is_none());
    }

    #[test]
    fn spike_is_strict() {
        assert!(is_volume_spike(200.0, 100.0, 1.5));
        assert!(!is_volume_spike(150.0, 100.0, 1.5));
    }
}
