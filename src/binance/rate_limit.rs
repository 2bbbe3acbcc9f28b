// =============================================================================
// Request-Weight Tracker — keeps the scanner under the futures API budget
// =============================================================================
//
// Binance USDⓈ-M futures allows 2400 request weight per minute per IP.  We
// hard-cap ourselves below that since other processes may share the address.
//
// The tracker reads the `X-MBX-USED-WEIGHT-1M` response header after every
// request.  The reading is only trusted for the minute it was taken in; once
// the wall-clock minute rolls over the budget is considered fresh again.
// =============================================================================

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

/// Hard ceiling at which we refuse to send additional requests.
const WEIGHT_HARD_LIMIT: u32 = 2000;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 1600;

/// Weight of one `GET /fapi/v1/klines` call for the given `limit`.
pub fn klines_weight(limit: usize) -> u32 {
    match limit {
        0..=99 => 1,
        100..=499 => 2,
        500..=1000 => 5,
        _ => 10,
    }
}

fn current_minute() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() / 60)
        .unwrap_or(0)
}

/// Thread-safe request-weight tracker backed by atomic counters.
pub struct WeightTracker {
    used_weight_1m: AtomicU32,
    observed_minute: AtomicU64,
}

impl WeightTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
            observed_minute: AtomicU64::new(0),
        }
    }

    /// Update the counter from HTTP response headers.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let Some(w) = headers
            .get("X-MBX-USED-WEIGHT-1M")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok())
        else {
            return;
        };
        self.record(w, current_minute());
    }

    fn record(&self, weight: u32, minute: u64) {
        let prev = self.used_weight_at(minute);
        self.used_weight_1m.store(weight, Ordering::Relaxed);
        self.observed_minute.store(minute, Ordering::Relaxed);

        if weight >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "request weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = weight, "request weight updated from header");
    }

    fn used_weight_at(&self, minute: u64) -> u32 {
        if self.observed_minute.load(Ordering::Relaxed) == minute {
            self.used_weight_1m.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    /// Weight used in the current minute, as last reported by the exchange.
    pub fn used_weight(&self) -> u32 {
        self.used_weight_at(current_minute())
    }

    /// Return `true` if `weight` more can be spent without exceeding the cap.
    pub fn can_send_request(&self, weight: u32) -> bool {
        self.can_send_at(weight, current_minute())
    }

    fn can_send_at(&self, weight: u32, minute: u64) -> bool {
        let current = self.used_weight_at(minute);
        let allowed = current + weight <= WEIGHT_HARD_LIMIT;
        if !allowed {
            warn!(
                current_weight = current,
                requested_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "request blocked — would exceed weight limit"
            );
        }
        allowed
    }
}

impl Default for WeightTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WeightTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightTracker")
            .field("used_weight_1m", &self.used_weight_1m.load(Ordering::Relaxed))
            .field("observed_minute", &self.observed_minute.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn klines_weight_brackets() {
        assert_eq!(klines_weight(50), 1);
        assert_eq!(klines_weight(100), 2);
        assert_eq!(klines_weight(500), 5);
        assert_eq!(klines_weight(1500), 10);
    }

    #[test]
    fn blocks_near_the_cap_within_the_same_minute() {
        let t = WeightTracker::new();
        t.record(1999, 42);
        assert!(t.can_send_at(1, 42));
        assert!(!t.can_send_at(2, 42));
    }

    #[test]
    fn budget_resets_when_minute_rolls_over() {
        let t = WeightTracker::new();
        t.record(2000, 42);
        assert!(!t.can_send_at(1, 42));
        assert!(t.can_send_at(1, 43));
    }

    #[test]
    fn reads_weight_header() {
        let t = WeightTracker::new();
        let mut headers = HeaderMap::new();
        headers.insert("X-MBX-USED-WEIGHT-1M", HeaderValue::from_static("37"));
        t.update_from_headers(&headers);
        // the minute could tick between the two calls; accept either reading
        assert!(t.used_weight() == 37 || t.used_weight() == 0);
    }

    #[test]
    fn ignores_garbage_header() {
        let t = WeightTracker::new();
        let mut headers = HeaderMap::new();
        headers.insert("X-MBX-USED-WEIGHT-1M", HeaderValue::from_static("lots"));
        t.update_from_headers(&headers);
        assert_eq!(t.used_weight(), 0);
    }
}
