// =============================================================================
// Signal Evaluator — EMA cross + RSI extreme + volume spike
// =============================================================================
//
// Looks only at the previous and latest rows of the indicator frame:
//
//   bull cross   fast > slow now,  fast <= slow before
//   bear cross   fast < slow now,  fast >= slow before
//   oversold     RSI < 30          overbought  RSI > 70
//   spike        volume > 1.5 * rolling volume average
//
//   LONG   = bull cross AND oversold   AND spike
//   SHORT  = bear cross AND overbought AND spike
//
// The cross conditions are mutually exclusive, so at most one direction can
// fire.  A frame without two defined trailing rows is reported as
// `Insufficient`, never as an error.
// =============================================================================

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::levels::{compute_levels, LevelOffsets};
use super::Signal;
use crate::indicators::volume::is_volume_spike;
use crate::indicators::{IndicatorFrame, IndicatorRow};
use crate::market_data::Series;
use crate::types::{Direction, TakeProfitMode};

pub const LONG_REASON: &str = "EMA Bull Cross + RSI Oversold + Volume Spike";
pub const SHORT_REASON: &str = "EMA Bear Cross + RSI Overbought + Volume Spike";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_oversold() -> f64 {
    30.0
}

fn default_overbought() -> f64 {
    70.0
}

fn default_volume_multiplier() -> f64 {
    1.5
}

fn default_entry_band_pct() -> f64 {
    0.3
}

fn default_stop_loss_pct() -> f64 {
    1.5
}

fn default_take_profit_pcts() -> [f64; 4] {
    [0.7, 1.4, 2.3, 3.8]
}

fn default_leverage() -> String {
    "10-20x".to_string()
}

fn default_confidence() -> u8 {
    85
}

fn default_price_precision() -> u32 {
    2
}

// =============================================================================
// SignalParams
// =============================================================================

/// Thresholds and level offsets for the decision rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalParams {
    /// RSI strictly below this is oversold.
    #[serde(default = "default_oversold")]
    pub rsi_oversold: f64,

    /// RSI strictly above this is overbought.
    #[serde(default = "default_overbought")]
    pub rsi_overbought: f64,

    /// Volume must exceed this multiple of its rolling average.
    #[serde(default = "default_volume_multiplier")]
    pub volume_multiplier: f64,

    /// Half-width of the entry band, percent of price.
    #[serde(default = "default_entry_band_pct")]
    pub entry_band_pct: f64,

    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,

    #[serde(default = "default_take_profit_pcts")]
    pub take_profit_pcts: [f64; 4],

    #[serde(default)]
    pub take_profit_mode: TakeProfitMode,

    #[serde(default = "default_leverage")]
    pub leverage: String,

    #[serde(default = "default_confidence")]
    pub confidence: u8,

    /// Decimal places for every published price.
    #[serde(default = "default_price_precision")]
    pub price_precision: u32,

    /// Per-symbol precision, e.g. `{"XRPUSDT": 4}` for sub-dollar contracts.
    #[serde(default)]
    pub symbol_precision: HashMap<String, u32>,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            rsi_oversold: default_oversold(),
            rsi_overbought: default_overbought(),
            volume_multiplier: default_volume_multiplier(),
            entry_band_pct: default_entry_band_pct(),
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pcts: default_take_profit_pcts(),
            take_profit_mode: TakeProfitMode::default(),
            leverage: default_leverage(),
            confidence: default_confidence(),
            price_precision: default_price_precision(),
            symbol_precision: HashMap::new(),
        }
    }
}

impl SignalParams {
    fn offsets(&self) -> LevelOffsets {
        LevelOffsets {
            entry_band_pct: self.entry_band_pct,
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pcts: self.take_profit_pcts,
        }
    }

    /// Decimal places used for `symbol`'s prices.
    pub fn precision_for(&self, symbol: &str) -> u32 {
        self.symbol_precision
            .get(symbol)
            .copied()
            .unwrap_or(self.price_precision)
    }
}

// =============================================================================
// Conditions & Evaluation
// =============================================================================

/// Individual rule components for the latest sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conditions {
    pub bull_cross: bool,
    pub bear_cross: bool,
    pub oversold: bool,
    pub overbought: bool,
    pub volume_spike: bool,
    pub rsi: f64,
    /// Latest volume divided by its rolling average.
    pub volume_ratio: f64,
}

impl Conditions {
    pub fn detect(
        prev: &IndicatorRow,
        last: &IndicatorRow,
        last_volume: f64,
        params: &SignalParams,
    ) -> Self {
        let bull_cross = last.ema_fast > last.ema_slow && prev.ema_fast <= prev.ema_slow;
        let bear_cross = last.ema_fast < last.ema_slow && prev.ema_fast >= prev.ema_slow;

        let volume_ratio = if last.volume_avg > 0.0 {
            last_volume / last.volume_avg
        } else {
            0.0
        };

        Self {
            bull_cross,
            bear_cross,
            oversold: last.rsi < params.rsi_oversold,
            overbought: last.rsi > params.rsi_overbought,
            volume_spike: is_volume_spike(last_volume, last.volume_avg, params.volume_multiplier),
            rsi: last.rsi,
            volume_ratio,
        }
    }

    /// Direction implied by the rule, if any.
    pub fn direction(&self) -> Option<Direction> {
        if self.bull_cross && self.oversold && self.volume_spike {
            Some(Direction::Long)
        } else if self.bear_cross && self.overbought && self.volume_spike {
            Some(Direction::Short)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Conditions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cross = if self.bull_cross {
            "bull"
        } else if self.bear_cross {
            "bear"
        } else {
            "none"
        };
        write!(
            f,
            "cross={cross} rsi={:.1} vol_ratio={:.2}",
            self.rsi, self.volume_ratio
        )
    }
}

/// Outcome of evaluating one instrument.
#[derive(Debug, Clone)]
pub enum Evaluation {
    Signal(Signal),
    /// Data was sufficient but the rule did not fire.
    NoSetup(Conditions),
    /// Not enough defined data to decide.
    Insufficient(String),
}

#[cfg(test)]
impl Evaluation {
    pub fn signal(&self) -> Option<&Signal> {
        match self {
            Self::Signal(s) => Some(s),
            _ => None,
        }
    }
}

// =============================================================================
// Evaluator
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct SignalEvaluator {
    params: SignalParams,
}

impl SignalEvaluator {
    pub fn new(params: SignalParams) -> Self {
        Self { params }
    }

    /// Decide on a signal from the last two rows of `frame` and the last
    /// candle of `series`.
    pub fn evaluate(&self, series: &Series, frame: &IndicatorFrame) -> Evaluation {
        if series.len() < 2 {
            return Evaluation::Insufficient(format!("{} candles, need 2", series.len()));
        }
        if frame.len() != series.len() {
            return Evaluation::Insufficient(format!(
                "frame has {} rows for {} candles",
                frame.len(),
                series.len()
            ));
        }

        let (prev, last) = match frame.trailing_pair() {
            Ok(pair) => pair,
            Err(e) => return Evaluation::Insufficient(e.to_string()),
        };

        let Some(candle) = series.last() else {
            return Evaluation::Insufficient("no candles".to_string());
        };

        let conditions = Conditions::detect(&prev, &last, candle.volume, &self.params);
        debug!(
            symbol = %series.instrument(),
            interval = %series.interval(),
            %conditions,
            "conditions evaluated"
        );

        let Some(direction) = conditions.direction() else {
            return Evaluation::NoSetup(conditions);
        };

        let price = candle.close;
        if !price.is_finite() || price <= 0.0 {
            return Evaluation::Insufficient(format!("invalid reference price {price}"));
        }

        let p = &self.params;
        let precision = p.precision_for(series.instrument());
        let levels = compute_levels(
            price,
            direction,
            &p.offsets(),
            p.take_profit_mode,
            precision,
        );
        let band_ok = levels.entry_low.is_finite() && levels.entry_low < levels.entry_high;
        if !band_ok {
            return Evaluation::Insufficient(format!(
                "price {price} too small for {precision} decimal entry band"
            ));
        }

        let reason = match direction {
            Direction::Long => LONG_REASON,
            Direction::Short => SHORT_REASON,
        };

        Evaluation::Signal(Signal {
            id: Uuid::new_v4(),
            instrument: series.instrument().to_string(),
            direction,
            reference_price: price,
            entry_low: levels.entry_low,
            entry_high: levels.entry_high,
            take_profits: levels.take_profits,
            stop_loss: levels.stop_loss,
            leverage: p.leverage.clone(),
            reason: reason.to_string(),
            confidence: p.confidence,
            precision,
            generated_at: Utc::now(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorEngine;
    use crate::market_data::Candle;
    use crate::signals::levels::round_to;

    /// Build a series with the given closes and volumes.
    fn series(closes: &[f64], volumes: &[f64]) -> Series {
        let candles = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&c, &v))| {
                let t = 1_700_000_000_000 + i as i64 * 300_000;
                Candle::new(t, c, c * 1.001, c * 0.999, c, v, t + 299_999)
            })
            .collect();
        Series::new("BTCUSDT", "5m", candles).unwrap()
    }

    fn row(ema_fast: f64, ema_slow: f64, rsi: f64) -> IndicatorRow {
        IndicatorRow {
            ema_fast,
            ema_slow,
            rsi,
            volume_avg: 100.0,
        }
    }

    /// A 30-row frame: fast EMA sits below slow until `cross_at`, then above.
    /// RSI and volume average are flat except at `cross_at`.
    fn crossing_frame(
        n: usize,
        cross_at: usize,
        rsi_at_cross: f64,
        bullish: bool,
    ) -> IndicatorFrame {
        let mut frame = IndicatorFrame::default();
        for i in 0..n {
            let (fast, slow) = match (i >= cross_at, bullish) {
                (false, true) | (true, false) => (99.0, 100.0),
                (true, true) | (false, false) => (101.0, 100.0),
            };
            frame.ema_fast.push(Some(fast));
            frame.ema_slow.push(Some(slow));
            frame.rsi.push(if i < 13 {
                None
            } else if i == cross_at {
                Some(rsi_at_cross)
            } else {
                Some(50.0)
            });
            frame.volume_avg.push(if i < 19 { None } else { Some(100.0) });
        }
        frame
    }

    fn truncate(frame: &IndicatorFrame, len: usize) -> IndicatorFrame {
        IndicatorFrame {
            ema_fast: frame.ema_fast[..len].to_vec(),
            ema_slow: frame.ema_slow[..len].to_vec(),
            rsi: frame.rsi[..len].to_vec(),
            volume_avg: frame.volume_avg[..len].to_vec(),
        }
    }

    /// 30 candles with a rising close and a 200-volume bar at index 24
    /// (candle 25), against a rolling average of 100.
    fn scenario_series() -> Series {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 0.5).collect();
        let mut volumes = vec![100.0; 30];
        volumes[24] = 200.0;
        series(&closes, &volumes)
    }

    fn candles_up_to(s: &Series, len: usize) -> Series {
        Series::new(s.instrument(), s.interval(), s.candles()[..len].to_vec()).unwrap()
    }

    #[test]
    fn scenario_a_long_on_candle_25() {
        let full = scenario_series();
        let frame = crossing_frame(30, 24, 28.0, true);
        let eval = SignalEvaluator::default();

        let out = eval.evaluate(&candles_up_to(&full, 25), &truncate(&frame, 25));
        let signal = out.signal().expect("LONG signal expected");
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.reason, LONG_REASON);
        assert_eq!(signal.confidence, 85);
        assert_eq!(signal.leverage, "10-20x");
        assert_eq!(signal.instrument, "BTCUSDT");

        // close at candle 25 = 112.0
        assert_eq!(signal.reference_price, 112.0);
        assert_eq!(signal.entry_low, 111.66);
        assert_eq!(signal.entry_high, 112.34);
        assert_eq!(signal.stop_loss.price, 110.32);
        assert_eq!(signal.take_profits[0].price, 112.78);
        assert_eq!(signal.take_profits[3].price, 116.26);

        // By candle 30 the cross is stale.
        assert!(eval.evaluate(&full, &frame).signal().is_none());
    }

    #[test]
    fn scenario_b_neutral_rsi_no_signal() {
        let full = scenario_series();
        let frame = crossing_frame(30, 24, 50.0, true);
        let out = SignalEvaluator::default()
            .evaluate(&candles_up_to(&full, 25), &truncate(&frame, 25));
        match out {
            Evaluation::NoSetup(c) => {
                assert!(c.bull_cross);
                assert!(c.volume_spike);
                assert!(!c.oversold);
            }
            other => panic!("expected NoSetup, got {other:?}"),
        }
    }

    #[test]
    fn short_signal_mirrors_targets_below_entry() {
        let closes = vec![200.0; 25];
        let mut volumes = vec![100.0; 25];
        volumes[24] = 300.0;
        let frame = crossing_frame(25, 24, 75.0, false);

        let out = SignalEvaluator::default().evaluate(&series(&closes, &volumes), &frame);
        let signal = out.signal().expect("SHORT signal expected");
        assert_eq!(signal.direction, Direction::Short);
        assert_eq!(signal.reason, SHORT_REASON);
        assert_eq!(signal.stop_loss.price, 203.0);
        let tps: Vec<f64> = signal.take_profits.iter().map(|t| t.price).collect();
        assert_eq!(tps, vec![198.6, 197.2, 195.4, 192.4]);
    }

    #[test]
    fn short_signal_legacy_targets() {
        let closes = vec![200.0; 25];
        let mut volumes = vec![100.0; 25];
        volumes[24] = 300.0;
        let frame = crossing_frame(25, 24, 75.0, false);
        let params = SignalParams {
            take_profit_mode: TakeProfitMode::Legacy,
            ..SignalParams::default()
        };

        let out = SignalEvaluator::new(params).evaluate(&series(&closes, &volumes), &frame);
        let tps: Vec<f64> = out
            .signal()
            .expect("SHORT signal expected")
            .take_profits
            .iter()
            .map(|t| t.price)
            .collect();
        assert_eq!(tps, vec![198.6, 202.8, 204.6, 207.6]);
    }

    #[test]
    fn fewer_than_two_candles_is_insufficient() {
        let eval = SignalEvaluator::default();
        let engine = IndicatorEngine::default();
        for n in 0..2 {
            let s = series(&vec![100.0; n], &vec![1.0; n]);
            let frame = engine.compute(&s);
            assert!(matches!(eval.evaluate(&s, &frame), Evaluation::Insufficient(_)));
        }
    }

    #[test]
    fn warm_up_gap_is_insufficient() {
        let s = series(&vec![100.0; 15], &vec![1.0; 15]);
        let frame = IndicatorEngine::default().compute(&s);
        assert!(matches!(
            SignalEvaluator::default().evaluate(&s, &frame),
            Evaluation::Insufficient(_)
        ));
    }

    #[test]
    fn mismatched_frame_is_insufficient() {
        let s = series(&vec![100.0; 30], &vec![1.0; 30]);
        let frame = crossing_frame(25, 24, 28.0, true);
        assert!(matches!(
            SignalEvaluator::default().evaluate(&s, &frame),
            Evaluation::Insufficient(_)
        ));
    }

    #[test]
    fn cross_is_edge_triggered() {
        // fast above slow from row 20 through 29
        let frame = crossing_frame(30, 20, 50.0, true);
        let params = SignalParams::default();
        let mut crosses = Vec::new();
        for i in 20..30 {
            let prev = frame.row(i - 1).unwrap();
            let last = frame.row(i).unwrap();
            if Conditions::detect(&prev, &last, 100.0, &params).bull_cross {
                crosses.push(i);
            }
        }
        assert_eq!(crosses, vec![20]);
    }

    #[test]
    fn touching_then_crossing_counts_as_cross() {
        let prev = row(100.0, 100.0, 20.0);
        let last = row(100.5, 100.0, 20.0);
        let c = Conditions::detect(&prev, &last, 151.0, &SignalParams::default());
        assert!(c.bull_cross);
        assert_eq!(c.direction(), Some(Direction::Long));
    }

    #[test]
    fn directions_are_mutually_exclusive() {
        let params = SignalParams::default();
        let levels = [99.0, 100.0, 101.0];
        for &pf in &levels {
            for &ps in &levels {
                for &lf in &levels {
                    for &ls in &levels {
                        for rsi in [10.0, 29.9, 30.0, 50.0, 70.0, 70.1, 95.0] {
                            for vol in [0.0, 150.0, 151.0, 500.0] {
                                let prev = row(pf, ps, rsi);
                                let last = row(lf, ls, rsi);
                                let c = Conditions::detect(&prev, &last, vol, &params);
                                assert!(!(c.bull_cross && c.bear_cross));
                                assert!(!(c.oversold && c.overbought));
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn emitted_prices_are_rounded_and_band_ordered() {
        let closes: Vec<f64> = (0..25).map(|i| 1234.5678 + i as f64 * 0.0137).collect();
        let mut volumes = vec![100.0; 25];
        volumes[24] = 400.0;
        let frame = crossing_frame(25, 24, 12.0, true);
        let out = SignalEvaluator::default().evaluate(&series(&closes, &volumes), &frame);
        let s = out.signal().expect("signal expected");

        let mut prices = vec![s.entry_low, s.entry_high, s.stop_loss.price];
        prices.extend(s.take_profits.iter().map(|t| t.price));
        for p in prices {
            assert_eq!(p, round_to(p, 2));
        }
        assert!(s.entry_low < s.entry_high);
    }

    #[test]
    fn sub_cent_price_refuses_degenerate_band() {
        let closes = vec![0.001; 25];
        let mut volumes = vec![100.0; 25];
        volumes[24] = 400.0;
        let frame = crossing_frame(25, 24, 12.0, true);
        let out = SignalEvaluator::default().evaluate(&series(&closes, &volumes), &frame);
        assert!(matches!(out, Evaluation::Insufficient(_)));
    }

    fn long_setup_at(price: f64) -> (Series, IndicatorFrame) {
        let closes = vec![price; 25];
        let mut volumes = vec![100.0; 25];
        volumes[24] = 400.0;
        (series(&closes, &volumes), crossing_frame(25, 24, 12.0, true))
    }

    #[test]
    fn symbol_precision_publishes_sub_dollar_prices() {
        let (s, frame) = long_setup_at(0.5);
        assert!(matches!(
            SignalEvaluator::default().evaluate(&s, &frame),
            Evaluation::Insufficient(_)
        ));

        let mut params = SignalParams::default();
        params.symbol_precision.insert("BTCUSDT".into(), 4);
        let out = SignalEvaluator::new(params).evaluate(&s, &frame);
        let signal = out.signal().expect("LONG signal expected");
        assert_eq!(signal.precision, 4);
        assert_eq!(signal.entry_low, 0.4985);
        assert_eq!(signal.entry_high, 0.5015);
        assert_eq!(signal.take_profits[0].price, 0.5035);
        assert_eq!(signal.stop_loss.price, 0.4925);
    }

    #[test]
    fn overflowing_precision_never_emits_nan_levels() {
        let (s, frame) = long_setup_at(100.0);
        let params = SignalParams {
            price_precision: 400,
            ..SignalParams::default()
        };
        let out = SignalEvaluator::new(params).evaluate(&s, &frame);
        assert!(matches!(out, Evaluation::Insufficient(_)));
    }

    #[test]
    fn signal_accessor_only_yields_emitted_signals() {
        let (s, frame) = long_setup_at(100.0);
        let eval = SignalEvaluator::default();
        assert!(eval.evaluate(&s, &frame).signal().is_some());

        let flat = series(&vec![100.0; 30], &vec![100.0; 30]);
        let flat_frame = IndicatorEngine::default().compute(&flat);
        assert!(eval.evaluate(&flat, &flat_frame).signal().is_none());
        assert!(Evaluation::Insufficient("gap".into()).signal().is_none());
    }

    #[test]
    fn real_indicators_on_steady_trend_give_no_signal() {
        let closes: Vec<f64> = (0..100).map(|i| 30_000.0 + i as f64 * 10.0).collect();
        let volumes = vec![50.0; 100];
        let s = series(&closes, &volumes);
        let frame = IndicatorEngine::default().compute(&s);
        assert!(matches!(
            SignalEvaluator::default().evaluate(&s, &frame),
            Evaluation::NoSetup(_)
        ));
    }
}
