// =============================================================================
// Price Levels — entry band, take-profit ladder, stop-loss
// =============================================================================
//
// All levels are fixed percentage offsets from the reference close P:
//
//   entry band   P * (1 - band),  P * (1 + band)          (both directions)
//   stop-loss    P * (1 - sl)  LONG,   P * (1 + sl)  SHORT
//   TP_k         P * (1 + tp_k) LONG,  P * (1 - tp_k) SHORT
//
// In `TakeProfitMode::Legacy` only TP1 flips for shorts; TP2-TP4 stay above
// entry, reproducing what the scanner historically published.
//
// Every price is rounded to `precision` decimals before leaving this module.
// =============================================================================

use crate::types::{Direction, TakeProfitMode};

/// A price level together with its distance from entry in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub price: f64,
    pub pct: f64,
}

/// All derived levels for one signal, already rounded.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLevels {
    pub entry_low: f64,
    pub entry_high: f64,
    pub take_profits: [Target; 4],
    pub stop_loss: Target,
}

/// Percentage offsets used by [`compute_levels`].  Values are in percent
/// (`0.7` means 0.7 %).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelOffsets {
    pub entry_band_pct: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pcts: [f64; 4],
}

/// Round `value` to `decimals` places, half away from zero.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

pub fn compute_levels(
    price: f64,
    direction: Direction,
    offsets: &LevelOffsets,
    mode: TakeProfitMode,
    precision: u32,
) -> PriceLevels {
    let at = |pct: f64| round_to(price * (1.0 + pct / 100.0), precision);
    let sign = direction.sign();

    let take_profits = std::array::from_fn(|k| {
        let pct = offsets.take_profit_pcts[k];
        let flips = match mode {
            TakeProfitMode::Mirrored => true,
            TakeProfitMode::Legacy => k == 0,
        };
        let signed = if flips { sign * pct } else { pct };
        Target {
            price: at(signed),
            pct,
        }
    });

    PriceLevels {
        entry_low: at(-offsets.entry_band_pct),
        entry_high: at(offsets.entry_band_pct),
        take_profits,
        stop_loss: Target {
            price: at(-sign * offsets.stop_loss_pct),
            pct: offsets.stop_loss_pct,
        },
    }
}
