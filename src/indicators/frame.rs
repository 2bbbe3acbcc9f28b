// =============================================================================
// Indicator Frame — all derived columns for one Series
// =============================================================================
//
// Columns are aligned index-for-index with the source candles.  A `None`
// entry means "not yet computable" (warm-up prefix or poisoned input) and is
// never read as zero.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::ema::{ema_series, EmaWeighting};
use super::rsi::rsi_series;
use super::volume::sma_series;
use crate::error::ScanError;
use crate::market_data::Series;

fn default_fast_span() -> usize {
    9
}

fn default_slow_span() -> usize {
    21
}

fn default_rsi_period() -> usize {
    14
}

fn default_volume_window() -> usize {
    20
}

/// Window lengths for the indicator columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorParams {
    #[serde(default = "default_fast_span")]
    pub fast_span: usize,

    #[serde(default = "default_slow_span")]
    pub slow_span: usize,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default = "default_volume_window")]
    pub volume_window: usize,

    #[serde(default)]
    pub ema_weighting: EmaWeighting,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            fast_span: default_fast_span(),
            slow_span: default_slow_span(),
            rsi_period: default_rsi_period(),
            volume_window: default_volume_window(),
            ema_weighting: EmaWeighting::default(),
        }
    }
}

impl IndicatorParams {
    /// Smallest lookback that leaves two defined trailing rows.
    pub fn min_lookback(&self) -> usize {
        self.slow_span
            .max(self.rsi_period)
            .max(self.volume_window)
            + 2
    }
}

/// One fully-defined row of the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorRow {
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub volume_avg: f64,
}

/// Derived indicator columns for a [`Series`].
#[derive(Debug, Clone, Default)]
pub struct IndicatorFrame {
    pub ema_fast: Vec<Option<f64>>,
    pub ema_slow: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub volume_avg: Vec<Option<f64>>,
}

impl IndicatorFrame {
    pub fn len(&self) -> usize {
        self.ema_fast.len()
    }

    /// Row `i` if every column is defined there.
    pub fn row(&self, i: usize) -> Option<IndicatorRow> {
        Some(IndicatorRow {
            ema_fast: (*self.ema_fast.get(i)?)?,
            ema_slow: (*self.ema_slow.get(i)?)?,
            rsi: (*self.rsi.get(i)?)?,
            volume_avg: (*self.volume_avg.get(i)?)?,
        })
    }

    /// The previous and latest rows, both fully defined.
    pub fn trailing_pair(&self) -> Result<(IndicatorRow, IndicatorRow), ScanError> {
        let n = self.len();
        if n < 2 {
            return Err(ScanError::ComputationGap {
                reason: format!("need 2 rows, frame has {n}"),
            });
        }

        match (self.row(n - 2), self.row(n - 1)) {
            (Some(prev), Some(last)) => Ok((prev, last)),
            _ => Err(ScanError::ComputationGap {
                reason: format!("undefined indicator value in last two of {n} rows"),
            }),
        }
    }
}

/// Pure, deterministic indicator computation.
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    params: IndicatorParams,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn compute(&self, series: &Series) -> IndicatorFrame {
        let closes = series.closes();
        let volumes = series.volumes();
        let p = &self.params;

        IndicatorFrame {
            ema_fast: ema_series(&closes, p.fast_span, p.ema_weighting),
            ema_slow: ema_series(&closes, p.slow_span, p.ema_weighting),
            rsi: rsi_series(&closes, p.rsi_period),
            volume_avg: sma_series(&volumes, p.volume_window),
        }
    }
}
