use serde::{Deserialize, Serialize};

use crate::error::ScanError;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV candle from the futures kline endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: i64,
    ) -> Self {
        Self {
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

// ---------------------------------------------------------------------------
// Series -- one fetch worth of candles for a single (symbol, interval)
// ---------------------------------------------------------------------------

/// Candles for one instrument and one sampling interval, oldest first.
///
/// Timestamps are strictly increasing.  Gaps in the upstream data are kept
/// as-is; nothing is filled in.
#[derive(Debug, Clone)]
pub struct Series {
    instrument: String,
    interval: String,
    candles: Vec<Candle>,
}

impl Series {
    /// Build a series, rejecting out-of-order or duplicated open times.
    pub fn new(
        instrument: impl Into<String>,
        interval: impl Into<String>,
        candles: Vec<Candle>,
    ) -> Result<Self, ScanError> {
        let instrument = instrument.into();

        if let Some(pos) = candles
            .windows(2)
            .position(|w| w[1].open_time <= w[0].open_time)
        {
            return Err(ScanError::data_unavailable(
                instrument,
                format!(
                    "candle timestamps not strictly ascending at index {} ({} -> {})",
                    pos + 1,
                    candles[pos].open_time,
                    candles[pos + 1].open_time
                ),
            ));
        }

        Ok(Self {
            instrument,
            interval: interval.into(),
            candles,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    #[cfg(test)]
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
