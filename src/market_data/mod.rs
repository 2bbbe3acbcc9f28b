pub mod series;

pub use series::{Candle, Series};

use async_trait::async_trait;

use crate::error::ScanError;

/// Source of recent OHLCV history for one instrument.
///
/// Implementations perform exactly one outbound request per call and must
/// bound it with a timeout.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    async fn fetch(
        &self,
        instrument: &str,
        interval: &str,
        count: usize,
    ) -> Result<Series, ScanError>;
}
