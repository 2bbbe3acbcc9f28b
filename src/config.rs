// =============================================================================
// Scanner Configuration — JSON file + environment overrides
// =============================================================================
//
// Every tunable parameter lives here and is handed to the scan loop once at
// startup.  All fields carry `#[serde(default)]` so that a partial (or empty)
// file works and adding fields never breaks loading an older one.
//
// Secrets (bot token, API key) are read from the environment only and never
// serialised.
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::indicators::IndicatorParams;
use crate::signals::SignalParams;

/// Upper bound for rounding precision; keeps the rounding factor finite.
const MAX_PRICE_PRECISION: u32 = 8;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "SOLUSDT".to_string(),
        "BNBUSDT".to_string(),
        "XRPUSDT".to_string(),
    ]
}

fn default_interval() -> String {
    "5m".to_string()
}

fn default_lookback() -> usize {
    100
}

fn default_cadence_secs() -> u64 {
    300
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_footer() -> String {
    "#Futures #CryptoSignals".to_string()
}

// =============================================================================
// ScannerConfig
// =============================================================================

/// Top-level configuration for the scanner process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    // --- Universe & sampling ------------------------------------------------

    /// Perpetual-futures symbols scanned every cycle, in order.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Kline interval, e.g. "5m".
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Candles fetched per instrument per cycle.
    #[serde(default = "default_lookback")]
    pub lookback: usize,

    /// Seconds slept between the end of one cycle and the start of the next.
    #[serde(default = "default_cadence_secs")]
    pub cadence_secs: u64,

    // --- Network ------------------------------------------------------------

    #[serde(default = "default_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub delivery_timeout_secs: u64,

    /// Process instruments of one cycle concurrently instead of in order.
    #[serde(default)]
    pub parallel_instruments: bool,

    // --- Strategy -----------------------------------------------------------

    #[serde(default)]
    pub indicators: IndicatorParams,

    #[serde(default)]
    pub signal: SignalParams,

    // --- Presentation -------------------------------------------------------

    /// Tag line appended to every message.  Empty disables it.
    #[serde(default = "default_footer")]
    pub message_footer: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            interval: default_interval(),
            lookback: default_lookback(),
            cadence_secs: default_cadence_secs(),
            fetch_timeout_secs: default_timeout_secs(),
            delivery_timeout_secs: default_timeout_secs(),
            parallel_instruments: false,
            indicators: IndicatorParams::default(),
            signal: SignalParams::default(),
            message_footer: default_footer(),
        }
    }
}

impl ScannerConfig {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scanner config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scanner config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            interval = %config.interval,
            "scanner config loaded"
        );

        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file means defaults.  A file
    /// that exists but does not parse is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "scanner config not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Apply `SCANNER_*` overrides.  `lookup` is normally `std::env::var`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(syms) = lookup("SCANNER_SYMBOLS") {
            self.symbols = syms
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(iv) = lookup("SCANNER_INTERVAL") {
            self.interval = iv.trim().to_string();
        }
        if let Some(v) = lookup("SCANNER_CADENCE_SECS") {
            self.cadence_secs = v
                .trim()
                .parse()
                .with_context(|| format!("SCANNER_CADENCE_SECS is not an integer: {v}"))?;
        }
        if let Some(v) = lookup("SCANNER_LOOKBACK") {
            self.lookback = v
                .trim()
                .parse()
                .with_context(|| format!("SCANNER_LOOKBACK is not an integer: {v}"))?;
        }
        Ok(())
    }

    /// Reject configurations the scan loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            bail!("symbol list is empty");
        }
        if self.interval.is_empty() {
            bail!("interval is empty");
        }
        if self.lookback < 2 {
            bail!("lookback must be at least 2, got {}", self.lookback);
        }
        if self.cadence_secs == 0 {
            bail!("cadence_secs must be positive");
        }
        if self.fetch_timeout_secs == 0 || self.delivery_timeout_secs == 0 {
            bail!("network timeouts must be positive");
        }

        let ind = &self.indicators;
        if ind.fast_span == 0
            || ind.slow_span == 0
            || ind.rsi_period == 0
            || ind.volume_window == 0
        {
            bail!("indicator windows must be positive");
        }

        let sig = &self.signal;
        if sig.volume_multiplier <= 0.0 || sig.entry_band_pct <= 0.0 || sig.stop_loss_pct <= 0.0 {
            bail!("signal multipliers and offsets must be positive");
        }
        if sig.take_profit_pcts.iter().any(|p| *p <= 0.0) {
            bail!("take-profit offsets must be positive");
        }
        if sig.rsi_oversold >= sig.rsi_overbought {
            bail!(
                "rsi_oversold ({}) must be below rsi_overbought ({})",
                sig.rsi_oversold,
                sig.rsi_overbought
            );
        }
        if sig.price_precision > MAX_PRICE_PRECISION {
            bail!(
                "price_precision {} exceeds {MAX_PRICE_PRECISION}",
                sig.price_precision
            );
        }
        if let Some((symbol, p)) = sig
            .symbol_precision
            .iter()
            .find(|(_, p)| **p > MAX_PRICE_PRECISION)
        {
            bail!("symbol_precision for {symbol} is {p}, max {MAX_PRICE_PRECISION}");
        }

        let min = ind.min_lookback();
        if self.lookback < min {
            warn!(
                lookback = self.lookback,
                recommended = min,
                "lookback shorter than indicator warm-up; expect no signals"
            );
        }

        Ok(())
    }

    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.cadence_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Secrets read from the environment.
#[derive(Clone, Default)]
pub struct Credentials {
    pub binance_api_key: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Credentials {
    /// Read credentials through `lookup`.  `BOT_TOKEN` / `CHANNEL_ID` are
    /// accepted as fallbacks for the `TELEGRAM_*` names.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            binance_api_key: non_empty("BINANCE_API_KEY"),
            telegram_bot_token: non_empty("TELEGRAM_BOT_TOKEN").or_else(|| non_empty("BOT_TOKEN")),
            telegram_chat_id: non_empty("TELEGRAM_CHANNEL_ID").or_else(|| non_empty("CHANNEL_ID")),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Token and chat id, when both are present.
    pub fn telegram(&self) -> Option<(&str, &str)> {
        Some((
            self.telegram_bot_token.as_deref()?,
            self.telegram_chat_id.as_deref()?,
        ))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<redacted>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("binance_api_key", &mask(&self.binance_api_key))
            .field("telegram_bot_token", &mask(&self.telegram_bot_token))
            .field("telegram_chat_id", &self.telegram_chat_id)
            .finish()
    }
}
