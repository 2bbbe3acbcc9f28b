// =============================================================================
// Perp Signal Scanner — Main Entry Point
// =============================================================================
//
// Scans a fixed list of USDⓈ-M perpetuals every few minutes and publishes
// EMA-cross / RSI / volume-spike signals to Telegram.  Without Telegram
// credentials the scanner runs in dry-run mode and only logs the messages.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod binance;
mod config;
mod error;
mod indicators;
mod market_data;
mod notifier;
mod scanner;
mod signals;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::binance::BinanceFuturesClient;
use crate::config::{Credentials, ScannerConfig};
use crate::notifier::{LogNotifier, MessageTemplate, Notifier, TelegramNotifier};
use crate::scanner::ScanLoop;

const DEFAULT_CONFIG_PATH: &str = "scanner_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Perp Signal Scanner starting up");

    let config_path =
        std::env::var("SCANNER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = ScannerConfig::load_or_default(&config_path)?;
    config.apply_env_overrides(|name| std::env::var(name).ok())?;
    config
        .validate()
        .with_context(|| format!("invalid scanner config ({config_path})"))?;

    let creds = Credentials::from_env();

    info!(
        symbols = ?config.symbols,
        interval = %config.interval,
        lookback = config.lookback,
        cadence_secs = config.cadence_secs,
        "configuration ready"
    );

    // ── 2. Market data client ────────────────────────────────────────────
    let client = Arc::new(BinanceFuturesClient::new(
        creds.binance_api_key.as_deref(),
        config.fetch_timeout(),
    )?);

    // ── 3. Notifier ──────────────────────────────────────────────────────
    let template = MessageTemplate {
        footer: config.message_footer.clone(),
    };

    let notifier: Arc<dyn Notifier> = match creds.telegram() {
        Some((token, chat_id)) => {
            info!(chat_id, "publishing signals to Telegram");
            Arc::new(TelegramNotifier::new(
                token,
                chat_id,
                template,
                config.delivery_timeout(),
            )?)
        }
        None => {
            warn!("Telegram credentials not set, dry-run: signals are only logged");
            Arc::new(LogNotifier::new(template))
        }
    };

    // ── 4. Shutdown wiring ───────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        warn!("Shutdown signal received — finishing current cycle");
        let _ = shutdown_tx.send(true);
    });

    // ── 5. Scan loop ─────────────────────────────────────────────────────
    let scan = ScanLoop::new(&config, client, notifier);
    let cycles = scan.run(shutdown_rx).await;

    info!(cycles, "Perp Signal Scanner shut down complete.");
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        if let Err(e) = res {
                            error!(error = %e, "failed to listen for Ctrl-C");
                        }
                    }
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => error!(error = %e, "failed to install SIGTERM handler"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl-C");
    }
}
