// =============================================================================
// Scan Loop — periodic fetch → compute → evaluate → deliver
// =============================================================================
//
// One cycle walks every configured instrument.  Failures are isolated per
// instrument: a fetch error or an undeliverable signal is logged and the
// cycle moves on.  Nothing is carried from one cycle to the next.
//
// Cycles never overlap.  The cadence sleep starts when a cycle ends, so a
// slow cycle pushes the next one back instead of stacking up behind it.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::error::{ScanError, Stage};
use crate::indicators::IndicatorEngine;
use crate::market_data::MarketDataClient;
use crate::notifier::Notifier;
use crate::signals::{Evaluation, Signal, SignalEvaluator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Scanning,
    Sleeping,
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scanning => write!(f, "SCANNING"),
            Self::Sleeping => write!(f, "SLEEPING"),
        }
    }
}

/// What happened to one instrument in one cycle.
#[derive(Debug)]
pub enum InstrumentOutcome {
    /// The rule fired.  `delivery` holds the notifier's verdict.
    Signalled {
        signal: Signal,
        delivery: Result<(), ScanError>,
    },
    NoSignal { detail: String },
    Failed { stage: Stage, error: ScanError },
}

impl InstrumentOutcome {
    pub fn is_signal(&self) -> bool {
        matches!(self, Self::Signalled { .. })
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Signalled { delivery: Ok(()), .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Summary of one completed cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub cycle: u64,
    pub outcomes: Vec<(String, InstrumentOutcome)>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn signals(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_signal()).count()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_delivered()).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }

    #[cfg(test)]
    pub fn outcome(&self, symbol: &str) -> Option<&InstrumentOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, o)| o)
    }
}

pub struct ScanLoop {
    symbols: Vec<String>,
    interval: String,
    lookback: usize,
    cadence: Duration,
    fetch_timeout: Duration,
    delivery_timeout: Duration,
    parallel: bool,
    client: Arc<dyn MarketDataClient>,
    notifier: Arc<dyn Notifier>,
    engine: IndicatorEngine,
    evaluator: SignalEvaluator,
}

impl ScanLoop {
    pub fn new(
        config: &ScannerConfig,
        client: Arc<dyn MarketDataClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            symbols: config.symbols.clone(),
            interval: config.interval.clone(),
            lookback: config.lookback,
            cadence: config.cadence(),
            fetch_timeout: config.fetch_timeout(),
            delivery_timeout: config.delivery_timeout(),
            parallel: config.parallel_instruments,
            client,
            notifier,
            engine: IndicatorEngine::new(config.indicators.clone()),
            evaluator: SignalEvaluator::new(config.signal.clone()),
        }
    }

    /// Run cycles until `shutdown` flips to `true` (or its sender is
    /// dropped).  Returns the number of completed cycles.
    ///
    /// A shutdown raised mid-cycle takes effect once that cycle finishes;
    /// every network call in it is timeout-bounded.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut cycle: u64 = 0;
        let mut phase = ScanPhase::Scanning;

        info!(
            symbols = ?self.symbols,
            interval = %self.interval,
            cadence_secs = self.cadence.as_secs(),
            parallel = self.parallel,
            "scan loop started"
        );

        loop {
            debug!(%phase, cycle = cycle + 1, "phase change");
            cycle += 1;
            let report = self.run_cycle(cycle).await;
            info!(
                cycle = report.cycle,
                instruments = report.outcomes.len(),
                signals = report.signals(),
                delivered = report.delivered(),
                failures = report.failures(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "cycle complete"
            );

            if *shutdown.borrow() {
                break;
            }

            phase = ScanPhase::Sleeping;
            debug!(%phase, secs = self.cadence.as_secs(), "phase change");
            if !sleep_or_shutdown(self.cadence, &mut shutdown).await {
                break;
            }
            phase = ScanPhase::Scanning;
        }

        info!(cycles = cycle, "scan loop stopped");
        cycle
    }

    /// Scan every configured instrument once.
    pub async fn run_cycle(&self, cycle: u64) -> CycleReport {
        let started = Instant::now();

        let outcomes: Vec<(String, InstrumentOutcome)> = if self.parallel {
            let results = join_all(self.symbols.iter().map(|s| self.scan_instrument(s))).await;
            self.symbols.iter().cloned().zip(results).collect()
        } else {
            let mut outcomes = Vec::with_capacity(self.symbols.len());
            for symbol in &self.symbols {
                let outcome = self.scan_instrument(symbol).await;
                outcomes.push((symbol.clone(), outcome));
            }
            outcomes
        };

        CycleReport {
            cycle,
            outcomes,
            elapsed: started.elapsed(),
        }
    }

    /// Full pipeline for one instrument.  Always yields an outcome and logs
    /// exactly one line for it.
    pub async fn scan_instrument(&self, symbol: &str) -> InstrumentOutcome {
        let outcome = self.pipeline(symbol).await;
        log_outcome(symbol, &outcome);
        outcome
    }

    async fn pipeline(&self, symbol: &str) -> InstrumentOutcome {
        let fetched = timeout(
            self.fetch_timeout,
            self.client.fetch(symbol, &self.interval, self.lookback),
        )
        .await
        .unwrap_or_else(|_| {
            Err(ScanError::Timeout {
                stage: Stage::Fetch,
                instrument: symbol.to_string(),
                after: self.fetch_timeout,
            })
        });

        let series = match fetched {
            Ok(series) => series,
            Err(error) => {
                return InstrumentOutcome::Failed {
                    stage: Stage::Fetch,
                    error,
                }
            }
        };

        let frame = self.engine.compute(&series);
        let signal = match self.evaluator.evaluate(&series, &frame) {
            Evaluation::Signal(signal) => signal,
            Evaluation::NoSetup(conditions) => {
                return InstrumentOutcome::NoSignal {
                    detail: conditions.to_string(),
                }
            }
            Evaluation::Insufficient(reason) => {
                return InstrumentOutcome::NoSignal {
                    detail: format!("insufficient data: {reason}"),
                }
            }
        };

        let delivery = timeout(self.delivery_timeout, self.notifier.deliver(&signal))
            .await
            .unwrap_or_else(|_| {
                Err(ScanError::Timeout {
                    stage: Stage::Deliver,
                    instrument: symbol.to_string(),
                    after: self.delivery_timeout,
                })
            });

        InstrumentOutcome::Signalled { signal, delivery }
    }
}

/// Sleep for `period` unless shutdown is requested first.  Returns `false`
/// when the loop should stop.
async fn sleep_or_shutdown(period: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let deadline = Instant::now() + period;
    loop {
        tokio::select! {
            _ = sleep_until(deadline) => return true,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}

fn log_outcome(symbol: &str, outcome: &InstrumentOutcome) {
    match outcome {
        InstrumentOutcome::Signalled {
            signal,
            delivery: Ok(()),
        } => info!(
            symbol,
            signal_id = %signal.id,
            direction = %signal.direction,
            price = signal.reference_price,
            "signal delivered"
        ),
        InstrumentOutcome::Signalled {
            signal,
            delivery: Err(e),
        } => warn!(
            symbol,
            signal_id = %signal.id,
            direction = %signal.direction,
            error = %e,
            "signal not delivered"
        ),
        InstrumentOutcome::NoSignal { detail } => info!(symbol, %detail, "no signal"),
        InstrumentOutcome::Failed { stage, error } => {
            warn!(symbol, %stage, error = %error, "instrument skipped")
        }
    }
}
