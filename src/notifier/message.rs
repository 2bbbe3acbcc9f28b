// =============================================================================
// Signal Message — Telegram Markdown template
// =============================================================================

use std::fmt::Write as _;

use crate::signals::Signal;

/// Render settings shared by every notifier.  Prices are printed at the
/// precision carried by the signal.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    /// Tag line appended after a blank line.  Empty disables it.
    pub footer: String,
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self {
            footer: "#Futures #CryptoSignals".to_string(),
        }
    }
}

impl MessageTemplate {
    /// Render `signal` as a Telegram (legacy) Markdown message.
    pub fn render(&self, signal: &Signal) -> String {
        let prec = signal.precision as usize;
        let px = |v: f64| format!("${v:.prec$}");

        let mut out = String::new();
        // write! into a String cannot fail
        let _ = writeln!(
            out,
            "🔥 *{} SIGNAL* | {} Perpetual 🔥",
            signal.direction, signal.instrument
        );
        out.push('\n');
        let _ = writeln!(
            out,
            "📈 *Entry Zone*: {} – {}",
            px(signal.entry_low),
            px(signal.entry_high)
        );
        for (k, tp) in signal.take_profits.iter().enumerate() {
            let _ = writeln!(out, "🎯 *TP{}*: {} ({}%)", k + 1, px(tp.price), tp.pct);
        }
        let _ = writeln!(
            out,
            "🛑 *SL*: {} ({}% Risk)",
            px(signal.stop_loss.price),
            signal.stop_loss.pct
        );
        out.push('\n');
        let _ = writeln!(out, "⚡ *Reason*: {}", signal.reason);
        let _ = write!(
            out,
            "💪 *Leverage*: {} | Confidence: {}%",
            signal.leverage, signal.confidence
        );

        if !self.footer.is_empty() {
            let _ = write!(out, "\n\n{}", self.footer);
        }

        out
    }
}
