use async_trait::async_trait;
use tracing::info;

use super::{MessageTemplate, Notifier};
use crate::error::ScanError;
use crate::signals::Signal;

/// Dry-run notifier: writes the rendered message to the log.
///
/// Selected when no Telegram credentials are configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    template: MessageTemplate,
}

impl LogNotifier {
    pub fn new(template: MessageTemplate) -> Self {
        Self { template }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, signal: &Signal) -> Result<(), ScanError> {
        let text = self.template.render(signal);
        info!(
            signal_id = %signal.id,
            symbol = %signal.instrument,
            direction = %signal.direction,
            "dry-run signal:\n{text}"
        );
        Ok(())
    }
}
