// =============================================================================
// Notifier Module
// =============================================================================
//
// Delivers a rendered signal to one preconfigured channel.  A failed delivery
// is reported as `ScanError::Delivery`; the scan loop logs it and moves on.
// The signal is not retried.

pub mod dry_run;
pub mod message;
pub mod telegram;

pub use dry_run::LogNotifier;
pub use message::MessageTemplate;
pub use telegram::TelegramNotifier;

use async_trait::async_trait;

use crate::error::ScanError;
use crate::signals::Signal;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, signal: &Signal) -> Result<(), ScanError>;
}
