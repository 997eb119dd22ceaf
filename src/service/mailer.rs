use async_trait::async_trait;
use tracing::info;

use crate::error::MonitorError;
use crate::types::alert::AlertMessage;

/// Outbound message delivery. Implementations report failure through the
/// returned `Result` and never panic across the dispatch loop.
#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, message: &AlertMessage) -> Result<(), MonitorError>;
}

/// Writes alerts to the log. Used when no mail relay is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, message: &AlertMessage) -> Result<(), MonitorError> {
        info!(
            recipient = %message.recipient,
            subject = %message.subject,
            "alert delivered to log (no mail relay configured)"
        );
        Ok(())
    }
}
