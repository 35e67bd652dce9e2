//! Notifier that only writes to the log.

use async_trait::async_trait;
use keeper_core::Notifier;
use tracing::warn;

/// Fallback when no chat is configured: every message becomes a `warn` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) {
        warn!(target: "keeper::alert", "{message}");
    }
}
