//! Operator notification channel.

use async_trait::async_trait;

/// Best-effort, fire-and-forget operator messages.
///
/// Implementations log their own delivery failures; callers never see them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}
