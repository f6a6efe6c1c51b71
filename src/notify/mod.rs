pub mod telegram;

use anyhow::Result;

/// Delivery seam. One implementation talks to Telegram; tests substitute a
/// recording notifier.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Send one HTML-formatted message to the configured destination.
    async fn send(&self, text: &str) -> Result<()>;
}
