//! Messaging trait and dynamic dispatch companion.

use crate::HistoryMessage;
use crate::error::Result;
use std::future::Future;
use std::pin::Pin;

/// Static trait for the channel the bot reads from and posts to.
/// Use this for type-safe implementations.
pub trait Messaging: Send + Sync + 'static {
    /// Unique name for this adapter.
    fn name(&self) -> &str;

    /// Fetch up to `limit` recent messages, newest first.
    fn fetch_recent(&self, limit: u8) -> impl Future<Output = Result<Vec<HistoryMessage>>> + Send;

    /// Post a message without triggering push or desktop notifications.
    fn send_silent(&self, text: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Dynamic trait for runtime polymorphism.
/// Use this when you need `Arc<dyn MessagingDyn>`.
pub trait MessagingDyn: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn fetch_recent<'a>(
        &'a self,
        limit: u8,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoryMessage>>> + Send + 'a>>;

    fn send_silent<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Blanket implementation: any type implementing Messaging automatically implements MessagingDyn.
impl<T: Messaging> MessagingDyn for T {
    fn name(&self) -> &str {
        Messaging::name(self)
    }

    fn fetch_recent<'a>(
        &'a self,
        limit: u8,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<HistoryMessage>>> + Send + 'a>> {
        Box::pin(Messaging::fetch_recent(self, limit))
    }

    fn send_silent<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(Messaging::send_silent(self, text))
    }
}
