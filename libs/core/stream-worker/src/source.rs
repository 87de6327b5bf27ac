//! The subscription seam between the worker loop and a broker.

use crate::error::StreamError;
use crate::message::StreamMessage;
use async_trait::async_trait;

/// A consumer-group subscription to one stream.
///
/// The worker owns its source exclusively. It calls `subscribe` once, then
/// `pull` until told to stop, and finally `release`.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Establish the subscription. Errors here are fatal to the worker.
    async fn subscribe(&self) -> Result<(), StreamError>;

    /// Wait for the next message.
    ///
    /// `Ok(None)` means the blocking wait elapsed without a message.
    /// `Err(StreamError::Closed)` means the subscription is gone for good;
    /// any other error is worth pulling again.
    async fn pull(&self) -> Result<Option<StreamMessage>, StreamError>;

    /// Mark a message as consumed by the group.
    async fn commit(&self, message: &StreamMessage) -> Result<(), StreamError>;

    /// Park a message on the dead-letter destination. Does not commit it.
    async fn dead_letter(&self, message: &StreamMessage, reason: &str) -> Result<(), StreamError>;

    /// Release the subscription. Calling it again is a no-op.
    async fn release(&self) -> Result<(), StreamError>;

    /// Human-readable "stream/group/consumer" for logs.
    fn describe(&self) -> String;
}
