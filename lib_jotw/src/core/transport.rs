use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{ChannelId, UserId};
use super::tally::ReactionEvent;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to publish to channel {channel}: {reason}")]
    PublishFailure { channel: ChannelId, reason: String },

    #[error("failed to add reaction {symbol} to message {message}: {reason}")]
    ReactionFailure {
        message: String,
        symbol: String,
        reason: String,
    },

    #[error("failed to collect reactions for message {message}: {reason}")]
    CollectFailure { message: String, reason: String },
}

/// A message published by the transport, enough to react to it and collect
/// reactions from it later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub channel: ChannelId,
    pub message_id: String,
}

/// # Transport
///
/// The chat platform as the poll cycle sees it. Implementations own the
/// connection, rate limiting and the wait behind
/// [`Transport::collect_reactions`]; the controller only awaits it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Account the bot posts and seeds reactions as.
    fn own_account_id(&self) -> UserId;

    async fn publish(&self, destination: &ChannelId, content: &str) -> Result<MessageHandle, TransportError>;

    async fn attach_reaction(&self, message: &MessageHandle, symbol: &str) -> Result<(), TransportError>;

    /// Waits out `window`, measured from when `message` was published, and
    /// returns every reaction with one of `allowed_symbols` received before it
    /// closed. Events are grouped by symbol in `allowed_symbols` order.
    async fn collect_reactions(
        &self,
        message: &MessageHandle,
        window: Duration,
        allowed_symbols: &[String],
    ) -> Result<Vec<ReactionEvent>, TransportError>;
}

/// Resolves a user's current display name. Used for rendering only, never
/// for identity comparison.
pub trait IdentityResolver: Send + Sync {
    fn display_name(&self, author_id: &str) -> Option<String>;
}

/// Resolver that knows nobody; rendering falls back to the name captured at
/// submission.
pub struct StoredNames;

impl IdentityResolver for StoredNames {
    fn display_name(&self, _author_id: &str) -> Option<String> {
        None
    }
}
