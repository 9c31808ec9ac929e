//! # Loopback Transport
//!
//! An in-process stand-in for the chat platform. Published messages are kept
//! in memory, reactions are pushed in by whoever plays the users (the HTTP
//! command surface, or a test), and [`Transport::collect_reactions`] waits out
//! the window on the tokio clock before returning what arrived in time.
//!
//! Timestamps use `tokio::time::Instant`, so tests running with a paused
//! clock control the window precisely.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use crate::core::model::{ChannelId, UserId};
use crate::core::tally::ReactionEvent;
use crate::core::transport::{IdentityResolver, MessageHandle, Transport, TransportError};

#[derive(Debug, Clone, Serialize)]
pub struct PostedReaction {
    pub symbol: String,
    pub user_id: UserId,
    #[serde(skip)]
    received_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostedMessage {
    pub id: String,
    pub channel: ChannelId,
    pub content: String,
    pub reactions: Vec<PostedReaction>,
    #[serde(skip)]
    published_at: Instant,
}

impl PostedMessage {
    pub fn handle(&self) -> MessageHandle {
        MessageHandle {
            channel: self.channel.clone(),
            message_id: self.id.clone(),
        }
    }
}

pub struct LoopbackTransport {
    own_account: UserId,
    next_id: AtomicU64,
    messages: Mutex<Vec<PostedMessage>>,
    unreachable: Mutex<HashSet<ChannelId>>,
    names: RwLock<HashMap<UserId, String>>,
}

impl LoopbackTransport {
    pub fn new(own_account: impl Into<UserId>) -> Self {
        Self {
            own_account: own_account.into(),
            next_id: AtomicU64::new(1),
            messages: Mutex::new(Vec::new()),
            unreachable: Mutex::new(HashSet::new()),
            names: RwLock::new(HashMap::new()),
        }
    }

    /// Makes every later publish to `channel` fail, as if it had been deleted.
    pub fn mark_unreachable(&self, channel: impl Into<ChannelId>) {
        self.unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.into());
    }

    pub fn remember_name(&self, user_id: impl Into<UserId>, display_name: impl Into<String>) {
        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.into(), display_name.into());
    }

    /// A user reacting to a published message.
    pub fn react(&self, message_id: &str, symbol: &str, user_id: &str) -> Result<(), TransportError> {
        let mut messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        let message = messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| TransportError::ReactionFailure {
                message: message_id.to_string(),
                symbol: symbol.to_string(),
                reason: "unknown message".to_string(),
            })?;
        message.reactions.push(PostedReaction {
            symbol: symbol.to_string(),
            user_id: user_id.to_string(),
            received_at: Instant::now(),
        });
        debug!(message = %message_id, symbol = %symbol, user = %user_id, "Reaction added");
        Ok(())
    }

    pub fn message(&self, message_id: &str) -> Option<PostedMessage> {
        let messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        messages.iter().find(|m| m.id == message_id).cloned()
    }

    /// Messages published to `channel`, oldest first.
    pub fn messages_in(&self, channel: &str) -> Vec<PostedMessage> {
        let messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        messages.iter().filter(|m| m.channel == channel).cloned().collect()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn own_account_id(&self) -> UserId {
        self.own_account.clone()
    }

    async fn publish(&self, destination: &ChannelId, content: &str) -> Result<MessageHandle, TransportError> {
        let unreachable = self
            .unreachable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(destination);
        if unreachable {
            return Err(TransportError::PublishFailure {
                channel: destination.clone(),
                reason: "channel is not reachable".to_string(),
            });
        }

        let message = PostedMessage {
            id: self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
            channel: destination.clone(),
            content: content.to_string(),
            reactions: Vec::new(),
            published_at: Instant::now(),
        };
        let handle = message.handle();
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        info!(channel = %destination, message = %handle.message_id, "Message published");
        Ok(handle)
    }

    async fn attach_reaction(&self, message: &MessageHandle, symbol: &str) -> Result<(), TransportError> {
        self.react(&message.message_id, symbol, &self.own_account)
    }

    async fn collect_reactions(
        &self,
        message: &MessageHandle,
        window: Duration,
        allowed_symbols: &[String],
    ) -> Result<Vec<ReactionEvent>, TransportError> {
        let unknown = || TransportError::CollectFailure {
            message: message.message_id.clone(),
            reason: "unknown message".to_string(),
        };

        let published_at = self.message(&message.message_id).ok_or_else(unknown)?.published_at;
        let closes_at = published_at + window;
        sleep_until(closes_at).await;

        let posted = self.message(&message.message_id).ok_or_else(unknown)?;
        let in_time: Vec<&PostedReaction> = posted
            .reactions
            .iter()
            .filter(|r| r.received_at < closes_at)
            .collect();

        let mut events = Vec::new();
        for symbol in allowed_symbols {
            events.extend(
                in_time
                    .iter()
                    .filter(|r| &r.symbol == symbol)
                    .map(|r| ReactionEvent::new(r.symbol.clone(), r.user_id.clone())),
            );
        }
        debug!(message = %message.message_id, reactions = events.len(), "Reactions collected");
        Ok(events)
    }
}

impl IdentityResolver for LoopbackTransport {
    fn display_name(&self, author_id: &str) -> Option<String> {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(author_id)
            .cloned()
    }
}
