use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ChannelId, IncomingMessage, MessageRef, Reply, Signal, UserId};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("timed out waiting for a response")]
    Timeout,

    #[error("channel not found: {0}")]
    ChannelNotFound(ChannelId),

    #[error("message not found: {0:?}")]
    MessageNotFound(MessageRef),

    #[error("user not found: {0}")]
    UserNotFound(UserId),

    #[error("chat transport error: {0}")]
    Transport(String),
}

/// Everything the engine needs from the chat platform.
///
/// Implementations are expected to be cheap to clone behind an `Arc` and to
/// resolve `await_*` calls from the platform's event stream. `fetch_reactors`
/// must already exclude bot accounts.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Direct-message a user. Returns a reference to the sent message so
    /// signals can be seeded on it.
    async fn send_dm(&self, user: UserId, text: &str) -> Result<MessageRef, ChatError>;

    async fn send_channel(&self, channel: ChannelId, text: &str) -> Result<MessageRef, ChatError>;

    async fn edit_message(&self, target: MessageRef, text: &str) -> Result<(), ChatError>;

    async fn delete_message(&self, target: MessageRef) -> Result<(), ChatError>;

    /// Seed a reaction on a message so users can respond with one click.
    async fn add_signal(&self, target: MessageRef, signal: &Signal) -> Result<(), ChatError>;

    async fn clear_signals(&self, target: MessageRef) -> Result<(), ChatError>;

    /// Non-bot users currently reacting with `signal` on `target`.
    async fn fetch_reactors(
        &self,
        target: MessageRef,
        signal: &Signal,
    ) -> Result<Vec<UserId>, ChatError>;

    /// Wait for the first of: a message from `user` in the channel of
    /// `anchor`, or one of the `offered` signals pressed by `user` on
    /// `anchor`. Elapses into `ChatError::Timeout`.
    async fn await_reply(
        &self,
        user: UserId,
        anchor: MessageRef,
        offered: &[Signal],
        timeout: Duration,
    ) -> Result<Reply, ChatError>;

    /// Wait for any message from `user`, regardless of channel. Used for
    /// teammate mentions and proof-of-payment uploads.
    async fn await_user_message(
        &self,
        user: UserId,
        timeout: Duration,
    ) -> Result<IncomingMessage, ChatError>;

    async fn display_name(&self, user: UserId) -> Result<String, ChatError>;
}
