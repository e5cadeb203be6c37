//! The ask-via-message-or-reaction primitive every intake and lifecycle
//! prompt is built on.

use std::time::Duration;

use gateway::{ChatClient, ChatError, IncomingMessage, Reply, Signal, UserId};

use crate::error::EngineError;

/// How many off-script answers a signal question tolerates before failing.
const SIGNAL_RETRIES: u32 = 5;

/// A DM conversation with one user, with cancel-signal and timeout
/// semantics applied uniformly.
pub struct Prompter<'a> {
    pub chat: &'a dyn ChatClient,
    pub user: UserId,
    pub cancel: Signal,
    pub timeout: Duration,
}

impl Prompter<'_> {
    pub async fn send_line(&self, text: &str) -> Result<(), EngineError> {
        self.chat.send_dm(self.user, text).await?;
        Ok(())
    }

    /// Send "Please respond with {what}", seed the offered signals plus the
    /// cancel signal, and wait for the first answer. A cancel reaction
    /// surfaces as [`EngineError::Cancelled`].
    pub async fn ask(&self, what: &str, offered: &[Signal]) -> Result<Reply, EngineError> {
        let anchor = self
            .chat
            .send_dm(self.user, &format!("Please respond with {what}"))
            .await?;

        for signal in offered {
            self.chat.add_signal(anchor, signal).await?;
        }
        self.chat.add_signal(anchor, &self.cancel).await?;

        let mut all: Vec<Signal> = offered.to_vec();
        all.push(self.cancel.clone());

        match self.chat.await_reply(self.user, anchor, &all, self.timeout).await {
            Ok(Reply::Signal(s)) if s == self.cancel => Err(EngineError::Cancelled),
            Ok(reply) => Ok(reply),
            Err(ChatError::Timeout) => Err(EngineError::TimedOut),
            Err(e) => Err(e.into()),
        }
    }

    /// Ask for a typed answer, returning the trimmed message content.
    pub async fn ask_text(&self, what: &str) -> Result<String, EngineError> {
        match self.ask(what, &[]).await? {
            Reply::Message(m) => Ok(m.content.trim().to_string()),
            Reply::Signal(s) => Err(EngineError::RequestFailed(format!(
                "Unexpected reaction {s} to a text question"
            ))),
        }
    }

    /// Ask a fixed-choice question answered with one of `options`. Typed
    /// answers get a nudge and another chance.
    pub async fn ask_signal(&self, what: &str, options: &[Signal]) -> Result<Signal, EngineError> {
        for _ in 0..SIGNAL_RETRIES {
            match self.ask(what, options).await? {
                Reply::Signal(s) if options.contains(&s) => return Ok(s),
                Reply::Signal(_) | Reply::Message(_) => {
                    self.send_line("Please answer with one of the offered reactions.")
                        .await?;
                }
            }
        }
        Err(EngineError::RequestFailed(
            "Too many invalid responses, please start over".to_string(),
        ))
    }
}

/// Wait up to `timeout` for `user` to send a message mentioning somebody;
/// other messages from them are ignored. `None` on timeout.
pub(crate) async fn await_mention(
    chat: &dyn ChatClient,
    user: UserId,
    timeout: Duration,
) -> Result<Option<UserId>, EngineError> {
    await_matching(chat, user, timeout, |m| m.mentions.first().copied()).await
}

/// Wait up to `timeout` for `user` to send a message with an attachment;
/// returns the first attachment URL, or `None` on timeout.
pub(crate) async fn await_attachment(
    chat: &dyn ChatClient,
    user: UserId,
    timeout: Duration,
) -> Result<Option<String>, EngineError> {
    await_matching(chat, user, timeout, |m| m.attachments.first().cloned()).await
}

async fn await_matching<T>(
    chat: &dyn ChatClient,
    user: UserId,
    timeout: Duration,
    extract: impl Fn(&IncomingMessage) -> Option<T>,
) -> Result<Option<T>, EngineError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        match chat.await_user_message(user, deadline - now).await {
            Ok(msg) => {
                if let Some(found) = extract(&msg) {
                    return Ok(Some(found));
                }
            }
            Err(ChatError::Timeout) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
}
