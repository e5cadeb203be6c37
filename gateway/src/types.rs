use std::fmt;

use serde::{Deserialize, Serialize};

/// Platform identifier of a user account.
pub type UserId = u64;
/// Platform identifier of a text channel (DM channels included).
pub type ChannelId = u64;
/// Platform identifier of a single message.
pub type MessageId = u64;

/// Fully-qualified reference to a message that can still be interacted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel: ChannelId,
    pub message: MessageId,
}

/// A reaction emblem as the platform names it ("✅", ":take:", ...).
///
/// Treated as an opaque string so instances can configure custom emotes
/// without the core caring what they render as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signal(String);

impl Signal {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message received from a user, with the pieces the engine cares about.
#[derive(Debug, Clone, Default)]
pub struct IncomingMessage {
    pub author: UserId,
    /// Channel the message arrived in (0 for DM-agnostic waits).
    pub channel: ChannelId,
    pub content: String,
    pub mentions: Vec<UserId>,
    /// URLs of uploaded attachments (proof-of-payment screenshots).
    pub attachments: Vec<String>,
}

/// First-of response to a prompt: either the user typed something or they
/// pressed one of the offered signals.
#[derive(Debug, Clone)]
pub enum Reply {
    Message(IncomingMessage),
    Signal(Signal),
}
