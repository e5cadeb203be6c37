//! Boundary traits for everything outside the process: the chat platform,
//! the character-profile HTTP API, and the external bookkeeping ledger.
//!
//! The engine crates only ever talk to these traits. Tests swap in scripted
//! in-memory implementations; the composition root wires real transports.

pub mod chat;
pub mod ledger;
pub mod profile;
pub mod types;

pub use chat::{ChatClient, ChatError};
pub use ledger::{LedgerClient, LedgerError, RowHandle};
pub use profile::{ProfileError, ProfileLookup, ProfileResult};
pub use types::{ChannelId, IncomingMessage, MessageId, MessageRef, Reply, Signal, UserId};
