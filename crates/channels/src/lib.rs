//! Host-facing message model.
//!
//! Platform adapters resolve raw wire events into the types defined here and
//! hand them to a [`MessageReceiver`] supplied by the host bot framework.

pub mod error;
pub mod message;
pub mod model;
pub mod plugin;

pub use {
    error::{Error, Result},
    message::{
        CanonicalMessage, EnterMessage, FileSharedMessage, LeaveMessage, MeMessage, Mention,
        MentionInfo, MentionKind, PresenceChangeMessage, ReactionItem, ReactionKind,
        ReactionMessage, TextMessage, TopicChangeMessage,
    },
    model::{Conversation, User},
    plugin::{MessageReceiver, MessageSender},
};
