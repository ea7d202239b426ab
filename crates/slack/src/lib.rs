//! Slack adapter for the slackbridge message model.
//!
//! Consumes raw Slack events, resolves the users, bots and conversations they
//! reference through cached Web API lookups, rewrites message markup into
//! plain text, and hands one canonical message per accepted event to a
//! [`slackbridge_channels::MessageReceiver`].

pub mod bridge;
pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod event;
pub mod mention;
pub mod normalizer;
pub mod sync;
pub mod telemetry;
pub mod web_api;

#[cfg(test)]
mod testing;

pub use {
    bridge::{BridgeTasks, SlackBridge},
    cache::Lookup,
    config::{BotSelf, SlackAccountConfig},
    directory::DirectoryApi,
    error::{Error, Result},
    event::RawEvent,
    mention::{MentionRewriter, RenderedText},
    normalizer::{Dispatch, DropReason, Normalizer},
    web_api::SlackWebApi,
};
