//! In-memory directory for unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use {
    async_trait::async_trait,
    serde_json::{Map, Value},
    slackbridge_channels::Conversation,
    tokio::sync::Notify,
};

use crate::{
    Error, Result,
    directory::{BotInfo, DirectoryApi, SlackUser, UsersPage},
};

/// Directory backed by maps, counting every call it serves.
///
/// Ids (and `users.list` cursors) passed to [`FakeDirectory::fail`] answer
/// with a transport-style error instead of their data. User ids passed to
/// [`FakeDirectory::hold`] answer only once the returned gate is notified.
#[derive(Default)]
pub struct FakeDirectory {
    users: HashMap<String, SlackUser>,
    bots: HashMap<String, BotInfo>,
    conversations: HashMap<String, Conversation>,
    pages: Vec<Vec<SlackUser>>,
    failing: Mutex<HashSet<String>>,
    held: Mutex<HashMap<String, Arc<Notify>>>,
    user_calls: AtomicUsize,
    bot_calls: AtomicUsize,
    conversation_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

pub fn slack_user(id: &str, name: &str) -> SlackUser {
    let mut profile = Map::new();
    profile.insert("email".into(), Value::String(format!("{name}@example.com")));
    SlackUser {
        id: id.into(),
        name: Some(name.into()),
        real_name: Some(format!("{name} (real)")),
        profile: Some(profile),
        rest: Map::new(),
    }
}

impl FakeDirectory {
    pub fn with_user(mut self, id: &str, name: &str) -> Self {
        self.users.insert(id.into(), slack_user(id, name));
        self
    }

    pub fn with_bot(mut self, id: &str, user_id: Option<&str>) -> Self {
        self.bots.insert(id.into(), BotInfo {
            id: id.into(),
            name: Some(format!("{id}-bot")),
            user_id: user_id.map(Into::into),
        });
        self
    }

    pub fn with_channel(mut self, id: &str, name: &str) -> Self {
        self.conversations.insert(id.into(), Conversation {
            id: id.into(),
            name: Some(name.into()),
            ..Conversation::default()
        });
        self
    }

    pub fn with_im(mut self, id: &str) -> Self {
        self.conversations.insert(id.into(), Conversation {
            id: id.into(),
            is_im: true,
            ..Conversation::default()
        });
        self
    }

    /// Pages served by `users.list`. Page `n > 0` is requested with cursor
    /// `page-n`.
    pub fn with_pages(mut self, pages: Vec<Vec<SlackUser>>) -> Self {
        self.pages = pages;
        self
    }

    pub fn fail(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.into());
    }

    pub fn hold(&self, user_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.held
            .lock()
            .unwrap()
            .insert(user_id.into(), Arc::clone(&gate));
        gate
    }

    pub fn user_calls(&self) -> usize {
        self.user_calls.load(Ordering::SeqCst)
    }

    pub fn bot_calls(&self) -> usize {
        self.bot_calls.load(Ordering::SeqCst)
    }

    pub fn conversation_calls(&self) -> usize {
        self.conversation_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check(&self, method: &str, id: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(id) {
            return Err(Error::api(method, "fatal_error"));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryApi for FakeDirectory {
    async fn get_user(&self, user_id: &str) -> Result<SlackUser> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.held.lock().unwrap().get(user_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check("users.info", user_id)?;
        self.users
            .get(user_id)
            .cloned()
            .ok_or_else(|| Error::api("users.info", "user_not_found"))
    }

    async fn list_users(&self, _page_size: u32, cursor: Option<&str>) -> Result<UsersPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let index = match cursor {
            None => 0,
            Some(cursor) => {
                self.check("users.list", cursor)?;
                cursor
                    .strip_prefix("page-")
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| Error::api("users.list", "invalid_cursor"))?
            },
        };
        let members = self.pages.get(index).cloned().unwrap_or_default();
        let next_cursor = (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1));
        Ok(UsersPage {
            members,
            next_cursor,
        })
    }

    async fn get_bot(&self, bot_id: &str) -> Result<BotInfo> {
        self.bot_calls.fetch_add(1, Ordering::SeqCst);
        self.check("bots.info", bot_id)?;
        self.bots
            .get(bot_id)
            .cloned()
            .ok_or_else(|| Error::api("bots.info", "bot_not_found"))
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation> {
        self.conversation_calls.fetch_add(1, Ordering::SeqCst);
        self.check("conversations.info", conversation_id)?;
        self.conversations
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| Error::api("conversations.info", "channel_not_found"))
    }
}
