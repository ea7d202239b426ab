use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

use crate::{Error, Result};

/// Keys owned by the fixed user schema. Extra attributes may not shadow them.
const RESERVED_USER_KEYS: &[&str] = &["id", "name", "real_name", "email_address", "platform", "room"];

/// A chat user as seen by the host framework.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    /// Every field of the platform's own user payload, kept verbatim.
    #[serde(default)]
    pub platform: Map<String, Value>,
    /// Conversation the user was last seen in. Stamped per received message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Attributes attached by other subsystems. Directory data never carries
    /// these, so they survive every merge.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Placeholder actor for events that name neither a user nor a bot.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_empty()
    }

    /// Best human-readable name: the handle, then the real name, then the id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.real_name.as_deref().filter(|name| !name.is_empty()))
            .unwrap_or(&self.id)
    }

    /// Merge a fresh representation over the previously stored one.
    ///
    /// `self` is the new representation and wins for every key it defines.
    /// Keys only `previous` defines (a missing e-mail, extra attributes) are
    /// carried over. `room` is transient and never carried.
    #[must_use]
    pub fn merged_with(mut self, previous: &User) -> User {
        if self.email_address.is_none() {
            self.email_address = previous.email_address.clone();
        }
        for (key, value) in &previous.extra {
            self.extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self.room = None;
        self
    }

    /// Attach an attribute that directory data does not know about.
    pub fn set_extra(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        if RESERVED_USER_KEYS.contains(&key.as_str()) {
            return Err(Error::invalid_input(format!(
                "user attribute '{key}' is part of the fixed schema"
            )));
        }
        self.extra.insert(key, value);
        Ok(())
    }

    /// Copy of this user stamped with the conversation an event happened in.
    #[must_use]
    pub fn in_room(&self, room: impl Into<String>) -> User {
        let mut user = self.clone();
        user.room = Some(room.into());
        user
    }
}

/// A conversation snapshot: public/private channel, DM or multi-party DM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_im: bool,
    #[serde(default)]
    pub is_mpim: bool,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub topic: Option<String>,
}

impl Conversation {
    /// Direct and multi-party direct messages have no name or topic.
    pub fn is_direct(&self) -> bool {
        self.is_im || self.is_mpim
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.id)
    }
}
