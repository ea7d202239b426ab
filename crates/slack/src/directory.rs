//! Read-only directory lookups and the wire types they return.

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    slackbridge_channels::{Conversation, User},
};

use crate::Result;

/// A user object as returned by `users.info` / `users.list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl SlackUser {
    pub fn email(&self) -> Option<&str> {
        self.profile.as_ref()?.get("email")?.as_str()
    }

    /// Every field of the payload as one attribute bag.
    pub fn attributes(&self) -> Map<String, Value> {
        let mut bag = Map::new();
        bag.insert("id".into(), Value::String(self.id.clone()));
        if let Some(name) = &self.name {
            bag.insert("name".into(), Value::String(name.clone()));
        }
        if let Some(real_name) = &self.real_name {
            bag.insert("real_name".into(), Value::String(real_name.clone()));
        }
        if let Some(profile) = &self.profile {
            bag.insert("profile".into(), Value::Object(profile.clone()));
        }
        bag.extend(self.rest.clone());
        bag
    }

    /// Fresh host representation of this payload, before any merge.
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            real_name: self.real_name.clone(),
            email_address: self.email().map(str::to_string),
            platform: self.attributes(),
            room: None,
            extra: Map::new(),
        }
    }
}

/// A bot integration as returned by `bots.info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Bot user behind the integration. Custom integrations have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Topic object nested in `conversations.info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackTopic {
    #[serde(default)]
    pub value: String,
}

/// A conversation as returned by `conversations.info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackConversation {
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
    pub topic: Option<SlackTopic>,
}

impl From<SlackConversation> for Conversation {
    fn from(conversation: SlackConversation) -> Self {
        Self {
            id: conversation.id,
            name: conversation.name,
            is_im: conversation.is_im,
            is_mpim: conversation.is_mpim,
            is_private: conversation.is_private,
            is_archived: conversation.is_archived,
            topic: conversation
                .topic
                .map(|topic| topic.value)
                .filter(|value| !value.is_empty()),
        }
    }
}

/// One page of `users.list`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsersPage {
    pub members: Vec<SlackUser>,
    /// Cursor for the next page. `None` once the listing is exhausted.
    pub next_cursor: Option<String>,
}

/// Directory reads the pipeline depends on.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<SlackUser>;

    async fn list_users(&self, page_size: u32, cursor: Option<&str>) -> Result<UsersPage>;

    async fn get_bot(&self, bot_id: &str) -> Result<BotInfo>;

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation>;
}
