//! Wire shape of platform events and their classification.

use {
    serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned},
    serde_json::{Map, Value},
    slackbridge_channels::{ReactionItem, ReactionKind},
};

use crate::directory::SlackUser;

/// Legacy message attachment. Only the plain-text fallback is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// `user` is an id on most events but a full profile on `user_change`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventUser {
    Id(String),
    Profile(Box<SlackUser>),
}

/// A platform event as delivered by the transport, before any lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<EventUser>,
    /// `file_shared` names its actor here instead of in `user`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_user: Option<String>,
    /// An id on message events, an object on `channel_created` and friends.
    #[serde(
        default,
        deserialize_with = "id_or_object",
        skip_serializing_if = "Option::is_none"
    )]
    pub channel: Option<String>,
    /// `file_shared` names its conversation here instead of in `channel`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default)]
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(
        default,
        deserialize_with = "id_or_object",
        skip_serializing_if = "Option::is_none"
    )]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub item: Option<ReactionItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
    /// Fields this crate does not interpret (blocks, edited, ...).
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Accepts a bare string, or an object carrying it under `id` or `value`.
/// Any other shape reads as absent.
fn id_or_object<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(id)) => Some(id),
        Some(Value::Object(object)) => ["id", "value"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    })
}

/// Field shapes that do not fit `T` read as absent instead of failing the event.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .and_then(|value| serde_json::from_value(value).ok()))
}

/// Message subtypes the pipeline distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Plain,
    ThreadBroadcast,
    Bot,
    Topic,
    Me,
    Join,
    Leave,
    Other(String),
}

/// Closed classification of `type`/`subtype`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Message(MessageKind),
    MemberJoined,
    MemberLeft,
    Reaction(ReactionKind),
    PresenceChange,
    FileShared,
    UserChange,
    Unknown(String),
}

impl EventKind {
    pub fn of(event: &RawEvent) -> Self {
        match event.event_type.as_str() {
            "message" => Self::Message(match event.subtype.as_deref() {
                None => MessageKind::Plain,
                Some("thread_broadcast") => MessageKind::ThreadBroadcast,
                Some("bot_message") => MessageKind::Bot,
                Some("channel_topic" | "group_topic") => MessageKind::Topic,
                Some("me_message") => MessageKind::Me,
                Some("channel_join" | "group_join") => MessageKind::Join,
                Some("channel_leave" | "group_leave") => MessageKind::Leave,
                Some(other) => MessageKind::Other(other.to_string()),
            }),
            "member_joined_channel" => Self::MemberJoined,
            "member_left_channel" => Self::MemberLeft,
            "reaction_added" => Self::Reaction(ReactionKind::Added),
            "reaction_removed" => Self::Reaction(ReactionKind::Removed),
            "presence_change" => Self::PresenceChange,
            "file_shared" => Self::FileShared,
            "user_change" => Self::UserChange,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl RawEvent {
    pub fn kind(&self) -> EventKind {
        EventKind::of(self)
    }

    /// Id of the acting user, wherever the event put it.
    pub fn actor_id(&self) -> Option<&str> {
        let id = match &self.user {
            Some(EventUser::Id(id)) => Some(id.as_str()),
            Some(EventUser::Profile(user)) => Some(user.id.as_str()),
            None => self.user_id.as_deref(),
        };
        id.filter(|id| !id.is_empty())
    }

    pub fn bot(&self) -> Option<&str> {
        self.bot_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Conversation the event happened in, wherever the event put it.
    pub fn conversation_id(&self) -> Option<&str> {
        self.channel
            .as_deref()
            .or(self.channel_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// Users named by a presence change. Batched events list them in `users`.
    pub fn presence_user_ids(&self) -> Vec<&str> {
        match &self.users {
            Some(users) => users.iter().map(String::as_str).collect(),
            None => self.actor_id().into_iter().collect(),
        }
    }

    /// Event timestamp, falling back to the message timestamp.
    pub fn event_ts(&self) -> &str {
        self.event_ts.as_deref().unwrap_or(&self.ts)
    }

    /// Full profile carried by `user_change`.
    pub fn user_profile(&self) -> Option<&SlackUser> {
        match &self.user {
            Some(EventUser::Profile(user)) => Some(user),
            _ => None,
        }
    }
}
