use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::model::{Conversation, User};

/// What a mention token referenced.
///
/// Broadcast and group tags (`<!here>`, `<!subteam^ID|label>`) are rendered
/// inline and never recorded, so they have no kind here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionKind {
    User,
    Conversation,
}

/// Entity data fetched while rewriting a mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MentionInfo {
    User(User),
    Conversation(Conversation),
}

/// A user or conversation reference found in message text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
    pub kind: MentionKind,
    /// Only present when the entity was looked up rather than labelled inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<MentionInfo>,
}

impl Mention {
    pub fn user(id: impl Into<String>, info: Option<User>) -> Self {
        Self {
            id: id.into(),
            kind: MentionKind::User,
            info: info.map(MentionInfo::User),
        }
    }

    pub fn conversation(id: impl Into<String>, info: Option<Conversation>) -> Self {
        Self {
            id: id.into(),
            kind: MentionKind::Conversation,
            info: info.map(MentionInfo::Conversation),
        }
    }
}

/// A chat message with display-ready text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    pub user: User,
    /// Text with markup rewritten for humans.
    pub text: String,
    /// Text exactly as the platform delivered it.
    pub raw_text: String,
    /// The platform event this message was built from.
    pub raw: Value,
    pub room: String,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    pub mentions: Vec<Mention>,
}

/// A `/me` action message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeMessage {
    pub user: User,
    pub text: String,
    pub raw_text: String,
    pub room: String,
    pub ts: String,
    pub mentions: Vec<Mention>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnterMessage {
    pub user: User,
    pub room: String,
    pub ts: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveMessage {
    pub user: User,
    pub room: String,
    pub ts: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicChangeMessage {
    pub user: User,
    pub topic: String,
    pub room: String,
    pub ts: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Added,
    Removed,
}

/// The thing a reaction was attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionItem {
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl ReactionItem {
    pub fn is_message(&self) -> bool {
        self.item_type == "message"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionMessage {
    pub kind: ReactionKind,
    pub user: User,
    pub reaction: String,
    /// Author of the reacted-to item, when the platform names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_user: Option<User>,
    pub item: ReactionItem,
    pub room: String,
    pub event_ts: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSharedMessage {
    pub user: User,
    pub file_id: String,
    pub room: String,
    pub event_ts: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceChangeMessage {
    pub user: User,
    pub users: Vec<User>,
    pub presence: String,
    pub room: String,
    pub ts: String,
}

/// Normalized output of the event pipeline, one per accepted platform event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanonicalMessage {
    Text(TextMessage),
    Me(MeMessage),
    Enter(EnterMessage),
    Leave(LeaveMessage),
    TopicChange(TopicChangeMessage),
    Reaction(ReactionMessage),
    FileShared(FileSharedMessage),
    PresenceChange(PresenceChangeMessage),
}

impl CanonicalMessage {
    /// The acting user.
    pub fn user(&self) -> &User {
        match self {
            Self::Text(msg) => &msg.user,
            Self::Me(msg) => &msg.user,
            Self::Enter(msg) => &msg.user,
            Self::Leave(msg) => &msg.user,
            Self::TopicChange(msg) => &msg.user,
            Self::Reaction(msg) => &msg.user,
            Self::FileShared(msg) => &msg.user,
            Self::PresenceChange(msg) => &msg.user,
        }
    }

    pub fn room(&self) -> &str {
        match self {
            Self::Text(msg) => &msg.room,
            Self::Me(msg) => &msg.room,
            Self::Enter(msg) => &msg.room,
            Self::Leave(msg) => &msg.room,
            Self::TopicChange(msg) => &msg.room,
            Self::Reaction(msg) => &msg.room,
            Self::FileShared(msg) => &msg.room,
            Self::PresenceChange(msg) => &msg.room,
        }
    }

    pub fn ts(&self) -> &str {
        match self {
            Self::Text(msg) => &msg.ts,
            Self::Me(msg) => &msg.ts,
            Self::Enter(msg) => &msg.ts,
            Self::Leave(msg) => &msg.ts,
            Self::TopicChange(msg) => &msg.ts,
            Self::Reaction(msg) => &msg.event_ts,
            Self::FileShared(msg) => &msg.event_ts,
            Self::PresenceChange(msg) => &msg.ts,
        }
    }

    /// Short name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Me(_) => "me",
            Self::Enter(_) => "enter",
            Self::Leave(_) => "leave",
            Self::TopicChange(_) => "topic_change",
            Self::Reaction(_) => "reaction",
            Self::FileShared(_) => "file_shared",
            Self::PresenceChange(_) => "presence_change",
        }
    }
}
