//! Turns raw platform events into canonical messages.
//!
//! One call to [`Normalizer::handle`] per event: resolve the actor, apply the
//! self and shared-workspace filters, then build exactly one canonical message
//! (or none). Events are independent; the only state shared between them is
//! the caches.

use std::sync::Arc;

use {
    futures::future::try_join_all,
    slackbridge_channels::{
        CanonicalMessage, EnterMessage, FileSharedMessage, LeaveMessage, MeMessage,
        MessageReceiver, PresenceChangeMessage, ReactionItem, ReactionKind, ReactionMessage,
        TextMessage, TopicChangeMessage, User,
    },
    tokio::{sync::mpsc, task::JoinSet},
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    Result,
    cache::{BotCache, ConversationCache, EntityCache},
    config::{BotSelf, SlackAccountConfig},
    directory::DirectoryApi,
    event::{EventKind, MessageKind, RawEvent},
    mention::MentionRewriter,
    sync::DirectorySync,
};

/// Why an event produced no message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Authored by the running bot.
    SelfMessage,
    /// Authored in another workspace sharing the channel.
    ForeignTeam,
    /// A type or subtype this pipeline does not translate.
    Ignored,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfMessage => "self_message",
            Self::ForeignTeam => "foreign_team",
            Self::Ignored => "ignored",
        }
    }
}

/// What happened to one raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A canonical message of this kind was handed to the receiver.
    Emitted(&'static str),
    Dropped(DropReason),
    /// The event only refreshed cached directory data.
    CacheUpdated,
}

pub struct Normalizer {
    users: Arc<EntityCache>,
    conversations: Arc<ConversationCache>,
    bots: Arc<BotCache>,
    rewriter: MentionRewriter,
    directory_sync: DirectorySync,
    bot: BotSelf,
    installed_team_only: bool,
    receiver: Arc<dyn MessageReceiver>,
}

impl Normalizer {
    pub fn new(
        api: Arc<dyn DirectoryApi>,
        config: &SlackAccountConfig,
        bot: BotSelf,
        receiver: Arc<dyn MessageReceiver>,
    ) -> Self {
        let users = Arc::new(EntityCache::new(Arc::clone(&api)));
        let conversations = Arc::new(ConversationCache::new(
            Arc::clone(&api),
            config.conversation_cache_ttl(),
        ));
        let bots = Arc::new(BotCache::new(Arc::clone(&api), Arc::clone(&users)));
        let rewriter = MentionRewriter::new(Arc::clone(&users), Arc::clone(&conversations))
            .with_bot(bot.clone());
        let directory_sync = DirectorySync::new(api, Arc::clone(&users), config.api_page_size);
        Self {
            users,
            conversations,
            bots,
            rewriter,
            directory_sync,
            bot,
            installed_team_only: config.installed_team_only,
            receiver,
        }
    }

    pub fn users(&self) -> &Arc<EntityCache> {
        &self.users
    }

    pub fn conversations(&self) -> &Arc<ConversationCache> {
        &self.conversations
    }

    pub fn bots(&self) -> &Arc<BotCache> {
        &self.bots
    }

    pub fn rewriter(&self) -> &MentionRewriter {
        &self.rewriter
    }

    /// Load the whole user directory into the cache.
    pub async fn sync_users(&self) -> Result<Vec<User>> {
        self.directory_sync.run().await
    }

    /// Consume events until the channel closes or `cancel` fires.
    ///
    /// Every event is processed on its own task, so a slow lookup never
    /// holds up later events. Messages therefore reach the receiver in
    /// completion order, which may differ from arrival order. In-flight
    /// events are awaited before returning.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<RawEvent>,
        cancel: CancellationToken,
    ) {
        let mut in_flight = JoinSet::new();
        info!(bot_user_id = %self.bot.user_id, "slack event loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("slack event loop cancelled");
                    break;
                },
                event = events.recv() => match event {
                    Some(event) => {
                        let this = Arc::clone(&self);
                        in_flight.spawn(async move { this.process(event).await });
                    },
                    None => {
                        debug!("slack event stream closed");
                        break;
                    },
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "slack event task failed");
                    }
                },
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "slack event task failed");
            }
        }
        info!("slack event loop stopped");
    }

    /// [`Normalizer::handle`] with errors contained: a failed event is
    /// logged and dropped.
    pub async fn process(&self, event: RawEvent) -> Option<Dispatch> {
        let event_type = event.event_type.clone();
        match self.handle(event).await {
            Ok(dispatch) => {
                debug!(%event_type, ?dispatch, "slack event handled");
                Some(dispatch)
            },
            Err(e) => {
                warn!(%event_type, error = %e, "dropping slack event");
                #[cfg(feature = "metrics")]
                metrics::counter!(
                    crate::telemetry::events::DROPPED_TOTAL,
                    "reason" => "error"
                )
                .increment(1);
                None
            },
        }
    }

    pub async fn handle(&self, event: RawEvent) -> Result<Dispatch> {
        #[cfg(feature = "metrics")]
        metrics::counter!(
            crate::telemetry::events::RECEIVED_TOTAL,
            "event_type" => event.event_type.clone()
        )
        .increment(1);

        let kind = event.kind();
        match &kind {
            EventKind::UserChange => return Ok(self.apply_user_change(&event).await),
            EventKind::Unknown(_) | EventKind::Message(MessageKind::Other(_)) => {
                debug!(
                    event_type = %event.event_type,
                    subtype = ?event.subtype,
                    "ignoring slack event"
                );
                return Ok(dropped(DropReason::Ignored));
            },
            _ => {},
        }

        if kind != EventKind::PresenceChange
            && event.actor_id() == Some(self.bot.user_id.as_str())
        {
            debug!(user_id = %self.bot.user_id, "ignoring message from self");
            return Ok(dropped(DropReason::SelfMessage));
        }

        let (actor, presence_users) = match kind {
            EventKind::PresenceChange => {
                let users = self.resolve_presence(&event).await?;
                let actor = users.first().cloned().unwrap_or_else(User::anonymous);
                (actor, users)
            },
            _ => (self.resolve_actor(&event).await?, Vec::new()),
        };

        if !actor.is_anonymous() && actor.id == self.bot.user_id {
            debug!(user_id = %actor.id, "ignoring message from self");
            return Ok(dropped(DropReason::SelfMessage));
        }
        if self.is_foreign(&event) {
            debug!(
                team = ?event.team,
                conversation_id = ?event.conversation_id(),
                "ignoring event from another workspace"
            );
            return Ok(dropped(DropReason::ForeignTeam));
        }

        let message = match kind {
            EventKind::Message(
                MessageKind::Plain | MessageKind::ThreadBroadcast | MessageKind::Bot,
            ) => self.text_message(&event, actor).await?,
            EventKind::Message(MessageKind::Me) => self.me_message(&event, actor).await,
            EventKind::Message(MessageKind::Topic) => {
                let room = room_of(&event);
                CanonicalMessage::TopicChange(TopicChangeMessage {
                    user: actor.in_room(&room),
                    topic: event.topic.clone().unwrap_or_default(),
                    room,
                    ts: event.ts.clone(),
                })
            },
            EventKind::Message(MessageKind::Join) | EventKind::MemberJoined => {
                let room = room_of(&event);
                CanonicalMessage::Enter(EnterMessage {
                    user: actor.in_room(&room),
                    room,
                    ts: event.ts.clone(),
                })
            },
            EventKind::Message(MessageKind::Leave) | EventKind::MemberLeft => {
                let room = room_of(&event);
                CanonicalMessage::Leave(LeaveMessage {
                    user: actor.in_room(&room),
                    room,
                    ts: event.ts.clone(),
                })
            },
            EventKind::Reaction(reaction_kind) => {
                self.reaction_message(&event, reaction_kind, actor).await?
            },
            EventKind::PresenceChange => {
                let room = room_of(&event);
                CanonicalMessage::PresenceChange(PresenceChangeMessage {
                    user: actor.in_room(&room),
                    users: presence_users.iter().map(|user| user.in_room(&room)).collect(),
                    presence: event.presence.clone().unwrap_or_default(),
                    room,
                    ts: event.ts.clone(),
                })
            },
            EventKind::FileShared => {
                let room = room_of(&event);
                CanonicalMessage::FileShared(FileSharedMessage {
                    user: actor.in_room(&room),
                    file_id: event.file_id.clone().unwrap_or_default(),
                    room,
                    event_ts: event.event_ts().to_string(),
                })
            },
            EventKind::UserChange
            | EventKind::Unknown(_)
            | EventKind::Message(MessageKind::Other(_)) => {
                return Ok(dropped(DropReason::Ignored));
            },
        };

        let emitted = message.kind();
        self.receiver.accept(message)?;

        #[cfg(feature = "metrics")]
        metrics::counter!(crate::telemetry::events::DISPATCHED_TOTAL, "kind" => emitted)
            .increment(1);

        Ok(Dispatch::Emitted(emitted))
    }

    async fn apply_user_change(&self, event: &RawEvent) -> Dispatch {
        match event.user_profile() {
            Some(profile) => {
                self.users.put(profile).await;
                debug!(user_id = %profile.id, "user updated from user_change");
                Dispatch::CacheUpdated
            },
            None => dropped(DropReason::Ignored),
        }
    }

    /// The acting user: a named user, else the bot's user, else anonymous.
    async fn resolve_actor(&self, event: &RawEvent) -> Result<User> {
        if let Some(user_id) = event.actor_id() {
            return Ok(self.users.fetch(user_id).await?.into_inner());
        }
        if let Some(bot_id) = event.bot() {
            return Ok(self.bots.resolve(bot_id).await?.into_inner());
        }
        Ok(User::anonymous())
    }

    async fn resolve_presence(&self, event: &RawEvent) -> Result<Vec<User>> {
        let lookups = try_join_all(
            event
                .presence_user_ids()
                .into_iter()
                .map(|user_id| self.users.fetch(user_id)),
        )
        .await?;
        Ok(lookups.into_iter().map(|lookup| lookup.into_inner()).collect())
    }

    fn is_foreign(&self, event: &RawEvent) -> bool {
        if !self.installed_team_only {
            return false;
        }
        match (event.team.as_deref(), self.bot.team_id.as_deref()) {
            (Some(team), Some(installed)) => team != installed,
            _ => false,
        }
    }

    /// Whether the event happened in a one-to-one conversation with the bot.
    async fn is_direct(&self, event: &RawEvent) -> Result<bool> {
        if let Some(channel_type) = event.channel_type.as_deref() {
            return Ok(channel_type == "im");
        }
        match event.conversation_id() {
            Some(conversation_id) => Ok(self
                .conversations
                .fetch(conversation_id)
                .await?
                .value()
                .is_im),
            None => Ok(false),
        }
    }

    async fn text_message(&self, event: &RawEvent, actor: User) -> Result<CanonicalMessage> {
        let (rendered, direct) = tokio::join!(
            self.rewriter
                .build_text(event.text.as_deref(), &event.attachments),
            self.is_direct(event)
        );
        let mut text = rendered.text;
        if direct? {
            text = self.address_bot(event.text.as_deref().unwrap_or_default(), text);
        }

        let room = room_of(event);
        Ok(CanonicalMessage::Text(TextMessage {
            user: actor.in_room(&room),
            text,
            raw_text: event.text.clone().unwrap_or_default(),
            raw: serde_json::to_value(event)?,
            room,
            ts: event.ts.clone(),
            thread_ts: event.thread_ts.clone(),
            mentions: rendered.mentions,
        }))
    }

    async fn me_message(&self, event: &RawEvent, actor: User) -> CanonicalMessage {
        let rendered = self
            .rewriter
            .build_text(event.text.as_deref(), &event.attachments)
            .await;
        let room = room_of(event);
        CanonicalMessage::Me(MeMessage {
            user: actor.in_room(&room),
            text: rendered.text,
            raw_text: event.text.clone().unwrap_or_default(),
            room,
            ts: event.ts.clone(),
            mentions: rendered.mentions,
        })
    }

    async fn reaction_message(
        &self,
        event: &RawEvent,
        kind: ReactionKind,
        actor: User,
    ) -> Result<CanonicalMessage> {
        let item_user = match event.item_user.as_deref().filter(|id| !id.is_empty()) {
            Some(user_id) => Some(self.users.fetch(user_id).await?.into_inner()),
            None => None,
        };
        let item = event.item.clone().unwrap_or_else(ReactionItem::default);
        // Reactions on files are not tied to a conversation.
        let room = if item.is_message() {
            item.channel.clone().unwrap_or_default()
        } else {
            String::new()
        };
        debug!(
            user_id = %actor.id,
            reaction = ?event.reaction,
            item_type = %item.item_type,
            "received reaction"
        );
        Ok(CanonicalMessage::Reaction(ReactionMessage {
            kind,
            user: actor.in_room(&room),
            reaction: event.reaction.clone().unwrap_or_default(),
            item_user,
            item,
            room,
            event_ts: event.event_ts().to_string(),
        }))
    }

    /// Prefix direct-message text with the bot's name so it reads as
    /// addressed to the bot. Text that already mentions the bot is kept.
    fn address_bot(&self, raw_text: &str, text: String) -> String {
        let name = self.bot.name.as_str();
        if name.is_empty() || text.trim().is_empty() || self.mentions_bot(raw_text) {
            return text;
        }
        let trimmed = text.trim_start();
        let unprefixed = trimmed.strip_prefix('@').unwrap_or(trimmed);
        let addressed = unprefixed
            .get(..name.len())
            .filter(|head| head.eq_ignore_ascii_case(name))
            .and_then(|_| unprefixed.get(name.len()..))
            .is_some_and(|rest| rest.chars().next().is_none_or(|c| !c.is_alphanumeric()));
        if addressed {
            text
        } else {
            format!("{name} {text}")
        }
    }

    fn mentions_bot(&self, raw_text: &str) -> bool {
        let user_id = self.bot.user_id.as_str();
        !user_id.is_empty()
            && (raw_text.contains(&format!("<@{user_id}>"))
                || raw_text.contains(&format!("<@{user_id}|")))
    }
}

fn room_of(event: &RawEvent) -> String {
    event.conversation_id().unwrap_or_default().to_string()
}

fn dropped(reason: DropReason) -> Dispatch {
    #[cfg(feature = "metrics")]
    metrics::counter!(crate::telemetry::events::DROPPED_TOTAL, "reason" => reason.as_str())
        .increment(1);
    Dispatch::Dropped(reason)
}
