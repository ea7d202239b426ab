use std::{collections::HashMap, sync::Arc};

use {
    slackbridge_channels::User,
    tokio::sync::RwLock,
    tracing::debug,
};

use crate::{
    Result,
    cache::{EntityCache, Lookup, record},
    directory::DirectoryApi,
};

/// Built-in bots that never show up in `bots.info` but post as a known user.
const WELL_KNOWN_BOTS: &[(&str, &str)] = &[("B01", "USLACKBOT")];

/// What a bot id resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum BotIdentity {
    /// The bot posts as this user.
    Resolved(User),
    /// Custom integration without a bot user. Never looked up again.
    Unresolvable,
}

impl BotIdentity {
    /// The user behind the bot, or the anonymous placeholder.
    pub fn to_user(&self) -> User {
        match self {
            Self::Resolved(user) => user.clone(),
            Self::Unresolvable => User::anonymous(),
        }
    }
}

/// Bot id to user mapping for messages posted by integrations.
pub struct BotCache {
    api: Arc<dyn DirectoryApi>,
    users: Arc<EntityCache>,
    identities: RwLock<HashMap<String, BotIdentity>>,
}

impl BotCache {
    pub fn new(api: Arc<dyn DirectoryApi>, users: Arc<EntityCache>) -> Self {
        Self {
            api,
            users,
            identities: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, bot_id: &str) -> Option<BotIdentity> {
        self.identities.read().await.get(bot_id).cloned()
    }

    /// Resolve a bot id to the user it posts as.
    ///
    /// Lookup order: cached identity, the well-known table, then `bots.info`
    /// followed by a user fetch for the linked user. Results are keyed by the
    /// bot id. A bot without a linked user resolves to [`User::anonymous`]
    /// for the rest of the process lifetime.
    pub async fn resolve(&self, bot_id: &str) -> Result<Lookup<User>> {
        if let Some(identity) = self.get(bot_id).await {
            let lookup = Lookup::Cached(identity.to_user());
            record("bot", &lookup);
            return Ok(lookup);
        }

        let linked_user = match well_known(bot_id) {
            Some(user_id) => Some(user_id.to_string()),
            None => {
                debug!(bot_id, "bot cache miss, calling bots.info");
                self.api.get_bot(bot_id).await?.user_id
            },
        };

        let identity = match linked_user.filter(|id| !id.is_empty()) {
            Some(user_id) => {
                BotIdentity::Resolved(self.users.fetch(&user_id).await?.into_inner())
            },
            None => {
                debug!(bot_id, "bot has no associated user");
                BotIdentity::Unresolvable
            },
        };

        let user = identity.to_user();
        self.identities
            .write()
            .await
            .insert(bot_id.to_string(), identity);
        let lookup = Lookup::Fetched(user);
        record("bot", &lookup);
        Ok(lookup)
    }

    pub async fn len(&self) -> usize {
        self.identities.read().await.len()
    }
}

fn well_known(bot_id: &str) -> Option<&'static str> {
    WELL_KNOWN_BOTS
        .iter()
        .find(|(id, _)| *id == bot_id)
        .map(|(_, user_id)| *user_id)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::testing::FakeDirectory};

    fn caches(directory: &Arc<FakeDirectory>) -> (Arc<EntityCache>, BotCache) {
        let users = Arc::new(EntityCache::new(directory.clone()));
        let bots = BotCache::new(directory.clone(), users.clone());
        (users, bots)
    }

    #[tokio::test]
    async fn bot_with_user_resolves_and_short_circuits() {
        let directory = Arc::new(
            FakeDirectory::default()
                .with_user("U9", "deploybot")
                .with_bot("B9", Some("U9")),
        );
        let (users, bots) = caches(&directory);

        let first = bots.resolve("B9").await.unwrap();
        assert!(!first.is_cached());
        assert_eq!(first.value().id, "U9");
        assert_eq!(first.value().name.as_deref(), Some("deploybot"));

        let second = bots.resolve("B9").await.unwrap();
        assert!(second.is_cached());
        assert_eq!(directory.bot_calls(), 1);
        assert_eq!(directory.user_calls(), 1);
        assert!(users.get("U9").await.is_some());
        assert!(matches!(bots.get("B9").await, Some(BotIdentity::Resolved(_))));
    }

    #[tokio::test]
    async fn bot_without_user_is_permanently_anonymous() {
        let directory = Arc::new(FakeDirectory::default().with_bot("B2", None));
        let (_, bots) = caches(&directory);

        let first = bots.resolve("B2").await.unwrap();
        assert!(first.value().is_anonymous());
        let second = bots.resolve("B2").await.unwrap();
        assert!(second.is_cached());
        assert!(second.value().is_anonymous());

        assert_eq!(directory.bot_calls(), 1);
        assert_eq!(bots.get("B2").await, Some(BotIdentity::Unresolvable));
    }

    #[tokio::test]
    async fn well_known_bot_skips_bots_info() {
        let directory = Arc::new(FakeDirectory::default().with_user("USLACKBOT", "slackbot"));
        let (_, bots) = caches(&directory);

        let user = bots.resolve("B01").await.unwrap().into_inner();
        assert_eq!(user.id, "USLACKBOT");
        assert_eq!(directory.bot_calls(), 0);
    }

    #[tokio::test]
    async fn failed_lookup_caches_nothing() {
        let directory = Arc::new(FakeDirectory::default().with_bot("B3", Some("U404")));
        let (users, bots) = caches(&directory);

        assert!(bots.resolve("B3").await.is_err());
        assert!(bots.resolve("B4").await.unwrap_err().is_not_found());
        assert_eq!(bots.len().await, 0);
        assert!(users.is_empty().await);
    }
}
