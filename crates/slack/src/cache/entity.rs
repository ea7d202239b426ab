use std::{collections::HashMap, sync::Arc};

use {
    serde_json::Value,
    slackbridge_channels::User,
    tokio::sync::RwLock,
    tracing::debug,
};

use crate::{
    Result,
    cache::{Lookup, record},
    directory::{DirectoryApi, SlackUser},
};

/// Users by id. Entries never expire; every write merges over the previous
/// representation (see [`User::merged_with`]).
pub struct EntityCache {
    api: Arc<dyn DirectoryApi>,
    users: RwLock<HashMap<String, User>>,
}

impl EntityCache {
    pub fn new(api: Arc<dyn DirectoryApi>) -> Self {
        Self {
            api,
            users: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, user_id: &str) -> Option<User> {
        self.users.read().await.get(user_id).cloned()
    }

    /// Write a directory payload and return the merged representation.
    ///
    /// The previous row is removed first and the new one rebuilt from the
    /// payload plus the keys only the previous row had.
    pub async fn put(&self, payload: &SlackUser) -> User {
        let fresh = payload.to_user();
        let mut users = self.users.write().await;
        let merged = match users.remove(&payload.id) {
            Some(previous) => fresh.merged_with(&previous),
            None => fresh,
        };
        users.insert(payload.id.clone(), merged.clone());
        merged
    }

    pub async fn remove(&self, user_id: &str) -> Option<User> {
        self.users.write().await.remove(user_id)
    }

    /// Attach a non-directory attribute to a known user. Returns `false` when
    /// the user is not cached.
    pub async fn annotate(&self, user_id: &str, key: &str, value: Value) -> Result<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(user_id) {
            Some(user) => {
                user.set_extra(key, value)?;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    /// Fetch-through read: cache first, then `users.info`.
    pub async fn fetch(&self, user_id: &str) -> Result<Lookup<User>> {
        let lookup = match self.get(user_id).await {
            Some(user) => Lookup::Cached(user),
            None => {
                debug!(user_id, "user cache miss, calling users.info");
                let payload = self.api.get_user(user_id).await?;
                Lookup::Fetched(self.put(&payload).await)
            },
        };
        record("user", &lookup);
        Ok(lookup)
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    /// Snapshot of every cached user, in no particular order.
    pub async fn users(&self) -> Vec<User> {
        self.users.read().await.values().cloned().collect()
    }
}
