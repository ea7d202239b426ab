use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    slackbridge_channels::Conversation,
    tokio::{sync::RwLock, time::Instant},
    tracing::debug,
};

use crate::{
    Result,
    cache::{Lookup, record},
    directory::DirectoryApi,
};

struct Entry {
    conversation: Conversation,
    updated_at: Instant,
}

/// Conversations by id, each entry fresh for a fixed TTL.
///
/// A stale entry is dropped before the refetch, so a failed refresh leaves
/// the conversation uncached rather than serving the old snapshot.
pub struct ConversationCache {
    api: Arc<dyn DirectoryApi>,
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl ConversationCache {
    pub fn new(api: Arc<dyn DirectoryApi>, ttl: Duration) -> Self {
        Self {
            api,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn fetch(&self, conversation_id: &str) -> Result<Lookup<Conversation>> {
        if let Some(conversation) = self.fresh(conversation_id).await {
            let lookup = Lookup::Cached(conversation);
            record("conversation", &lookup);
            return Ok(lookup);
        }

        debug!(conversation_id, "conversation cache miss, calling conversations.info");
        let conversation = self.api.get_conversation(conversation_id).await?;
        self.entries.write().await.insert(conversation_id.to_string(), Entry {
            conversation: conversation.clone(),
            updated_at: Instant::now(),
        });
        let lookup = Lookup::Fetched(conversation);
        record("conversation", &lookup);
        Ok(lookup)
    }

    pub async fn invalidate(&self, conversation_id: &str) -> bool {
        self.entries.write().await.remove(conversation_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn fresh(&self, conversation_id: &str) -> Option<Conversation> {
        {
            let entries = self.entries.read().await;
            match entries.get(conversation_id) {
                Some(entry) if entry.updated_at.elapsed() < self.ttl => {
                    return Some(entry.conversation.clone());
                },
                Some(_) => {},
                None => return None,
            }
        }
        let mut entries = self.entries.write().await;
        // Re-check under the write lock; a concurrent refresh may have won.
        if let Some(entry) = entries.get(conversation_id)
            && entry.updated_at.elapsed() < self.ttl
        {
            return Some(entry.conversation.clone());
        }
        entries.remove(conversation_id);
        None
    }
}
