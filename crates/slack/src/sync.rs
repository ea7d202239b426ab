//! Full directory sync over the paginated `users.list` call.

use std::sync::Arc;

use {
    futures::{Stream, TryStreamExt, stream},
    slackbridge_channels::User,
    tracing::{debug, info},
};

use crate::{
    Error, Result,
    cache::EntityCache,
    directory::{DirectoryApi, SlackUser},
};

enum Cursor {
    Start(Option<String>),
    Next(String),
    Done,
}

/// Walks every page of the user directory and loads it into the cache.
pub struct DirectorySync {
    api: Arc<dyn DirectoryApi>,
    users: Arc<EntityCache>,
    page_size: u32,
}

impl DirectorySync {
    pub fn new(api: Arc<dyn DirectoryApi>, users: Arc<EntityCache>, page_size: u32) -> Self {
        Self {
            api,
            users,
            page_size: page_size.max(1),
        }
    }

    /// Lazy sequence of member batches, one per page, in listing order.
    ///
    /// The stream ends after the first page without a continuation cursor and
    /// yields at most one error, after which it is exhausted.
    pub fn pages(&self) -> impl Stream<Item = Result<Vec<SlackUser>>> + Send + 'static {
        self.pages_from(None)
    }

    /// Same as [`DirectorySync::pages`], resuming from a cursor returned
    /// by an earlier listing.
    pub fn pages_from(
        &self,
        cursor: Option<String>,
    ) -> impl Stream<Item = Result<Vec<SlackUser>>> + Send + 'static {
        let api = Arc::clone(&self.api);
        let page_size = self.page_size;
        stream::try_unfold(Cursor::Start(cursor), move |state| {
            let api = Arc::clone(&api);
            async move {
                let cursor = match state {
                    Cursor::Start(cursor) => cursor,
                    Cursor::Next(cursor) => Some(cursor),
                    Cursor::Done => return Ok(None),
                };
                let page = api.list_users(page_size, cursor.as_deref()).await?;
                debug!(
                    members = page.members.len(),
                    has_more = page.next_cursor.is_some(),
                    "fetched users.list page"
                );
                let next = match page.next_cursor.filter(|cursor| !cursor.is_empty()) {
                    Some(cursor) => Cursor::Next(cursor),
                    None => Cursor::Done,
                };
                Ok::<_, Error>(Some((page.members, next)))
            }
        })
    }

    /// Fetch every page, then merge all members into the cache.
    ///
    /// Nothing is written unless every page succeeded.
    pub async fn run(&self) -> Result<Vec<User>> {
        let members: Vec<SlackUser> = self.pages().try_concat().await?;

        let mut synced = Vec::with_capacity(members.len());
        for member in &members {
            synced.push(self.users.put(member).await);
        }

        #[cfg(feature = "metrics")]
        metrics::counter!(crate::telemetry::directory::SYNCED_USERS_TOTAL)
            .increment(synced.len() as u64);

        info!(users = synced.len(), "directory sync complete");
        Ok(synced)
    }
}
