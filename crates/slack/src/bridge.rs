use std::sync::Arc;

use {
    slackbridge_channels::MessageReceiver,
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{error, info},
};

use crate::{
    Error, Result,
    config::{BotSelf, SlackAccountConfig},
    directory::DirectoryApi,
    event::RawEvent,
    normalizer::Normalizer,
    web_api::SlackWebApi,
};

/// Background tasks started by [`SlackBridge::start`].
pub struct BridgeTasks {
    pub event_loop: JoinHandle<()>,
    /// Start-up directory sync, unless disabled in the config.
    pub user_sync: Option<JoinHandle<()>>,
}

/// One workspace installation: Web API client, caches and event loop.
pub struct SlackBridge {
    normalizer: Arc<Normalizer>,
    disable_user_sync: bool,
    cancel: CancellationToken,
}

impl SlackBridge {
    pub fn new(
        config: &SlackAccountConfig,
        bot: BotSelf,
        receiver: Arc<dyn MessageReceiver>,
    ) -> Result<Self> {
        let api = Arc::new(SlackWebApi::new(config)?);
        Ok(Self::with_api(api, config, bot, receiver))
    }

    pub fn with_api(
        api: Arc<dyn DirectoryApi>,
        config: &SlackAccountConfig,
        bot: BotSelf,
        receiver: Arc<dyn MessageReceiver>,
    ) -> Self {
        Self {
            normalizer: Arc::new(Normalizer::new(api, config, bot, receiver)),
            disable_user_sync: config.disable_user_sync,
            cancel: CancellationToken::new(),
        }
    }

    pub fn normalizer(&self) -> &Arc<Normalizer> {
        &self.normalizer
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn the event loop over `events` and, unless disabled, a full
    /// directory sync running alongside it.
    pub fn start(&self, events: mpsc::Receiver<RawEvent>) -> BridgeTasks {
        let user_sync = (!self.disable_user_sync).then(|| {
            let normalizer = Arc::clone(&self.normalizer);
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => info!("slack user sync cancelled"),
                    result = normalizer.sync_users() => {
                        if let Err(e) = result {
                            error!(error = %e, "slack user sync failed");
                        }
                    },
                }
            })
        });

        let normalizer = Arc::clone(&self.normalizer);
        let event_loop = tokio::spawn(normalizer.run(events, self.cancel.clone()));
        BridgeTasks {
            event_loop,
            user_sync,
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the tasks from [`SlackBridge::start`] to finish.
    pub async fn join(tasks: BridgeTasks) -> Result<()> {
        if let Some(user_sync) = tasks.user_sync {
            user_sync
                .await
                .map_err(|e| Error::external("slack user sync task", e))?;
        }
        tasks
            .event_loop
            .await
            .map_err(|e| Error::external("slack event loop task", e))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{FakeDirectory, slack_user},
        serde_json::json,
        slackbridge_channels::CanonicalMessage,
        tokio::sync::mpsc::unbounded_channel,
    };

    fn bot() -> BotSelf {
        BotSelf {
            user_id: "UBOT".into(),
            name: "hubot".into(),
            team_id: None,
        }
    }

    fn directory() -> Arc<FakeDirectory> {
        Arc::new(
            FakeDirectory::default()
                .with_user("U1", "ada")
                .with_pages(vec![vec![slack_user("U1", "ada"), slack_user("U2", "grace")]]),
        )
    }

    #[tokio::test]
    async fn start_syncs_and_dispatches() {
        let directory = directory();
        let (tx, mut messages) = unbounded_channel::<CanonicalMessage>();
        let bridge = SlackBridge::with_api(
            directory.clone(),
            &SlackAccountConfig::default(),
            bot(),
            Arc::new(tx),
        );

        let (events, rx) = mpsc::channel(4);
        let tasks = bridge.start(rx);
        let joined = json!({"type": "member_joined_channel", "user": "U1", "channel": "C1"});
        events
            .send(serde_json::from_value(joined).unwrap())
            .await
            .unwrap();
        drop(events);
        SlackBridge::join(tasks).await.unwrap();

        assert_eq!(messages.try_recv().unwrap().kind(), "enter");
        assert_eq!(directory.list_calls(), 1);
        assert_eq!(bridge.normalizer().users().len().await, 2);
    }

    #[tokio::test]
    async fn user_sync_can_be_disabled() {
        let directory = directory();
        let (tx, _messages) = unbounded_channel::<CanonicalMessage>();
        let bridge = SlackBridge::with_api(
            directory.clone(),
            &SlackAccountConfig {
                disable_user_sync: true,
                ..SlackAccountConfig::default()
            },
            bot(),
            Arc::new(tx),
        );

        let (_events, rx) = mpsc::channel(1);
        let tasks = bridge.start(rx);
        assert!(tasks.user_sync.is_none());
        bridge.stop();
        SlackBridge::join(tasks).await.unwrap();
        assert_eq!(directory.list_calls(), 0);
    }
}
