use std::time::Duration;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Configuration for a single Slack workspace installation.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackAccountConfig {
    /// Bot token (`xoxb-...`) used for Web API reads.
    #[serde(serialize_with = "serialize_secret")]
    pub bot_token: Secret<String>,

    /// Web API base URL.
    pub api_base: String,

    /// Page size for paginated list calls such as `users.list`.
    pub api_page_size: u32,

    /// How long a fetched conversation stays fresh (ms).
    pub conversation_cache_ttl_ms: u64,

    /// Drop events authored by users of other workspaces in shared channels.
    pub installed_team_only: bool,

    /// Skip the full directory sync at start-up.
    pub disable_user_sync: bool,

    /// Per-request timeout for Web API calls (ms).
    pub request_timeout_ms: u64,
}

impl SlackAccountConfig {
    pub fn conversation_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.conversation_cache_ttl_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }
}

impl std::fmt::Debug for SlackAccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackAccountConfig")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("api_page_size", &self.api_page_size)
            .field("conversation_cache_ttl_ms", &self.conversation_cache_ttl_ms)
            .field("installed_team_only", &self.installed_team_only)
            .field("disable_user_sync", &self.disable_user_sync)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for SlackAccountConfig {
    fn default() -> Self {
        Self {
            bot_token: Secret::new(String::new()),
            api_base: "https://slack.com/api".into(),
            api_page_size: 100,
            conversation_cache_ttl_ms: 5 * 60 * 1000,
            installed_team_only: false,
            disable_user_sync: false,
            request_timeout_ms: 30_000,
        }
    }
}

/// Identity of the running bot, as reported by `auth.test`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSelf {
    pub user_id: String,
    pub name: String,
    /// Workspace the app is installed in.
    #[serde(default)]
    pub team_id: Option<String>,
}
