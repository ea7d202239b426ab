//! [`DirectoryApi`] over the Slack Web API.

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, de::DeserializeOwned},
    slackbridge_channels::Conversation,
    tracing::{debug, warn},
};

use crate::{
    Error, Result,
    config::SlackAccountConfig,
    directory::{BotInfo, DirectoryApi, SlackConversation, SlackUser, UsersPage},
};

/// Every Web API response: `ok`, an error code when not ok, and the
/// method-specific body alongside.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Default, Deserialize)]
struct UserInfoBody {
    #[serde(default)]
    user: Option<SlackUser>,
}

#[derive(Debug, Default, Deserialize)]
struct UsersListBody {
    #[serde(default)]
    members: Vec<SlackUser>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Default, Deserialize)]
struct BotInfoBody {
    #[serde(default)]
    bot: Option<BotInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ConversationInfoBody {
    #[serde(default)]
    channel: Option<SlackConversation>,
}

/// Web API client authenticated with a bot token.
pub struct SlackWebApi {
    http: reqwest::Client,
    api_base: String,
    token: Secret<String>,
}

impl SlackWebApi {
    pub fn new(config: &SlackAccountConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(http, config))
    }

    pub fn with_client(http: reqwest::Client, config: &SlackAccountConfig) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> Result<T> {
        #[cfg(feature = "metrics")]
        metrics::counter!(
            crate::telemetry::directory::CALLS_TOTAL,
            "method" => method.to_string()
        )
        .increment(1);

        let result = self.send(method, query).await;
        if let Err(e) = &result {
            warn!(method, error = %e, "slack web api call failed");
            #[cfg(feature = "metrics")]
            metrics::counter!(
                crate::telemetry::directory::ERRORS_TOTAL,
                "method" => method.to_string()
            )
            .increment(1);
        }
        result
    }

    async fn send<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> Result<T> {
        debug!(method, "calling slack web api");
        let envelope: ApiEnvelope<T> = self
            .http
            .get(format!("{}/{method}", self.api_base))
            .bearer_auth(self.token.expose_secret())
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !envelope.ok {
            return Err(Error::api(
                method,
                envelope.error.unwrap_or_else(|| "unknown_error".into()),
            ));
        }
        Ok(envelope.body)
    }
}

#[async_trait]
impl DirectoryApi for SlackWebApi {
    async fn get_user(&self, user_id: &str) -> Result<SlackUser> {
        let body: UserInfoBody = self.call("users.info", &[("user", user_id)]).await?;
        body.user.ok_or_else(|| Error::not_found("user", user_id))
    }

    async fn list_users(&self, page_size: u32, cursor: Option<&str>) -> Result<UsersPage> {
        let limit = page_size.to_string();
        let mut query = vec![("limit", limit.as_str())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let body: UsersListBody = self.call("users.list", &query).await?;
        Ok(UsersPage {
            members: body.members,
            next_cursor: body
                .response_metadata
                .map(|meta| meta.next_cursor)
                .filter(|cursor| !cursor.is_empty()),
        })
    }

    async fn get_bot(&self, bot_id: &str) -> Result<BotInfo> {
        let body: BotInfoBody = self.call("bots.info", &[("bot", bot_id)]).await?;
        body.bot.ok_or_else(|| Error::not_found("bot", bot_id))
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation> {
        let body: ConversationInfoBody = self
            .call("conversations.info", &[("channel", conversation_id)])
            .await?;
        body.channel
            .map(Conversation::from)
            .ok_or_else(|| Error::not_found("conversation", conversation_id))
    }
}
