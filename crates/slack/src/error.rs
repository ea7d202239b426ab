use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The Web API answered with `ok: false`.
    #[error("slack {method} failed: {error}")]
    Api { method: String, error: String },

    /// The Web API answered `ok: true` without the entity we asked for.
    #[error("slack {kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Channel(#[from] slackbridge_channels::Error),

    #[error("{message}")]
    Message { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn api(method: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Api {
            method: method.into(),
            error: error.into(),
        }
    }

    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether the referenced entity does not exist (as opposed to a
    /// transport or decoding failure).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Api { error, .. } => matches!(
                error.as_str(),
                "user_not_found" | "bot_not_found" | "channel_not_found" | "users_not_found"
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        assert!(Error::not_found("user", "U1").is_not_found());
        assert!(Error::api("users.info", "user_not_found").is_not_found());
        assert!(!Error::api("users.info", "ratelimited").is_not_found());
        assert!(!Error::message("boom").is_not_found());
    }

    #[test]
    fn api_error_display() {
        let err = Error::api("conversations.info", "channel_not_found");
        assert_eq!(
            err.to_string(),
            "slack conversations.info failed: channel_not_found"
        );
    }
}
