use crate::NotificationSink;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};
use tweetwatch_core::{ConfigError, CoreError, NotifyError, SlackAttachment};

pub const SLACK_TOKEN_ENV: &str = "SLACK_ACCESS_TOKEN";
const SLACK_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Clone, PartialEq)]
pub struct SlackArgs {
    pub channel_id: String,
    pub attachment: Option<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    as_user: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<Vec<&'a SlackAttachment>>,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Posts messages to a Slack channel through `chat.postMessage`.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    http_client: Client,
    token: String,
    api_base: String,
}

impl SlackNotifier {
    pub fn new(token: String) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http_client,
            token,
            api_base: SLACK_API_BASE.to_string(),
        })
    }

    /// Reads the access token from `SLACK_ACCESS_TOKEN`.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_env_var(SLACK_TOKEN_ENV)
    }

    pub fn from_env_var(var_name: &str) -> Result<Self, CoreError> {
        match std::env::var(var_name) {
            Ok(token) if !token.is_empty() => Self::new(token),
            _ => {
                error!(
                    "Invalid slack access token. Please set \"{}\" variable",
                    var_name
                );
                Err(CoreError::Config(ConfigError::MissingEnvironmentVariable {
                    var_name: var_name.to_string(),
                }))
            }
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn delivery_failed(reason: impl ToString) -> CoreError {
        CoreError::Notify(NotifyError::DeliveryFailed {
            sink: "slack".to_string(),
            reason: reason.to_string(),
        })
    }
}

#[async_trait]
impl NotificationSink for SlackNotifier {
    type Args = SlackArgs;

    fn kind(&self) -> &'static str {
        "slack"
    }

    async fn notify(&self, message: &str, args: &SlackArgs) -> Result<(), CoreError> {
        let body = PostMessageRequest {
            channel: &args.channel_id,
            text: message,
            as_user: true,
            attachments: args.attachment.as_ref().map(|a| vec![a]),
        };

        let url = format!("{}/chat.postMessage", self.api_base.trim_end_matches('/'));
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("{} slack args {:?}", e, args);
                Self::delivery_failed(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("Slack responded with status {} for {:?}", status, args);
            return Err(Self::delivery_failed(format!("HTTP {}", status)));
        }

        let reply: PostMessageResponse = response.json().await.map_err(Self::delivery_failed)?;
        if !reply.ok {
            let reason = reply.error.unwrap_or_else(|| "unknown_error".to_string());
            error!("{} slack args {:?}", reason, args);
            return Err(CoreError::Notify(NotifyError::Rejected {
                sink: "slack".to_string(),
                reason,
            }));
        }

        info!(
            "Message successfully sent to channel {} at {}",
            reply.channel.as_deref().unwrap_or(&args.channel_id),
            reply.ts.as_deref().unwrap_or("-")
        );
        Ok(())
    }
}
