use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use karmabot_core::config::SlackConfig;
use karmabot_core::domain::team::TeamAuthToken;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlackApiError {
    #[error("slack request failed: {0}")]
    Transport(String),
    #[error("slack returned HTTP {0}")]
    Status(u16),
    #[error("slack api error: {0}")]
    Api(String),
    #[error("failed to decode slack response: {0}")]
    Decode(String),
    #[error("slack client credentials are not configured")]
    MissingCredentials,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn post_message(
        &self,
        bot_token: &str,
        channel: &str,
        text: &str,
    ) -> Result<(), SlackApiError>;
}

#[async_trait]
pub trait OAuthExchanger: Send + Sync {
    /// Trades the code Slack hands to the install redirect for a team token.
    async fn exchange_code(&self, code: &str) -> Result<TeamAuthToken, SlackApiError>;
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
}

/// Slack Web API over HTTPS.
#[derive(Clone)]
pub struct SlackWebClient {
    client: Client,
    base_url: String,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
}

impl SlackWebClient {
    pub fn new(config: &SlackConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &SlackConfig) -> Self {
        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }
}

/// Slack answers HTTP 200 for most failures and reports them in `ok`/`error`.
async fn read_api_response(response: reqwest::Response) -> Result<Value, SlackApiError> {
    if !response.status().is_success() {
        return Err(SlackApiError::Status(response.status().as_u16()));
    }
    let body: Value =
        response.json().await.map_err(|error| SlackApiError::Decode(error.to_string()))?;
    check_ok(body)
}

fn check_ok(body: Value) -> Result<Value, SlackApiError> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(body);
    }
    let reason = body.get("error").and_then(Value::as_str).unwrap_or("unknown_error");
    Err(SlackApiError::Api(reason.to_owned()))
}

#[async_trait]
impl MessageSender for SlackWebClient {
    async fn post_message(
        &self,
        bot_token: &str,
        channel: &str,
        text: &str,
    ) -> Result<(), SlackApiError> {
        let response = self
            .client
            .post(self.endpoint("chat.postMessage"))
            .bearer_auth(bot_token)
            .json(&PostMessageRequest { channel, text })
            .send()
            .await
            .map_err(|error| {
                error!(
                    event_name = "slack.web.post_message_failed",
                    channel,
                    error = %error,
                    "chat.postMessage request failed"
                );
                SlackApiError::Transport(error.to_string())
            })?;

        read_api_response(response).await?;
        info!(event_name = "slack.web.message_sent", channel, "response sent");
        Ok(())
    }
}

#[async_trait]
impl OAuthExchanger for SlackWebClient {
    async fn exchange_code(&self, code: &str) -> Result<TeamAuthToken, SlackApiError> {
        let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret) else {
            return Err(SlackApiError::MissingCredentials);
        };

        let response = self
            .client
            .post(self.endpoint("oauth.access"))
            .basic_auth(client_id, Some(client_secret.expose_secret()))
            .form(&[("code", code)])
            .send()
            .await
            .map_err(|error| {
                error!(
                    event_name = "slack.web.oauth_failed",
                    error = %error,
                    "oauth.access request failed"
                );
                SlackApiError::Transport(error.to_string())
            })?;

        let body = read_api_response(response).await?;
        serde_json::from_value(body).map_err(|error| SlackApiError::Decode(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;

    use karmabot_core::config::SlackConfig;
    use karmabot_core::domain::team::TeamAuthToken;

    use super::{check_ok, OAuthExchanger, SlackApiError, SlackWebClient};

    fn config(client_id: Option<&str>) -> SlackConfig {
        SlackConfig {
            signing_secret: SecretString::from("secret".to_owned()),
            client_id: client_id.map(str::to_owned),
            client_secret: client_id.map(|_| SecretString::from("client-secret".to_owned())),
            bot_token: None,
            api_base_url: "https://slack.example.test/api/".to_owned(),
        }
    }

    #[test]
    fn endpoint_joins_base_url_without_double_slash() {
        let client = SlackWebClient::new(&config(None));
        assert_eq!(
            client.endpoint("chat.postMessage"),
            "https://slack.example.test/api/chat.postMessage"
        );
    }

    #[test]
    fn check_ok_surfaces_slack_error_codes() {
        assert!(check_ok(json!({"ok": true})).is_ok());
        assert_eq!(
            check_ok(json!({"ok": false, "error": "channel_not_found"})),
            Err(SlackApiError::Api("channel_not_found".to_owned()))
        );
        assert_eq!(check_ok(json!({})), Err(SlackApiError::Api("unknown_error".to_owned())));
    }

    #[test]
    fn oauth_access_payload_decodes_into_team_token() {
        let body = check_ok(json!({
            "ok": true,
            "access_token": "xoxp-user",
            "scope": "identify,bot",
            "team_name": "Team One",
            "team_id": "T1",
            "bot": {"bot_user_id": "UBOT", "bot_access_token": "xoxb-bot"}
        }))
        .expect("ok body");

        let token: TeamAuthToken = serde_json::from_value(body).expect("decode");
        assert_eq!(token.team_id, "T1");
        assert_eq!(token.posting_token(), "xoxb-bot");
    }

    #[tokio::test]
    async fn exchange_requires_client_credentials() {
        let client = SlackWebClient::new(&config(None));
        assert_eq!(
            client.exchange_code("code").await,
            Err(SlackApiError::MissingCredentials)
        );
    }
}
