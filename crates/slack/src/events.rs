//! Inbound Slack Events API requests.
//!
//! Slack posts both real events and `url_verification` challenges to the same
//! endpoint, and expects an answer within three seconds. [`EventHandler`]
//! verifies and classifies each request, answers immediately, and hands
//! accepted karma messages to a background task.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use karmabot_core::domain::team::TenantCredentials;
use karmabot_core::errors::{ApplicationError, InterfaceError};

use crate::karma::{KarmaMessage, KarmaUpdateError, KarmaUpdateHandler};
use crate::oauth::{TeamAuthorizer, TenantResolver};
use crate::verification::RequestVerifier;

pub const AUTHORIZATION_SUCCESS_BODY: &str = "Authorization successful";
pub const EVENT_ACCEPTED_BODY: &str = "Event processing.";

const AUTH_QUERY_PARAM: &str = "auth";
const CODE_QUERY_PARAM: &str = "code";

/// Transport-neutral view of an HTTP request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GatewayRequest {
    pub headers: HashMap<String, String>,
    pub body: String,
    pub query: HashMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,
    pub is_base64_encoded: bool,
    pub body: String,
}

impl GatewayResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self { status_code, is_base64_encoded: false, body: body.into() }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }
}

impl From<InterfaceError> for GatewayResponse {
    fn from(error: InterfaceError) -> Self {
        Self::new(error.status_code(), error.user_message())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IncomingSlackEvent {
    #[serde(default)]
    pub challenge: Option<Value>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub event: Option<EventData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
}

impl EventData {
    pub fn is_from_bot(&self) -> bool {
        self.bot_id.is_some() || self.subtype.as_deref() == Some("bot_message")
    }
}

pub type KarmaTask = JoinHandle<Result<(), KarmaUpdateError>>;

/// The immediate answer plus, for accepted karma messages, the task still
/// applying them. Dropping the handle detaches the task.
#[derive(Debug)]
pub struct EventOutcome {
    pub response: GatewayResponse,
    pub background: Option<KarmaTask>,
}

impl EventOutcome {
    fn respond(response: GatewayResponse) -> Self {
        Self { response, background: None }
    }

    fn fail(error: ApplicationError, correlation_id: &str) -> Self {
        Self::respond(error.into_interface(correlation_id).into())
    }
}

pub struct EventHandler {
    verifier: Arc<RequestVerifier>,
    authorizer: Arc<dyn TeamAuthorizer>,
    tenants: Arc<dyn TenantResolver>,
    karma: Arc<KarmaUpdateHandler>,
}

impl EventHandler {
    pub fn new(
        verifier: Arc<RequestVerifier>,
        authorizer: Arc<dyn TeamAuthorizer>,
        tenants: Arc<dyn TenantResolver>,
        karma: Arc<KarmaUpdateHandler>,
    ) -> Self {
        Self { verifier, authorizer, tenants, karma }
    }

    pub async fn handle(&self, request: &GatewayRequest) -> EventOutcome {
        let correlation_id = Uuid::new_v4().to_string();
        let correlation_id = correlation_id.as_str();

        if !self.verifier.verify_request(&request.headers, &request.body) {
            warn!(event_name = "slack.event.unverified", correlation_id, "rejecting slack request");
            return EventOutcome::fail(
                ApplicationError::Verification("signature check failed".to_owned()),
                correlation_id,
            );
        }

        if let (Some(_), Some(code)) =
            (request.query.get(AUTH_QUERY_PARAM), request.query.get(CODE_QUERY_PARAM))
        {
            return match self.authorizer.authorize_team(code).await {
                Ok(_) => EventOutcome::respond(GatewayResponse::ok(AUTHORIZATION_SUCCESS_BODY)),
                Err(error) => EventOutcome::fail(
                    ApplicationError::Authorization(error.to_string()),
                    correlation_id,
                ),
            };
        }

        let incoming = match serde_json::from_str::<IncomingSlackEvent>(&request.body) {
            Ok(incoming) => incoming,
            Err(error) => {
                warn!(
                    event_name = "slack.event.invalid_json",
                    correlation_id,
                    error = %error,
                    "request body is not a slack event"
                );
                return EventOutcome::fail(
                    ApplicationError::Validation(error.to_string()),
                    correlation_id,
                );
            }
        };

        if let Some(challenge) = incoming.challenge {
            info!(event_name = "slack.event.challenge", correlation_id, "answering slack challenge");
            return EventOutcome::respond(GatewayResponse::ok(challenge_text(challenge)));
        }

        let team_id = incoming.team_id.as_deref();
        let tenant = match self.tenants.resolve(team_id).await {
            Ok(Some(tenant)) => tenant,
            Ok(None) => {
                return EventOutcome::fail(
                    ApplicationError::TenantNotFound(team_id.unwrap_or_default().to_owned()),
                    correlation_id,
                );
            }
            Err(error) => {
                error!(
                    event_name = "slack.event.tenant_lookup_failed",
                    correlation_id,
                    error = %error,
                    "failed to resolve team credentials"
                );
                return EventOutcome::fail(error, correlation_id);
            }
        };

        let Some(event) = incoming.event else {
            return invalid_event(correlation_id, "missing event");
        };
        if event.is_from_bot() {
            info!(event_name = "slack.event.bot_message", correlation_id, "ignoring bot message");
            return EventOutcome::respond(GatewayResponse::ok(EVENT_ACCEPTED_BODY));
        }
        let (Some(text), Some(channel)) = (event.text, event.channel) else {
            return invalid_event(correlation_id, "event has no text or channel");
        };

        let background =
            self.spawn_karma_update(tenant, KarmaMessage { channel, text }, correlation_id);
        EventOutcome {
            response: GatewayResponse::ok(EVENT_ACCEPTED_BODY),
            background: Some(background),
        }
    }

    fn spawn_karma_update(
        &self,
        tenant: TenantCredentials,
        message: KarmaMessage,
        correlation_id: &str,
    ) -> KarmaTask {
        let karma = Arc::clone(&self.karma);
        let correlation_id = correlation_id.to_owned();

        tokio::spawn(async move {
            let result = karma.handle_message(&tenant, &message, &correlation_id).await;
            if let Err(error) = &result {
                error!(
                    event_name = "karma.update.failed",
                    correlation_id = %correlation_id,
                    partition = %tenant.partition,
                    channel = %message.channel,
                    error = %error,
                    "karma update failed"
                );
            }
            result.map(|_| ())
        })
    }
}

/// Challenges are normally strings; any other JSON value is echoed in its
/// serialized form.
fn challenge_text(challenge: Value) -> String {
    match challenge {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn invalid_event(correlation_id: &str, reason: &str) -> EventOutcome {
    warn!(
        event_name = "slack.event.invalid",
        correlation_id,
        reason,
        "didn't receive a valid event"
    );
    EventOutcome::fail(ApplicationError::Validation(reason.to_owned()), correlation_id)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;
    use secrecy::SecretString;
    use serde_json::json;

    use karmabot_core::domain::karma::{KarmaRecord, Partition};
    use karmabot_core::domain::team::{TeamAuthToken, TenantCredentials};
    use karmabot_core::errors::ApplicationError;
    use karmabot_db::KarmaLedger;

    use super::{EventHandler, GatewayRequest, GatewayResponse};
    use crate::karma::tests::{ledger_with, RecordingSender};
    use crate::karma::KarmaUpdateHandler;
    use crate::oauth::tests::team_token;
    use crate::oauth::{TeamAuthorizer, TenantResolver};
    use crate::verification::{RequestVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};

    const SECRET: &str = "test-signing-secret";

    struct FixedTenants(Option<TenantCredentials>);

    #[async_trait]
    impl TenantResolver for FixedTenants {
        async fn resolve(
            &self,
            _team_id: Option<&str>,
        ) -> Result<Option<TenantCredentials>, ApplicationError> {
            Ok(self.0.clone())
        }
    }

    struct ScriptedAuthorizer {
        succeed: bool,
        codes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TeamAuthorizer for ScriptedAuthorizer {
        async fn authorize_team(&self, code: &str) -> Result<TeamAuthToken, ApplicationError> {
            self.codes.lock().expect("codes lock").push(code.to_owned());
            if self.succeed {
                Ok(team_token("T1"))
            } else {
                Err(ApplicationError::Authorization("invalid_code".to_owned()))
            }
        }
    }

    struct Harness {
        handler: EventHandler,
        sender: Arc<RecordingSender>,
        ledger: KarmaLedger,
        authorizer: Arc<ScriptedAuthorizer>,
    }

    fn tenant() -> TenantCredentials {
        TenantCredentials { partition: Partition::for_team("T1"), bot_token: "xoxb-T1".to_owned() }
    }

    fn harness(tenant: Option<TenantCredentials>, records: Vec<KarmaRecord>) -> Harness {
        let ledger = ledger_with(Partition::for_team("T1"), records);
        let sender = Arc::new(RecordingSender::default());
        let authorizer =
            Arc::new(ScriptedAuthorizer { succeed: true, codes: Mutex::new(Vec::new()) });
        let karma = Arc::new(KarmaUpdateHandler::new(ledger.clone(), sender.clone()));
        let handler = EventHandler::new(
            Arc::new(RequestVerifier::new(SecretString::from(SECRET.to_owned()))),
            authorizer.clone(),
            Arc::new(FixedTenants(tenant)),
            karma,
        );
        Harness { handler, sender, ledger, authorizer }
    }

    fn signed(body: &str) -> GatewayRequest {
        let verifier = RequestVerifier::new(SecretString::from(SECRET.to_owned()));
        let timestamp = Utc::now().timestamp();
        let signature = verifier.sign(timestamp, body).expect("sign");
        GatewayRequest {
            headers: HashMap::from([
                (SIGNATURE_HEADER.to_owned(), signature),
                (TIMESTAMP_HEADER.to_owned(), timestamp.to_string()),
            ]),
            body: body.to_owned(),
            query: HashMap::new(),
        }
    }

    fn message_body(text: &str) -> String {
        json!({
            "team_id": "T1",
            "event": {"type": "message", "text": text, "channel": "C1", "user": "U1"}
        })
        .to_string()
    }

    #[tokio::test]
    async fn unsigned_request_is_forbidden() {
        let harness = harness(Some(tenant()), Vec::new());
        let mut request = signed(&message_body("foo++"));
        request.body.push(' ');

        let outcome = harness.handler.handle(&request).await;

        assert_eq!(outcome.response, GatewayResponse::new(403, "Unauthorized - failed verification"));
        assert!(outcome.background.is_none());
    }

    #[tokio::test]
    async fn challenge_is_echoed_without_touching_the_ledger() {
        let harness = harness(None, Vec::new());
        let body = json!({"type": "url_verification", "challenge": "3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P"});

        let outcome = harness.handler.handle(&signed(&body.to_string())).await;

        assert_eq!(
            outcome.response,
            GatewayResponse::ok("3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P")
        );
        assert!(outcome.background.is_none());
        assert!(harness.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn non_string_challenge_is_echoed_and_null_is_ignored() {
        let harness = harness(None, Vec::new());

        let outcome = harness.handler.handle(&signed(r#"{"challenge": 42}"#)).await;
        assert_eq!(outcome.response, GatewayResponse::ok("42"));

        let outcome =
            harness.handler.handle(&signed(r#"{"team_id": "T9", "challenge": null}"#)).await;
        assert_eq!(
            outcome.response,
            GatewayResponse::new(400, "Couldn't find team authorization.")
        );
    }

    #[tokio::test]
    async fn accepted_message_updates_karma_and_replies() {
        let harness = harness(
            Some(tenant()),
            vec![KarmaRecord::new("Stuff", 0), KarmaRecord::new("Hotdogs", 2)],
        );

        let outcome = harness.handler.handle(&signed(&message_body("stuff++ hotdogs"))).await;

        assert_eq!(outcome.response, GatewayResponse::ok("Event processing."));
        outcome.background.expect("background task").await.expect("join").expect("update");
        assert_eq!(
            harness.sender.sent(),
            vec![(
                "xoxb-T1".to_owned(),
                "C1".to_owned(),
                "Stuff now has 1 karma. Hotdogs has the next highest karma, with 2 karma."
                    .to_owned()
            )]
        );
        assert_eq!(
            harness.ledger.find(&Partition::for_team("T1"), "Stuff").await.expect("find"),
            Some(KarmaRecord::new("Stuff", 1))
        );
    }

    #[tokio::test]
    async fn event_without_text_or_channel_is_rejected() {
        let harness = harness(Some(tenant()), Vec::new());
        let body = json!({"team_id": "T1", "event": {"type": "message", "channel": "C1"}});

        let outcome = harness.handler.handle(&signed(&body.to_string())).await;
        assert_eq!(outcome.response, GatewayResponse::new(401, "Couldn't parse slack event."));

        let outcome = harness.handler.handle(&signed(r#"{"team_id": "T1"}"#)).await;
        assert_eq!(outcome.response, GatewayResponse::new(401, "Couldn't parse slack event."));

        let outcome = harness.handler.handle(&signed("not json")).await;
        assert_eq!(outcome.response.status_code, 401);
    }

    #[tokio::test]
    async fn unknown_team_is_a_bad_request() {
        let harness = harness(None, Vec::new());

        let outcome = harness.handler.handle(&signed(&message_body("foo++"))).await;

        assert_eq!(outcome.response, GatewayResponse::new(400, "Couldn't find team authorization."));
        assert!(outcome.background.is_none());
    }

    #[tokio::test]
    async fn bot_messages_are_acknowledged_but_ignored() {
        let harness = harness(Some(tenant()), Vec::new());
        let body = json!({
            "team_id": "T1",
            "event": {
                "type": "message",
                "text": "Foo now has 1 karma.",
                "channel": "C1",
                "bot_id": "B1"
            }
        });

        let outcome = harness.handler.handle(&signed(&body.to_string())).await;

        assert_eq!(outcome.response, GatewayResponse::ok("Event processing."));
        assert!(outcome.background.is_none());
    }

    #[tokio::test]
    async fn auth_query_runs_authorization() {
        let harness = harness(None, Vec::new());
        let mut request = signed("");
        request.query = HashMap::from([
            ("auth".to_owned(), "true".to_owned()),
            ("code".to_owned(), "code-1".to_owned()),
        ]);

        let outcome = harness.handler.handle(&request).await;

        assert_eq!(outcome.response, GatewayResponse::ok("Authorization successful"));
        assert_eq!(*harness.authorizer.codes.lock().expect("codes"), vec!["code-1".to_owned()]);
    }

    #[tokio::test]
    async fn failed_authorization_is_forbidden() {
        let mut harness = harness(None, Vec::new());
        let authorizer =
            Arc::new(ScriptedAuthorizer { succeed: false, codes: Mutex::new(Vec::new()) });
        harness.handler.authorizer = authorizer as Arc<dyn TeamAuthorizer>;
        let mut request = signed("");
        request.query = HashMap::from([
            ("auth".to_owned(), "1".to_owned()),
            ("code".to_owned(), "bad".to_owned()),
        ]);

        let outcome = harness.handler.handle(&request).await;

        assert_eq!(outcome.response, GatewayResponse::new(403, "Unauthorized - failed auth0 check"));
    }

    #[test]
    fn gateway_response_serializes_camel_case() {
        let value = serde_json::to_value(GatewayResponse::ok("Event processing.")).expect("json");
        assert_eq!(
            value,
            json!({"statusCode": 200, "isBase64Encoded": false, "body": "Event processing."})
        );
    }
}
