use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use karmabot_core::errors::ApplicationError;
use karmabot_slack::events::AUTHORIZATION_SUCCESS_BODY;
use karmabot_slack::{EventHandler, GatewayRequest, GatewayResponse, TeamAuthorizer};
use serde::Deserialize;
use tracing::warn;

#[derive(Clone)]
pub struct SlackState {
    pub events: Arc<EventHandler>,
    pub authorizer: Arc<dyn TeamAuthorizer>,
}

pub fn router(state: SlackState) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/slack/oauth", get(slack_oauth))
        .with_state(state)
}

async fn slack_events(
    State(state): State<SlackState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let request = GatewayRequest { headers: header_map(&headers), body, query };

    // The karma update keeps running after the response; its handle is dropped here.
    let outcome = state.events.handle(&request).await;
    into_http(outcome.response)
}

#[derive(Debug, Deserialize)]
struct OAuthQuery {
    code: Option<String>,
}

async fn slack_oauth(
    State(state): State<SlackState>,
    Query(query): Query<OAuthQuery>,
) -> (StatusCode, String) {
    let result = match query.code.as_deref().map(str::trim).filter(|code| !code.is_empty()) {
        Some(code) => state.authorizer.authorize_team(code).await.map(|_| ()),
        None => Err(ApplicationError::Authorization("missing code".to_owned())),
    };

    let response = match result {
        Ok(()) => GatewayResponse::ok(AUTHORIZATION_SUCCESS_BODY),
        Err(error) => {
            warn!(event_name = "http.oauth.failed", error = %error, "team authorization failed");
            ApplicationError::Authorization(error.to_string()).into_interface("oauth").into()
        }
    };
    into_http(response)
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
        })
        .collect()
}

fn into_http(response: GatewayResponse) -> (StatusCode, String) {
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, response.body)
}
