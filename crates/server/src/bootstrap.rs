use std::sync::Arc;

use karmabot_core::config::AppConfig;
use karmabot_db::repositories::{SqlKarmaRepository, SqlTeamTokenRepository};
use karmabot_db::{ConnectError, ConnectionSettings, KarmaLedger, StoreConnector};
use karmabot_slack::{
    EventHandler, KarmaUpdateHandler, OAuthService, RequestVerifier, SlackWebClient,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub connector: Arc<StoreConnector>,
    pub oauth: Arc<OAuthService>,
    pub events: Arc<EventHandler>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Storage(#[from] ConnectError),
}

pub async fn bootstrap(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let connector = Arc::new(StoreConnector::new(ConnectionSettings::from(&config.database)));
    // Connect up front so a bad database url fails startup instead of the first event.
    connector.pool().await?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established and migrations applied"
    );

    let web = Arc::new(SlackWebClient::new(&config.slack));
    let ledger = KarmaLedger::new(Arc::new(SqlKarmaRepository::new(Arc::clone(&connector))));
    let oauth = Arc::new(
        OAuthService::new(
            Arc::new(SqlTeamTokenRepository::new(Arc::clone(&connector))),
            web.clone(),
        )
        .with_fallback_bot_token(config.slack.bot_token.clone()),
    );
    let karma = Arc::new(KarmaUpdateHandler::new(ledger, web));
    let events = Arc::new(EventHandler::new(
        Arc::new(RequestVerifier::new(config.slack.signing_secret.clone())),
        oauth.clone(),
        oauth.clone(),
        karma,
    ));

    Ok(Application { config, connector, oauth, events })
}
