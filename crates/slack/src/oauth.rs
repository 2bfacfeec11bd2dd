use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{error, info, warn};

use karmabot_core::domain::karma::Partition;
use karmabot_core::domain::team::{TeamAuthToken, TenantCredentials};
use karmabot_core::errors::ApplicationError;
use karmabot_db::repositories::{RepositoryError, TeamTokenRepository};

use crate::web::OAuthExchanger;

/// Finds the partition and bot token an event should be processed with.
#[async_trait]
pub trait TenantResolver: Send + Sync {
    async fn resolve(
        &self,
        team_id: Option<&str>,
    ) -> Result<Option<TenantCredentials>, ApplicationError>;
}

#[async_trait]
pub trait TeamAuthorizer: Send + Sync {
    async fn authorize_team(&self, code: &str) -> Result<TeamAuthToken, ApplicationError>;
}

pub struct OAuthService {
    tokens: Arc<dyn TeamTokenRepository>,
    exchanger: Arc<dyn OAuthExchanger>,
    fallback_bot_token: Option<SecretString>,
}

impl OAuthService {
    pub fn new(tokens: Arc<dyn TeamTokenRepository>, exchanger: Arc<dyn OAuthExchanger>) -> Self {
        Self { tokens, exchanger, fallback_bot_token: None }
    }

    /// Single-team installs configure a bot token directly; teams without a
    /// stored token then fall back to it and the global partition.
    pub fn with_fallback_bot_token(mut self, token: Option<SecretString>) -> Self {
        self.fallback_bot_token = token;
        self
    }

    pub async fn save_team_token(&self, token: TeamAuthToken) -> Result<(), ApplicationError> {
        info!(event_name = "oauth.token.save", team_id = %token.team_id, "saving team token");
        self.tokens.save(token).await.map_err(storage_error)
    }

    pub async fn get_team_token(
        &self,
        team_id: &str,
    ) -> Result<Option<TeamAuthToken>, ApplicationError> {
        let token = self.tokens.find_by_team(team_id).await.map_err(storage_error)?;
        if token.is_none() {
            warn!(event_name = "oauth.token.missing", team_id, "no token stored for team");
        }
        Ok(token)
    }

    fn fallback_credentials(&self) -> Option<TenantCredentials> {
        self.fallback_bot_token.as_ref().map(|token| TenantCredentials {
            partition: Partition::global(),
            bot_token: token.expose_secret().to_owned(),
        })
    }
}

#[async_trait]
impl TeamAuthorizer for OAuthService {
    async fn authorize_team(&self, code: &str) -> Result<TeamAuthToken, ApplicationError> {
        info!(event_name = "oauth.authorize.started", "authenticating with slack");
        let token = self.exchanger.exchange_code(code).await.map_err(|e| {
            error!(
                event_name = "oauth.authorize.failed",
                error = %e,
                "failed to authorize team"
            );
            ApplicationError::Authorization(e.to_string())
        })?;

        self.save_team_token(token.clone()).await?;
        info!(event_name = "oauth.authorize.completed", team_id = %token.team_id, "team authorized");
        Ok(token)
    }
}

#[async_trait]
impl TenantResolver for OAuthService {
    async fn resolve(
        &self,
        team_id: Option<&str>,
    ) -> Result<Option<TenantCredentials>, ApplicationError> {
        let team_id = team_id.map(str::trim).filter(|id| !id.is_empty());
        let Some(team_id) = team_id else {
            return Ok(self.fallback_credentials());
        };

        match self.get_team_token(team_id).await? {
            Some(token) => Ok(Some(TenantCredentials::from_token(&token))),
            None => Ok(self.fallback_credentials()),
        }
    }
}

fn storage_error(error: RepositoryError) -> ApplicationError {
    ApplicationError::StorageUnavailable(error.to_string())
}
