use std::sync::Arc;

use sqlx::Row;

use karmabot_core::domain::team::{BotToken, TeamAuthToken};

use super::{RepositoryError, TeamTokenRepository};
use crate::StoreConnector;

pub struct SqlTeamTokenRepository {
    connector: Arc<StoreConnector>,
}

impl SqlTeamTokenRepository {
    pub fn new(connector: Arc<StoreConnector>) -> Self {
        Self { connector }
    }
}

fn row_to_token(row: &sqlx::sqlite::SqliteRow) -> Result<TeamAuthToken, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());
    let bot_user_id: Option<String> = row.try_get("bot_user_id").map_err(decode)?;
    let bot_access_token: Option<String> = row.try_get("bot_access_token").map_err(decode)?;

    Ok(TeamAuthToken {
        team_id: row.try_get("team_id").map_err(decode)?,
        team_name: row.try_get("team_name").map_err(decode)?,
        access_token: row.try_get("access_token").map_err(decode)?,
        scope: row.try_get("scope").map_err(decode)?,
        bot: match (bot_user_id, bot_access_token) {
            (Some(bot_user_id), Some(bot_access_token)) => {
                Some(BotToken { bot_user_id, bot_access_token })
            }
            _ => None,
        },
    })
}

#[async_trait::async_trait]
impl TeamTokenRepository for SqlTeamTokenRepository {
    async fn find_by_team(&self, team_id: &str) -> Result<Option<TeamAuthToken>, RepositoryError> {
        let pool = self.connector.pool().await?;
        let row = sqlx::query(
            "SELECT team_id, team_name, access_token, scope, bot_user_id, bot_access_token
             FROM team_auth_token WHERE team_id = ?",
        )
        .bind(team_id)
        .fetch_optional(&pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_token(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, token: TeamAuthToken) -> Result<(), RepositoryError> {
        let pool = self.connector.pool().await?;
        let (bot_user_id, bot_access_token) = match &token.bot {
            Some(bot) => (Some(bot.bot_user_id.as_str()), Some(bot.bot_access_token.as_str())),
            None => (None, None),
        };

        sqlx::query(
            "INSERT INTO team_auth_token (team_id, team_name, access_token, scope,
                                          bot_user_id, bot_access_token)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(team_id) DO UPDATE SET
                 team_name = excluded.team_name,
                 access_token = excluded.access_token,
                 scope = excluded.scope,
                 bot_user_id = excluded.bot_user_id,
                 bot_access_token = excluded.bot_access_token,
                 updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&token.team_id)
        .bind(token.team_name.as_deref())
        .bind(&token.access_token)
        .bind(token.scope.as_deref())
        .bind(bot_user_id)
        .bind(bot_access_token)
        .execute(&pool)
        .await?;

        Ok(())
    }
}
