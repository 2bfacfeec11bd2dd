use serde::{Deserialize, Serialize};

use crate::domain::karma::Partition;

/// Token Slack returns from `oauth.access` after a team installs the bot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamAuthToken {
    pub team_id: String,
    #[serde(default)]
    pub team_name: Option<String>,
    pub access_token: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub bot: Option<BotToken>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotToken {
    pub bot_user_id: String,
    pub bot_access_token: String,
}

impl TeamAuthToken {
    /// Bot token when the install granted one, otherwise the user access token.
    pub fn posting_token(&self) -> &str {
        self.bot
            .as_ref()
            .map(|bot| bot.bot_access_token.as_str())
            .filter(|token| !token.is_empty())
            .unwrap_or(&self.access_token)
    }
}

/// Everything a request needs to act on behalf of one team.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantCredentials {
    pub partition: Partition,
    pub bot_token: String,
}

impl TenantCredentials {
    pub fn from_token(token: &TeamAuthToken) -> Self {
        Self {
            partition: Partition::for_team(&token.team_id),
            bot_token: token.posting_token().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BotToken, TeamAuthToken, TenantCredentials};

    fn token(bot: Option<BotToken>) -> TeamAuthToken {
        TeamAuthToken {
            team_id: "T1".to_owned(),
            team_name: Some("Team One".to_owned()),
            access_token: "xoxp-user".to_owned(),
            scope: Some("bot,chat:write".to_owned()),
            bot,
        }
    }

    #[test]
    fn posting_token_prefers_bot_token() {
        let token = token(Some(BotToken {
            bot_user_id: "UBOT".to_owned(),
            bot_access_token: "xoxb-bot".to_owned(),
        }));

        let credentials = TenantCredentials::from_token(&token);
        assert_eq!(credentials.bot_token, "xoxb-bot");
        assert_eq!(credentials.partition.as_str(), "karma_T1");
    }

    #[test]
    fn posting_token_falls_back_to_access_token() {
        assert_eq!(token(None).posting_token(), "xoxp-user");
    }
}
