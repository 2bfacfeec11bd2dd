use std::sync::Arc;

use futures::future::try_join_all;
use thiserror::Error;
use tracing::info;

use karmabot_core::domain::karma::{KarmaRecord, Partition};
use karmabot_core::domain::team::TenantCredentials;
use karmabot_core::errors::ApplicationError;
use karmabot_core::karma::KarmaParser;
use karmabot_db::{KarmaLedger, LedgerError};

use crate::messages::{join_summaries, render_summary};
use crate::web::{MessageSender, SlackApiError};

/// A channel message that passed event validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KarmaMessage {
    pub channel: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum KarmaUpdateError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("failed to send karma summary: {0}")]
    Send(#[from] SlackApiError),
}

impl From<KarmaUpdateError> for ApplicationError {
    fn from(error: KarmaUpdateError) -> Self {
        match error {
            KarmaUpdateError::Ledger(error) => error.into(),
            KarmaUpdateError::Send(error) => Self::Integration(error.to_string()),
        }
    }
}

/// Applies the karma changes found in a message and replies with a summary.
pub struct KarmaUpdateHandler {
    parser: KarmaParser,
    ledger: KarmaLedger,
    sender: Arc<dyn MessageSender>,
}

impl KarmaUpdateHandler {
    pub fn new(ledger: KarmaLedger, sender: Arc<dyn MessageSender>) -> Self {
        Self { parser: KarmaParser::new(), ledger, sender }
    }

    /// Returns the reply that was posted, or `None` when the message held no
    /// karma changes. All deltas are applied before any neighbour lookup, and
    /// the reply keeps the order subjects appeared in the message.
    pub async fn handle_message(
        &self,
        tenant: &TenantCredentials,
        message: &KarmaMessage,
        correlation_id: &str,
    ) -> Result<Option<String>, KarmaUpdateError> {
        let deltas = self.parser.parse_message(&message.text);
        if deltas.is_empty() {
            info!(
                event_name = "karma.update.no_changes",
                correlation_id,
                "no karma updates found"
            );
            return Ok(None);
        }

        let partition = &tenant.partition;
        let updated =
            try_join_all(deltas.iter().map(|delta| self.ledger.update(partition, delta))).await?;
        info!(
            event_name = "karma.update.applied",
            correlation_id,
            partition = %partition,
            updates = updated.len(),
            "updated karma"
        );

        let summaries =
            try_join_all(updated.iter().map(|record| self.summarize(partition, record))).await?;
        let reply = join_summaries(&summaries);

        self.sender.post_message(&tenant.bot_token, &message.channel, &reply).await?;
        Ok(Some(reply))
    }

    async fn summarize(
        &self,
        partition: &Partition,
        record: &KarmaRecord,
    ) -> Result<String, LedgerError> {
        let neighbors = self.ledger.get_neighbors(partition, &record.subject).await?;
        Ok(render_summary(record, &neighbors))
    }
}
