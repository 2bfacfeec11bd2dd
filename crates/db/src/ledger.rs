//! Karma ledger: the only component the event pipeline uses to read and
//! write karma. Wraps a [`KarmaRepository`] and folds its failures into the
//! two outcomes callers care about.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, warn};

use karmabot_core::domain::karma::{
    KarmaDelta, KarmaNeighbors, KarmaRecord, LeaderboardOrder, Partition,
};
use karmabot_core::errors::{ApplicationError, DomainError};

use crate::repositories::{KarmaRepository, RepositoryError};

pub const LEADERBOARD_SIZE: u32 = 5;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("karma store unavailable: {0}")]
    Unavailable(String),
    #[error("{count} records share subject `{subject}` in partition `{partition}`")]
    Consistency { partition: String, subject: String, count: usize },
}

impl From<RepositoryError> for LedgerError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Duplicate { partition, subject, count } => {
                Self::Consistency { partition, subject, count }
            }
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl From<LedgerError> for ApplicationError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::Unavailable(message) => Self::StorageUnavailable(message),
            LedgerError::Consistency { partition, subject, .. } => {
                Self::Domain(DomainError::DataConsistency { partition, subject })
            }
        }
    }
}

#[derive(Clone)]
pub struct KarmaLedger {
    repository: Arc<dyn KarmaRepository>,
}

impl KarmaLedger {
    pub fn new(repository: Arc<dyn KarmaRepository>) -> Self {
        Self { repository }
    }

    pub async fn find(
        &self,
        partition: &Partition,
        subject: &str,
    ) -> Result<Option<KarmaRecord>, LedgerError> {
        self.repository.find(partition, subject).await.map_err(|e| report(partition, subject, e))
    }

    /// Applies a delta atomically and returns the record as stored afterwards.
    /// An unknown subject starts from zero.
    pub async fn update(
        &self,
        partition: &Partition,
        delta: &KarmaDelta,
    ) -> Result<KarmaRecord, LedgerError> {
        let record = self
            .repository
            .increment(partition, delta)
            .await
            .map_err(|e| report(partition, &delta.subject, e))?;

        debug!(
            event_name = "karma.ledger.updated",
            partition = %partition,
            subject = %record.subject,
            amount = delta.amount,
            value = record.value,
            "karma updated"
        );
        Ok(record)
    }

    pub async fn get_neighbors(
        &self,
        partition: &Partition,
        subject: &str,
    ) -> Result<KarmaNeighbors, LedgerError> {
        self.repository
            .neighbors(partition, subject)
            .await
            .map_err(|e| report(partition, subject, e))
    }

    /// Highest or lowest [`LEADERBOARD_SIZE`] records of one partition.
    pub async fn get_leaderboard(
        &self,
        partition: &Partition,
        order: LeaderboardOrder,
    ) -> Result<Vec<KarmaRecord>, LedgerError> {
        self.repository.leaderboard(partition, order, LEADERBOARD_SIZE).await.map_err(|e| {
            warn!(
                event_name = "karma.ledger.leaderboard_failed",
                partition = %partition,
                error = %e,
                "leaderboard query failed"
            );
            LedgerError::from(e)
        })
    }
}

fn report(partition: &Partition, subject: &str, error: RepositoryError) -> LedgerError {
    let error = LedgerError::from(error);
    match &error {
        LedgerError::Consistency { count, .. } => error!(
            event_name = "karma.ledger.duplicate_subject",
            partition = %partition,
            subject,
            count,
            "duplicate karma records"
        ),
        LedgerError::Unavailable(message) => warn!(
            event_name = "karma.ledger.unavailable",
            partition = %partition,
            subject,
            error = %message,
            "karma store call failed"
        ),
    }
    error
}
