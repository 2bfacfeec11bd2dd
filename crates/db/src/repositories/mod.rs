use async_trait::async_trait;
use thiserror::Error;

use karmabot_core::domain::karma::{
    KarmaDelta, KarmaNeighbors, KarmaRecord, LeaderboardOrder, Partition,
};
use karmabot_core::domain::team::TeamAuthToken;

use crate::connection::ConnectError;

pub mod karma;
pub mod memory;
pub mod team_token;

pub use karma::SqlKarmaRepository;
pub use memory::{InMemoryKarmaRepository, InMemoryTeamTokenRepository};
pub use team_token::SqlTeamTokenRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Unavailable(#[from] ConnectError),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("found {count} records for subject `{subject}` in partition `{partition}`")]
    Duplicate { partition: String, subject: String, count: usize },
}

/// Storage for karma records. Every call is scoped to one partition.
#[async_trait]
pub trait KarmaRepository: Send + Sync {
    /// Fails with [`RepositoryError::Duplicate`] when more than one row shares the subject.
    async fn find(
        &self,
        partition: &Partition,
        subject: &str,
    ) -> Result<Option<KarmaRecord>, RepositoryError>;

    /// Adds `delta.amount` to the subject's value in one atomic upsert and
    /// returns the stored record afterwards.
    async fn increment(
        &self,
        partition: &Partition,
        delta: &KarmaDelta,
    ) -> Result<KarmaRecord, RepositoryError>;

    /// Closest records strictly above and below the subject's value. Equal-valued
    /// candidates resolve to the lexically smallest subject.
    async fn neighbors(
        &self,
        partition: &Partition,
        subject: &str,
    ) -> Result<KarmaNeighbors, RepositoryError>;

    async fn leaderboard(
        &self,
        partition: &Partition,
        order: LeaderboardOrder,
        limit: u32,
    ) -> Result<Vec<KarmaRecord>, RepositoryError>;
}

#[async_trait]
pub trait TeamTokenRepository: Send + Sync {
    async fn find_by_team(&self, team_id: &str) -> Result<Option<TeamAuthToken>, RepositoryError>;

    /// Replaces any token previously stored for the same team.
    async fn save(&self, token: TeamAuthToken) -> Result<(), RepositoryError>;
}
