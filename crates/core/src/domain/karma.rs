use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix every per-team partition name starts with.
pub const PARTITION_PREFIX: &str = "karma";

/// Persisted karma value for one subject within one partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KarmaRecord {
    pub subject: String,
    pub value: i64,
}

impl KarmaRecord {
    pub fn new(subject: impl Into<String>, value: i64) -> Self {
        Self { subject: subject.into(), value }
    }
}

/// A single signed adjustment extracted from a message. Never persisted as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KarmaDelta {
    pub subject: String,
    pub amount: i64,
}

impl KarmaDelta {
    pub fn new(subject: impl Into<String>, amount: i64) -> Self {
        Self { subject: subject.into(), amount }
    }
}

/// A subject's record together with the closest records ranked directly below
/// (`previous`) and above (`next`) it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KarmaNeighbors {
    pub target: Option<KarmaRecord>,
    pub previous: Option<KarmaRecord>,
    pub next: Option<KarmaRecord>,
}

impl KarmaNeighbors {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardOrder {
    /// Highest values first.
    #[default]
    Top,
    /// Lowest values first.
    Bottom,
}

/// Isolation boundary for karma records. Two partitions never share subjects.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition(String);

impl Partition {
    /// The single partition used by single-tenant deployments.
    pub fn global() -> Self {
        Self(PARTITION_PREFIX.to_owned())
    }

    pub fn for_team(team_id: &str) -> Self {
        let team_id = team_id.trim();
        if team_id.is_empty() {
            return Self::global();
        }
        Self(format!("{PARTITION_PREFIX}_{team_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
