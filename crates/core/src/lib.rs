//! Karmabot core: domain types, the karma message parser, configuration and
//! the error taxonomy shared by the storage and Slack crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod karma;

pub use domain::karma::{
    KarmaDelta, KarmaNeighbors, KarmaRecord, LeaderboardOrder, Partition, PARTITION_PREFIX,
};
pub use domain::team::{BotToken, TeamAuthToken, TenantCredentials};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use karma::{parse_message, KarmaParser};
