pub mod connection;
pub mod ledger;
pub mod migrations;
pub mod repositories;

pub use connection::{
    connect_with_settings, ConnectError, ConnectionSettings, DbPool, StoreConnector,
};
pub use ledger::{KarmaLedger, LedgerError, LEADERBOARD_SIZE};
