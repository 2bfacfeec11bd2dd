//! Slack Events API integration for karmabot.
//!
//! - `verification` checks Slack request signatures.
//! - `events` turns a verified request into an immediate response and, for
//!   karma messages, a background update.
//! - `karma` applies parsed deltas through the ledger and posts the summary.
//! - `oauth` handles team installs and per-team credential lookup.
//! - `web` is the outbound Slack Web API client.
//!
//! ```text
//! HTTP request → EventHandler → KarmaUpdateHandler → KarmaLedger
//!                     ↓                  ↓
//!               OAuthService       SlackWebClient (chat.postMessage)
//! ```

pub mod events;
pub mod karma;
pub mod messages;
pub mod oauth;
pub mod verification;
pub mod web;

pub use events::{EventHandler, EventOutcome, GatewayRequest, GatewayResponse};
pub use karma::{KarmaMessage, KarmaUpdateError, KarmaUpdateHandler};
pub use oauth::{OAuthService, TeamAuthorizer, TenantResolver};
pub use verification::RequestVerifier;
pub use web::{MessageSender, OAuthExchanger, SlackApiError, SlackWebClient};
