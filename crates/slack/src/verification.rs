//! Slack request signing.
//!
//! Every request Slack sends carries `X-Slack-Signature`, an HMAC-SHA256 of
//! `v0:<timestamp>:<raw body>` keyed with the app's signing secret. Requests
//! older or newer than five minutes are rejected to limit replays.

use std::collections::HashMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
pub const MAX_REQUEST_AGE_SECS: i64 = 300;

const SIGNATURE_VERSION: &str = "v0";

type HmacSha256 = Hmac<Sha256>;

pub struct RequestVerifier {
    signing_secret: SecretString,
}

impl RequestVerifier {
    pub fn new(signing_secret: SecretString) -> Self {
        Self { signing_secret }
    }

    /// Reads the signature headers (any casing) and checks them against the body.
    pub fn verify_request(&self, headers: &HashMap<String, String>, raw_body: &str) -> bool {
        let signature = header_value(headers, SIGNATURE_HEADER).unwrap_or_default();
        let timestamp =
            header_value(headers, TIMESTAMP_HEADER).and_then(|raw| raw.trim().parse::<i64>().ok());
        self.check_signature(signature, timestamp, raw_body)
    }

    pub fn check_signature(&self, signature: &str, timestamp: Option<i64>, raw_body: &str) -> bool {
        self.check_signature_at(Utc::now().timestamp(), signature, timestamp, raw_body)
    }

    pub fn check_signature_at(
        &self,
        now: i64,
        signature: &str,
        timestamp: Option<i64>,
        raw_body: &str,
    ) -> bool {
        let Some(timestamp) = timestamp else {
            warn!(event_name = "slack.verify.missing_timestamp", "slack request has no timestamp");
            return false;
        };

        let skew = now.saturating_sub(timestamp).saturating_abs();
        if skew > MAX_REQUEST_AGE_SECS {
            warn!(
                event_name = "slack.verify.stale_request",
                now,
                timestamp,
                skew_secs = skew,
                max_age_secs = MAX_REQUEST_AGE_SECS,
                "received an outdated slack request"
            );
            return false;
        }

        let Some(expected) = self.sign(timestamp, raw_body) else {
            return false;
        };
        let matches: bool = expected.as_bytes().ct_eq(signature.as_bytes()).into();
        if !matches {
            warn!(event_name = "slack.verify.bad_signature", "slack request has a bad signature");
        }
        matches
    }

    /// `v0=<hex hmac>` for the given timestamp and body.
    pub fn sign(&self, timestamp: i64, raw_body: &str) -> Option<String> {
        let mut mac =
            HmacSha256::new_from_slice(self.signing_secret.expose_secret().as_bytes()).ok()?;
        mac.update(format!("{SIGNATURE_VERSION}:{timestamp}:{raw_body}").as_bytes());
        Some(format!("{SIGNATURE_VERSION}={}", encode_hex(&mac.finalize().into_bytes())))
    }
}

fn header_value<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
