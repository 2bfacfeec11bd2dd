pub mod parser;

pub use parser::{normalize_subject, parse_message, KarmaParser, EXEMPT_SUBJECT, MAX_DELTA};
