use crate::domain::karma::KarmaDelta;

const INCREMENTER: char = '+';
const DECREMENTER: char = '-';

/// Largest change a single token may apply to a regular subject.
pub const MAX_DELTA: i64 = 5;

/// Subject that is neither clamped nor allowed to lose karma.
pub const EXEMPT_SUBJECT: &str = "Pia";

/// Slack encodes user mentions as `<@U123>`; raw `@handle` tokens are kept as well.
const MENTION_PREFIXES: [char; 2] = ['<', '@'];

/// Turns free-text messages into karma deltas.
///
/// A token counts when it ends in a run of at least two identical `+` or `-`
/// characters. The run length minus one is the magnitude, so `foo++` is `+1`
/// and `bar---` is `-2`. Tokens are reported in the order they appear and
/// repeated subjects are not merged.
#[derive(Clone, Copy, Debug, Default)]
pub struct KarmaParser;

impl KarmaParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_message(&self, message: &str) -> Vec<KarmaDelta> {
        message.split_whitespace().filter_map(parse_word).map(prettify).collect()
    }
}

/// Convenience wrapper around [`KarmaParser::parse_message`].
pub fn parse_message(message: &str) -> Vec<KarmaDelta> {
    KarmaParser::new().parse_message(message)
}

fn parse_word(word: &str) -> Option<KarmaDelta> {
    let symbol = match word.chars().last()? {
        INCREMENTER => INCREMENTER,
        DECREMENTER => DECREMENTER,
        _ => return None,
    };

    let run = word.chars().rev().take_while(|ch| *ch == symbol).count();
    if run < 2 {
        return None;
    }

    // Both symbols are single-byte, so the run length is also its byte length.
    let subject = &word[..word.len() - run];
    if subject.is_empty() {
        return None;
    }

    let magnitude = i64::try_from(run - 1).unwrap_or(i64::MAX);
    let amount = if symbol == DECREMENTER { -magnitude } else { magnitude };
    Some(KarmaDelta::new(subject, amount))
}

fn prettify(delta: KarmaDelta) -> KarmaDelta {
    let subject = normalize_subject(&delta.subject);

    let amount = if subject == EXEMPT_SUBJECT {
        delta.amount.abs()
    } else {
        delta.amount.clamp(-MAX_DELTA, MAX_DELTA)
    };

    KarmaDelta { subject, amount }
}

/// Lower-cases a subject and capitalises its first character. Mentions are left
/// untouched because changing their case would break the encoded user id.
pub fn normalize_subject(subject: &str) -> String {
    if subject.starts_with(MENTION_PREFIXES) {
        return subject.to_owned();
    }

    let lowered = subject.to_lowercase();
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
