use karmabot_core::domain::karma::{KarmaNeighbors, KarmaRecord};

pub const SUMMARY_SEPARATOR: &str = "\n-----\n";

/// One line per updated subject, e.g.
/// `Stuff now has 1 karma. Hotdogs has the next highest karma, with 2 karma.`
pub fn render_summary(updated: &KarmaRecord, neighbors: &KarmaNeighbors) -> String {
    let target = neighbors.target.as_ref().unwrap_or(updated);
    let mut message = format!("{} now has {} karma.", target.subject, target.value);

    if let Some(next) = &neighbors.next {
        message.push_str(&format!(
            " {} has the next highest karma, with {} karma.",
            next.subject, next.value
        ));
    }
    if let Some(previous) = &neighbors.previous {
        message.push_str(&format!(
            " {} has the next lowest karma, with {} karma.",
            previous.subject, previous.value
        ));
    }

    message
}

pub fn join_summaries<I, S>(summaries: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    summaries
        .into_iter()
        .map(|line| line.as_ref().to_owned())
        .collect::<Vec<_>>()
        .join(SUMMARY_SEPARATOR)
}
