use std::collections::HashMap;

use tokio::sync::RwLock;

use karmabot_core::domain::karma::{
    KarmaDelta, KarmaNeighbors, KarmaRecord, LeaderboardOrder, Partition,
};
use karmabot_core::domain::team::TeamAuthToken;

use super::{KarmaRepository, RepositoryError, TeamTokenRepository};

/// Process-local karma store. Records are kept as a plain list per partition
/// so tests can seed inconsistent data (duplicate subjects) that the SQL
/// schema would reject.
#[derive(Default)]
pub struct InMemoryKarmaRepository {
    records: RwLock<HashMap<Partition, Vec<KarmaRecord>>>,
}

impl InMemoryKarmaRepository {
    pub fn with_records(
        partition: Partition,
        records: impl IntoIterator<Item = KarmaRecord>,
    ) -> Self {
        let mut map = HashMap::new();
        map.insert(partition, records.into_iter().collect());
        Self { records: RwLock::new(map) }
    }
}

fn find_in(
    records: &[KarmaRecord],
    partition: &Partition,
    subject: &str,
) -> Result<Option<KarmaRecord>, RepositoryError> {
    let matches: Vec<&KarmaRecord> =
        records.iter().filter(|record| record.subject == subject).collect();
    match matches.as_slice() {
        [] => Ok(None),
        [record] => Ok(Some((*record).clone())),
        _ => Err(RepositoryError::Duplicate {
            partition: partition.to_string(),
            subject: subject.to_owned(),
            count: matches.len(),
        }),
    }
}

#[async_trait::async_trait]
impl KarmaRepository for InMemoryKarmaRepository {
    async fn find(
        &self,
        partition: &Partition,
        subject: &str,
    ) -> Result<Option<KarmaRecord>, RepositoryError> {
        let records = self.records.read().await;
        match records.get(partition) {
            Some(list) => find_in(list, partition, subject),
            None => Ok(None),
        }
    }

    async fn increment(
        &self,
        partition: &Partition,
        delta: &KarmaDelta,
    ) -> Result<KarmaRecord, RepositoryError> {
        let mut records = self.records.write().await;
        let list = records.entry(partition.clone()).or_default();
        find_in(list, partition, &delta.subject)?;

        match list.iter_mut().find(|record| record.subject == delta.subject) {
            Some(record) => {
                record.value += delta.amount;
                Ok(record.clone())
            }
            None => {
                let record = KarmaRecord::new(delta.subject.clone(), delta.amount);
                list.push(record.clone());
                Ok(record)
            }
        }
    }

    async fn neighbors(
        &self,
        partition: &Partition,
        subject: &str,
    ) -> Result<KarmaNeighbors, RepositoryError> {
        let records = self.records.read().await;
        let Some(list) = records.get(partition) else {
            return Ok(KarmaNeighbors::empty());
        };
        let Some(target) = find_in(list, partition, subject)? else {
            return Ok(KarmaNeighbors::empty());
        };

        let next = list
            .iter()
            .filter(|record| record.value > target.value)
            .min_by(|a, b| a.value.cmp(&b.value).then_with(|| a.subject.cmp(&b.subject)))
            .cloned();
        let previous = list
            .iter()
            .filter(|record| record.value < target.value)
            .min_by(|a, b| b.value.cmp(&a.value).then_with(|| a.subject.cmp(&b.subject)))
            .cloned();

        Ok(KarmaNeighbors { target: Some(target), previous, next })
    }

    async fn leaderboard(
        &self,
        partition: &Partition,
        order: LeaderboardOrder,
        limit: u32,
    ) -> Result<Vec<KarmaRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut list = records.get(partition).cloned().unwrap_or_default();
        list.sort_by(|a, b| {
            let by_value = match order {
                LeaderboardOrder::Top => b.value.cmp(&a.value),
                LeaderboardOrder::Bottom => a.value.cmp(&b.value),
            };
            by_value.then_with(|| a.subject.cmp(&b.subject))
        });
        list.truncate(limit as usize);
        Ok(list)
    }
}

#[derive(Default)]
pub struct InMemoryTeamTokenRepository {
    tokens: RwLock<HashMap<String, TeamAuthToken>>,
}

#[async_trait::async_trait]
impl TeamTokenRepository for InMemoryTeamTokenRepository {
    async fn find_by_team(&self, team_id: &str) -> Result<Option<TeamAuthToken>, RepositoryError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(team_id).cloned())
    }

    async fn save(&self, token: TeamAuthToken) -> Result<(), RepositoryError> {
        let mut tokens = self.tokens.write().await;
        tokens.insert(token.team_id.clone(), token);
        Ok(())
    }
}
