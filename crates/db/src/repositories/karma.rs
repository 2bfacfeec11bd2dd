use std::sync::Arc;

use sqlx::Row;

use karmabot_core::domain::karma::{
    KarmaDelta, KarmaNeighbors, KarmaRecord, LeaderboardOrder, Partition,
};

use super::{KarmaRepository, RepositoryError};
use crate::{DbPool, StoreConnector};

pub struct SqlKarmaRepository {
    connector: Arc<StoreConnector>,
}

impl SqlKarmaRepository {
    pub fn new(connector: Arc<StoreConnector>) -> Self {
        Self { connector }
    }

    async fn pool(&self) -> Result<DbPool, RepositoryError> {
        Ok(self.connector.pool().await?)
    }
}

/// Storage names the columns `name`/`value`; this is the only place they are
/// translated into the domain's `subject`/`value`.
fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<KarmaRecord, RepositoryError> {
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let value: i64 = row.try_get("value").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    Ok(KarmaRecord { subject: name, value })
}

fn optional_record(
    row: Option<sqlx::sqlite::SqliteRow>,
) -> Result<Option<KarmaRecord>, RepositoryError> {
    row.as_ref().map(row_to_record).transpose()
}

#[async_trait::async_trait]
impl KarmaRepository for SqlKarmaRepository {
    async fn find(
        &self,
        partition: &Partition,
        subject: &str,
    ) -> Result<Option<KarmaRecord>, RepositoryError> {
        let pool = self.pool().await?;
        let rows = sqlx::query("SELECT name, value FROM karma WHERE partition = ? AND name = ?")
            .bind(partition.as_str())
            .bind(subject)
            .fetch_all(&pool)
            .await?;

        match rows.as_slice() {
            [] => Ok(None),
            [row] => Ok(Some(row_to_record(row)?)),
            _ => Err(RepositoryError::Duplicate {
                partition: partition.to_string(),
                subject: subject.to_owned(),
                count: rows.len(),
            }),
        }
    }

    async fn increment(
        &self,
        partition: &Partition,
        delta: &KarmaDelta,
    ) -> Result<KarmaRecord, RepositoryError> {
        let pool = self.pool().await?;
        let row = sqlx::query(
            "INSERT INTO karma (partition, name, value)
             VALUES (?, ?, ?)
             ON CONFLICT(partition, name) DO UPDATE SET
                 value = value + excluded.value,
                 updated_at = CURRENT_TIMESTAMP
             RETURNING name, value",
        )
        .bind(partition.as_str())
        .bind(&delta.subject)
        .bind(delta.amount)
        .fetch_one(&pool)
        .await?;

        row_to_record(&row)
    }

    async fn neighbors(
        &self,
        partition: &Partition,
        subject: &str,
    ) -> Result<KarmaNeighbors, RepositoryError> {
        let Some(target) = self.find(partition, subject).await? else {
            return Ok(KarmaNeighbors::empty());
        };
        let pool = self.pool().await?;

        let next = sqlx::query(
            "SELECT name, value FROM karma
             WHERE partition = ? AND value > ?
             ORDER BY value ASC, name ASC
             LIMIT 1",
        )
        .bind(partition.as_str())
        .bind(target.value)
        .fetch_optional(&pool)
        .await?;

        let previous = sqlx::query(
            "SELECT name, value FROM karma
             WHERE partition = ? AND value < ?
             ORDER BY value DESC, name ASC
             LIMIT 1",
        )
        .bind(partition.as_str())
        .bind(target.value)
        .fetch_optional(&pool)
        .await?;

        Ok(KarmaNeighbors {
            target: Some(target),
            previous: optional_record(previous)?,
            next: optional_record(next)?,
        })
    }

    async fn leaderboard(
        &self,
        partition: &Partition,
        order: LeaderboardOrder,
        limit: u32,
    ) -> Result<Vec<KarmaRecord>, RepositoryError> {
        let statement = match order {
            LeaderboardOrder::Top => {
                "SELECT name, value FROM karma WHERE partition = ?
                 ORDER BY value DESC, name ASC LIMIT ?"
            }
            LeaderboardOrder::Bottom => {
                "SELECT name, value FROM karma WHERE partition = ?
                 ORDER BY value ASC, name ASC LIMIT ?"
            }
        };

        let pool = self.pool().await?;
        let rows = sqlx::query(statement)
            .bind(partition.as_str())
            .bind(i64::from(limit))
            .fetch_all(&pool)
            .await?;

        rows.iter().map(row_to_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use karmabot_core::domain::karma::{
        KarmaDelta, KarmaRecord, LeaderboardOrder, Partition,
    };

    use crate::repositories::{KarmaRepository, SqlKarmaRepository};
    use crate::{ConnectionSettings, StoreConnector};

    async fn setup() -> SqlKarmaRepository {
        let connector = StoreConnector::new(ConnectionSettings {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 5,
        });
        SqlKarmaRepository::new(Arc::new(connector))
    }

    async fn seed(repo: &SqlKarmaRepository, partition: &Partition, records: &[(&str, i64)]) {
        for (subject, value) in records {
            repo.increment(partition, &KarmaDelta::new(*subject, *value)).await.expect("seed");
        }
    }

    #[tokio::test]
    async fn increment_creates_then_accumulates() {
        let repo = setup().await;
        let partition = Partition::global();

        let created = repo.increment(&partition, &KarmaDelta::new("Foo", 1)).await.expect("create");
        let updated = repo.increment(&partition, &KarmaDelta::new("Foo", 1)).await.expect("update");

        assert_eq!(created, KarmaRecord::new("Foo", 1));
        assert_eq!(updated, KarmaRecord::new("Foo", 2));
        assert_eq!(
            repo.find(&partition, "Foo").await.expect("find"),
            Some(KarmaRecord::new("Foo", 2))
        );
    }

    #[tokio::test]
    async fn find_returns_none_for_unknown_subject() {
        let repo = setup().await;
        assert_eq!(repo.find(&Partition::global(), "Nobody").await.expect("find"), None);
    }

    #[tokio::test]
    async fn neighbors_pick_closest_values_on_each_side() {
        let repo = setup().await;
        let partition = Partition::global();
        seed(&repo, &partition, &[("Low", -4), ("Mid", 1), ("High", 7), ("Top", 20)]).await;

        let neighbors = repo.neighbors(&partition, "Mid").await.expect("neighbors");

        assert_eq!(neighbors.target, Some(KarmaRecord::new("Mid", 1)));
        assert_eq!(neighbors.previous, Some(KarmaRecord::new("Low", -4)));
        assert_eq!(neighbors.next, Some(KarmaRecord::new("High", 7)));
    }

    #[tokio::test]
    async fn neighbors_break_ties_by_subject() {
        let repo = setup().await;
        let partition = Partition::global();
        seed(&repo, &partition, &[("Zed", 5), ("Amy", 5), ("Mid", 3), ("Yak", 1), ("Bob", 1)])
            .await;

        let neighbors = repo.neighbors(&partition, "Mid").await.expect("neighbors");

        assert_eq!(neighbors.next, Some(KarmaRecord::new("Amy", 5)));
        assert_eq!(neighbors.previous, Some(KarmaRecord::new("Bob", 1)));
    }

    #[tokio::test]
    async fn neighbors_are_empty_at_the_extremes_and_for_unknown_subjects() {
        let repo = setup().await;
        let partition = Partition::global();
        seed(&repo, &partition, &[("Stuff", 0), ("Hotdogs", 2)]).await;

        let lowest = repo.neighbors(&partition, "Stuff").await.expect("lowest");
        assert_eq!(lowest.previous, None);
        assert_eq!(lowest.next, Some(KarmaRecord::new("Hotdogs", 2)));

        let highest = repo.neighbors(&partition, "Hotdogs").await.expect("highest");
        assert_eq!(highest.next, None);

        let missing = repo.neighbors(&partition, "Ghost").await.expect("missing");
        assert_eq!(missing, Default::default());
    }

    #[tokio::test]
    async fn partitions_do_not_share_subjects() {
        let repo = setup().await;
        let team_one = Partition::for_team("T1");
        let team_two = Partition::for_team("T2");

        repo.increment(&team_one, &KarmaDelta::new("Foo", 3)).await.expect("team one");
        repo.increment(&team_two, &KarmaDelta::new("Foo", -2)).await.expect("team two");

        assert_eq!(
            repo.find(&team_one, "Foo").await.expect("find"),
            Some(KarmaRecord::new("Foo", 3))
        );
        assert_eq!(
            repo.find(&team_two, "Foo").await.expect("find"),
            Some(KarmaRecord::new("Foo", -2))
        );
        assert_eq!(repo.find(&Partition::global(), "Foo").await.expect("find"), None);
    }

    #[tokio::test]
    async fn leaderboard_is_limited_and_ordered() {
        let repo = setup().await;
        let partition = Partition::global();
        seed(
            &repo,
            &partition,
            &[("A", 1), ("B", 2), ("C", 3), ("D", 4), ("E", 5), ("F", 6), ("G", -1)],
        )
        .await;

        let top = repo.leaderboard(&partition, LeaderboardOrder::Top, 5).await.expect("top");
        let names: Vec<_> = top.iter().map(|record| record.subject.as_str()).collect();
        assert_eq!(names, ["F", "E", "D", "C", "B"]);

        let bottom =
            repo.leaderboard(&partition, LeaderboardOrder::Bottom, 5).await.expect("bottom");
        let names: Vec<_> = bottom.iter().map(|record| record.subject.as_str()).collect();
        assert_eq!(names, ["G", "A", "B", "C", "D"]);
    }
}
