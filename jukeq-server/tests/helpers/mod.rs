//! Test helpers for queue integration tests
//!
//! Builds an in-memory database with one seeded restaurant and exposes
//! direct-SQL probes for asserting on stored queue state.

use jukeq_common::db::models::{Restaurant, Song};
use jukeq_common::db::{self, seed};
use jukeq_server::QueueStore;
use sqlx::SqlitePool;
use uuid::Uuid;

/// One restaurant, its catalog, and a queue store over an in-memory database
pub struct TestQueue {
    pub pool: SqlitePool,
    pub store: QueueStore,
    pub restaurant: Restaurant,
}

impl TestQueue {
    /// Default per-user quota of 2, matching production defaults
    pub async fn new() -> Self {
        Self::with_quota(2).await
    }

    pub async fn with_quota(quota: i64) -> Self {
        let pool = db::init_memory_database().await.expect("init database");
        let restaurant = seed::create_restaurant(&pool, "Testaurant", Some(quota))
            .await
            .expect("seed restaurant");
        let store = QueueStore::new(pool.clone());
        Self {
            pool,
            store,
            restaurant,
        }
    }

    pub async fn add_song(&self, title: &str) -> Song {
        seed::create_song(&self.pool, self.restaurant.id, title, "Test Artist", Some(180), None)
            .await
            .expect("seed song")
    }

    /// Pending request ids in queue_position order
    pub async fn pending_order(&self) -> Vec<Uuid> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM requests WHERE restaurant_id = ? AND status = 'pending' \
             ORDER BY queue_position ASC",
        )
        .bind(self.restaurant.id.to_string())
        .fetch_all(&self.pool)
        .await
        .expect("query pending order");
        rows.iter()
            .map(|(id,)| Uuid::parse_str(id).expect("stored uuid"))
            .collect()
    }

    /// Sorted pending positions; density means this equals 1..=N
    pub async fn pending_positions(&self) -> Vec<i64> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT queue_position FROM requests \
             WHERE restaurant_id = ? AND status = 'pending' ORDER BY queue_position ASC",
        )
        .bind(self.restaurant.id.to_string())
        .fetch_all(&self.pool)
        .await
        .expect("query pending positions");
        rows.into_iter().map(|(p,)| p).collect()
    }

    pub async fn position_of(&self, request_id: Uuid) -> i64 {
        let (pos,): (i64,) = sqlx::query_as("SELECT queue_position FROM requests WHERE id = ?")
            .bind(request_id.to_string())
            .fetch_one(&self.pool)
            .await
            .expect("query position");
        pos
    }

    pub async fn playing_count(&self) -> i64 {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM requests WHERE restaurant_id = ? AND status = 'playing'",
        )
        .bind(self.restaurant.id.to_string())
        .fetch_one(&self.pool)
        .await
        .expect("query playing count");
        count
    }

    pub fn assert_dense(positions: &[i64]) {
        let expected: Vec<i64> = (1..=positions.len() as i64).collect();
        assert_eq!(
            positions, &expected,
            "pending positions must be exactly 1..=N"
        );
    }
}
