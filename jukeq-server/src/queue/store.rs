//! Queue store: durable request collection with atomic mutation primitives
//!
//! All multi-step mutations (quota check + ordinal assignment + insert,
//! demote + promote, cancel + reconcile, promote-to-top shuffle) run inside a
//! single transaction while holding a per-restaurant lock. The lock makes the
//! read-then-write sequences over one restaurant's pending ordinal sequence
//! mutually exclusive within the process; the transaction keeps them atomic
//! in storage. Busy/locked conflicts from other writers are retried a bounded
//! number of times before surfacing as a transient `Conflict` error.

use jukeq_common::db::models::{QueueItem, QueueStats, Request, RequestStatus};
use jukeq_common::{time, Error, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::query::{self, QueueFilter};

/// Bounded retry budget for busy/locked write transactions
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Base backoff between retries (multiplied by attempt number)
const RETRY_BACKOFF_MS: u64 = 25;

/// Handle to the request queue, shared across HTTP handlers
pub struct QueueStore {
    pool: SqlitePool,
    /// Per-restaurant write locks, created on first use
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl QueueStore {
    /// Create a store over an initialized database pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Underlying pool (read paths and tests)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn restaurant_lock(&self, restaurant_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(restaurant_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    // ========================================================================
    // Enqueue
    // ========================================================================

    /// Create a new pending request at the tail of the restaurant's queue
    ///
    /// Fails with `QuotaExceeded` when the user already occupies
    /// `max_pending_requests` slots (pending + playing) in this restaurant.
    pub async fn enqueue(
        &self,
        restaurant_id: Uuid,
        user_id: &str,
        song_id: Uuid,
        user_table: Option<&str>,
    ) -> Result<Request> {
        let lock = self.restaurant_lock(restaurant_id);
        let _guard = lock.lock().await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut tx = self.pool.begin().await?;
            let result = match enqueue_in_tx(&mut tx, restaurant_id, user_id, song_id, user_table)
                .await
            {
                Ok(request) => tx.commit().await.map(|_| request).map_err(Error::from),
                Err(e) => {
                    drop(tx);
                    Err(e)
                }
            };

            match result {
                Ok(request) => {
                    info!(
                        restaurant_id = %restaurant_id,
                        request_id = %request.id,
                        position = request.queue_position,
                        "Enqueued request"
                    );
                    return Ok(request);
                }
                Err(e) if is_transient(&e) && attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(
                        restaurant_id = %restaurant_id,
                        attempt,
                        "Enqueue hit a busy database, retrying: {}",
                        e
                    );
                    backoff(attempt).await;
                }
                Err(e) if is_transient(&e) => {
                    return Err(Error::Conflict(format!(
                        "enqueue for restaurant {} kept conflicting: {}",
                        restaurant_id, e
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ========================================================================
    // Status transitions
    // ========================================================================

    /// Move a request along its lifecycle
    ///
    /// Returns the affected-row count (1 on success). Transitioning to
    /// `playing` demotes any other playing request in the restaurant to
    /// `completed` in the same transaction; transitioning a pending request
    /// to `cancelled` reconciles the remaining pending positions.
    pub async fn transition_status(&self, request_id: Uuid, target: RequestStatus) -> Result<u64> {
        let restaurant_id = self.resolve_restaurant(request_id).await?;
        let lock = self.restaurant_lock(restaurant_id);
        let _guard = lock.lock().await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut tx = self.pool.begin().await?;
            let result = match transition_in_tx(&mut tx, request_id, restaurant_id, target).await {
                Ok(affected) => tx.commit().await.map(|_| affected).map_err(Error::from),
                Err(e) => {
                    drop(tx);
                    Err(e)
                }
            };

            match result {
                Ok(affected) => {
                    info!(
                        restaurant_id = %restaurant_id,
                        request_id = %request_id,
                        target = %target,
                        "Transitioned request"
                    );
                    return Ok(affected);
                }
                Err(e) if is_transient(&e) && attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(
                        request_id = %request_id,
                        attempt,
                        "Status transition hit a busy database, retrying: {}",
                        e
                    );
                    backoff(attempt).await;
                }
                Err(e) if is_transient(&e) => {
                    return Err(Error::Conflict(format!(
                        "transition of request {} kept conflicting: {}",
                        request_id, e
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Cancel a request (terminal); reconciles pending positions
    pub async fn cancel(&self, request_id: Uuid) -> Result<u64> {
        self.transition_status(request_id, RequestStatus::Cancelled)
            .await
    }

    // ========================================================================
    // Promote to top
    // ========================================================================

    /// Move a pending request to position 1 of its restaurant's queue
    ///
    /// Restaurant-scoped: the restaurant is resolved from the request id
    /// first, then only that restaurant's pending requests ahead of the
    /// target shift down by one. Promoting the request already at position 1
    /// changes nothing.
    pub async fn promote_to_top(&self, request_id: Uuid) -> Result<u64> {
        let restaurant_id = self.resolve_restaurant(request_id).await?;
        let lock = self.restaurant_lock(restaurant_id);
        let _guard = lock.lock().await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut tx = self.pool.begin().await?;
            let result = match promote_in_tx(&mut tx, request_id, restaurant_id).await {
                Ok(affected) => tx.commit().await.map(|_| affected).map_err(Error::from),
                Err(e) => {
                    drop(tx);
                    Err(e)
                }
            };

            match result {
                Ok(affected) => {
                    info!(
                        restaurant_id = %restaurant_id,
                        request_id = %request_id,
                        "Promoted request to top"
                    );
                    return Ok(affected);
                }
                Err(e) if is_transient(&e) && attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(
                        request_id = %request_id,
                        attempt,
                        "Promote hit a busy database, retrying: {}",
                        e
                    );
                    backoff(attempt).await;
                }
                Err(e) if is_transient(&e) => {
                    return Err(Error::Conflict(format!(
                        "promote of request {} kept conflicting: {}",
                        request_id, e
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ========================================================================
    // Read paths
    // ========================================================================

    /// List a restaurant's queue in playback order (see ordering policy)
    pub async fn list_queue(
        &self,
        restaurant_id: Uuid,
        filter: &QueueFilter,
    ) -> Result<(Vec<QueueItem>, i64)> {
        query::list_queue(&self.pool, restaurant_id, filter).await
    }

    /// Queue statistics for the staff dashboard
    pub async fn stats(&self, restaurant_id: Uuid) -> Result<QueueStats> {
        let today_start = time::today_start_db_string();

        let (pending, playing, completed_today): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'playing' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'completed' AND completed_at >= ? THEN 1 ELSE 0 END), 0)
            FROM requests
            WHERE restaurant_id = ?
            "#,
        )
        .bind(&today_start)
        .bind(restaurant_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        // Wait time measured from creation to playback start, over requests
        // that started playing today
        let (avg_wait_minutes,): (Option<f64>,) = sqlx::query_as(
            r#"
            SELECT AVG((julianday(started_playing_at) - julianday(requested_at)) * 1440.0)
            FROM requests
            WHERE restaurant_id = ?
              AND started_playing_at IS NOT NULL
              AND started_playing_at >= ?
            "#,
        )
        .bind(restaurant_id.to_string())
        .bind(&today_start)
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueStats {
            pending,
            playing,
            completed_today,
            avg_wait_minutes,
        })
    }

    /// Fetch a single request by id
    pub async fn get_request(&self, request_id: Uuid) -> Result<Request> {
        let row = sqlx::query_as::<_, RequestRow>(
            "SELECT id, restaurant_id, user_id, user_table, song_id, status, \
                    queue_position, requested_at, started_playing_at, completed_at \
             FROM requests WHERE id = ?",
        )
        .bind(request_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("request {}", request_id)))?;

        row.into_request()
    }

    async fn resolve_restaurant(&self, request_id: Uuid) -> Result<Uuid> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT restaurant_id FROM requests WHERE id = ?")
                .bind(request_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        let (restaurant_id,) =
            row.ok_or_else(|| Error::NotFound(format!("request {}", request_id)))?;
        parse_uuid(&restaurant_id)
    }
}

// ============================================================================
// Transaction bodies
// ============================================================================

async fn enqueue_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    restaurant_id: Uuid,
    user_id: &str,
    song_id: Uuid,
    user_table: Option<&str>,
) -> Result<Request> {
    // Quota limit comes from restaurant configuration, never a hard-coded
    // call-site constant
    let limit_row: Option<(i64,)> =
        sqlx::query_as("SELECT max_pending_requests FROM restaurants WHERE id = ?")
            .bind(restaurant_id.to_string())
            .fetch_optional(&mut **tx)
            .await?;
    let (limit,) =
        limit_row.ok_or_else(|| Error::NotFound(format!("restaurant {}", restaurant_id)))?;

    // A playing request still occupies one of the user's slots
    let (occupied,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM requests \
         WHERE restaurant_id = ? AND user_id = ? AND status IN ('pending', 'playing')",
    )
    .bind(restaurant_id.to_string())
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;

    if occupied >= limit {
        return Err(Error::QuotaExceeded { limit });
    }

    // The song must exist in this restaurant's catalog; a request that could
    // never join to a song is rejected, not silently created
    let song_row: Option<(String,)> =
        sqlx::query_as("SELECT id FROM songs WHERE id = ? AND restaurant_id = ?")
            .bind(song_id.to_string())
            .bind(restaurant_id.to_string())
            .fetch_optional(&mut **tx)
            .await?;
    song_row.ok_or_else(|| Error::NotFound(format!("song {}", song_id)))?;

    // Next ordinal: one past the current pending maximum, 1 when empty
    let (max_position,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(MAX(queue_position), 0) FROM requests \
         WHERE restaurant_id = ? AND status = 'pending'",
    )
    .bind(restaurant_id.to_string())
    .fetch_one(&mut **tx)
    .await?;
    let position = max_position + 1;

    let id = Uuid::new_v4();
    let requested_at = time::now();

    sqlx::query(
        r#"
        INSERT INTO requests (id, restaurant_id, user_id, user_table, song_id,
                              status, queue_position, requested_at)
        VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(restaurant_id.to_string())
    .bind(user_id)
    .bind(user_table)
    .bind(song_id.to_string())
    .bind(position)
    .bind(time::to_db_string(requested_at))
    .execute(&mut **tx)
    .await?;

    // Informational catalog counter; a failure here must not abort the
    // request creation
    let counter = sqlx::query(
        "UPDATE songs SET times_requested = times_requested + 1, last_requested_at = ? \
         WHERE id = ?",
    )
    .bind(time::to_db_string(requested_at))
    .bind(song_id.to_string())
    .execute(&mut **tx)
    .await;
    if let Err(e) = counter {
        warn!(song_id = %song_id, "Failed to update song request counter: {}", e);
    }

    Ok(Request {
        id,
        restaurant_id,
        user_id: user_id.to_string(),
        user_table: user_table.map(str::to_string),
        song_id,
        status: RequestStatus::Pending,
        queue_position: position,
        requested_at,
        started_playing_at: None,
        completed_at: None,
    })
}

async fn transition_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    request_id: Uuid,
    restaurant_id: Uuid,
    target: RequestStatus,
) -> Result<u64> {
    // Re-read inside the transaction; the status may have moved since the
    // caller resolved the request
    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT status, queue_position FROM requests WHERE id = ?")
            .bind(request_id.to_string())
            .fetch_optional(&mut **tx)
            .await?;
    let (status_str, old_position) =
        row.ok_or_else(|| Error::NotFound(format!("request {}", request_id)))?;
    let current = RequestStatus::parse(&status_str)?;

    if !current.can_transition_to(target) {
        return Err(Error::InvalidTransition {
            from: current.to_string(),
            to: target.to_string(),
        });
    }

    let now = time::now_db_string();
    let affected = match target {
        RequestStatus::Playing => {
            // Single-playing invariant: anything still marked playing is
            // stale and gets healed to completed before this one starts
            let demoted = sqlx::query(
                "UPDATE requests SET status = 'completed', completed_at = ? \
                 WHERE restaurant_id = ? AND status = 'playing' AND id != ?",
            )
            .bind(&now)
            .bind(restaurant_id.to_string())
            .bind(request_id.to_string())
            .execute(&mut **tx)
            .await?
            .rows_affected();
            if demoted > 0 {
                warn!(
                    restaurant_id = %restaurant_id,
                    request_id = %request_id,
                    demoted,
                    "Healed stale playing requests before starting playback"
                );
            }

            sqlx::query(
                "UPDATE requests SET status = 'playing', started_playing_at = ? WHERE id = ?",
            )
            .bind(&now)
            .bind(request_id.to_string())
            .execute(&mut **tx)
            .await?
            .rows_affected()
        }
        RequestStatus::Completed => sqlx::query(
            "UPDATE requests SET status = 'completed', completed_at = ? WHERE id = ?",
        )
        .bind(&now)
        .bind(request_id.to_string())
        .execute(&mut **tx)
        .await?
        .rows_affected(),
        RequestStatus::Cancelled => {
            let affected = sqlx::query(
                "UPDATE requests SET status = 'cancelled', completed_at = ? WHERE id = ?",
            )
            .bind(&now)
            .bind(request_id.to_string())
            .execute(&mut **tx)
            .await?
            .rows_affected();

            // Only a cancellation removes a slot from the middle of the
            // pending sequence; close the ordinal gap it left behind
            if current == RequestStatus::Pending {
                reconcile_in_tx(tx, restaurant_id, old_position).await?;
            }
            affected
        }
        // The transition table never admits pending as a target
        RequestStatus::Pending => {
            return Err(Error::InvalidTransition {
                from: current.to_string(),
                to: target.to_string(),
            });
        }
    };

    Ok(affected)
}

/// Close the ordinal gap left by a pending request that departed at
/// `removed_position`: one bulk decrement over the positions above it.
/// Idempotent and a silent no-op when nothing sits above the gap.
async fn reconcile_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    restaurant_id: Uuid,
    removed_position: i64,
) -> Result<u64> {
    let shifted = sqlx::query(
        "UPDATE requests SET queue_position = queue_position - 1 \
         WHERE restaurant_id = ? AND status = 'pending' AND queue_position > ?",
    )
    .bind(restaurant_id.to_string())
    .bind(removed_position)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    Ok(shifted)
}

async fn promote_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    request_id: Uuid,
    restaurant_id: Uuid,
) -> Result<u64> {
    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT status, queue_position FROM requests WHERE id = ?")
            .bind(request_id.to_string())
            .fetch_optional(&mut **tx)
            .await?;
    let (status_str, position) =
        row.ok_or_else(|| Error::NotFound(format!("request {}", request_id)))?;
    let status = RequestStatus::parse(&status_str)?;

    if status != RequestStatus::Pending {
        return Err(Error::InvalidInput(format!(
            "only pending requests can be promoted (request {} is {})",
            request_id, status
        )));
    }

    // Already at the head: executes, changes nothing
    if position == 1 {
        return Ok(1);
    }

    // Shift down only the requests ahead of the target, scoped to this
    // restaurant's pending set; positions behind it stay put, so the
    // sequence remains dense
    sqlx::query(
        "UPDATE requests SET queue_position = queue_position + 1 \
         WHERE restaurant_id = ? AND status = 'pending' AND queue_position < ?",
    )
    .bind(restaurant_id.to_string())
    .bind(position)
    .execute(&mut **tx)
    .await?;

    Ok(sqlx::query("UPDATE requests SET queue_position = 1 WHERE id = ?")
        .bind(request_id.to_string())
        .execute(&mut **tx)
        .await?
        .rows_affected())
}

// ============================================================================
// Row mapping and retry plumbing
// ============================================================================

/// Raw request row as stored; converted through `into_request`
#[derive(sqlx::FromRow)]
struct RequestRow {
    id: String,
    restaurant_id: String,
    user_id: String,
    user_table: Option<String>,
    song_id: String,
    status: String,
    queue_position: i64,
    requested_at: String,
    started_playing_at: Option<String>,
    completed_at: Option<String>,
}

impl RequestRow {
    fn into_request(self) -> Result<Request> {
        Ok(Request {
            id: parse_uuid(&self.id)?,
            restaurant_id: parse_uuid(&self.restaurant_id)?,
            user_id: self.user_id,
            user_table: self.user_table,
            song_id: parse_uuid(&self.song_id)?,
            status: RequestStatus::parse(&self.status)?,
            queue_position: self.queue_position,
            requested_at: time::from_db_string(&self.requested_at)?,
            started_playing_at: self
                .started_playing_at
                .as_deref()
                .map(time::from_db_string)
                .transpose()?,
            completed_at: self
                .completed_at
                .as_deref()
                .map(time::from_db_string)
                .transpose()?,
        })
    }
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Malformed stored uuid '{}': {}", s, e)))
}

/// SQLITE_BUSY / SQLITE_LOCKED and their extended codes
fn is_transient(e: &Error) -> bool {
    match e {
        Error::Database(sqlx::Error::Database(db)) => {
            matches!(db.code().as_deref(), Some("5") | Some("6") | Some("261") | Some("517"))
                || db.message().contains("database is locked")
        }
        _ => false,
    }
}

async fn backoff(attempt: u32) {
    tokio::time::sleep(std::time::Duration::from_millis(
        RETRY_BACKOFF_MS * attempt as u64,
    ))
    .await;
}
