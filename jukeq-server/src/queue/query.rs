//! Queue listing: filter composition and the ordering policy
//!
//! SQL text is composed from fixed fragments only; caller-supplied values
//! travel exclusively through bind parameters.

use jukeq_common::db::models::{QueueItem, Request, RequestStatus};
use jukeq_common::{time, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::store::parse_uuid;

/// Default page size when the caller does not pass `limit`
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Hard cap on page size
pub const MAX_PAGE_SIZE: i64 = 200;

/// Ordering policy: the playing track first, then the pending queue in its
/// explicit manual order, then history oldest-first. Positions on
/// completed/cancelled rows are inert, so their relative order falls through
/// to `requested_at`.
const ORDER_BY: &str = "ORDER BY CASE r.status \
     WHEN 'playing' THEN 1 \
     WHEN 'pending' THEN 2 \
     WHEN 'completed' THEN 3 \
     ELSE 4 END, \
     r.queue_position ASC, r.requested_at ASC";

/// Optional filters and pagination for a queue listing
#[derive(Debug, Clone, Default)]
pub struct QueueFilter {
    pub user_id: Option<String>,
    pub status: Option<RequestStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl QueueFilter {
    /// WHERE clause over the `requests` table (aliased `r`), restaurant
    /// scope always first. Bind order: restaurant_id, then user_id and
    /// status when present.
    fn where_sql(&self) -> String {
        let mut sql = String::from("WHERE r.restaurant_id = ?");
        if self.user_id.is_some() {
            sql.push_str(" AND r.user_id = ?");
        }
        if self.status.is_some() {
            sql.push_str(" AND r.status = ?");
        }
        sql
    }

    fn page(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

/// List a restaurant's queue: ordered page of rows plus the unpaginated total
pub async fn list_queue(
    pool: &SqlitePool,
    restaurant_id: Uuid,
    filter: &QueueFilter,
) -> Result<(Vec<QueueItem>, i64)> {
    let where_sql = filter.where_sql();
    let (limit, offset) = filter.page();

    let count_sql = format!("SELECT COUNT(*) FROM requests r {}", where_sql);
    let mut count_query = sqlx::query_as::<_, (i64,)>(&count_sql).bind(restaurant_id.to_string());
    if let Some(user_id) = &filter.user_id {
        count_query = count_query.bind(user_id);
    }
    if let Some(status) = filter.status {
        count_query = count_query.bind(status.as_str());
    }
    let (total,) = count_query.fetch_one(pool).await?;

    let list_sql = format!(
        r#"
        SELECT r.id, r.restaurant_id, r.user_id, r.user_table, r.song_id,
               r.status, r.queue_position, r.requested_at,
               r.started_playing_at, r.completed_at,
               s.title, s.artist, s.duration_seconds, s.image_url, s.genre,
               u.display_name, u.table_number
        FROM requests r
        JOIN songs s ON s.id = r.song_id
        LEFT JOIN users u ON u.id = r.user_id
        {}
        {}
        LIMIT ? OFFSET ?
        "#,
        where_sql, ORDER_BY
    );

    let mut list_query = sqlx::query(&list_sql).bind(restaurant_id.to_string());
    if let Some(user_id) = &filter.user_id {
        list_query = list_query.bind(user_id);
    }
    if let Some(status) = filter.status {
        list_query = list_query.bind(status.as_str());
    }
    let rows = list_query.bind(limit).bind(offset).fetch_all(pool).await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let request = Request {
            id: parse_uuid(row.get::<&str, _>("id"))?,
            restaurant_id: parse_uuid(row.get::<&str, _>("restaurant_id"))?,
            user_id: row.get::<String, _>("user_id"),
            user_table: row.get::<Option<String>, _>("user_table"),
            song_id: parse_uuid(row.get::<&str, _>("song_id"))?,
            status: RequestStatus::parse(row.get::<&str, _>("status"))?,
            queue_position: row.get::<i64, _>("queue_position"),
            requested_at: time::from_db_string(row.get::<&str, _>("requested_at"))?,
            started_playing_at: row
                .get::<Option<String>, _>("started_playing_at")
                .as_deref()
                .map(time::from_db_string)
                .transpose()?,
            completed_at: row
                .get::<Option<String>, _>("completed_at")
                .as_deref()
                .map(time::from_db_string)
                .transpose()?,
        };

        items.push(QueueItem {
            request,
            song_title: row.get::<String, _>("title"),
            song_artist: row.get::<String, _>("artist"),
            song_duration_seconds: row.get::<Option<i64>, _>("duration_seconds"),
            song_image_url: row.get::<Option<String>, _>("image_url"),
            song_genre: row.get::<Option<String>, _>("genre"),
            requester_name: row.get::<Option<String>, _>("display_name"),
            requester_table: row.get::<Option<String>, _>("table_number"),
        });
    }

    Ok((items, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_sql_restaurant_scope_only() {
        let filter = QueueFilter::default();
        assert_eq!(filter.where_sql(), "WHERE r.restaurant_id = ?");
    }

    #[test]
    fn test_where_sql_with_all_filters() {
        let filter = QueueFilter {
            user_id: Some("u1".to_string()),
            status: Some(RequestStatus::Pending),
            ..Default::default()
        };
        assert_eq!(
            filter.where_sql(),
            "WHERE r.restaurant_id = ? AND r.user_id = ? AND r.status = ?"
        );
    }

    #[test]
    fn test_filter_values_never_enter_sql_text() {
        // A hostile filter value must not change the generated SQL
        let filter = QueueFilter {
            user_id: Some("'; DROP TABLE requests; --".to_string()),
            ..Default::default()
        };
        assert_eq!(
            filter.where_sql(),
            "WHERE r.restaurant_id = ? AND r.user_id = ?"
        );
    }

    #[test]
    fn test_page_defaults_and_caps() {
        assert_eq!(QueueFilter::default().page(), (DEFAULT_PAGE_SIZE, 0));

        let filter = QueueFilter {
            limit: Some(10_000),
            offset: Some(-5),
            ..Default::default()
        };
        assert_eq!(filter.page(), (MAX_PAGE_SIZE, 0));
    }

    #[test]
    fn test_order_by_ranks_statuses() {
        // playing < pending < completed < cancelled, then position, then age
        assert!(ORDER_BY.find("'playing' THEN 1").unwrap() < ORDER_BY.find("'pending' THEN 2").unwrap());
        assert!(ORDER_BY.contains("r.queue_position ASC"));
        assert!(ORDER_BY.ends_with("r.requested_at ASC"));
    }
}
