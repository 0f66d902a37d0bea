//! Collaborator write paths: restaurants, songs, users
//!
//! The queue service does not own catalog management, but initialization and
//! tests need a way to install the rows the queue joins against.

use crate::db::models::{Restaurant, Song};
use crate::{time, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Insert a restaurant; `max_pending_requests` falls back to the
/// `default_max_pending_requests` setting when not given.
pub async fn create_restaurant(
    pool: &SqlitePool,
    name: &str,
    max_pending_requests: Option<i64>,
) -> Result<Restaurant> {
    let limit = match max_pending_requests {
        Some(limit) => limit,
        None => crate::db::init::get_setting_i64(pool, "default_max_pending_requests", 2).await?,
    };

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO restaurants (id, name, max_pending_requests, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(name)
    .bind(limit)
    .bind(time::now_db_string())
    .execute(pool)
    .await?;

    Ok(Restaurant {
        id,
        name: name.to_string(),
        max_pending_requests: limit,
    })
}

/// Insert a catalog song for a restaurant
pub async fn create_song(
    pool: &SqlitePool,
    restaurant_id: Uuid,
    title: &str,
    artist: &str,
    duration_seconds: Option<i64>,
    genre: Option<&str>,
) -> Result<Song> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO songs (id, restaurant_id, title, artist, duration_seconds,
                           image_url, genre, times_requested, created_at)
        VALUES (?, ?, ?, ?, ?, NULL, ?, 0, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(restaurant_id.to_string())
    .bind(title)
    .bind(artist)
    .bind(duration_seconds)
    .bind(genre)
    .bind(time::now_db_string())
    .execute(pool)
    .await?;

    Ok(Song {
        id,
        restaurant_id,
        title: title.to_string(),
        artist: artist.to_string(),
        duration_seconds,
        image_url: None,
        genre: genre.map(str::to_string),
        times_requested: 0,
        last_requested_at: None,
    })
}

/// Insert a user/session row the queue joins against for display names
pub async fn create_user(
    pool: &SqlitePool,
    user_id: &str,
    display_name: Option<&str>,
    table_number: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT OR REPLACE INTO users (id, display_name, table_number, created_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(display_name)
    .bind(table_number)
    .bind(time::now_db_string())
    .execute(pool)
    .await?;

    Ok(())
}
