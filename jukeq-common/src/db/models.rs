//! Database models and the request status lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Lifecycle status of a playback request
///
/// Stored as lowercase text; parsed back through [`RequestStatus::parse`] so
/// that free strings never reach storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Playing,
    Completed,
    Cancelled,
}

impl RequestStatus {
    /// Parse a status value received from a caller or read from storage
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "playing" => Ok(Self::Playing),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Playing => "playing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Sort rank for queue listings: playing first, then the pending queue,
    /// then completed/cancelled history.
    pub fn rank(&self) -> i64 {
        match self {
            Self::Playing => 1,
            Self::Pending => 2,
            Self::Completed => 3,
            Self::Cancelled => 4,
        }
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Lifecycle transition table:
    /// pending -> playing | completed | cancelled
    /// playing -> completed | cancelled
    pub fn can_transition_to(&self, target: RequestStatus) -> bool {
        match (self, target) {
            (Self::Pending, Self::Playing) => true,
            (Self::Pending, Self::Completed) => true,
            (Self::Pending, Self::Cancelled) => true,
            (Self::Playing, Self::Completed) => true,
            (Self::Playing, Self::Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A playback request
///
/// `queue_position` is dense and unique per restaurant while the request is
/// pending; once the request leaves the pending set the value is inert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub user_id: String,
    pub user_table: Option<String>,
    pub song_id: Uuid,
    pub status: RequestStatus,
    pub queue_position: i64,
    pub requested_at: DateTime<Utc>,
    pub started_playing_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A queue listing row: request plus song and requester join fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    #[serde(flatten)]
    pub request: Request,
    pub song_title: String,
    pub song_artist: String,
    pub song_duration_seconds: Option<i64>,
    pub song_image_url: Option<String>,
    pub song_genre: Option<String>,
    pub requester_name: Option<String>,
    pub requester_table: Option<String>,
}

/// Per-restaurant queue statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub playing: i64,
    pub completed_today: i64,
    pub avg_wait_minutes: Option<f64>,
}

/// Restaurant configuration row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    /// Per-user quota of simultaneously occupied slots (pending + playing)
    pub max_pending_requests: i64,
}

/// Catalog song row (the fields the queue service reads and updates)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub title: String,
    pub artist: String,
    pub duration_seconds: Option<i64>,
    pub image_url: Option<String>,
    pub genre: Option<String>,
    pub times_requested: i64,
    pub last_requested_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_round_trip() {
        for s in ["pending", "playing", "completed", "cancelled"] {
            assert_eq!(RequestStatus::parse(s).unwrap().as_str(), s);
        }
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        assert!(matches!(
            RequestStatus::parse("paused"),
            Err(Error::InvalidStatus(_))
        ));
        // Matching is case sensitive, same as the storage representation
        assert!(RequestStatus::parse("Pending").is_err());
    }

    #[test]
    fn test_rank_orders_playing_first() {
        assert!(RequestStatus::Playing.rank() < RequestStatus::Pending.rank());
        assert!(RequestStatus::Pending.rank() < RequestStatus::Completed.rank());
        assert!(RequestStatus::Completed.rank() < RequestStatus::Cancelled.rank());
    }

    #[test]
    fn test_transition_table() {
        use RequestStatus::*;

        assert!(Pending.can_transition_to(Playing));
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Playing.can_transition_to(Completed));
        assert!(Playing.can_transition_to(Cancelled));

        // No edge re-enters pending
        for from in [Pending, Playing, Completed, Cancelled] {
            assert!(!from.can_transition_to(Pending));
        }

        // Terminal states admit nothing
        for to in [Pending, Playing, Completed, Cancelled] {
            assert!(!Completed.can_transition_to(to));
            assert!(!Cancelled.can_transition_to(to));
        }
    }
}
