//! Response bodies of the web layer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{ConsumerId, StationTimetable, TrafficReport};
use crate::snapshot::CategorySnapshot;

/// Current published content of one category.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse<T> {
    pub consumer: ConsumerId,
    /// `null` until the first cycle has published.
    pub entries: Option<Vec<T>>,
    pub last_update: Option<DateTime<Utc>>,
}

impl<T> CategoryResponse<T> {
    pub fn from_snapshot(consumer: ConsumerId, snapshot: CategorySnapshot<T>) -> Self {
        Self {
            consumer,
            entries: snapshot.current,
            last_update: snapshot.published_at,
        }
    }
}

/// Result of an on-demand fetch of both categories.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub consumer: ConsumerId,
    pub timetables: Vec<StationTimetable>,
    pub traffic: Vec<TrafficReport>,
}

#[derive(Debug, Serialize)]
pub struct ConsumersResponse {
    pub consumers: Vec<ConsumerId>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
