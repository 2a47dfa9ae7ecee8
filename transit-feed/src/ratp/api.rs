//! The upstream API seam.

use std::future::Future;

use serde_json::Value;

use crate::domain::{TimetableQuery, TrafficQuery};

use super::error::ApiError;
use super::types::{ScheduleDto, StationDto, StationsResult, SchedulesResult, TrafficDto, decode};

/// Source of upstream JSON documents.
///
/// [`TransitApi::request`] is the only point of network I/O; the typed
/// lookups build on it. Implementations perform no retries: a failed request
/// is retried by the next scheduled fetch cycle.
pub trait TransitApi: Send + Sync {
    /// GET `path` relative to the API base URL and parse the body as JSON.
    fn request(&self, path: &str) -> impl Future<Output = Result<Value, ApiError>> + Send;

    /// Find the configured station among the stations of its line.
    fn station(
        &self,
        query: &TimetableQuery,
    ) -> impl Future<Output = Result<StationDto, ApiError>> + Send {
        let path = query.stations_path();
        let slug = query.station.clone();
        let line = query.line.clone();

        async move {
            let result: StationsResult = decode(self.request(&path).await?)?;
            result
                .stations
                .into_iter()
                .find(|station| station.slug == slug)
                .ok_or(ApiError::StationNotFound {
                    station: slug,
                    line,
                })
        }
    }

    /// Next passes for the configured station and direction.
    fn schedules(
        &self,
        query: &TimetableQuery,
    ) -> impl Future<Output = Result<Vec<ScheduleDto>, ApiError>> + Send {
        let path = query.schedules_path();

        async move {
            let result: SchedulesResult = decode(self.request(&path).await?)?;
            Ok(result.schedules)
        }
    }

    /// Current traffic information for a line.
    fn traffic(
        &self,
        query: &TrafficQuery,
    ) -> impl Future<Output = Result<TrafficDto, ApiError>> + Send {
        let path = query.traffic_path();

        async move { decode(self.request(&path).await?) }
    }
}
