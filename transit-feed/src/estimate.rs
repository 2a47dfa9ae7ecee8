//! Wait-time estimation from the previous snapshot.
//!
//! When the upstream has nothing usable for one station (a failed request,
//! or "Schedules unavailable") the display keeps counting down from the last
//! good timetable instead of going blank. Estimated entries whose wait drops
//! below zero are assumed to have left and are removed; a station with no
//! remaining entry shows the unavailable placeholder.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{QueryKey, StationTimetable, TimetableEntry, TimetableQuery, WaitingTime};
use crate::fields::{is_timetable_available, is_wait_time_valid};
use crate::ratp::ApiError;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Errors from estimating a timetable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EstimationError {
    /// The previous snapshot has no usable entries for this station
    #[error("no usable previous timetable to estimate from")]
    Unavailable,
}

/// Decay a previous timetable to `now`.
///
/// Each published wait is reduced by the minutes elapsed since the previous
/// `requested_at` and rounded half up. The previous `requested_at` is kept,
/// so the staleness clock keeps running from the last real observation.
pub fn estimate_from(
    previous: &StationTimetable,
    now: DateTime<Utc>,
) -> Result<StationTimetable, EstimationError> {
    if !is_timetable_available(&previous.timetable) {
        return Err(EstimationError::Unavailable);
    }

    let elapsed_minutes =
        (now - previous.requested_at).num_milliseconds() as f64 / MILLIS_PER_MINUTE;

    let timetable = previous
        .timetable
        .iter()
        .filter_map(|entry| {
            // Unknown or non-numeric waits cannot be decayed.
            let minutes = entry.waiting_time.as_minutes()?;
            let estimated = (minutes - elapsed_minutes + 0.5).floor() as i64;
            Some(TimetableEntry::new(
                WaitingTime::minutes(estimated),
                entry.destination.clone(),
            ))
        })
        .collect();

    Ok(StationTimetable {
        timetable,
        is_estimation: true,
        ..previous.clone()
    })
}

/// Drop invalid waits and guarantee at least one entry.
pub fn finalize(mut result: StationTimetable) -> StationTimetable {
    result
        .timetable
        .retain(|entry| is_wait_time_valid(&entry.waiting_time));

    if result.timetable.is_empty() {
        result.timetable.push(TimetableEntry::unavailable());
    }

    result
}

/// Produce the published timetable for one query from its fresh outcome and
/// the previous snapshot for the same query, if any.
pub fn reconcile(
    query: &TimetableQuery,
    fresh: Result<StationTimetable, ApiError>,
    previous: Option<&StationTimetable>,
    now: DateTime<Utc>,
) -> StationTimetable {
    let fresh = match fresh {
        Ok(result) if is_timetable_available(&result.timetable) => return finalize(result),
        Ok(result) => Some(result),
        Err(_) => None,
    };

    let estimated = previous
        .ok_or(EstimationError::Unavailable)
        .and_then(|previous| estimate_from(previous, now));

    match estimated {
        Ok(estimated) => {
            debug!(query = %query.key(), "Estimating timetable from previous snapshot");
            finalize(estimated)
        }
        Err(EstimationError::Unavailable) => {
            let mut result = fresh.unwrap_or_else(|| {
                let mut empty = StationTimetable::empty(query, now);
                if let Some(previous) = previous {
                    empty.station_name = previous.station_name.clone();
                }
                empty
            });
            result.timetable.clear();
            result.is_estimation = false;
            finalize(result)
        }
    }
}

/// Reconcile a whole timetable cycle.
///
/// Previous results are matched by [`QueryKey`], not by position, so the
/// order of configured queries may change between cycles.
pub fn reconcile_cycle(
    outcomes: Vec<(TimetableQuery, Result<StationTimetable, ApiError>)>,
    previous: &[StationTimetable],
    now: DateTime<Utc>,
) -> Vec<StationTimetable> {
    let previous: HashMap<&QueryKey, &StationTimetable> = previous
        .iter()
        .map(|result| (&result.query_key, result))
        .collect();

    outcomes
        .into_iter()
        .map(|(query, fresh)| {
            let key = query.key();
            reconcile(&query, fresh, previous.get(&key).copied(), now)
        })
        .collect()
}
