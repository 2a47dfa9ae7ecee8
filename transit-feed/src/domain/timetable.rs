//! Station timetable types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::query::{QueryKey, TimetableQuery, TransportType};

/// Destination label of the placeholder entry shown when a station has no
/// usable next pass.
pub const UNAVAILABLE_DESTINATION: &str = "Horaires non disponibles";

/// Minutes until the next pass, as published to the display.
///
/// Either normalized text (usually a non-negative integer such as `"3"`) or
/// the unknown marker, serialized as `null`. Unrecognized upstream wording is
/// kept verbatim, so the text is not guaranteed to be numeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaitingTime(Option<String>);

impl WaitingTime {
    /// The unknown marker: the upstream has no estimate.
    pub fn unknown() -> Self {
        Self(None)
    }

    pub fn minutes(minutes: i64) -> Self {
        Self(Some(minutes.to_string()))
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self(Some(text.into()))
    }

    pub fn is_unknown(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Numeric value of the text, if it parses as a finite number.
    pub fn as_minutes(&self) -> Option<f64> {
        self.0
            .as_deref()?
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|minutes| minutes.is_finite())
    }
}

impl fmt::Display for WaitingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(text) => f.write_str(text),
            None => f.write_str("unknown"),
        }
    }
}

/// One upcoming pass at a station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    pub waiting_time: WaitingTime,
    pub destination: String,
}

impl TimetableEntry {
    pub fn new(waiting_time: WaitingTime, destination: impl Into<String>) -> Self {
        Self {
            waiting_time,
            destination: destination.into(),
        }
    }

    /// The placeholder that keeps a published timetable from being empty.
    pub fn unavailable() -> Self {
        Self::new(WaitingTime::unknown(), UNAVAILABLE_DESTINATION)
    }

    pub fn is_unavailable_placeholder(&self) -> bool {
        self.waiting_time.is_unknown() && self.destination == UNAVAILABLE_DESTINATION
    }
}

/// The published next passes for one configured station query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationTimetable {
    pub query_key: QueryKey,
    pub line_type: TransportType,
    pub line_name: String,
    pub station_name: String,
    pub timetable: Vec<TimetableEntry>,
    /// When the data was obtained from the upstream. Estimated results keep
    /// the timestamp of the snapshot they were derived from.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub requested_at: DateTime<Utc>,
    pub is_estimation: bool,
}

impl StationTimetable {
    /// A fresh result for `query` carrying the given entries.
    pub fn fresh(
        query: &TimetableQuery,
        station_name: impl Into<String>,
        timetable: Vec<TimetableEntry>,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            query_key: query.key(),
            line_type: query.transport,
            line_name: query.line.clone(),
            station_name: station_name.into(),
            timetable,
            requested_at,
            is_estimation: false,
        }
    }

    /// A result with no entries, used when the upstream gave nothing usable.
    ///
    /// The station slug stands in for the display name, which is unknown.
    pub fn empty(query: &TimetableQuery, requested_at: DateTime<Utc>) -> Self {
        Self::fresh(query, query.station.clone(), Vec::new(), requested_at)
    }
}
