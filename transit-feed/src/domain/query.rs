//! Configured upstream queries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport network a line belongs to.
///
/// Serialized in the singular form used in configuration (`"metro"`), while
/// [`TransportType::api_segment`] gives the plural path segment the upstream
/// API expects (`"metros"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Metro,
    Rer,
    Tramway,
    Bus,
    Noctilien,
}

impl TransportType {
    /// Returns the configuration name (`"metro"`, `"bus"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Metro => "metro",
            TransportType::Rer => "rer",
            TransportType::Tramway => "tramway",
            TransportType::Bus => "bus",
            TransportType::Noctilien => "noctilien",
        }
    }

    /// Returns the plural path segment used by the upstream API.
    pub fn api_segment(&self) -> &'static str {
        match self {
            TransportType::Metro => "metros",
            TransportType::Rer => "rers",
            TransportType::Tramway => "tramways",
            TransportType::Bus => "buses",
            TransportType::Noctilien => "noctiliens",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A station timetable to poll: one direction of one line at one station.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimetableQuery {
    #[serde(rename = "type")]
    pub transport: TransportType,
    pub line: String,
    /// Upstream station slug (e.g. `"bobigny+pablo+picasso"`).
    pub station: String,
    /// Upstream direction code (`"A"`, `"R"` or `"A+R"`).
    pub direction: String,
}

impl TimetableQuery {
    pub fn new(
        transport: TransportType,
        line: impl Into<String>,
        station: impl Into<String>,
        direction: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            line: line.into(),
            station: station.into(),
            direction: direction.into(),
        }
    }

    /// Stable identity of this query across fetch cycles.
    pub fn key(&self) -> QueryKey {
        QueryKey(format!(
            "{}/{}/{}/{}",
            self.transport, self.line, self.station, self.direction
        ))
    }

    /// Path listing every station of the line.
    pub fn stations_path(&self) -> String {
        format!("/stations/{}/{}", self.transport.api_segment(), self.line)
    }

    /// Path of the next-passes list for this station and direction.
    pub fn schedules_path(&self) -> String {
        format!(
            "/schedules/{}/{}/{}/{}",
            self.transport.api_segment(),
            self.line,
            self.station,
            self.direction
        )
    }
}

/// A line whose traffic status to poll.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrafficQuery {
    #[serde(rename = "type")]
    pub transport: TransportType,
    pub line: String,
}

impl TrafficQuery {
    pub fn new(transport: TransportType, line: impl Into<String>) -> Self {
        Self {
            transport,
            line: line.into(),
        }
    }

    pub fn traffic_path(&self) -> String {
        format!("/traffic/{}/{}", self.transport.api_segment(), self.line)
    }
}

/// Composite identity of a timetable query (`type/line/station/direction`).
///
/// Estimation matches a fresh result with the previous snapshot through this
/// key, so reordering the configured queries does not misalign stations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
