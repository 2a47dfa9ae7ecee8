//! Line traffic status types.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::query::{TrafficQuery, TransportType};

/// Classified traffic status of a line.
///
/// Slugs outside the known vocabulary are kept in [`LineStatus::Other`] so
/// the display can still show them untranslated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LineStatus {
    Normal,
    Work,
    Protest,
    Incident,
    Other(String),
}

impl LineStatus {
    pub fn as_str(&self) -> &str {
        match self {
            LineStatus::Normal => "normal",
            LineStatus::Work => "work",
            LineStatus::Protest => "protest",
            LineStatus::Incident => "incident",
            LineStatus::Other(label) => label,
        }
    }

    /// Inverse of [`LineStatus::as_str`]; does not interpret upstream slugs.
    fn from_label(label: &str) -> Self {
        match label {
            "normal" => LineStatus::Normal,
            "work" => LineStatus::Work,
            "protest" => LineStatus::Protest,
            "incident" => LineStatus::Incident,
            other => LineStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for LineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LineStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LineStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(LineStatus::from_label(&label))
    }
}

/// Published traffic information for one line.
///
/// Fields the upstream did not provide stay `None`; a failed request yields a
/// report with only the line identity filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficReport {
    pub line_type: TransportType,
    pub line_name: String,
    pub line_status: Option<LineStatus>,
    pub title: Option<String>,
    pub message: Option<String>,
}

impl TrafficReport {
    /// A report carrying only the line identity.
    pub fn empty(query: &TrafficQuery) -> Self {
        Self {
            line_type: query.transport,
            line_name: query.line.clone(),
            line_status: None,
            title: None,
            message: None,
        }
    }
}
