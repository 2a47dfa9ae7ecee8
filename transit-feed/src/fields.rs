//! Parsers for the upstream's free-text fields.
//!
//! The upstream writes wait times and traffic states as French display text
//! and internal slugs. Known vocabulary is normalized; anything else passes
//! through unchanged so new wording still reaches the display, and is logged
//! so a stale vocabulary gets noticed.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::domain::{LineStatus, TimetableEntry, WaitingTime};

/// Raw wait texts meaning the train is there or about to be.
const AT_STATION_TEXTS: [&str; 2] = ["Train a l'approche", "Train a quai"];

/// Raw wait text meaning the upstream has no estimate.
const UNAVAILABLE_TEXT: &str = "Schedules unavailable";

/// Minute unit the upstream appends to numeric waits, in any case.
static MINUTE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("(?i) mn").expect("minute suffix regex is valid"));

/// Normalize the upstream wait text of one next pass.
///
/// ```
/// use transit_feed::fields::normalize_wait_time;
///
/// assert_eq!(normalize_wait_time("3 mn").as_str(), Some("3"));
/// assert_eq!(normalize_wait_time("Train a quai").as_str(), Some("0"));
/// assert!(normalize_wait_time("Schedules unavailable").is_unknown());
/// ```
pub fn normalize_wait_time(raw: &str) -> WaitingTime {
    let text = raw.trim();

    if AT_STATION_TEXTS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(text))
    {
        return WaitingTime::minutes(0);
    }

    if UNAVAILABLE_TEXT.eq_ignore_ascii_case(text) {
        return WaitingTime::unknown();
    }

    let stripped = MINUTE_SUFFIX.replace_all(text, "");
    if stripped.trim().parse::<f64>().is_err() {
        warn!(raw, "Unrecognized wait time text, passing through");
    }

    WaitingTime::from_text(stripped.into_owned())
}

/// Classify the upstream traffic slug of a line.
///
/// `"normal_trav"` (normal service with planned works) is reported as
/// [`LineStatus::Work`].
pub fn classify_traffic_status(slug: &str) -> LineStatus {
    match slug {
        "normal" => LineStatus::Normal,
        "normal_trav" => LineStatus::Work,
        "alerte" => LineStatus::Protest,
        "critical" => LineStatus::Incident,
        other => {
            warn!(slug = other, "Unrecognized traffic status, passing through");
            LineStatus::Other(other.to_string())
        }
    }
}

/// Whether a wait time may be published: the unknown marker, or a
/// non-negative number.
pub fn is_wait_time_valid(value: &WaitingTime) -> bool {
    value.is_unknown() || value.as_minutes().is_some_and(|minutes| minutes >= 0.0)
}

/// Whether a timetable holds usable data: non-empty, with a known first wait.
pub fn is_timetable_available(entries: &[TimetableEntry]) -> bool {
    entries
        .first()
        .is_some_and(|first| !first.waiting_time.is_unknown())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_time_vocabulary() {
        assert_eq!(normalize_wait_time("Train a l'approche").as_str(), Some("0"));
        assert_eq!(normalize_wait_time("Train a quai").as_str(), Some("0"));
        assert!(normalize_wait_time("Schedules unavailable").is_unknown());
        assert_eq!(normalize_wait_time("3 mn").as_str(), Some("3"));
    }

    #[test]
    fn minute_suffix_is_case_insensitive() {
        assert_eq!(normalize_wait_time("12 MN").as_str(), Some("12"));
        assert_eq!(normalize_wait_time("7 Mn").as_str(), Some("7"));
    }

    #[test]
    fn every_minute_unit_is_removed() {
        assert_eq!(
            normalize_wait_time("5 Mn (retard 2 mn)").as_str(),
            Some("5 (retard 2)")
        );
    }

    #[test]
    fn unrecognized_wait_text_passes_through() {
        assert_eq!(
            normalize_wait_time("Service termine").as_str(),
            Some("Service termine")
        );
        assert_eq!(normalize_wait_time("Deviation").as_str(), Some("Deviation"));
    }

    #[test]
    fn traffic_vocabulary() {
        assert_eq!(classify_traffic_status("normal_trav"), LineStatus::Work);
        assert_eq!(classify_traffic_status("alerte"), LineStatus::Protest);
        assert_eq!(classify_traffic_status("critical"), LineStatus::Incident);
        assert_eq!(classify_traffic_status("normal"), LineStatus::Normal);
        assert_eq!(
            classify_traffic_status("something_else"),
            LineStatus::Other("something_else".to_string())
        );
        assert_eq!(classify_traffic_status("something_else").as_str(), "something_else");
    }

    #[test]
    fn wait_time_validity() {
        assert!(is_wait_time_valid(&WaitingTime::unknown()));
        assert!(is_wait_time_valid(&WaitingTime::from_text("0")));
        assert!(is_wait_time_valid(&WaitingTime::from_text("14")));
        assert!(!is_wait_time_valid(&WaitingTime::from_text("-1")));
        assert!(!is_wait_time_valid(&WaitingTime::from_text("Service termine")));
        assert!(!is_wait_time_valid(&WaitingTime::from_text("inf")));
        assert!(!is_wait_time_valid(&WaitingTime::from_text("NaN")));
    }

    #[test]
    fn timetable_availability() {
        let known = TimetableEntry::new(WaitingTime::minutes(4), "Nation");
        let unknown = TimetableEntry::new(WaitingTime::unknown(), "Nation");

        assert!(!is_timetable_available(&[]));
        assert!(is_timetable_available(&[known.clone()]));
        assert!(!is_timetable_available(&[unknown.clone(), known.clone()]));
        assert!(is_timetable_available(&[known, unknown]));
    }
}
