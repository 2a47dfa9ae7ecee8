//! Domain types for the transit feed.
//!
//! Queries come from configuration and never change; results are what a
//! fetch cycle publishes to the display.

mod consumer;
mod query;
mod timetable;
mod traffic;

pub use consumer::{Category, ConsumerId};
pub use query::{QueryKey, TimetableQuery, TrafficQuery, TransportType};
pub use timetable::{StationTimetable, TimetableEntry, UNAVAILABLE_DESTINATION, WaitingTime};
pub use traffic::{LineStatus, TrafficReport};
