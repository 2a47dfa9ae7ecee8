//! Transit feed server.
//!
//! Periodically polls the RATP open-data API for each registered display
//! ("consumer"), keeps the previous and current timetables and traffic
//! reports, and estimates waiting times when a fresh query fails.

pub mod config;
pub mod domain;
pub mod estimate;
pub mod events;
pub mod fetch;
pub mod fields;
pub mod ratp;
pub mod scheduler;
pub mod snapshot;
pub mod web;
