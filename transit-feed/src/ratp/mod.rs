//! RATP schedules API client.
//!
//! This module provides the HTTP client for the public RATP REST API and the
//! [`TransitApi`] trait the fetch orchestrator is written against.
//!
//! Key characteristics of the upstream:
//! - Paths use plural network names (`/schedules/metros/1/bastille/A`)
//! - Wait times are free text (`"3 mn"`, `"Train a quai"`)
//! - Application errors come back as 200 responses whose `result` holds a
//!   `code` and `message`

mod api;
mod client;
mod error;
mod mock;
mod types;

pub use api::TransitApi;
pub use client::{DEFAULT_BASE_URL, RatpClient, RatpConfig};
pub use error::ApiError;
pub use mock::MockApi;
pub use types::{ScheduleDto, SchedulesResult, StationDto, StationsResult, TrafficDto, decode};
