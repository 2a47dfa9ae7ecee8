//! Web layer for the transit feed.
//!
//! Exposes the published snapshots, on-demand refreshes and the refresh
//! event stream to out-of-process display clients.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
