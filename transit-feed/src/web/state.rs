//! Application state for the web layer.

use std::sync::Arc;

use crate::fetch::Fetcher;
use crate::ratp::TransitApi;
use crate::scheduler::Scheduler;

/// Shared application state.
///
/// Wraps the scheduler, which owns the fetcher and through it the snapshot
/// store and event bus.
pub struct AppState<A> {
    pub scheduler: Arc<Scheduler<A>>,
}

impl<A> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

impl<A: TransitApi + 'static> AppState<A> {
    pub fn new(scheduler: Arc<Scheduler<A>>) -> Self {
        Self { scheduler }
    }

    pub fn fetcher(&self) -> &Arc<Fetcher<A>> {
        self.scheduler.fetcher()
    }
}
