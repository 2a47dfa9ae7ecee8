//! Fetch orchestration.
//!
//! One fetch cycle per category: every configured query is requested
//! concurrently, the cycle waits until all of them settle, the timetable
//! results go through estimation, and the joined result is published to the
//! snapshot store and the event bus in one step. A failing query degrades to
//! estimated or placeholder content; a cycle itself never fails because of
//! the upstream.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::ConsumerConfig;
use crate::domain::{
    Category, ConsumerId, StationTimetable, TimetableEntry, TimetableQuery, TrafficQuery,
    TrafficReport,
};
use crate::estimate::reconcile_cycle;
use crate::events::{EventBus, EventKind, Published};
use crate::fields::{classify_traffic_status, normalize_wait_time};
use crate::ratp::{ApiError, TransitApi};
use crate::snapshot::{CycleTicket, SnapshotStore};

/// Source of the current time, replaceable in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Errors from requesting a fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// No consumer is registered under this identifier
    #[error("unknown consumer: {0}")]
    UnknownConsumer(ConsumerId),
}

/// Which notifications a fetch cycle emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub notify_on_start: bool,
    pub notify_on_finish: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            notify_on_start: true,
            notify_on_finish: true,
        }
    }
}

impl FetchOptions {
    /// Publish to the store only, without any notification.
    pub fn silent() -> Self {
        Self {
            notify_on_start: false,
            notify_on_finish: false,
        }
    }
}

/// Drives fetch cycles against a [`TransitApi`].
pub struct Fetcher<A> {
    api: Arc<A>,
    store: SnapshotStore,
    events: EventBus,
    clock: Clock,
}

impl<A: TransitApi + 'static> Fetcher<A> {
    pub fn new(api: A) -> Self {
        Self {
            api: Arc::new(api),
            store: SnapshotStore::new(),
            events: EventBus::new(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock used for `requested_at` and estimation.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Register a consumer and announce it.
    pub async fn register(&self, config: ConsumerConfig) {
        let id = config.identifier.clone();
        let timetables = config.timetables.queries.len();
        let traffic = config.traffic.queries.len();

        self.store.register(config).await;
        info!(consumer = %id, timetables, traffic, "Registered consumer");
        self.events.publish(&id, EventKind::Registered);
    }

    /// Forget a consumer and its snapshots.
    pub async fn unregister(&self, id: &ConsumerId) -> bool {
        let removed = self.store.unregister(id).await;
        if removed {
            info!(consumer = %id, "Unregistered consumer");
        }
        removed
    }

    /// Run one timetable cycle and return what was published.
    ///
    /// Cycles for the same consumer are queued behind one another, so the
    /// previous snapshot read for estimation is always the latest published.
    pub async fn fetch_timetables(
        &self,
        id: &ConsumerId,
        options: FetchOptions,
    ) -> Result<Vec<StationTimetable>, FetchError> {
        let ticket = self.begin(id, Category::Timetables).await?;
        let _cycle = ticket.lock().await;

        debug!(consumer = %id, ?options, "Fetching timetables");
        if options.notify_on_start {
            self.events.publish(
                id,
                EventKind::RefreshStarted {
                    category: Category::Timetables,
                },
            );
        }

        let requests: Vec<_> = ticket
            .config()
            .timetables
            .queries
            .iter()
            .cloned()
            .map(|query| {
                let api = Arc::clone(&self.api);
                let clock = Arc::clone(&self.clock);
                async move {
                    let fresh = fetch_station_timetable(api.as_ref(), &query, &clock).await;
                    if let Err(e) = &fresh {
                        warn!(query = %query.key(), error = %e, "Timetable request failed");
                    }
                    (query, fresh)
                }
            })
            .collect();

        let outcomes = join_all(requests).await;

        let previous = self
            .store
            .timetables(id)
            .await
            .and_then(|snapshot| snapshot.current)
            .unwrap_or_default();
        let now = (self.clock)();
        let result = reconcile_cycle(outcomes, &previous, now);

        self.finish(&ticket, Published::Timetables(result.clone()), now, options)
            .await;

        Ok(result)
    }

    /// Run one traffic cycle and return what was published.
    ///
    /// A failed line keeps only its identity; it borrows nothing from the
    /// previous snapshot and does not affect the other lines.
    pub async fn fetch_traffic(
        &self,
        id: &ConsumerId,
        options: FetchOptions,
    ) -> Result<Vec<TrafficReport>, FetchError> {
        let ticket = self.begin(id, Category::Traffic).await?;
        let _cycle = ticket.lock().await;

        debug!(consumer = %id, ?options, "Fetching traffic");
        if options.notify_on_start {
            self.events.publish(
                id,
                EventKind::RefreshStarted {
                    category: Category::Traffic,
                },
            );
        }

        let requests: Vec<_> = ticket
            .config()
            .traffic
            .queries
            .iter()
            .cloned()
            .map(|query| {
                let api = Arc::clone(&self.api);
                async move {
                    match fetch_traffic_report(api.as_ref(), &query).await {
                        Ok(report) => report,
                        Err(e) => {
                            warn!(line = %query.line, transport = %query.transport, error = %e, "Traffic request failed");
                            TrafficReport::empty(&query)
                        }
                    }
                }
            })
            .collect();

        let result = join_all(requests).await;
        let now = (self.clock)();

        self.finish(&ticket, Published::Traffic(result.clone()), now, options)
            .await;

        Ok(result)
    }

    /// Run the timetable and traffic cycles concurrently; completes once
    /// both have published.
    pub async fn fetch_all(
        &self,
        id: &ConsumerId,
        options: FetchOptions,
    ) -> Result<(Vec<StationTimetable>, Vec<TrafficReport>), FetchError> {
        debug!(consumer = %id, "Fetching everything");
        let (timetables, traffic) = tokio::join!(
            self.fetch_timetables(id, options),
            self.fetch_traffic(id, options)
        );
        Ok((timetables?, traffic?))
    }

    async fn begin(&self, id: &ConsumerId, category: Category) -> Result<CycleTicket, FetchError> {
        self.store
            .begin_cycle(id, category)
            .await
            .ok_or_else(|| FetchError::UnknownConsumer(id.clone()))
    }

    async fn finish(
        &self,
        ticket: &CycleTicket,
        published: Published,
        now: DateTime<Utc>,
        options: FetchOptions,
    ) {
        let id = ticket.consumer();
        let category = published.category();
        let stored = match &published {
            Published::Timetables(result) => {
                self.store.publish_timetables(ticket, result.clone(), now).await
            }
            Published::Traffic(result) => {
                self.store.publish_traffic(ticket, result.clone(), now).await
            }
        };

        if !stored {
            debug!(consumer = %id, %category, "Registration gone, discarding cycle result");
            return;
        }

        if options.notify_on_finish {
            self.events.publish(id, EventKind::RefreshFinished(published));
        }
    }
}

/// Look up the station and its next passes concurrently.
async fn fetch_station_timetable<A: TransitApi>(
    api: &A,
    query: &TimetableQuery,
    clock: &Clock,
) -> Result<StationTimetable, ApiError> {
    let (station, schedules) = tokio::join!(api.station(query), api.schedules(query));
    let station = station?;
    let entries = schedules?
        .into_iter()
        .map(|pass| TimetableEntry::new(normalize_wait_time(&pass.message), pass.destination))
        .collect();

    Ok(StationTimetable::fresh(query, station.name, entries, clock()))
}

async fn fetch_traffic_report<A: TransitApi>(
    api: &A,
    query: &TrafficQuery,
) -> Result<TrafficReport, ApiError> {
    let traffic = api.traffic(query).await?;

    Ok(TrafficReport {
        line_status: traffic.slug.as_deref().map(classify_traffic_status),
        title: traffic.title,
        message: traffic.message,
        ..TrafficReport::empty(query)
    })
}
