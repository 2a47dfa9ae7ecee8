//! Periodic refresh timers.
//!
//! Each registered consumer gets one timer per non-empty category, with the
//! interval from its configuration, plus an immediate fetch-all on
//! registration. Stopping a consumer aborts its timers together with any
//! cycle they have in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::ConsumerConfig;
use crate::domain::{Category, ConsumerId};
use crate::fetch::{FetchOptions, Fetcher};
use crate::ratp::TransitApi;

/// Owns the refresh tasks of every consumer.
pub struct Scheduler<A> {
    fetcher: Arc<Fetcher<A>>,
    tasks: Mutex<HashMap<ConsumerId, Vec<JoinHandle<()>>>>,
}

impl<A: TransitApi + 'static> Scheduler<A> {
    pub fn new(fetcher: Arc<Fetcher<A>>) -> Self {
        Self {
            fetcher,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetcher(&self) -> &Arc<Fetcher<A>> {
        &self.fetcher
    }

    /// Register a consumer, fetch everything once, then refresh each
    /// category on its own interval.
    ///
    /// Starting an identifier that is already running restarts it.
    pub async fn start(&self, config: ConsumerConfig) {
        let id = config.identifier.clone();
        let timetables_every = (!config.timetables.queries.is_empty())
            .then(|| config.timetables.update_interval());
        let traffic_every =
            (!config.traffic.queries.is_empty()).then(|| config.traffic.update_interval());

        // Held until the new tasks are recorded, so concurrent starts of one
        // identifier cannot leave tasks behind.
        let mut tasks = self.tasks.lock().await;
        if let Some(old) = tasks.remove(&id) {
            abort_all(&id, old);
        }

        self.fetcher.register(config).await;

        let mut handles = vec![spawn_initial(Arc::clone(&self.fetcher), id.clone())];
        if let Some(period) = timetables_every {
            handles.push(spawn_periodic(
                Arc::clone(&self.fetcher),
                id.clone(),
                Category::Timetables,
                period,
            ));
        }
        if let Some(period) = traffic_every {
            handles.push(spawn_periodic(
                Arc::clone(&self.fetcher),
                id.clone(),
                Category::Traffic,
                period,
            ));
        }

        tasks.insert(id, handles);
    }

    /// Stop refreshing a consumer and drop its snapshots.
    ///
    /// Returns `false` if the consumer was not running.
    pub async fn stop(&self, id: &ConsumerId) -> bool {
        let mut tasks = self.tasks.lock().await;
        let had_tasks = match tasks.remove(id) {
            Some(handles) => {
                abort_all(id, handles);
                true
            }
            None => false,
        };
        let removed = self.fetcher.unregister(id).await;
        had_tasks || removed
    }

    /// Stop every consumer.
    pub async fn shutdown(&self) {
        let ids: Vec<ConsumerId> = self.tasks.lock().await.keys().cloned().collect();
        for id in ids {
            self.stop(&id).await;
        }
    }

    /// Number of refresh tasks currently owned for `id`.
    pub async fn task_count(&self, id: &ConsumerId) -> usize {
        self.tasks.lock().await.get(id).map_or(0, Vec::len)
    }
}

fn abort_all(id: &ConsumerId, handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        handle.abort();
    }
    debug!(consumer = %id, "Aborted refresh tasks");
}

fn spawn_initial<A: TransitApi + 'static>(fetcher: Arc<Fetcher<A>>, id: ConsumerId) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = fetcher.fetch_all(&id, FetchOptions::default()).await {
            warn!(consumer = %id, error = %e, "Initial fetch failed");
        }
    })
}

fn spawn_periodic<A: TransitApi + 'static>(
    fetcher: Arc<Fetcher<A>>,
    id: ConsumerId,
    category: Category,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await; // First tick is immediate, skip it

        loop {
            interval.tick().await;
            let result = match category {
                Category::Timetables => fetcher
                    .fetch_timetables(&id, FetchOptions::default())
                    .await
                    .map(|_| ()),
                Category::Traffic => fetcher
                    .fetch_traffic(&id, FetchOptions::default())
                    .await
                    .map(|_| ()),
            };

            if let Err(e) = result {
                warn!(consumer = %id, %category, error = %e, "Stopping refresh");
                break;
            }
        }
    })
}
