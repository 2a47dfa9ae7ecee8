//! Per-consumer snapshot store.
//!
//! Holds, for every registered consumer, the previous and current published
//! results of each category, plus the guard that keeps fetch cycles of one
//! category from overlapping. Consumers never share an entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::config::ConsumerConfig;
use crate::domain::{Category, ConsumerId, StationTimetable, TrafficReport};

/// Previous and current published results of one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySnapshot<T> {
    pub previous: Option<Vec<T>>,
    pub current: Option<Vec<T>>,
    /// When `current` was published.
    pub published_at: Option<DateTime<Utc>>,
}

impl<T> Default for CategorySnapshot<T> {
    fn default() -> Self {
        Self {
            previous: None,
            current: None,
            published_at: None,
        }
    }
}

impl<T> CategorySnapshot<T> {
    /// Move `current` into `previous` and publish `next`.
    fn rotate(&mut self, next: Vec<T>, at: DateTime<Utc>) {
        self.previous = self.current.take();
        self.current = Some(next);
        self.published_at = Some(at);
    }
}

struct ConsumerRecord {
    config: Arc<ConsumerConfig>,
    generation: u64,
    timetables: CategorySnapshot<StationTimetable>,
    traffic: CategorySnapshot<TrafficReport>,
    timetables_cycle: Arc<Mutex<()>>,
    traffic_cycle: Arc<Mutex<()>>,
}

impl ConsumerRecord {
    fn new(config: ConsumerConfig, generation: u64) -> Self {
        Self {
            config: Arc::new(config),
            generation,
            timetables: CategorySnapshot::default(),
            traffic: CategorySnapshot::default(),
            timetables_cycle: Arc::new(Mutex::new(())),
            traffic_cycle: Arc::new(Mutex::new(())),
        }
    }

    fn cycle(&self, category: Category) -> &Arc<Mutex<()>> {
        match category {
            Category::Timetables => &self.timetables_cycle,
            Category::Traffic => &self.traffic_cycle,
        }
    }
}

/// One fetch cycle's hold on a consumer registration.
///
/// Carries the configuration the cycle runs with and the guard serializing
/// cycles of its category. Publishing through a ticket fails once the
/// consumer has been unregistered or registered again.
#[derive(Debug, Clone)]
pub struct CycleTicket {
    consumer: ConsumerId,
    config: Arc<ConsumerConfig>,
    guard: Arc<Mutex<()>>,
    generation: u64,
}

impl CycleTicket {
    pub fn consumer(&self) -> &ConsumerId {
        &self.consumer
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Wait until no other cycle of this category is running.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.guard.lock().await
    }
}

/// Thread-safe snapshot store, keyed by consumer identifier.
///
/// Cloning is cheap and every clone sees the same entries.
#[derive(Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<RwLock<HashMap<ConsumerId, ConsumerRecord>>>,
    generations: Arc<AtomicU64>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer with empty snapshots.
    ///
    /// Registering an identifier again replaces its configuration and
    /// discards its snapshots; cycles still running for the old registration
    /// finish without publishing. Returns `true` if the identifier was new.
    pub async fn register(&self, config: ConsumerConfig) -> bool {
        let id = config.identifier.clone();
        let generation = self.generations.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.inner.write().await;

        let mut record = ConsumerRecord::new(config, generation);
        if let Some(old) = guard.get(&id) {
            // New cycles queue behind the ones still running for the old
            // registration.
            record.timetables_cycle = Arc::clone(&old.timetables_cycle);
            record.traffic_cycle = Arc::clone(&old.traffic_cycle);
        }

        guard.insert(id, record).is_none()
    }

    /// Drop a consumer and its snapshots. Returns `true` if it existed.
    pub async fn unregister(&self, id: &ConsumerId) -> bool {
        let mut guard = self.inner.write().await;
        guard.remove(id).is_some()
    }

    pub async fn contains(&self, id: &ConsumerId) -> bool {
        let guard = self.inner.read().await;
        guard.contains_key(id)
    }

    /// Identifiers of all registered consumers, sorted.
    pub async fn consumers(&self) -> Vec<ConsumerId> {
        let guard = self.inner.read().await;
        let mut ids: Vec<ConsumerId> = guard.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Take a ticket for one fetch cycle of `category` on the current
    /// registration of `id`.
    pub async fn begin_cycle(&self, id: &ConsumerId, category: Category) -> Option<CycleTicket> {
        let guard = self.inner.read().await;
        guard.get(id).map(|record| CycleTicket {
            consumer: id.clone(),
            config: Arc::clone(&record.config),
            guard: Arc::clone(record.cycle(category)),
            generation: record.generation,
        })
    }

    pub async fn timetables(&self, id: &ConsumerId) -> Option<CategorySnapshot<StationTimetable>> {
        let guard = self.inner.read().await;
        guard.get(id).map(|record| record.timetables.clone())
    }

    pub async fn traffic(&self, id: &ConsumerId) -> Option<CategorySnapshot<TrafficReport>> {
        let guard = self.inner.read().await;
        guard.get(id).map(|record| record.traffic.clone())
    }

    /// Publish a timetable cycle result, rotating the previous one out.
    ///
    /// Returns `false` if the ticket's registration is no longer current.
    pub async fn publish_timetables(
        &self,
        ticket: &CycleTicket,
        result: Vec<StationTimetable>,
        at: DateTime<Utc>,
    ) -> bool {
        let mut guard = self.inner.write().await;
        match guard.get_mut(&ticket.consumer) {
            Some(record) if record.generation == ticket.generation => {
                record.timetables.rotate(result, at);
                true
            }
            _ => false,
        }
    }

    /// Publish a traffic cycle result, rotating the previous one out.
    ///
    /// Returns `false` if the ticket's registration is no longer current.
    pub async fn publish_traffic(
        &self,
        ticket: &CycleTicket,
        result: Vec<TrafficReport>,
        at: DateTime<Utc>,
    ) -> bool {
        let mut guard = self.inner.write().await;
        match guard.get_mut(&ticket.consumer) {
            Some(record) if record.generation == ticket.generation => {
                record.traffic.rotate(result, at);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TrafficQuery, TransportType};
    use chrono::TimeZone;

    fn report(line: &str) -> TrafficReport {
        TrafficReport::empty(&TrafficQuery::new(TransportType::Metro, line))
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 8, minute, 0).unwrap()
    }

    async fn ticket(store: &SnapshotStore, id: &ConsumerId, category: Category) -> CycleTicket {
        store.begin_cycle(id, category).await.unwrap()
    }

    #[tokio::test]
    async fn register_creates_empty_snapshots() {
        let store = SnapshotStore::new();
        let id = ConsumerId::from("hallway");

        assert!(store.register(ConsumerConfig::new("hallway")).await);
        assert!(store.contains(&id).await);

        let traffic = store.traffic(&id).await.unwrap();
        assert_eq!(traffic, CategorySnapshot::default());
        assert!(store.timetables(&id).await.unwrap().current.is_none());
    }

    #[tokio::test]
    async fn reregister_resets_snapshots() {
        let store = SnapshotStore::new();
        let id = ConsumerId::from("hallway");
        store.register(ConsumerConfig::new("hallway")).await;
        let cycle = ticket(&store, &id, Category::Traffic).await;
        store.publish_traffic(&cycle, vec![report("1")], at(0)).await;

        assert!(!store.register(ConsumerConfig::new("hallway")).await);
        assert!(store.traffic(&id).await.unwrap().current.is_none());
    }

    #[tokio::test]
    async fn publish_rotates_previous() {
        let store = SnapshotStore::new();
        let id = ConsumerId::from("hallway");
        store.register(ConsumerConfig::new("hallway")).await;
        let cycle = ticket(&store, &id, Category::Traffic).await;

        store.publish_traffic(&cycle, vec![report("1")], at(0)).await;
        store.publish_traffic(&cycle, vec![report("2")], at(10)).await;

        let traffic = store.traffic(&id).await.unwrap();
        assert_eq!(traffic.previous, Some(vec![report("1")]));
        assert_eq!(traffic.current, Some(vec![report("2")]));
        assert_eq!(traffic.published_at, Some(at(10)));
    }

    #[tokio::test]
    async fn consumers_are_isolated() {
        let store = SnapshotStore::new();
        let a = ConsumerId::from("a");
        let b = ConsumerId::from("b");
        store.register(ConsumerConfig::new("a")).await;
        store.register(ConsumerConfig::new("b")).await;

        let cycle = ticket(&store, &a, Category::Traffic).await;
        store.publish_traffic(&cycle, vec![report("1")], at(0)).await;

        assert!(store.traffic(&a).await.unwrap().current.is_some());
        assert!(store.traffic(&b).await.unwrap().current.is_none());
        assert_eq!(store.consumers().await, vec![a, b]);
    }

    #[tokio::test]
    async fn publish_after_unregister_is_dropped() {
        let store = SnapshotStore::new();
        let id = ConsumerId::from("gone");
        store.register(ConsumerConfig::new("gone")).await;
        let cycle = ticket(&store, &id, Category::Timetables).await;

        assert!(store.unregister(&id).await);
        assert!(!store.publish_timetables(&cycle, Vec::new(), at(0)).await);
        assert!(store.timetables(&id).await.is_none());
        assert!(store.begin_cycle(&id, Category::Timetables).await.is_none());
    }

    #[tokio::test]
    async fn publish_for_replaced_registration_is_dropped() {
        let store = SnapshotStore::new();
        let id = ConsumerId::from("hallway");
        store.register(ConsumerConfig::new("hallway")).await;
        let stale = ticket(&store, &id, Category::Traffic).await;

        store.register(ConsumerConfig::new("hallway")).await;
        let fresh = ticket(&store, &id, Category::Traffic).await;

        assert!(!store.publish_traffic(&stale, vec![report("1")], at(0)).await);
        assert!(store.traffic(&id).await.unwrap().current.is_none());
        assert!(store.publish_traffic(&fresh, vec![report("2")], at(1)).await);
        assert_eq!(
            store.traffic(&id).await.unwrap().current,
            Some(vec![report("2")])
        );
    }

    #[tokio::test]
    async fn reregister_keeps_cycle_guards() {
        let store = SnapshotStore::new();
        let id = ConsumerId::from("hallway");
        store.register(ConsumerConfig::new("hallway")).await;
        let stale = ticket(&store, &id, Category::Timetables).await;
        let _running = stale.lock().await;

        store.register(ConsumerConfig::new("hallway")).await;
        let fresh = ticket(&store, &id, Category::Timetables).await;

        assert!(fresh.guard.try_lock().is_err());
    }

    #[tokio::test]
    async fn cycle_guards_are_per_category() {
        let store = SnapshotStore::new();
        let id = ConsumerId::from("hallway");
        store.register(ConsumerConfig::new("hallway")).await;

        let timetables = ticket(&store, &id, Category::Timetables).await;
        let traffic = ticket(&store, &id, Category::Traffic).await;

        let _held = timetables.lock().await;
        assert!(traffic.guard.try_lock().is_ok());
        assert!(timetables.guard.try_lock().is_err());
    }
}
