//! Scripted in-memory API for tests and offline development.
//!
//! Serves canned JSON documents by path, as if they were live responses.
//! Individual paths can be made to fail or to answer after a delay.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::domain::{TimetableQuery, TrafficQuery};

use super::api::TransitApi;
use super::error::ApiError;

#[derive(Debug, Clone)]
enum Reply {
    Document(Value),
    Failure { status: u16, message: String },
}

#[derive(Debug, Clone)]
struct Route {
    reply: Reply,
    delay: Option<Duration>,
}

/// Mock API serving documents registered per path.
///
/// Unregistered paths answer with an upstream 404. Responses can be replaced
/// while the mock is shared, so a test can change what the "upstream" says
/// between two fetch cycles.
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    routes: Arc<RwLock<HashMap<String, Route>>>,
    calls: Arc<AtomicUsize>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `doc` for `path`.
    pub async fn set(&self, path: impl Into<String>, doc: Value) {
        self.insert(path.into(), Reply::Document(doc)).await;
    }

    /// Make `path` fail with an upstream error.
    pub async fn fail(&self, path: impl Into<String>, status: u16) {
        let reply = Reply::Failure {
            status,
            message: "scripted failure".to_string(),
        };
        self.insert(path.into(), reply).await;
    }

    /// Delay the reply for `path`, which must already be registered.
    pub async fn delay(&self, path: &str, delay: Duration) {
        if let Some(route) = self.routes.write().await.get_mut(path) {
            route.delay = Some(delay);
        }
    }

    /// Register the station list and next passes for a timetable query.
    ///
    /// `messages` are `(wait text, destination)` pairs as the upstream
    /// writes them.
    pub async fn set_timetable(
        &self,
        query: &TimetableQuery,
        station_name: &str,
        messages: &[(&str, &str)],
    ) {
        self.set(
            query.stations_path(),
            json!({"result": {"stations": [{"name": station_name, "slug": query.station}]}}),
        )
        .await;
        self.set_schedules(query, messages).await;
    }

    /// Replace only the next passes of a timetable query.
    pub async fn set_schedules(&self, query: &TimetableQuery, messages: &[(&str, &str)]) {
        let schedules: Vec<Value> = messages
            .iter()
            .map(|(message, destination)| json!({"message": message, "destination": destination}))
            .collect();
        self.set(
            query.schedules_path(),
            json!({"result": {"schedules": schedules}}),
        )
        .await;
    }

    /// Register the traffic document of a line.
    pub async fn set_traffic(&self, query: &TrafficQuery, slug: &str, title: &str, message: &str) {
        self.set(
            query.traffic_path(),
            json!({"result": {"line": query.line, "slug": slug, "title": title, "message": message}}),
        )
        .await;
    }

    /// Number of requests served so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn insert(&self, path: String, reply: Reply) {
        let mut routes = self.routes.write().await;
        let delay = routes.get(&path).and_then(|route| route.delay);
        routes.insert(path, Route { reply, delay });
    }
}

impl TransitApi for MockApi {
    async fn request(&self, path: &str) -> Result<Value, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let route = self.routes.read().await.get(path).cloned();
        let Some(route) = route else {
            return Err(ApiError::Upstream {
                status: 404,
                message: format!("no mock document for {path}"),
            });
        };

        if let Some(delay) = route.delay {
            tokio::time::sleep(delay).await;
        }

        match route.reply {
            Reply::Document(doc) => Ok(doc),
            Reply::Failure { status, message } => Err(ApiError::Upstream { status, message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransportType;

    fn bastille() -> TimetableQuery {
        TimetableQuery::new(TransportType::Metro, "1", "bastille", "A")
    }

    #[tokio::test]
    async fn serves_registered_timetable() {
        let api = MockApi::new();
        let query = bastille();
        api.set_timetable(&query, "Bastille", &[("3 mn", "La Defense")])
            .await;

        let station = api.station(&query).await.unwrap();
        let schedules = api.schedules(&query).await.unwrap();

        assert_eq!(station.name, "Bastille");
        assert_eq!(schedules[0].message, "3 mn");
        assert_eq!(api.call_count(), 2);
    }

    #[tokio::test]
    async fn unknown_path_returns_error() {
        let api = MockApi::new();
        let result = api.request("/traffic/metros/14").await;

        assert!(matches!(
            result,
            Err(ApiError::Upstream { status: 404, .. })
        ));
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test]
    async fn station_lookup_miss() {
        let api = MockApi::new();
        let query = bastille();
        api.set(
            query.stations_path(),
            json!({"result": {"stations": [{"name": "Nation", "slug": "nation"}]}}),
        )
        .await;

        let result = api.station(&query).await;
        assert!(matches!(result, Err(ApiError::StationNotFound { .. })));
    }

    #[tokio::test]
    async fn scripted_failure_replaces_document() {
        let api = MockApi::new();
        let query = TrafficQuery::new(TransportType::Rer, "A");
        api.set_traffic(&query, "normal", "Trafic normal", "").await;
        api.fail(query.traffic_path(), 500).await;

        let result = api.traffic(&query).await;
        assert!(matches!(
            result,
            Err(ApiError::Upstream { status: 500, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_route_waits() {
        let api = MockApi::new();
        let query = TrafficQuery::new(TransportType::Metro, "4");
        api.set_traffic(&query, "normal", "Trafic normal", "").await;
        api.delay(&query.traffic_path(), Duration::from_secs(5)).await;

        let start = tokio::time::Instant::now();
        api.traffic(&query).await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
