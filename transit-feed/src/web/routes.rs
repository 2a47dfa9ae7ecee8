//! HTTP route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
    routing::{delete, get, post},
};
use futures::Stream;
use tracing::warn;

use crate::config::ConsumerConfig;
use crate::domain::{Category, ConsumerId, StationTimetable, TrafficReport};
use crate::events::Published;
use crate::fetch::{FetchError, FetchOptions};
use crate::ratp::TransitApi;

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router<A: TransitApi + 'static>(state: AppState<A>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/consumers", get(list_consumers::<A>).post(register_consumer::<A>))
        .route("/consumers/:id", delete(remove_consumer::<A>))
        .route("/consumers/:id/timetables", get(current_timetables::<A>))
        .route("/consumers/:id/traffic", get(current_traffic::<A>))
        .route("/consumers/:id/refresh", post(refresh_all::<A>))
        .route("/consumers/:id/refresh/:category", post(refresh_category::<A>))
        .route("/consumers/:id/events", get(consumer_events::<A>))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

async fn list_consumers<A: TransitApi + 'static>(
    State(state): State<AppState<A>>,
) -> Json<ConsumersResponse> {
    let consumers = state.fetcher().store().consumers().await;
    Json(ConsumersResponse { consumers })
}

/// Register (or restart) a consumer from a JSON configuration.
async fn register_consumer<A: TransitApi + 'static>(
    State(state): State<AppState<A>>,
    Json(config): Json<ConsumerConfig>,
) -> Result<StatusCode, AppError> {
    if config.identifier.as_str().trim().is_empty() {
        return Err(AppError::BadRequest {
            message: "consumer identifier is empty".to_string(),
        });
    }
    if config.timetables.update_interval_secs == 0 || config.traffic.update_interval_secs == 0 {
        return Err(AppError::BadRequest {
            message: "update intervals must be non-zero".to_string(),
        });
    }

    state.scheduler.start(config).await;
    Ok(StatusCode::CREATED)
}

async fn remove_consumer<A: TransitApi + 'static>(
    State(state): State<AppState<A>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = ConsumerId::from(id);
    if state.scheduler.stop(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::from(FetchError::UnknownConsumer(id)))
    }
}

async fn current_timetables<A: TransitApi + 'static>(
    State(state): State<AppState<A>>,
    Path(id): Path<String>,
) -> Result<Json<CategoryResponse<StationTimetable>>, AppError> {
    let id = ConsumerId::from(id);
    let snapshot = state
        .fetcher()
        .store()
        .timetables(&id)
        .await
        .ok_or_else(|| FetchError::UnknownConsumer(id.clone()))?;

    Ok(Json(CategoryResponse::from_snapshot(id, snapshot)))
}

async fn current_traffic<A: TransitApi + 'static>(
    State(state): State<AppState<A>>,
    Path(id): Path<String>,
) -> Result<Json<CategoryResponse<TrafficReport>>, AppError> {
    let id = ConsumerId::from(id);
    let snapshot = state
        .fetcher()
        .store()
        .traffic(&id)
        .await
        .ok_or_else(|| FetchError::UnknownConsumer(id.clone()))?;

    Ok(Json(CategoryResponse::from_snapshot(id, snapshot)))
}

/// Fetch everything now.
async fn refresh_all<A: TransitApi + 'static>(
    State(state): State<AppState<A>>,
    Path(id): Path<String>,
) -> Result<Json<RefreshResponse>, AppError> {
    let id = ConsumerId::from(id);
    let (timetables, traffic) = state
        .fetcher()
        .fetch_all(&id, FetchOptions::default())
        .await?;

    Ok(Json(RefreshResponse {
        consumer: id,
        timetables,
        traffic,
    }))
}

/// Fetch one category now.
async fn refresh_category<A: TransitApi + 'static>(
    State(state): State<AppState<A>>,
    Path((id, category)): Path<(String, Category)>,
) -> Result<Json<Published>, AppError> {
    let id = ConsumerId::from(id);
    let fetcher = state.fetcher();
    let published = match category {
        Category::Timetables => {
            Published::Timetables(fetcher.fetch_timetables(&id, FetchOptions::default()).await?)
        }
        Category::Traffic => {
            Published::Traffic(fetcher.fetch_traffic(&id, FetchOptions::default()).await?)
        }
    };

    Ok(Json(published))
}

/// Server-Sent Events stream of one consumer's refresh notifications.
async fn consumer_events<A: TransitApi + 'static>(
    State(state): State<AppState<A>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, axum::Error>>>, AppError> {
    let id = ConsumerId::from(id);
    if !state.fetcher().store().contains(&id).await {
        return Err(FetchError::UnknownConsumer(id).into());
    }

    let subscription = state.fetcher().events().subscribe(id);
    let stream = futures::stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.recv().await?;
        let sse = SseEvent::default()
            .event(event.kind.name())
            .json_data(&*event);
        Some((sse, subscription))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::UnknownConsumer(_) => AppError::NotFound {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
        };

        warn!(%status, %message, "Request failed");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TrafficQuery, TransportType};
    use crate::fetch::Fetcher;
    use crate::ratp::MockApi;
    use crate::scheduler::Scheduler;
    use std::sync::Arc;

    async fn state_with_consumer(api: &MockApi) -> AppState<MockApi> {
        let fetcher = Fetcher::new(api.clone());
        let mut config = ConsumerConfig::new("hallway");
        config.traffic.queries = vec![TrafficQuery::new(TransportType::Metro, "1")];
        fetcher.register(config).await;
        AppState::new(Arc::new(Scheduler::new(Arc::new(fetcher))))
    }

    #[tokio::test]
    async fn health_ok() {
        assert_eq!(health().await, "ok");
    }

    #[tokio::test]
    async fn unknown_consumer_is_not_found() {
        let state = state_with_consumer(&MockApi::new()).await;

        let result = current_timetables(State(state.clone()), Path("ghost".to_string())).await;
        let response = result.unwrap_err().into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn traffic_is_empty_before_first_cycle() {
        let state = state_with_consumer(&MockApi::new()).await;

        let Json(body) = current_traffic(State(state), Path("hallway".to_string()))
            .await
            .unwrap();

        assert!(body.entries.is_none());
        assert!(body.last_update.is_none());
    }

    #[tokio::test]
    async fn refresh_publishes_and_is_visible() {
        let api = MockApi::new();
        let line = TrafficQuery::new(TransportType::Metro, "1");
        api.set_traffic(&line, "alerte", "Mouvement social", "Trafic perturbe")
            .await;
        let state = state_with_consumer(&api).await;

        let Json(refreshed) = refresh_category(
            State(state.clone()),
            Path(("hallway".to_string(), Category::Traffic)),
        )
        .await
        .unwrap();
        let Json(current) = current_traffic(State(state), Path("hallway".to_string()))
            .await
            .unwrap();

        let Published::Traffic(reports) = refreshed else {
            panic!("expected traffic");
        };
        assert_eq!(current.entries, Some(reports));
        assert!(current.last_update.is_some());
    }

    #[tokio::test]
    async fn refresh_all_unknown_consumer() {
        let state = state_with_consumer(&MockApi::new()).await;

        let result = refresh_all(State(state), Path("ghost".to_string())).await;

        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn register_and_remove_consumer() {
        let state = state_with_consumer(&MockApi::new()).await;

        let status = register_consumer(State(state.clone()), Json(ConsumerConfig::new("kitchen")))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let Json(list) = list_consumers(State(state.clone())).await;
        assert_eq!(
            list.consumers,
            vec![ConsumerId::from("hallway"), ConsumerId::from("kitchen")]
        );

        let status = remove_consumer(State(state.clone()), Path("kitchen".to_string()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let missing = remove_consumer(State(state), Path("kitchen".to_string())).await;
        assert!(matches!(missing, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn register_rejects_empty_identifier() {
        let state = state_with_consumer(&MockApi::new()).await;

        let result = register_consumer(State(state), Json(ConsumerConfig::new(" "))).await;

        assert!(matches!(result, Err(AppError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn events_for_unknown_consumer() {
        let state = state_with_consumer(&MockApi::new()).await;

        let result = consumer_events(State(state), Path("ghost".to_string())).await;

        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }
}
