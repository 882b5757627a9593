//! Record handlers
//!
//! Thin translation between HTTP and [`RecordService`](todo_core::RecordService).

use crate::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use todo_core::{OpContext, Outcome, Record, RecordDraft, RecordError, RecordPatch};

/// Response header describing the cache path taken
pub const CACHE_HEADER: &str = "x-cache";

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<RecordError> for ApiError {
    fn from(e: RecordError) -> Self {
        let status = status_for(&e);
        if status.is_server_error() {
            tracing::error!("Request failed: {}", e);
        } else {
            tracing::debug!("Request rejected: {}", e);
        }
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        tracing::debug!("Failed to decode request body: {}", e);
        Self::bad_request(format!("Invalid input: {}", e.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        tracing::debug!("Failed to parse record id: {}", e);
        Self::bad_request(format!("Invalid id: {}", e.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub fn status_for(e: &RecordError) -> StatusCode {
    match e {
        RecordError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        RecordError::NotFound(_) => StatusCode::NOT_FOUND,
        RecordError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn respond<T: Serialize>(status: StatusCode, outcome: Outcome<T>) -> Response {
    (
        status,
        [(CACHE_HEADER, outcome.cache.label())],
        Json(outcome.value),
    )
        .into_response()
}

fn context(state: &AppState) -> OpContext {
    OpContext::with_timeout(state.request_timeout)
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Response> {
    let outcome = state.service.list(&context(&state)).await?;
    Ok(respond(StatusCode::OK, outcome))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<RecordDraft>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(draft) = payload?;
    let outcome: Outcome<Record> = state.service.create(&context(&state), draft).await?;
    tracing::info!("Todo created: id={}", outcome.value.id);
    Ok(respond(StatusCode::CREATED, outcome))
}

pub async fn get(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Response> {
    let Path(id) = path?;
    let outcome = state.service.get(&context(&state), id).await?;
    Ok(respond(StatusCode::OK, outcome))
}

pub async fn update(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<RecordPatch>, JsonRejection>,
) -> ApiResult<Response> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    let outcome = state.service.update(&context(&state), id, patch).await?;
    Ok(respond(StatusCode::OK, outcome))
}

pub async fn delete(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Response> {
    let Path(id) = path?;
    let outcome = state.service.delete(&context(&state), id).await?;
    Ok((
        StatusCode::NO_CONTENT,
        [(CACHE_HEADER, outcome.cache.label())],
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryCache;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use todo_core::ports::storage::StoreResult;
    use todo_core::ports::RecordStore;
    use todo_core::{RecordService, ServiceConfig, StoreError, ValidationError};
    use tower::ServiceExt;

    #[derive(Default)]
    struct TestStore {
        records: Mutex<BTreeMap<i64, Record>>,
        down: AtomicBool,
    }

    impl TestStore {
        fn check(&self) -> StoreResult<()> {
            if self.down.load(Ordering::SeqCst) {
                Err(StoreError::Database("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RecordStore for TestStore {
        async fn create(&self, draft: &RecordDraft) -> StoreResult<Record> {
            self.check()?;
            let mut records = self.records.lock().unwrap();
            let id = records.keys().next_back().copied().unwrap_or(0) + 1;
            let now = Utc::now();
            let record = Record {
                id,
                title: draft.title.clone(),
                done: draft.done,
                created_at: now,
                updated_at: now,
            };
            records.insert(id, record.clone());
            Ok(record)
        }

        async fn get_by_id(&self, id: i64) -> StoreResult<Option<Record>> {
            self.check()?;
            Ok(self.records.lock().unwrap().get(&id).cloned())
        }

        async fn list(&self) -> StoreResult<Vec<Record>> {
            self.check()?;
            Ok(self.records.lock().unwrap().values().cloned().collect())
        }

        async fn update(&self, id: i64, patch: &RecordPatch) -> StoreResult<Option<Record>> {
            self.check()?;
            let mut records = self.records.lock().unwrap();
            Ok(records.get_mut(&id).map(|record| {
                patch.apply_to(record);
                record.updated_at = Utc::now();
                record.clone()
            }))
        }

        async fn delete(&self, id: i64) -> StoreResult<bool> {
            self.check()?;
            Ok(self.records.lock().unwrap().remove(&id).is_some())
        }

        async fn ping(&self) -> StoreResult<()> {
            self.check()
        }
    }

    fn test_app() -> (axum::Router, Arc<TestStore>) {
        let store = Arc::new(TestStore::default());
        let service = RecordService::new(
            store.clone(),
            Arc::new(MemoryCache::new()),
            ServiceConfig::default(),
        );
        let state = AppState {
            service: Arc::new(service),
            request_timeout: Duration::from_secs(1),
        };
        (crate::app(state), store)
    }

    fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn cache_header(response: &Response) -> &str {
        response
            .headers()
            .get(CACHE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (app, _store) = test_app();

        let response = app
            .clone()
            .oneshot(json_request("POST", "/todos", r#"{"title":"buy milk"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(cache_header(&response), "written");
        let created = body_json(response).await;
        assert_eq!(created["id"], 1);
        assert_eq!(created["title"], "buy milk");
        assert_eq!(created["done"], false);

        let response = app.oneshot(empty_request("GET", "/todos/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cache_header(&response), "hit");
        assert_eq!(body_json(response).await, created);
    }

    #[tokio::test]
    async fn test_update_then_get_refills() {
        let (app, _store) = test_app();
        app.clone()
            .oneshot(json_request("POST", "/todos", r#"{"title":"buy milk"}"#))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(json_request("PUT", "/todos/1", r#"{"done":true}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cache_header(&response), "invalidated");

        let response = app.oneshot(empty_request("GET", "/todos/1")).await.unwrap();
        assert_eq!(cache_header(&response), "filled");
        let body = body_json(response).await;
        assert_eq!(body["title"], "buy milk");
        assert_eq!(body["done"], true);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_404() {
        let (app, _store) = test_app();
        app.clone()
            .oneshot(json_request("POST", "/todos", r#"{"title":"buy milk"}"#))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", "/todos/1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/todos/1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(empty_request("DELETE", "/todos/1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_returns_store_contents() {
        let (app, _store) = test_app();
        for title in ["buy milk", "walk dog"] {
            app.clone()
                .oneshot(json_request(
                    "POST",
                    "/todos",
                    &format!(r#"{{"title":"{}"}}"#, title),
                ))
                .await
                .unwrap();
        }

        let response = app.oneshot(empty_request("GET", "/todos")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(cache_header(&response), "bypassed");
        let body = body_json(response).await;
        let titles: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["buy milk", "walk dog"]);
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let (app, _store) = test_app();

        let response = app
            .clone()
            .oneshot(json_request("POST", "/todos", r#"{"title":""}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());

        let response = app
            .clone()
            .oneshot(json_request("POST", "/todos", "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/todos/abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());

        let response = app
            .oneshot(json_request("PUT", "/todos/1", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_id_gets_json_error() {
        let (app, store) = test_app();

        for request in [
            empty_request("GET", "/todos/abc"),
            json_request("PUT", "/todos/abc", r#"{"done":true}"#),
            empty_request("DELETE", "/todos/1.5"),
        ] {
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = body_json(response).await;
            assert!(body["error"]
                .as_str()
                .is_some_and(|e| e.starts_with("Invalid id")));
        }
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_outage_is_500() {
        let (app, store) = test_app();
        store.down.store(true, Ordering::SeqCst);

        let response = app.oneshot(empty_request("GET", "/todos")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_health() {
        let (app, store) = test_app();

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");

        store.down.store(true, Ordering::SeqCst);
        let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&RecordError::InvalidInput(ValidationError::EmptyTitle)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&RecordError::NotFound(1)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&RecordError::StoreUnavailable("down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
