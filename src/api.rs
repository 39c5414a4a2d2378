//! HTTP surface for the student API.
//!
//! - `GET /` – Liveness banner.
//! - `POST /students` – Create a student; responds `201` with the stored record.
//! - `GET /students` – List every stored student (unordered).
//! - `GET /students/:id` – Fetch one student.
//! - `PUT /students/:id` – Replace a student; the path id always wins over any body id.
//! - `DELETE /students/:id` – Remove a student; responds `204`.
//! - `GET /students/:id/summary` – Generate a natural-language profile summary.
//! - `GET /metrics` – Request counters.
//!
//! Bodies are decoded from raw bytes so any undecodable payload maps to `400` regardless of the
//! request content type.

use crate::metrics::{MetricsSnapshot, ServiceMetrics};
use crate::store::{StoreError, Student, StudentInput, StudentStore};
use crate::summary::{SummaryClient, SummaryError};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

const HOME_BANNER: &str = "Student API is working! Visit /students or /students/{id}";

/// Shared handler state: the record store, the summary provider, and counters.
struct AppState<G> {
    store: Arc<StudentStore>,
    summarizer: Arc<G>,
    metrics: Arc<ServiceMetrics>,
}

impl<G> Clone for AppState<G> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            summarizer: self.summarizer.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Build the HTTP router over an injected store and summary provider.
pub fn create_router<G>(store: Arc<StudentStore>, summarizer: Arc<G>) -> Router
where
    G: SummaryClient + 'static,
{
    let state = AppState {
        store,
        summarizer,
        metrics: Arc::new(ServiceMetrics::new()),
    };

    Router::new()
        .route("/", get(home))
        .route(
            "/students",
            get(list_students::<G>).post(create_student::<G>),
        )
        .route(
            "/students/:id",
            get(get_student::<G>)
                .put(update_student::<G>)
                .delete(delete_student::<G>),
        )
        .route("/students/:id/summary", get(student_summary::<G>))
        .route("/metrics", get(get_metrics::<G>))
        .with_state(state)
}

async fn home() -> &'static str {
    HOME_BANNER
}

async fn create_student<G>(
    State(state): State<AppState<G>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Student>), ApiError>
where
    G: SummaryClient,
{
    let candidate = parse_body(&body)?;
    let student = state.store.create(candidate)?;
    state.metrics.record_created();
    tracing::info!(id = student.id, "Student created");
    Ok((StatusCode::CREATED, Json(student)))
}

async fn list_students<G>(State(state): State<AppState<G>>) -> Json<Vec<Student>>
where
    G: SummaryClient,
{
    Json(state.store.list())
}

async fn get_student<G>(
    State(state): State<AppState<G>>,
    Path(raw_id): Path<String>,
) -> Result<Json<Student>, ApiError>
where
    G: SummaryClient,
{
    let id = stored_key(parse_id(&raw_id)?)?;
    Ok(Json(state.store.get(id)?))
}

async fn update_student<G>(
    State(state): State<AppState<G>>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> Result<Json<Student>, ApiError>
where
    G: SummaryClient,
{
    let id = parse_id(&raw_id)?;
    let candidate = parse_body(&body)?;
    let id = stored_key(id)?;
    let student = state.store.update(id, candidate)?;
    state.metrics.record_updated();
    tracing::info!(id, "Student updated");
    Ok(Json(student))
}

async fn delete_student<G>(
    State(state): State<AppState<G>>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    G: SummaryClient,
{
    let id = stored_key(parse_id(&raw_id)?)?;
    state.store.delete(id)?;
    state.metrics.record_deleted();
    tracing::info!(id, "Student deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Response body for `GET /students/:id/summary`.
#[derive(Serialize)]
struct SummaryResponse {
    summary: String,
}

/// Look up the student, then stream a summary for it from the generation service.
async fn student_summary<G>(
    State(state): State<AppState<G>>,
    Path(raw_id): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError>
where
    G: SummaryClient,
{
    let id = stored_key(parse_id(&raw_id)?)?;
    let student = state.store.get(id)?;

    let outcome = state.summarizer.summarize(&student).await;
    state.metrics.record_summary(outcome.is_ok());
    let summary = outcome?;

    tracing::info!(id, length = summary.len(), "Summary generated");
    Ok(Json(SummaryResponse { summary }))
}

async fn get_metrics<G>(State(state): State<AppState<G>>) -> Json<MetricsSnapshot>
where
    G: SummaryClient,
{
    Json(state.metrics.snapshot())
}

/// Any integer is a well-formed id; only non-integers are rejected here.
fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse().map_err(|_| ApiError::InvalidId)
}

/// Store keys are positive, so a zero or negative id can never resolve to a student.
fn stored_key(id: i64) -> Result<u64, ApiError> {
    u64::try_from(id)
        .ok()
        .filter(|key| *key > 0)
        .ok_or(ApiError::UnknownId(id))
}

fn parse_body(body: &[u8]) -> Result<StudentInput, ApiError> {
    serde_json::from_slice(body).map_err(ApiError::InvalidBody)
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("Invalid student ID")]
    InvalidId,
    #[error("Invalid student data")]
    InvalidBody(#[source] serde_json::Error),
    #[error("Student {0} not found")]
    UnknownId(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Summary(#[from] SummaryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidId | Self::InvalidBody(_) | Self::Store(StoreError::Validation(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::UnknownId(_) | Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Summary(error) => {
                match error {
                    SummaryError::UpstreamStatus { status, .. } => {
                        tracing::warn!(upstream_status = %status, "Summary rejected upstream: {error}")
                    }
                    _ => tracing::error!("Summary failed: {error}"),
                }
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self {
            Self::UnknownId(_) | Self::Store(StoreError::NotFound(_)) => {
                "Student not found".to_string()
            }
            other => other.to_string(),
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::{HOME_BANNER, create_router};
    use crate::store::{Student, StudentStore};
    use crate::summary::{SummaryClient, SummaryError};
    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Clone)]
    enum StubOutcome {
        Summary(String),
        Status(reqwest::StatusCode),
    }

    struct StubSummaryClient {
        calls: Mutex<Vec<Student>>,
        outcome: StubOutcome,
    }

    impl StubSummaryClient {
        fn new(outcome: StubOutcome) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                outcome,
            }
        }

        async fn recorded_calls(&self) -> Vec<Student> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl SummaryClient for StubSummaryClient {
        async fn summarize(&self, student: &Student) -> Result<String, SummaryError> {
            self.calls.lock().await.push(student.clone());
            match &self.outcome {
                StubOutcome::Summary(text) => Ok(text.clone()),
                StubOutcome::Status(status) => Err(SummaryError::UpstreamStatus {
                    status: *status,
                    body: String::new(),
                }),
            }
        }
    }

    fn app_with(outcome: StubOutcome) -> (Router, Arc<StubSummaryClient>) {
        let stub = Arc::new(StubSummaryClient::new(outcome));
        let app = create_router(Arc::new(StudentStore::new()), stub.clone());
        (app, stub)
    }

    fn app() -> Router {
        app_with(StubOutcome::Summary("A diligent student.".into())).0
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<String>) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().method(method).uri(uri);
        if body.is_some() {
            request = request.header(header::CONTENT_TYPE, "application/json");
        }
        let response = app
            .clone()
            .oneshot(
                request
                    .body(body.map(Body::from).unwrap_or_else(Body::empty))
                    .expect("request"),
            )
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, bytes.to_vec())
    }

    fn as_json(body: &[u8]) -> Value {
        serde_json::from_slice(body).expect("json body")
    }

    async fn create(app: &Router, name: &str, age: i64, email: &str) -> Value {
        let payload = json!({ "name": name, "age": age, "email": email });
        let (status, body) = send(app, Method::POST, "/students", Some(payload.to_string())).await;
        assert_eq!(status, StatusCode::CREATED);
        as_json(&body)
    }

    #[tokio::test]
    async fn home_reports_liveness() {
        let (status, body) = send(&app(), Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, HOME_BANNER.as_bytes());
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let app = app();
        let created = create(&app, "Ada", 21, "ada@example.edu").await;
        assert_eq!(
            created,
            json!({ "id": 1, "name": "Ada", "age": 21, "email": "ada@example.edu" })
        );

        let (status, body) = send(&app, Method::GET, "/students/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(as_json(&body), created);
    }

    #[tokio::test]
    async fn create_rejects_invalid_payloads() {
        let app = app();
        let bodies = [
            json!({ "name": "Ada", "age": 0, "email": "a@x" }).to_string(),
            json!({ "name": "Ada", "age": -1, "email": "a@x" }).to_string(),
            json!({ "name": "", "age": 20, "email": "a@x" }).to_string(),
            json!({ "name": "Ada", "age": 20 }).to_string(),
            json!({ "name": "Ada", "age": "twenty", "email": "a@x" }).to_string(),
            "{not json".to_string(),
        ];
        for body in bodies {
            let (status, _) = send(&app, Method::POST, "/students", Some(body.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        }

        let (_, body) = send(&app, Method::GET, "/students", None).await;
        assert_eq!(as_json(&body), json!([]));
    }

    #[tokio::test]
    async fn create_accepts_body_without_content_type() {
        let app = app();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/students")
                    .body(Body::from(
                        json!({ "name": "Ada", "age": 21, "email": "a@x" }).to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn list_returns_every_student() {
        let app = app();
        create(&app, "Ada", 21, "a@x").await;
        create(&app, "Bob", 22, "b@x").await;

        let (status, body) = send(&app, Method::GET, "/students", None).await;
        assert_eq!(status, StatusCode::OK);
        let mut names: Vec<String> = as_json(&body)
            .as_array()
            .expect("array")
            .iter()
            .map(|student| student["name"].as_str().expect("name").to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Ada", "Bob"]);
    }

    #[tokio::test]
    async fn id_routes_reject_non_numeric_ids() {
        let app = app();
        let payload = json!({ "name": "Ada", "age": 21, "email": "a@x" }).to_string();
        let cases = [
            (Method::GET, "/students/abc", None),
            (Method::PUT, "/students/abc", Some(payload)),
            (Method::DELETE, "/students/abc", None),
            (Method::GET, "/students/abc/summary", None),
        ];
        for (method, uri, body) in cases {
            let (status, body) = send(&app, method, uri, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body, b"Invalid student ID");
        }
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let app = app();
        let payload = json!({ "name": "Ada", "age": 21, "email": "a@x" }).to_string();
        let cases = [
            (Method::GET, "/students/42", None),
            (Method::PUT, "/students/42", Some(payload)),
            (Method::DELETE, "/students/42", None),
            (Method::GET, "/students/42/summary", None),
        ];
        for (method, uri, body) in cases {
            let (status, body) = send(&app, method, uri, body).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body, b"Student not found");
        }
    }

    #[tokio::test]
    async fn non_positive_ids_are_not_found() {
        let (app, stub) = app_with(StubOutcome::Summary("unused".into()));
        create(&app, "Ada", 21, "a@x").await;
        let payload = json!({ "name": "Ada", "age": 21, "email": "a@x" }).to_string();
        let cases = [
            (Method::GET, "/students/-1", None),
            (Method::GET, "/students/0", None),
            (Method::PUT, "/students/-1", Some(payload)),
            (Method::DELETE, "/students/-1", None),
            (Method::GET, "/students/-1/summary", None),
        ];
        for (method, uri, body) in cases {
            let (status, body) = send(&app, method, uri, body).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body, b"Student not found");
        }
        assert!(stub.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn update_with_negative_id_still_validates_body_first() {
        let app = app();
        let payload = json!({ "name": "", "age": 21, "email": "a@x" }).to_string();
        let (status, _) = send(&app, Method::PUT, "/students/-1", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_forces_path_id() {
        let app = app();
        create(&app, "Ada", 21, "a@x").await;

        let payload = json!({ "id": 99, "name": "Ada L.", "age": 22, "email": "ada@l.org" });
        let (status, body) =
            send(&app, Method::PUT, "/students/1", Some(payload.to_string())).await;
        assert_eq!(status, StatusCode::OK);
        let expected = json!({ "id": 1, "name": "Ada L.", "age": 22, "email": "ada@l.org" });
        assert_eq!(as_json(&body), expected);

        let (_, body) = send(&app, Method::GET, "/students/1", None).await;
        assert_eq!(as_json(&body), expected);
        let (status, _) = send(&app, Method::GET, "/students/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_rejects_invalid_payload() {
        let app = app();
        create(&app, "Ada", 21, "a@x").await;
        let payload = json!({ "name": "Ada", "age": 0, "email": "a@x" }).to_string();
        let (status, _) = send(&app, Method::PUT, "/students/1", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let app = app();
        create(&app, "Ada", 21, "a@x").await;

        let (status, body) = send(&app, Method::DELETE, "/students/1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());

        let (status, _) = send(&app, Method::GET, "/students/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn summary_returns_generated_text() {
        let (app, stub) = app_with(StubOutcome::Summary("Ada is 21.".into()));
        create(&app, "Ada", 21, "a@x").await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/students/1/summary")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        assert_eq!(as_json(&body), json!({ "summary": "Ada is 21." }));

        let calls = stub.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, 1);
        assert_eq!(calls[0].name, "Ada");
    }

    #[tokio::test]
    async fn summary_for_unknown_student_skips_upstream() {
        let (app, stub) = app_with(StubOutcome::Summary("unused".into()));
        let (status, _) = send(&app, Method::GET, "/students/5/summary", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(stub.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn summary_failure_maps_to_internal_error() {
        let (app, _) = app_with(StubOutcome::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        create(&app, "Ada", 21, "a@x").await;

        let (status, body) = send(&app, Method::GET, "/students/1/summary", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(String::from_utf8_lossy(&body).contains("503"));
    }

    #[tokio::test]
    async fn metrics_track_mutations_and_summaries() {
        let (app, _) = app_with(StubOutcome::Summary("ok".into()));
        create(&app, "Ada", 21, "a@x").await;
        create(&app, "Bob", 22, "b@x").await;
        let payload = json!({ "name": "Bob", "age": 23, "email": "b@x" }).to_string();
        send(&app, Method::PUT, "/students/2", Some(payload)).await;
        send(&app, Method::DELETE, "/students/1", None).await;
        send(&app, Method::GET, "/students/2/summary", None).await;

        let (status, body) = send(&app, Method::GET, "/metrics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            as_json(&body),
            json!({
                "students_created": 2,
                "students_updated": 1,
                "students_deleted": 1,
                "summaries_generated": 1,
                "summaries_failed": 0
            })
        );
    }
}
