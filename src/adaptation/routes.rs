//! REST endpoints for day resolution, planner state, skips, and progress.
//!
//! Responses are plain JSON data; presentation belongs to the caller.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{debug, error, info};

use super::service::AdaptationService;
use crate::error::PlannerError;

/// Shared state for the adaptation routes.
#[derive(Clone)]
pub struct AdaptationRouteState {
    pub service: Arc<AdaptationService>,
}

/// A planner error rendered as an HTTP response.
pub struct ApiError(PlannerError);

impl From<PlannerError> for ApiError {
    fn from(err: PlannerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = match &err {
            PlannerError::UserNotFound { .. } => StatusCode::NOT_FOUND,
            PlannerError::InvalidStartDate { .. } => StatusCode::BAD_REQUEST,
            PlannerError::NotApplicable(_)
            | PlannerError::SkipLimitExceeded { .. }
            | PlannerError::NoSkippedDaysToReturn => StatusCode::CONFLICT,
            PlannerError::CorruptStartDate { .. }
            | PlannerError::InvalidItemIndex { .. }
            | PlannerError::AlreadyCompleted { .. }
            | PlannerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if err.is_fault() {
            error!(code = err.code(), error = %err, "Planner request failed");
        } else {
            info!(code = err.code(), "Planner request declined: {err}");
        }

        (
            status,
            Json(serde_json::json!({
                "error": err.code(),
                "message": err.to_string(),
            })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Body of `PUT /api/users/{id}`.
#[derive(Debug, Deserialize)]
pub struct ProvisionRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "adapt-planner"
    }))
}

/// PUT /api/users/{id}
async fn provision_user(
    State(state): State<AdaptationRouteState>,
    Path(user_id): Path<String>,
    Json(req): Json<ProvisionRequest>,
) -> ApiResult<super::model::OnboardingProfile> {
    let profile = state
        .service
        .provision(&user_id, req.name, req.start_date.as_deref())
        .await?;
    Ok(Json(profile))
}

/// GET /api/users/{id}/day
async fn get_day(
    State(state): State<AdaptationRouteState>,
    Path(user_id): Path<String>,
) -> ApiResult<super::day::Resolution> {
    Ok(Json(state.service.resolve_day(&user_id).await?))
}

/// GET /api/users/{id}/tasks
async fn get_main_tasks(
    State(state): State<AdaptationRouteState>,
    Path(user_id): Path<String>,
) -> ApiResult<super::service::Today<Vec<String>>> {
    Ok(Json(state.service.main_tasks(&user_id).await?))
}

/// GET /api/users/{id}/planner
async fn get_planner(
    State(state): State<AdaptationRouteState>,
    Path(user_id): Path<String>,
) -> ApiResult<super::service::Today<super::tracker::PlannerView>> {
    debug!(user_id = %user_id, "Planner requested");
    Ok(Json(state.service.planner(&user_id).await?))
}

/// GET /api/users/{id}/planner/{day}
async fn get_planner_for_day(
    State(state): State<AdaptationRouteState>,
    Path((user_id, day)): Path<(String, i64)>,
) -> ApiResult<super::tracker::PlannerView> {
    Ok(Json(state.service.planner_for_day(&user_id, day).await?))
}

/// POST /api/users/{id}/planner/{day}/items/{index}/complete
async fn complete_item(
    State(state): State<AdaptationRouteState>,
    Path((user_id, day, index)): Path<(String, i64, u32)>,
) -> ApiResult<super::tracker::PlannerView> {
    Ok(Json(state.service.toggle_complete(&user_id, day, index).await?))
}

/// POST /api/users/{id}/planner/{day}/items/{index}/postpone
async fn postpone_item(
    State(state): State<AdaptationRouteState>,
    Path((user_id, day, index)): Path<(String, i64, u32)>,
) -> ApiResult<super::tracker::PlannerView> {
    Ok(Json(state.service.postpone(&user_id, day, index).await?))
}

/// POST /api/users/{id}/skip
async fn skip_day(
    State(state): State<AdaptationRouteState>,
    Path(user_id): Path<String>,
) -> ApiResult<super::service::SkipOutcome> {
    Ok(Json(state.service.skip_day(&user_id).await?))
}

/// POST /api/users/{id}/return
async fn return_day(
    State(state): State<AdaptationRouteState>,
    Path(user_id): Path<String>,
) -> ApiResult<super::service::SkipOutcome> {
    Ok(Json(state.service.return_day(&user_id).await?))
}

/// GET /api/progress
async fn get_progress(
    State(state): State<AdaptationRouteState>,
) -> ApiResult<Vec<super::service::UserProgress>> {
    Ok(Json(state.service.progress_overview().await?))
}

/// Build the adaptation REST routes.
pub fn adaptation_routes(state: AdaptationRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users/{id}", put(provision_user))
        .route("/api/users/{id}/day", get(get_day))
        .route("/api/users/{id}/tasks", get(get_main_tasks))
        .route("/api/users/{id}/planner", get(get_planner))
        .route("/api/users/{id}/planner/{day}", get(get_planner_for_day))
        .route(
            "/api/users/{id}/planner/{day}/items/{index}/complete",
            post(complete_item),
        )
        .route(
            "/api/users/{id}/planner/{day}/items/{index}/postpone",
            post(postpone_item),
        )
        .route("/api/users/{id}/skip", post(skip_day))
        .route("/api/users/{id}/return", post(return_day))
        .route("/api/progress", get(get_progress))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chrono::NaiveDate;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::adaptation::clock::FixedClock;
    use crate::adaptation::model::{OnboardingProfile, PlannerItem};
    use crate::store::{AdaptationStore, MemoryStore};

    async fn app_on(today: NaiveDate) -> Router {
        let store = Arc::new(MemoryStore::new());
        store
            .put_day_tasks(
                1,
                &[
                    PlannerItem::new("09:00", "Welcome"),
                    PlannerItem::new("10:00", "Laptop setup"),
                ],
            )
            .await
            .unwrap();
        let service = AdaptationService::new(store, Arc::new(FixedClock(today)));
        adaptation_routes(AdaptationRouteState {
            service: Arc::new(service),
        })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let resp = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 2).unwrap()
    }

    #[tokio::test]
    async fn health_ok() {
        let app = app_on(monday()).await;
        let (status, json) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_user_is_404() {
        let app = app_on(monday()).await;
        let (status, json) = send(&app, "GET", "/api/users/nobody/day", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "user_not_found");
    }

    #[tokio::test]
    async fn provision_then_resolve() {
        let app = app_on(monday()).await;
        let (status, json) = send(
            &app,
            "PUT",
            "/api/users/7",
            Some(serde_json::json!({"name": "Anna", "start_date": "02.09.2024"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["start_date"], "02.09.2024");

        let (status, json) = send(&app, "GET", "/api/users/7/day", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({"status": "day", "day": 1}));
    }

    #[tokio::test]
    async fn bad_start_date_is_400() {
        let app = app_on(monday()).await;
        let (status, json) = send(
            &app,
            "PUT",
            "/api/users/7",
            Some(serde_json::json!({"start_date": "2024-09-02"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid_start_date");
    }

    #[tokio::test]
    async fn out_of_range_item_is_internal_error() {
        let app = app_on(monday()).await;
        send(
            &app,
            "PUT",
            "/api/users/7",
            Some(serde_json::json!({"start_date": "02.09.2024"})),
        )
        .await;
        let (status, json) = send(&app, "POST", "/api/users/7/planner/1/items/5/complete", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "invalid_item_index");
    }

    #[tokio::test]
    async fn unreadable_stored_date_is_internal_error() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_profile(&OnboardingProfile::new("7").with_start_date("2024/09/02"))
            .await
            .unwrap();
        let service = AdaptationService::new(store, Arc::new(FixedClock(monday())));
        let app = adaptation_routes(AdaptationRouteState {
            service: Arc::new(service),
        });

        let (status, json) = send(&app, "GET", "/api/users/7/day", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "corrupt_start_date");
    }

    #[tokio::test]
    async fn return_without_skips_is_conflict() {
        let app = app_on(monday()).await;
        send(
            &app,
            "PUT",
            "/api/users/7",
            Some(serde_json::json!({"start_date": "02.09.2024"})),
        )
        .await;
        let (status, json) = send(&app, "POST", "/api/users/7/return", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "no_skipped_days_to_return");
    }

    #[tokio::test]
    async fn planner_for_explicit_day() {
        let app = app_on(monday()).await;
        send(
            &app,
            "PUT",
            "/api/users/7",
            Some(serde_json::json!({"start_date": "02.09.2024"})),
        )
        .await;
        send(&app, "POST", "/api/users/7/planner/1/items/2/postpone", None).await;

        let (status, json) = send(&app, "GET", "/api/users/7/planner/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["day"], 1);
        assert_eq!(json["entries"].as_array().unwrap().len(), 1);
        assert_eq!(json["postponed"][0]["display_index"], 2);
    }

    #[tokio::test]
    async fn planner_reports_weekend() {
        let app = app_on(NaiveDate::from_ymd_opt(2024, 9, 7).unwrap()).await;
        send(
            &app,
            "PUT",
            "/api/users/7",
            Some(serde_json::json!({"start_date": "02.09.2024"})),
        )
        .await;
        let (status, json) = send(&app, "GET", "/api/users/7/planner", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "not_applicable");
        assert_eq!(json["reason"], "weekend_today");
    }
}
