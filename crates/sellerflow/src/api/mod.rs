use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::jobs::error::StoreError;
use crate::jobs::store::JobStore;
use crate::sync::model::Tenant;
use crate::sync::store::TenantStore;
use crate::sync::triggers::{SyncTriggers, TriggerError, TriggerOutcome};

#[derive(Clone)]
pub struct ApiState {
    pub jobs: Arc<dyn JobStore>,
    pub tenants: Arc<dyn TenantStore>,
    pub triggers: SyncTriggers,
}

impl ApiState {
    pub fn new(jobs: Arc<dyn JobStore>, tenants: Arc<dyn TenantStore>) -> Self {
        let triggers = SyncTriggers::new(jobs.clone(), tenants.clone());
        Self {
            jobs,
            tenants,
            triggers,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        // Triggers
        .route("/tenants/:tenant_id/sync", post(request_tenant_sync))
        .route(
            "/tenants/:tenant_id/listings/:listing_id/sync",
            post(request_listing_sync),
        )
        // Inspect
        .route("/tenants/:tenant_id/sync-status", get(sync_status))
        .route("/jobs/:id", get(get_job))
        // Metrics
        .route("/metrics", get(metrics))
        // Health
        .route("/health", get(health))
        .with_state(state)
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn error_body(status: StatusCode, error: &str) -> ApiError {
    (status, Json(json!({ "error": error })))
}

fn store_err(e: StoreError) -> ApiError {
    tracing::error!(error = %e, "store error in api handler");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, &format!("internal error: {e}"))
}

fn trigger_err(e: TriggerError) -> ApiError {
    match e {
        TriggerError::TenantNotFound(_) => error_body(StatusCode::NOT_FOUND, "tenant not found"),
        TriggerError::ListingNotFound(_) => error_body(StatusCode::NOT_FOUND, "listing not found"),
        TriggerError::Store(e) => store_err(e),
    }
}

fn trigger_response(outcome: TriggerOutcome) -> Response {
    match outcome {
        TriggerOutcome::Enqueued { job_id } => {
            (StatusCode::ACCEPTED, Json(json!({ "job_id": job_id }))).into_response()
        }
        TriggerOutcome::Cooldown {
            retry_after_seconds,
        } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "cooldown",
                "retry_after_seconds": retry_after_seconds,
            })),
        )
            .into_response(),
    }
}

pub async fn request_tenant_sync(
    State(state): State<ApiState>,
    Path(tenant_id): Path<String>,
) -> Result<Response, ApiError> {
    let outcome = state
        .triggers
        .request_manual_sync(&tenant_id)
        .await
        .map_err(trigger_err)?;
    Ok(trigger_response(outcome))
}

pub async fn request_listing_sync(
    State(state): State<ApiState>,
    Path((tenant_id, listing_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let outcome = state
        .triggers
        .request_listing_sync(&tenant_id, &listing_id)
        .await
        .map_err(trigger_err)?;
    Ok(trigger_response(outcome))
}

pub async fn sync_status(
    State(state): State<ApiState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Tenant>, ApiError> {
    state
        .tenants
        .get_tenant(&tenant_id)
        .await
        .map_err(store_err)?
        .map(Json)
        .ok_or_else(|| error_body(StatusCode::NOT_FOUND, "tenant not found"))
}

pub async fn get_job(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let job = state
        .jobs
        .get_job(id)
        .await
        .map_err(store_err)?
        .ok_or_else(|| error_body(StatusCode::NOT_FOUND, "job not found"))?;
    Ok(Json(job).into_response())
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub jobs: BTreeMap<&'static str, i64>,
}

pub async fn metrics(State(state): State<ApiState>) -> Result<Json<MetricsResponse>, ApiError> {
    let counts = state.jobs.count_by_status().await.map_err(store_err)?;
    let jobs = counts.into_iter().map(|(s, n)| (s.as_str(), n)).collect();
    Ok(Json(MetricsResponse { jobs }))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::memory::InMemoryJobStore;
    use crate::jobs::model::JobStatus;
    use crate::sync::memory::InMemoryTenantStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    struct Harness {
        jobs: InMemoryJobStore,
        app: Router,
    }

    async fn harness() -> Harness {
        let jobs = InMemoryJobStore::new();
        let tenants = InMemoryTenantStore::new();
        tenants.put_tenant(Tenant::new("T1")).await;
        tenants.put_listing("T1", "l1", "MLB1", None).await;

        let app = router(ApiState::new(
            Arc::new(jobs.clone()),
            Arc::new(tenants.clone()),
        ));
        Harness { jobs, app }
    }

    async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn manual_sync_accepted_then_rate_limited() {
        let h = harness().await;

        let (status, body) = call(&h.app, "POST", "/tenants/T1/sync").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let job_id: Uuid = body["job_id"].as_str().unwrap().parse().unwrap();
        let job = h.jobs.get_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        let (status, body) = call(&h.app, "POST", "/tenants/T1/sync").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "cooldown");
        assert!(body["retry_after_seconds"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn unknown_tenant_is_404() {
        let h = harness().await;
        let (status, _) = call(&h.app, "POST", "/tenants/nope/sync").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&h.app, "GET", "/tenants/nope/sync-status").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listing_sync_route() {
        let h = harness().await;
        let (status, body) = call(&h.app, "POST", "/tenants/T1/listings/l1/sync").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body["job_id"].is_string());

        let (status, _) = call(&h.app, "POST", "/tenants/T1/listings/missing/sync").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn job_lookup_and_metrics() {
        let h = harness().await;
        let (_, body) = call(&h.app, "POST", "/tenants/T1/sync").await;
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let (status, job) = call(&h.app, "GET", &format!("/jobs/{job_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(job["job_type"], "TENANT_SYNC");
        assert_eq!(job["lock_key"], "tenant:T1");

        let (status, _) = call(&h.app, "GET", &format!("/jobs/{}", Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, metrics) = call(&h.app, "GET", "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(metrics["jobs"]["queued"], 1);
        assert_eq!(metrics["jobs"]["running"], 0);
    }

    #[tokio::test]
    async fn sync_status_and_health() {
        let h = harness().await;
        let (status, tenant) = call(&h.app, "GET", "/tenants/T1/sync-status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tenant["id"], "T1");
        assert!(tenant["last_sync_status"].is_null());

        let (status, body) = call(&h.app, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }
}
