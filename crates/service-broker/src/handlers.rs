//! API request handlers for the service broker

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use broker_common::{Error, LastOperation, ServiceCatalog};
use std::sync::Arc;
use tracing::info;

use crate::models::{
    AsyncQuery, BindRequest, BindingResponse, DeprovisionOutcome, LastOperationQuery,
    OperationResponse, ProvisionRequest,
};
use crate::orchestrator::Orchestrator;

/// Shared application state
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// API Error type
#[derive(Debug)]
pub struct ApiError(pub Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(self.0.body())).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

fn empty_object() -> Json<serde_json::Value> {
    Json(serde_json::json!({}))
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "fabric-service-broker"
    }))
}

pub async fn catalog_handler() -> Json<ServiceCatalog> {
    info!("Handling GET /v2/catalog");
    Json(ServiceCatalog::fabric())
}

pub async fn provision_handler(
    State(state): State<Arc<AppState>>,
    Path(instance_id): Path<String>,
    Query(query): Query<AsyncQuery>,
    Json(payload): Json<ProvisionRequest>,
) -> Result<(StatusCode, Json<OperationResponse>), ApiError> {
    info!("Handling PUT /v2/service_instances/{}", instance_id);

    let task_id = state
        .orchestrator
        .provision(&instance_id, &payload, query.accepts_incomplete())
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(OperationResponse { operation: task_id }),
    ))
}

pub async fn deprovision_handler(
    State(state): State<Arc<AppState>>,
    Path(instance_id): Path<String>,
    Query(query): Query<AsyncQuery>,
) -> Result<Response, ApiError> {
    info!("Handling DELETE /v2/service_instances/{}", instance_id);

    let outcome = state
        .orchestrator
        .deprovision(&instance_id, query.accepts_incomplete())
        .await?;

    let response = match outcome {
        DeprovisionOutcome::Deleting(task_id) => (
            StatusCode::ACCEPTED,
            Json(OperationResponse { operation: task_id }),
        )
            .into_response(),
        DeprovisionOutcome::Removed => (StatusCode::OK, empty_object()).into_response(),
    };
    Ok(response)
}

pub async fn last_operation_handler(
    State(state): State<Arc<AppState>>,
    Path(instance_id): Path<String>,
    Query(query): Query<LastOperationQuery>,
) -> Result<Json<LastOperation>, ApiError> {
    info!(
        "Handling GET /v2/service_instances/{}/last_operation",
        instance_id
    );

    let last_operation = state
        .orchestrator
        .last_operation(&instance_id, query.operation.as_deref())
        .await?;

    Ok(Json(last_operation))
}

pub async fn bind_handler(
    State(state): State<Arc<AppState>>,
    Path((instance_id, binding_id)): Path<(String, String)>,
    Json(payload): Json<BindRequest>,
) -> Result<(StatusCode, Json<BindingResponse>), ApiError> {
    info!(
        "Handling PUT /v2/service_instances/{}/service_bindings/{}",
        instance_id, binding_id
    );

    let response = state
        .orchestrator
        .bind(&instance_id, &binding_id, &payload)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn unbind_handler(
    State(state): State<Arc<AppState>>,
    Path((instance_id, binding_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    info!(
        "Handling DELETE /v2/service_instances/{}/service_bindings/{}",
        instance_id, binding_id
    );

    state.orchestrator.unbind(&instance_id, &binding_id).await?;

    Ok(empty_object())
}
