use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use purchasing_core::domain::request::{
    NewPurchaseRequest, PurchaseRequest, RequestId, RequestPatch,
};
use purchasing_core::domain::user::UserId;
use purchasing_core::errors::ApplicationError;
use purchasing_core::workflow::{StatusChange, WorkflowError};
use purchasing_db::repositories::{Page, RequestFilter};

use super::error::ApiError;
use super::identity::Caller;
use super::state::ApiState;

#[derive(Debug, Default, Deserialize)]
pub struct RequestListQuery {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub user_id: Option<i64>,
    pub supervisor_id: Option<i64>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
}

fn not_found(id: RequestId) -> ApiError {
    ApplicationError::from(WorkflowError::NotFound(id)).into()
}

pub async fn create_request(
    State(state): State<ApiState>,
    Caller(actor): Caller,
    payload: Result<Json<NewPurchaseRequest>, JsonRejection>,
) -> Result<Json<PurchaseRequest>, ApiError> {
    let Json(payload) = payload?;
    let created = state.requests.create(&actor, payload).await?;
    Ok(Json(created))
}

/// Listing does not require an identity.
pub async fn list_requests(
    State(state): State<ApiState>,
    Query(query): Query<RequestListQuery>,
) -> Result<Json<Vec<PurchaseRequest>>, ApiError> {
    let filter = RequestFilter {
        user_id: query.user_id.map(UserId),
        supervisor_id: query.supervisor_id.map(UserId),
    };
    let requests = state.requests.list(filter, Page::new(query.skip, query.limit)).await?;
    Ok(Json(requests))
}

pub async fn get_request(
    State(state): State<ApiState>,
    Caller(_actor): Caller,
    Path(id): Path<i64>,
) -> Result<Json<PurchaseRequest>, ApiError> {
    let id = RequestId(id);
    let request = state.requests.find_by_id(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(request))
}

pub async fn update_request(
    State(state): State<ApiState>,
    Caller(_actor): Caller,
    Path(id): Path<i64>,
    payload: Result<Json<RequestPatch>, JsonRejection>,
) -> Result<Json<PurchaseRequest>, ApiError> {
    let Json(patch) = payload?;
    let id = RequestId(id);
    let request = state.requests.update(id, patch).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(request))
}

pub async fn delete_request(
    State(state): State<ApiState>,
    Caller(_actor): Caller,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = RequestId(id);
    if !state.requests.delete(id).await? {
        return Err(not_found(id));
    }
    Ok(Json(DeleteResponse { message: "Request deleted successfully" }))
}

/// Supervisor decision. Existence is checked before the caller's capability.
pub async fn change_status(
    State(state): State<ApiState>,
    Caller(actor): Caller,
    Path(id): Path<i64>,
    payload: Result<Json<StatusChange>, JsonRejection>,
) -> Result<Json<PurchaseRequest>, ApiError> {
    let Json(change) = payload?;
    let updated = state.requests.change_status(RequestId(id), &actor, change).await?;
    Ok(Json(updated))
}
