use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use purchasing_core::domain::audit::AuditEntry;
use purchasing_core::domain::request::RequestId;
use purchasing_core::domain::user::{UserId, SUPERVISOR};
use purchasing_db::repositories::{AuditFilter, Page};

use super::error::ApiError;
use super::identity::Caller;
use super::state::ApiState;

#[derive(Debug, Default, Deserialize)]
pub struct AuditListQuery {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub request_id: Option<i64>,
    pub user_id: Option<i64>,
}

pub async fn list_audit(
    State(state): State<ApiState>,
    caller: Caller,
    Query(query): Query<AuditListQuery>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    caller.require(SUPERVISOR)?;

    let filter = AuditFilter {
        request_id: query.request_id.map(RequestId),
        user_id: query.user_id.map(UserId),
    };
    let entries = state.audit.list(filter, Page::new(query.skip, query.limit)).await?;
    Ok(Json(entries))
}
