use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use tracing::{info, warn};

use purchasing_core::domain::request::{
    CommentId, NewPurchaseRequest, NewRequestComment, PurchaseRequest, RequestComment, RequestId,
    RequestPatch, RequestStatus,
};
use purchasing_core::domain::user::{Actor, UserId};
use purchasing_core::workflow::{ApprovalWorkflow, StatusChange, TransitionPlan, WorkflowError};

use super::audit::insert_entry;
use super::{
    decode_date, decode_error, decode_timestamp, encode_date, encode_timestamp, Page,
    RepositoryError, RequestFilter, RequestRepository,
};
use crate::DbPool;

const REQUEST_COLUMNS: &str = "id, title, description, status, amount, expected_date, \
                               created_at, updated_at, user_id, supervisor_id, version";

pub struct SqlRequestRepository {
    pool: DbPool,
    workflow: ApprovalWorkflow,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool, workflow: ApprovalWorkflow) -> Self {
        Self { pool, workflow }
    }

    pub fn workflow(&self) -> &ApprovalWorkflow {
        &self.workflow
    }
}

fn row_to_request(row: &SqliteRow) -> Result<PurchaseRequest, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let title: Option<String> = row.try_get("title").map_err(decode_error)?;
    let description: String = row.try_get("description").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let amount: String = row.try_get("amount").map_err(decode_error)?;
    let expected_date: Option<String> = row.try_get("expected_date").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;
    let user_id: i64 = row.try_get("user_id").map_err(decode_error)?;
    let supervisor_id: Option<i64> = row.try_get("supervisor_id").map_err(decode_error)?;
    let version: i64 = row.try_get("version").map_err(decode_error)?;

    Ok(PurchaseRequest {
        id: RequestId(id),
        title,
        description,
        status: status
            .parse::<RequestStatus>()
            .map_err(|error| RepositoryError::Decode(format!("status: {error}")))?,
        amount: amount
            .parse::<Decimal>()
            .map_err(|error| RepositoryError::Decode(format!("amount: {error}")))?,
        expected_date: expected_date
            .as_deref()
            .map(|raw| decode_date("expected_date", raw))
            .transpose()?,
        created_at: decode_timestamp("created_at", &created_at)?,
        updated_at: decode_timestamp("updated_at", &updated_at)?,
        user_id: UserId(user_id),
        supervisor_id: supervisor_id.map(UserId),
        version,
        comments: Vec::new(),
    })
}

fn row_to_comment(row: &SqliteRow) -> Result<RequestComment, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let comment: String = row.try_get("comment").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let request_id: i64 = row.try_get("request_id").map_err(decode_error)?;
    let user_id: i64 = row.try_get("user_id").map_err(decode_error)?;

    Ok(RequestComment {
        id: CommentId(id),
        comment,
        created_at: decode_timestamp("created_at", &created_at)?,
        request_id: RequestId(request_id),
        user_id: UserId(user_id),
    })
}

async fn fetch_request(
    conn: &mut SqliteConnection,
    id: RequestId,
) -> Result<Option<PurchaseRequest>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?"))
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(row_to_request).transpose()
}

async fn load_comments(
    conn: &mut SqliteConnection,
    ids: &[RequestId],
) -> Result<HashMap<RequestId, Vec<RequestComment>>, RepositoryError> {
    let mut grouped: HashMap<RequestId, Vec<RequestComment>> = HashMap::new();
    if ids.is_empty() {
        return Ok(grouped);
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT id, comment, created_at, request_id, user_id
         FROM comment_requests
         WHERE request_id IN (",
    );
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id.0);
    }
    separated.push_unseparated(") ORDER BY created_at ASC, id ASC");

    let rows = query.build().fetch_all(&mut *conn).await?;
    for row in &rows {
        let comment = row_to_comment(row)?;
        grouped.entry(comment.request_id).or_default().push(comment);
    }
    Ok(grouped)
}

async fn attach_comments(
    conn: &mut SqliteConnection,
    request: &mut PurchaseRequest,
) -> Result<(), RepositoryError> {
    let mut grouped = load_comments(conn, &[request.id]).await?;
    request.comments = grouped.remove(&request.id).unwrap_or_default();
    Ok(())
}

async fn insert_comment(
    conn: &mut SqliteConnection,
    comment: &NewRequestComment,
) -> Result<CommentId, RepositoryError> {
    let result = sqlx::query(
        "INSERT INTO comment_requests (comment, created_at, request_id, user_id)
         VALUES (?, ?, ?, ?)",
    )
    .bind(&comment.comment)
    .bind(encode_timestamp(&comment.created_at))
    .bind(comment.request_id.0)
    .bind(comment.user_id.0)
    .execute(&mut *conn)
    .await?;

    Ok(CommentId(result.last_insert_rowid()))
}

/// Writes the comment, the audit entry and the guarded status update of an
/// accepted transition. The update only lands when the stored version still
/// matches the one the plan was built from.
pub(crate) async fn persist_transition(
    conn: &mut SqliteConnection,
    plan: &TransitionPlan,
) -> Result<(), RepositoryError> {
    if let Some(comment) = plan.comment_record() {
        insert_comment(conn, &comment).await?;
    }
    insert_entry(conn, &plan.audit_entry()).await?;

    let result = sqlx::query(
        "UPDATE requests
         SET status = ?, updated_at = MAX(?, created_at), version = version + 1
         WHERE id = ? AND version = ?",
    )
    .bind(plan.new_status.as_str())
    .bind(encode_timestamp(&plan.decided_at))
    .bind(plan.request_id.0)
    .bind(plan.expected_version)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(WorkflowError::Conflict(plan.request_id).into());
    }
    Ok(())
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(&self, id: RequestId) -> Result<Option<PurchaseRequest>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let Some(mut request) = fetch_request(&mut conn, id).await? else {
            return Ok(None);
        };
        attach_comments(&mut conn, &mut request).await?;
        Ok(Some(request))
    }

    async fn list(
        &self,
        filter: RequestFilter,
        page: Page,
    ) -> Result<Vec<PurchaseRequest>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE 1=1"
        ));
        if let Some(user_id) = filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id.0);
        }
        if let Some(supervisor_id) = filter.supervisor_id {
            query.push(" AND supervisor_id = ").push_bind(supervisor_id.0);
        }
        query
            .push(" ORDER BY id ASC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(page.skip));

        let rows = query.build().fetch_all(&mut *conn).await?;
        let mut requests = rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<RequestId> = requests.iter().map(|request| request.id).collect();
        let mut comments = load_comments(&mut conn, &ids).await?;
        for request in &mut requests {
            request.comments = comments.remove(&request.id).unwrap_or_default();
        }
        Ok(requests)
    }

    async fn create(
        &self,
        actor: &Actor,
        payload: NewPurchaseRequest,
    ) -> Result<PurchaseRequest, RepositoryError> {
        payload.validate()?;

        let now = Utc::now();
        let stamp = encode_timestamp(&now);
        let supervisor_id = self.workflow.supervisor_for(actor);

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO requests
                 (title, description, status, amount, expected_date, created_at, updated_at,
                  user_id, supervisor_id, version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(payload.title.as_deref())
        .bind(&payload.description)
        .bind(RequestStatus::Pending.as_str())
        .bind(payload.amount.to_string())
        .bind(payload.expected_date.as_ref().map(encode_date))
        .bind(&stamp)
        .bind(&stamp)
        .bind(actor.user_id.0)
        .bind(supervisor_id.map(|id| id.0))
        .execute(&mut *tx)
        .await?;

        let request = PurchaseRequest {
            id: RequestId(result.last_insert_rowid()),
            title: payload.title,
            description: payload.description,
            status: RequestStatus::Pending,
            amount: payload.amount,
            expected_date: payload.expected_date,
            created_at: now,
            updated_at: now,
            user_id: actor.user_id,
            supervisor_id,
            version: 1,
            comments: Vec::new(),
        };
        insert_entry(&mut tx, &self.workflow.creation_audit(&request, actor)).await?;
        tx.commit().await?;

        info!(
            event_name = "request.created",
            request_id = %request.id,
            user_id = %actor.user_id,
            supervisor_assigned = supervisor_id.is_some(),
            "purchase request created"
        );
        Ok(request)
    }

    async fn update(
        &self,
        id: RequestId,
        patch: RequestPatch,
    ) -> Result<Option<PurchaseRequest>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut request) = fetch_request(&mut tx, id).await? else {
            return Ok(None);
        };
        let expected_version = request.version;
        let previous_status = request.status;

        patch.apply_to(&mut request, Utc::now())?;

        let result = sqlx::query(
            "UPDATE requests
             SET title = ?, description = ?, status = ?, amount = ?, expected_date = ?,
                 updated_at = ?, supervisor_id = ?, version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(request.title.as_deref())
        .bind(&request.description)
        .bind(request.status.as_str())
        .bind(request.amount.to_string())
        .bind(request.expected_date.as_ref().map(encode_date))
        .bind(encode_timestamp(&request.updated_at))
        .bind(request.supervisor_id.map(|id| id.0))
        .bind(id.0)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WorkflowError::Conflict(id).into());
        }
        request.version = expected_version + 1;
        attach_comments(&mut tx, &mut request).await?;
        tx.commit().await?;

        if patch.overrides_workflow() {
            warn!(
                event_name = "request.update.override",
                request_id = %id,
                previous_status = %previous_status,
                new_status = %request.status,
                supervisor_id = ?request.supervisor_id.map(|id| id.0),
                "generic update changed workflow-owned fields without an audit entry"
            );
        } else {
            info!(event_name = "request.updated", request_id = %id, "purchase request updated");
        }
        Ok(Some(request))
    }

    async fn delete(&self, id: RequestId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM requests WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(event_name = "request.deleted", request_id = %id, "purchase request deleted");
        }
        Ok(deleted)
    }

    async fn change_status(
        &self,
        id: RequestId,
        actor: &Actor,
        change: StatusChange,
    ) -> Result<PurchaseRequest, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut request = fetch_request(&mut tx, id).await?.ok_or(WorkflowError::NotFound(id))?;

        let plan = self.workflow.plan(&request, actor, &change)?;
        if let Err(error) = persist_transition(&mut tx, &plan).await {
            warn!(
                event_name = "request.status.persist_failed",
                request_id = %id,
                actor_id = %actor.user_id,
                error = %error,
                "status change rolled back"
            );
            return Err(error);
        }

        plan.apply(&mut request);
        attach_comments(&mut tx, &mut request).await?;
        tx.commit().await?;

        info!(
            event_name = "request.status.changed",
            request_id = %id,
            actor_id = %actor.user_id,
            previous_status = %plan.previous_status,
            new_status = %plan.new_status,
            commented = plan.comment.is_some(),
            "purchase request status changed"
        );
        Ok(request)
    }
}
