use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use purchasing_core::domain::audit::{AuditEntry, AuditEntryId, NewAuditEntry};
use purchasing_core::domain::request::{RequestId, RequestStatus};
use purchasing_core::domain::user::UserId;

use super::{
    decode_error, decode_timestamp, encode_timestamp, AuditFilter, AuditRepository, Page,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlAuditRepository {
    pool: DbPool,
}

impl SqlAuditRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Appends one audit row on the caller's connection or transaction.
pub(crate) async fn insert_entry(
    conn: &mut SqliteConnection,
    entry: &NewAuditEntry,
) -> Result<AuditEntryId, RepositoryError> {
    let result = sqlx::query(
        "INSERT INTO audit_requests
             (action, previous_status, new_status, comment, created_at, request_id, user_id)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.action.as_str())
    .bind(entry.previous_status.map(|status| status.as_str()))
    .bind(entry.new_status.map(|status| status.as_str()))
    .bind(entry.comment.as_deref())
    .bind(encode_timestamp(&entry.created_at))
    .bind(entry.request_id.0)
    .bind(entry.user_id.0)
    .execute(&mut *conn)
    .await?;

    Ok(AuditEntryId(result.last_insert_rowid()))
}

fn parse_optional_status(
    column: &str,
    raw: Option<String>,
) -> Result<Option<RequestStatus>, RepositoryError> {
    raw.map(|value| {
        value
            .parse::<RequestStatus>()
            .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
    })
    .transpose()
}

fn row_to_entry(row: &SqliteRow) -> Result<AuditEntry, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let action: String = row.try_get("action").map_err(decode_error)?;
    let previous_status: Option<String> = row.try_get("previous_status").map_err(decode_error)?;
    let new_status: Option<String> = row.try_get("new_status").map_err(decode_error)?;
    let comment: Option<String> = row.try_get("comment").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let request_id: i64 = row.try_get("request_id").map_err(decode_error)?;
    let user_id: i64 = row.try_get("user_id").map_err(decode_error)?;

    Ok(AuditEntry {
        id: AuditEntryId(id),
        action: action
            .parse()
            .map_err(|error| RepositoryError::Decode(format!("action: {error}")))?,
        previous_status: parse_optional_status("previous_status", previous_status)?,
        new_status: parse_optional_status("new_status", new_status)?,
        comment,
        created_at: decode_timestamp("created_at", &created_at)?,
        request_id: RequestId(request_id),
        user_id: UserId(user_id),
    })
}

#[async_trait::async_trait]
impl AuditRepository for SqlAuditRepository {
    async fn list(
        &self,
        filter: AuditFilter,
        page: Page,
    ) -> Result<Vec<AuditEntry>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, action, previous_status, new_status, comment, created_at, request_id, user_id
             FROM audit_requests
             WHERE 1=1",
        );
        if let Some(request_id) = filter.request_id {
            query.push(" AND request_id = ").push_bind(request_id.0);
        }
        if let Some(user_id) = filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id.0);
        }
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(page.skip));

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use purchasing_core::domain::audit::{AuditAction, NewAuditEntry};
    use purchasing_core::domain::request::{RequestId, RequestStatus};
    use purchasing_core::domain::user::{NewUser, UserId};

    use super::{insert_entry, SqlAuditRepository};
    use crate::repositories::{AuditFilter, AuditRepository, Page, SqlUserRepository, UserRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_user(pool: &sqlx::SqlitePool, email: &str) -> UserId {
        SqlUserRepository::new(pool.clone())
            .create_user(NewUser { email: email.to_string(), full_name: "Test".to_string() })
            .await
            .expect("insert user")
            .id
    }

    /// Bare request row so the audit foreign key is satisfied.
    async fn insert_request(pool: &sqlx::SqlitePool, owner: UserId) -> RequestId {
        let now = crate::repositories::encode_timestamp(&Utc::now());
        let result = sqlx::query(
            "INSERT INTO requests (description, status, amount, created_at, updated_at, user_id)
             VALUES ('seed', 'pendiente', '10', ?, ?, ?)",
        )
        .bind(&now)
        .bind(&now)
        .bind(owner.0)
        .execute(pool)
        .await
        .expect("insert request");
        RequestId(result.last_insert_rowid())
    }

    fn entry(request_id: RequestId, user_id: UserId, minutes_ago: i64) -> NewAuditEntry {
        NewAuditEntry {
            action: AuditAction::StatusChange,
            previous_status: Some(RequestStatus::Pending),
            new_status: Some(RequestStatus::Approved),
            comment: Some(format!("decided {minutes_ago} minutes ago")),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            request_id,
            user_id,
        }
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_filters() {
        let pool = setup().await;
        let owner = insert_user(&pool, "owner@example.com").await;
        let supervisor = insert_user(&pool, "boss@example.com").await;
        let first = insert_request(&pool, owner).await;
        let second = insert_request(&pool, owner).await;

        let mut conn = pool.acquire().await.expect("acquire");
        insert_entry(&mut conn, &entry(first, supervisor, 30)).await.expect("insert 1");
        insert_entry(&mut conn, &entry(first, supervisor, 5)).await.expect("insert 2");
        insert_entry(&mut conn, &entry(second, owner, 10)).await.expect("insert 3");
        drop(conn);

        let repo = SqlAuditRepository::new(pool);

        let all = repo.list(AuditFilter::default(), Page::default()).await.expect("list all");
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));
        assert_eq!(all[0].comment.as_deref(), Some("decided 5 minutes ago"));

        let for_first = repo
            .list(AuditFilter { request_id: Some(first), ..AuditFilter::default() }, Page::default())
            .await
            .expect("list by request");
        assert_eq!(for_first.len(), 2);
        assert!(for_first.iter().all(|entry| entry.request_id == first));

        let by_owner = repo
            .list(AuditFilter { user_id: Some(owner), ..AuditFilter::default() }, Page::default())
            .await
            .expect("list by user");
        assert_eq!(by_owner.len(), 1);
        assert_eq!(by_owner[0].request_id, second);
    }

    #[tokio::test]
    async fn list_paginates_with_skip_and_limit() {
        let pool = setup().await;
        let owner = insert_user(&pool, "owner@example.com").await;
        let request = insert_request(&pool, owner).await;

        let mut conn = pool.acquire().await.expect("acquire");
        for minutes_ago in [40, 30, 20, 10] {
            insert_entry(&mut conn, &entry(request, owner, minutes_ago)).await.expect("insert");
        }
        drop(conn);

        let repo = SqlAuditRepository::new(pool);
        let page = repo
            .list(AuditFilter::default(), Page::new(Some(1), Some(2)))
            .await
            .expect("paged list");

        let comments: Vec<_> = page.iter().filter_map(|entry| entry.comment.clone()).collect();
        assert_eq!(comments, vec!["decided 20 minutes ago", "decided 30 minutes ago"]);
    }
}
