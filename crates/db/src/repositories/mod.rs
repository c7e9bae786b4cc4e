use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use thiserror::Error;

use purchasing_core::domain::audit::AuditEntry;
use purchasing_core::domain::request::{
    NewPurchaseRequest, PurchaseRequest, RequestId, RequestPatch,
};
use purchasing_core::domain::user::{Actor, NewUser, Role, RoleId, User, UserId};
use purchasing_core::errors::{ApplicationError, DomainError};
use purchasing_core::workflow::{StatusChange, WorkflowError};

pub mod audit;
pub mod request;
pub mod user;

pub use audit::SqlAuditRepository;
pub use request::SqlRequestRepository;
pub use user::SqlUserRepository;

pub const DEFAULT_PAGE_LIMIT: u32 = 100;
pub const MAX_PAGE_LIMIT: u32 = 1000;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Validation(#[from] DomainError),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Workflow(error) => Self::Workflow(error),
            RepositoryError::Validation(error) => Self::Domain(error),
            RepositoryError::Database(sqlx::Error::Database(db_error))
                if db_error.is_foreign_key_violation()
                    || db_error.is_check_violation()
                    || db_error.is_unique_violation() =>
            {
                Self::Domain(DomainError::InvariantViolation(db_error.message().to_string()))
            }
            RepositoryError::Database(error) => Self::Persistence(error.to_string()),
            RepositoryError::Decode(message) => Self::Persistence(message),
        }
    }
}

/// Offset pagination. `limit` is always within `1..=MAX_PAGE_LIMIT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub skip: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(skip: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            skip: skip.unwrap_or(0),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub user_id: Option<UserId>,
    pub supervisor_id: Option<UserId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub request_id: Option<RequestId>,
    pub user_id: Option<UserId>,
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: RequestId) -> Result<Option<PurchaseRequest>, RepositoryError>;

    async fn list(
        &self,
        filter: RequestFilter,
        page: Page,
    ) -> Result<Vec<PurchaseRequest>, RepositoryError>;

    /// Inserts a pending request owned by `actor` together with its `create`
    /// audit entry.
    async fn create(
        &self,
        actor: &Actor,
        payload: NewPurchaseRequest,
    ) -> Result<PurchaseRequest, RepositoryError>;

    /// Generic field update. Returns `None` when the request does not exist.
    async fn update(
        &self,
        id: RequestId,
        patch: RequestPatch,
    ) -> Result<Option<PurchaseRequest>, RepositoryError>;

    /// Removes the request with its comments and audit entries. Returns
    /// whether a row was deleted.
    async fn delete(&self, id: RequestId) -> Result<bool, RepositoryError>;

    /// Runs the approval workflow and persists its outcome atomically.
    async fn change_status(
        &self,
        id: RequestId,
        actor: &Actor,
        change: StatusChange,
    ) -> Result<PurchaseRequest, RepositoryError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn list(&self, filter: AuditFilter, page: Page)
        -> Result<Vec<AuditEntry>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, RepositoryError>;
    async fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Role, RepositoryError>;
    async fn roles_for(&self, user_id: UserId) -> Result<Vec<Role>, RepositoryError>;
    async fn attach_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), RepositoryError>;
    async fn detach_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool, RepositoryError>;

    /// Identity and role names for an active user; `None` for unknown or
    /// inactive users.
    async fn resolve_actor(&self, user_id: UserId) -> Result<Option<Actor>, RepositoryError>;
}

/// Fixed-width UTC timestamps so that lexical order matches time order.
pub(crate) fn encode_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn encode_date(value: &NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub(crate) fn decode_date(column: &str, raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn decode_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}
