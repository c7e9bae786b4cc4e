use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::{RequestId, RequestStatus};
use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditEntryId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    StatusChange,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::StatusChange => "status_change",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(Self::Create),
            "status_change" => Ok(Self::StatusChange),
            other => Err(DomainError::InvariantViolation(format!("unknown audit action `{other}`"))),
        }
    }
}

/// Append-only record of a creation or status change on a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub action: AuditAction,
    pub previous_status: Option<RequestStatus>,
    pub new_status: Option<RequestStatus>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub request_id: RequestId,
    pub user_id: UserId,
}

/// An audit entry that has not been assigned an id yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub previous_status: Option<RequestStatus>,
    pub new_status: Option<RequestStatus>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub request_id: RequestId,
    pub user_id: UserId,
}
