//! Approval workflow for purchase requests.
//!
//! A supervisor moves a pending request to a decision (`aprobado` or
//! `rechazado`). Validation runs in a fixed order and the first failure wins:
//!
//! 1. the request exists (checked by the store that owns the lookup),
//! 2. the actor holds the `supervisor` capability,
//! 3. the target status is a decision value,
//! 4. a comment is present when the request is being rejected or its amount
//!    is above the configured threshold.
//!
//! A successful check yields a [`TransitionPlan`] that the store persists as
//! one unit: the optional comment, the `status_change` audit entry and the
//! status update.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::audit::{AuditAction, NewAuditEntry};
use crate::domain::request::{
    check_length, NewRequestComment, PurchaseRequest, RequestId, RequestStatus, COMMENT_MAX_CHARS,
};
use crate::domain::user::{actor_has_capability, Actor, UserId, SUPERVISOR};
use crate::errors::DomainError;

pub const DEFAULT_COMMENT_AMOUNT_THRESHOLD: Decimal = Decimal::from_parts(500, 0, 0, false, 0);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowPolicy {
    /// Amounts strictly above this value need a comment on any decision.
    pub comment_amount_threshold: Decimal,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self { comment_amount_threshold: DEFAULT_COMMENT_AMOUNT_THRESHOLD }
    }
}

/// Body of a status change call. Unknown fields are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: String,
    #[serde(default)]
    pub comment: Option<String>,
}

impl StatusChange {
    pub fn new(status: impl Into<String>, comment: Option<&str>) -> Self {
        Self { status: status.into(), comment: comment.map(ToString::to_string) }
    }

    /// The supplied comment, or `None` when it is absent or empty. Any other
    /// text, whitespace included, is kept verbatim.
    pub fn effective_comment(&self) -> Option<&str> {
        self.comment.as_deref().filter(|comment| !comment.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MissingCommentReason {
    Rejected,
    HighAmount { threshold: Decimal },
}

impl std::fmt::Display for MissingCommentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected => f.write_str("comment is required when rejecting a request"),
            Self::HighAmount { threshold } => {
                write!(f, "comment is required for requests with amount greater than {threshold}")
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("request {0} not found")]
    NotFound(RequestId),
    #[error("user {actor} lacks the `{capability}` capability")]
    Forbidden { actor: UserId, capability: &'static str },
    #[error("status must be either 'aprobado' or 'rechazado' (got `{requested}`)")]
    InvalidTransition { requested: String },
    #[error("{0}")]
    MissingComment(MissingCommentReason),
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("request {0} was modified concurrently; reload and retry")]
    Conflict(RequestId),
}

/// Everything needed to persist one accepted status change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionPlan {
    pub request_id: RequestId,
    pub expected_version: i64,
    pub previous_status: RequestStatus,
    pub new_status: RequestStatus,
    pub comment: Option<String>,
    pub actor_id: UserId,
    pub decided_at: DateTime<Utc>,
}

impl TransitionPlan {
    pub fn audit_entry(&self) -> NewAuditEntry {
        NewAuditEntry {
            action: AuditAction::StatusChange,
            previous_status: Some(self.previous_status),
            new_status: Some(self.new_status),
            comment: self.comment.clone(),
            created_at: self.decided_at,
            request_id: self.request_id,
            user_id: self.actor_id,
        }
    }

    pub fn comment_record(&self) -> Option<NewRequestComment> {
        self.comment.as_ref().map(|comment| NewRequestComment {
            comment: comment.clone(),
            created_at: self.decided_at,
            request_id: self.request_id,
            user_id: self.actor_id,
        })
    }

    /// Applies the status change to an in-memory copy of the request. Only
    /// status, `updated_at` and the version counter change.
    pub fn apply(&self, request: &mut PurchaseRequest) {
        request.status = self.new_status;
        request.touch(self.decided_at);
        request.version = self.expected_version + 1;
    }
}

#[derive(Clone, Debug, Default)]
pub struct ApprovalWorkflow {
    policy: WorkflowPolicy,
}

impl ApprovalWorkflow {
    pub fn new(policy: WorkflowPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &WorkflowPolicy {
        &self.policy
    }

    pub fn plan(
        &self,
        request: &PurchaseRequest,
        actor: &Actor,
        change: &StatusChange,
    ) -> Result<TransitionPlan, WorkflowError> {
        if !actor_has_capability(actor, SUPERVISOR) {
            return Err(WorkflowError::Forbidden { actor: actor.user_id, capability: SUPERVISOR });
        }

        let new_status = change
            .status
            .parse::<RequestStatus>()
            .ok()
            .filter(RequestStatus::is_decision)
            .ok_or_else(|| WorkflowError::InvalidTransition { requested: change.status.clone() })?;

        let comment = change.effective_comment();
        if comment.is_none() {
            if let Some(reason) = self.comment_requirement(request, new_status) {
                return Err(WorkflowError::MissingComment(reason));
            }
        }
        if let Some(comment) = comment {
            check_length("comment", comment, COMMENT_MAX_CHARS)?;
        }

        Ok(TransitionPlan {
            request_id: request.id,
            expected_version: request.version,
            previous_status: request.status,
            new_status,
            comment: comment.map(ToString::to_string),
            actor_id: actor.user_id,
            decided_at: Utc::now(),
        })
    }

    /// Why a comment is needed for this decision, if it is. Rejection takes
    /// priority over the amount rule.
    pub fn comment_requirement(
        &self,
        request: &PurchaseRequest,
        new_status: RequestStatus,
    ) -> Option<MissingCommentReason> {
        if new_status == RequestStatus::Rejected {
            return Some(MissingCommentReason::Rejected);
        }
        if request.amount > self.policy.comment_amount_threshold {
            return Some(MissingCommentReason::HighAmount {
                threshold: self.policy.comment_amount_threshold,
            });
        }
        None
    }

    /// Supervisors creating a request are assigned as its supervisor.
    pub fn supervisor_for(&self, actor: &Actor) -> Option<UserId> {
        actor.is_supervisor().then_some(actor.user_id)
    }

    pub fn creation_audit(&self, request: &PurchaseRequest, actor: &Actor) -> NewAuditEntry {
        NewAuditEntry {
            action: AuditAction::Create,
            previous_status: None,
            new_status: Some(request.status),
            comment: None,
            created_at: request.created_at,
            request_id: request.id,
            user_id: actor.user_id,
        }
    }
}
