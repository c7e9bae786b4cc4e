pub mod config;
pub mod domain;
pub mod errors;
pub mod workflow;

pub use domain::audit::{AuditAction, AuditEntry, AuditEntryId, NewAuditEntry};
pub use domain::request::{
    CommentId, NewPurchaseRequest, NewRequestComment, PurchaseRequest, RequestComment, RequestId,
    RequestPatch, RequestStatus,
};
pub use domain::user::{actor_has_capability, Actor, NewUser, Role, RoleId, User, UserId, UserRole};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use workflow::{
    ApprovalWorkflow, MissingCommentReason, StatusChange, TransitionPlan, WorkflowError,
    WorkflowPolicy,
};
