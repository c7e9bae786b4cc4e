use rust_decimal::Decimal;
use thiserror::Error;

use crate::workflow::WorkflowError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("`{field}` must be at most {max_chars} characters")]
    FieldTooLong { field: &'static str, max_chars: usize },
    #[error("`{0}` is required")]
    MissingField(&'static str),
    #[error("amount must not be negative (got {0})")]
    NegativeAmount(Decimal),
    #[error("unknown request status `{0}` (expected pendiente|aprobado|rechazado)")]
    UnknownStatus(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("authentication required: {0}")]
    Unauthenticated(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Unauthorized { .. } => "Caller identity could not be established.",
            Self::Forbidden { .. } => "The caller is not allowed to perform this operation.",
            Self::NotFound { .. } => "The requested resource does not exist.",
            Self::Conflict { .. } => {
                "The resource was modified by another operation. Reload and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::Unauthorized { message, .. }
            | Self::Forbidden { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Unauthorized { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Unauthorized { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::Workflow(error) => match error {
                WorkflowError::NotFound(_) => {
                    Self::NotFound { message: error.to_string(), correlation_id }
                }
                WorkflowError::Forbidden { .. } => {
                    Self::Forbidden { message: error.to_string(), correlation_id }
                }
                WorkflowError::Conflict(_) => {
                    Self::Conflict { message: error.to_string(), correlation_id }
                }
                WorkflowError::InvalidTransition { .. }
                | WorkflowError::MissingComment(_)
                | WorkflowError::Invalid(_) => {
                    Self::BadRequest { message: error.to_string(), correlation_id }
                }
            },
            ApplicationError::NotFound(message) => Self::NotFound { message, correlation_id },
            ApplicationError::Unauthenticated(message) => {
                Self::Unauthorized { message, correlation_id }
            }
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::request::RequestId;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::workflow::{MissingCommentReason, WorkflowError};

    #[test]
    fn domain_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::MissingField("description"))
            .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(interface.message(), "`description` is required");
    }

    #[test]
    fn missing_comment_keeps_its_specific_message() {
        let interface = ApplicationError::from(WorkflowError::MissingComment(
            MissingCommentReason::HighAmount { threshold: Decimal::new(500, 0) },
        ))
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
        assert_eq!(
            interface.message(),
            "comment is required for requests with amount greater than 500"
        );
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn workflow_not_found_and_conflict_map_to_distinct_classes() {
        let missing =
            ApplicationError::from(WorkflowError::NotFound(RequestId(9))).into_interface("req-3");
        assert!(matches!(missing, InterfaceError::NotFound { .. }));

        let conflict =
            ApplicationError::from(WorkflowError::Conflict(RequestId(9))).into_interface("req-4");
        assert!(matches!(conflict, InterfaceError::Conflict { .. }));
        assert_eq!(conflict.correlation_id(), "req-4");
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::Configuration("invalid api prefix".to_owned())
            .into_interface("req-6");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
