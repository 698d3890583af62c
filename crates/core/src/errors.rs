use thiserror::Error;

use crate::chain::ApprovalRole;
use crate::domain::record::{RecordId, RecordStatus};
use crate::store::StoreError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("record `{record_id}` cannot be changed in status {status:?} at step {step:?}")]
    InvalidState { record_id: RecordId, status: RecordStatus, step: Option<ApprovalRole> },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("`{actor}` is not allowed to act on record `{record_id}`: {reason}")]
    Unauthorized { record_id: RecordId, actor: String, reason: String },
    #[error("record `{record_id}` was changed concurrently: {detail}")]
    Conflict { record_id: RecordId, detail: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { entity, id } => WorkflowError::NotFound { entity, id }.into(),
            StoreError::Conflict { record_id, detail } => {
                WorkflowError::Conflict { record_id, detail }.into()
            }
            StoreError::Backend(message) => Self::Persistence(message),
        }
    }
}

impl ApplicationError {
    /// Stable machine-readable class, used by the CLI payload and in logs.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Workflow(WorkflowError::NotFound { .. }) => "not_found",
            Self::Workflow(WorkflowError::InvalidState { .. }) => "invalid_state",
            Self::Workflow(WorkflowError::Validation(_)) => "validation",
            Self::Workflow(WorkflowError::Unauthorized { .. }) => "unauthorized",
            Self::Workflow(WorkflowError::Conflict { .. }) => "conflict",
            Self::Persistence(_) => "persistence",
            Self::Configuration(_) => "configuration",
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
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
            Self::NotFound { .. } => "The record could not be found. It may have been removed.",
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not the approver for the current step.",
            Self::Conflict { .. } => {
                "This record was already updated by someone else. Refresh and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Workflow(error) => {
                let message = error.to_string();
                match error {
                    WorkflowError::NotFound { .. } => Self::NotFound { message, correlation_id },
                    WorkflowError::InvalidState { .. } | WorkflowError::Validation(_) => {
                        Self::BadRequest { message, correlation_id }
                    }
                    WorkflowError::Unauthorized { .. } => {
                        Self::Forbidden { message, correlation_id }
                    }
                    WorkflowError::Conflict { .. } => Self::Conflict { message, correlation_id },
                }
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
    use crate::domain::record::{RecordId, RecordStatus};
    use crate::errors::{ApplicationError, InterfaceError, WorkflowError};
    use crate::store::StoreError;

    #[test]
    fn conflict_maps_to_refresh_hint() {
        let interface = ApplicationError::from(WorkflowError::Conflict {
            record_id: RecordId("BT-1".to_owned()),
            detail: "step `staff_ga` was already approved".to_owned(),
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::Conflict { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "This record was already updated by someone else. Refresh and try again."
        );
    }

    #[test]
    fn invalid_state_and_validation_are_bad_requests() {
        let invalid = ApplicationError::from(WorkflowError::InvalidState {
            record_id: RecordId("BT-1".to_owned()),
            status: RecordStatus::Rejected,
            step: None,
        })
        .into_interface("req-2");
        let validation =
            ApplicationError::from(WorkflowError::Validation("missing reason".to_owned()))
                .into_interface("req-3");

        assert!(matches!(invalid, InterfaceError::BadRequest { .. }));
        assert!(matches!(validation, InterfaceError::BadRequest { .. }));
    }

    #[test]
    fn store_errors_fold_into_workflow_kinds() {
        let not_found = ApplicationError::from(StoreError::NotFound {
            entity: "workflow record",
            id: "BT-404".to_owned(),
        });
        let conflict = ApplicationError::from(StoreError::Conflict {
            record_id: RecordId("BT-1".to_owned()),
            detail: "version 3 expected".to_owned(),
        });
        let backend = ApplicationError::from(StoreError::Backend("disk full".to_owned()));

        assert_eq!(not_found.class(), "not_found");
        assert_eq!(conflict.class(), "conflict");
        assert_eq!(backend.class(), "persistence");
        assert!(matches!(
            backend.into_interface("req-4"),
            InterfaceError::ServiceUnavailable { .. }
        ));
    }

    #[test]
    fn unauthorized_maps_to_forbidden() {
        let interface = ApplicationError::from(WorkflowError::Unauthorized {
            record_id: RecordId("BT-1".to_owned()),
            actor: "E-7".to_owned(),
            reason: "not the assigned hr_manager".to_owned(),
        })
        .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::Forbidden { .. }));
        assert_eq!(interface.user_message(), "You are not the approver for the current step.");
    }
}
