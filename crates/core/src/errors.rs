use thiserror::Error;

use crate::coordination::ProjectAction;
use crate::domain::party::PartyId;
use crate::domain::project::ProjectId;
use crate::domain::proposal::{ProposalId, ProposalStatus};
use crate::fanout::PartialFanoutFailure;
use crate::negotiation::machine::ProposalAction;

/// Why an actor was refused. Kept separate from the action so the caller can
/// phrase "not yours" differently from "not your turn".
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum AuthorizationFailure {
    #[error("actor is neither the sender nor the performer")]
    NotAParty,
    #[error("the sender cannot accept their own proposal")]
    SenderCannotAccept,
    #[error("only the sender may do this")]
    SenderOnly,
    #[error("only the project owner may do this")]
    OwnerOnly,
    #[error("only the project PM may do this")]
    PmOnly,
    #[error("only the project owner or PM may do this")]
    OwnerOrPm,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("proposal {proposal_id} is already {status} and accepts no further events")]
    AlreadyTerminal { proposal_id: ProposalId, status: ProposalStatus },
    #[error("project {project_id} cannot {action} while {from}")]
    InvalidProjectTransition { project_id: ProjectId, from: String, action: ProjectAction },
    #[error("{actor} may not {action}: {reason}")]
    Unauthorized { actor: PartyId, action: String, reason: AuthorizationFailure },
    #[error("project {project_id} is in an inconsistent state: {detail}")]
    InconsistentProjectState { project_id: ProjectId, detail: String },
    #[error("amount must be a non-negative integer, got {0}")]
    InvalidAmount(i64),
    #[error("project {project_id} already has PM {pm}")]
    PmAlreadyAssigned { project_id: ProjectId, pm: PartyId },
    #[error("{performer} holds no accepted proposal on project {project_id}")]
    NotEligibleForPm { project_id: ProjectId, performer: PartyId },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn unauthorized(
        actor: &PartyId,
        action: impl Into<String>,
        reason: AuthorizationFailure,
    ) -> Self {
        Self::Unauthorized { actor: actor.clone(), action: action.into(), reason }
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::AlreadyTerminal { .. } | Self::InvalidProjectTransition { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

impl From<ProposalAction> for String {
    fn from(value: ProposalAction) -> Self {
        value.as_str().to_owned()
    }
}

impl From<ProjectAction> for String {
    fn from(value: ProjectAction) -> Self {
        value.as_str().to_owned()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    PartialFanout(#[from] PartialFanoutFailure),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictKind {
    AlreadyTerminal,
    InvalidTransition,
    AlreadyAssigned,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("conflict: {message}")]
    Conflict { kind: ConflictKind, message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("partially applied: {message}")]
    PartiallyApplied { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Conflict { kind: ConflictKind::AlreadyTerminal, .. } => {
                "This proposal is already closed and can no longer change."
            }
            Self::Conflict { kind: ConflictKind::InvalidTransition, .. } => {
                "That action is not available in the project's current state."
            }
            Self::Conflict { kind: ConflictKind::AlreadyAssigned, .. } => {
                "A PM is already assigned to this project."
            }
            Self::Forbidden { .. } => "You are not the party who can take this action.",
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::PartiallyApplied { .. } => {
                "Some invitations were sent and others failed. Review the list and retry the rest."
            }
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Conflict { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::PartiallyApplied { correlation_id, .. }
            | Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => "conflict",
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::PartiallyApplied { .. } => "partially_applied",
            Self::BadRequest { .. } => "bad_request",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Internal { .. } => "internal",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::PartiallyApplied { correlation_id: id, .. }
            | InterfaceError::BadRequest { correlation_id: id, .. }
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
                let message = error.to_string();
                match error {
                    DomainError::AlreadyTerminal { .. } => {
                        Self::Conflict { kind: ConflictKind::AlreadyTerminal, message, correlation_id }
                    }
                    DomainError::InvalidProjectTransition { .. } => Self::Conflict {
                        kind: ConflictKind::InvalidTransition,
                        message,
                        correlation_id,
                    },
                    DomainError::PmAlreadyAssigned { .. } => {
                        Self::Conflict { kind: ConflictKind::AlreadyAssigned, message, correlation_id }
                    }
                    DomainError::Unauthorized { .. } => Self::Forbidden { message, correlation_id },
                    DomainError::InconsistentProjectState { .. } => {
                        Self::Internal { message, correlation_id }
                    }
                    DomainError::InvalidAmount(_)
                    | DomainError::NotEligibleForPm { .. }
                    | DomainError::InvariantViolation(_) => {
                        Self::BadRequest { message, correlation_id }
                    }
                }
            }
            ApplicationError::NotFound { .. } => {
                Self::NotFound { message: value.to_string(), correlation_id }
            }
            ApplicationError::PartialFanout(failure) => {
                Self::PartiallyApplied { message: failure.to_string(), correlation_id }
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
    use crate::coordination::ProjectAction;
    use crate::domain::party::PartyId;
    use crate::domain::project::ProjectId;
    use crate::domain::proposal::{ProposalId, ProposalStatus};
    use crate::errors::{
        ApplicationError, AuthorizationFailure, ConflictKind, DomainError, InterfaceError,
    };
    use crate::fanout::{FanoutFailure, PartialFanoutFailure};

    #[test]
    fn already_terminal_and_wrong_party_get_distinct_messages() {
        let terminal = ApplicationError::from(DomainError::AlreadyTerminal {
            proposal_id: ProposalId("prp-1".to_owned()),
            status: ProposalStatus::Accepted,
        })
        .into_interface("req-1");
        let forbidden = ApplicationError::from(DomainError::unauthorized(
            &PartyId::new("owner-1"),
            "accept",
            AuthorizationFailure::SenderCannotAccept,
        ))
        .into_interface("req-2");

        assert!(matches!(
            terminal,
            InterfaceError::Conflict { kind: ConflictKind::AlreadyTerminal, ref correlation_id, .. }
                if correlation_id == "req-1"
        ));
        assert!(matches!(forbidden, InterfaceError::Forbidden { .. }));
        assert_ne!(terminal.user_message(), forbidden.user_message());
        assert_eq!(forbidden.correlation_id(), "req-2");
    }

    #[test]
    fn project_transition_counts_as_invalid_transition() {
        let error = DomainError::InvalidProjectTransition {
            project_id: ProjectId("prj-1".to_owned()),
            from: "cancelled/cancelled".to_owned(),
            action: ProjectAction::Confirm,
        };

        assert!(error.is_invalid_transition());
        assert!(!error.is_unauthorized());
        assert_eq!(error.to_string(), "project prj-1 cannot confirm while cancelled/cancelled");
    }

    #[test]
    fn partial_fanout_maps_to_partially_applied() {
        let failure = PartialFanoutFailure {
            succeeded: Vec::new(),
            failed: vec![FanoutFailure {
                performer_id: PartyId::new("dancer-b"),
                reason: "database is locked".to_owned(),
            }],
        };
        let interface = ApplicationError::from(failure).into_interface("req-3");

        assert_eq!(interface.class(), "partially_applied");
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn inconsistent_state_is_surfaced_as_internal() {
        let interface = ApplicationError::from(DomainError::InconsistentProjectState {
            project_id: ProjectId("prj-9".to_owned()),
            detail: "progress `recruiting` requires confirmation `confirmed`".to_owned(),
        })
        .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
    }

    #[test]
    fn not_found_names_the_entity() {
        let error = ApplicationError::not_found("proposal", "prp-404");
        assert_eq!(error.to_string(), "proposal `prp-404` was not found");
    }
}
