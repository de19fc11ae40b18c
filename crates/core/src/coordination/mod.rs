//! The single writer of project status. Explicit owner/PM actions and the
//! aftermath of proposal transitions both go through here so the two status
//! axes never drift apart.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::party::PartyId;
use crate::domain::project::{
    ConfirmationStatus, LegacyProjectStatus, ProgressStatus, Project, ProjectId, ProjectStatus,
};
use crate::domain::proposal::{Proposal, ProposalStatus};
use crate::errors::{AuthorizationFailure, DomainError};
use crate::events::EngagementEvent;
use crate::negotiation::machine::ClosedAs;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectAction {
    Confirm,
    Decline,
    Cancel,
    Complete,
    StartProgress,
    ApplyAcceptance,
    ApplyClosure,
    AssignPm,
    Invite,
}

impl ProjectAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Decline => "decline",
            Self::Cancel => "cancel",
            Self::Complete => "complete",
            Self::StartProgress => "start_progress",
            Self::ApplyAcceptance => "apply_acceptance",
            Self::ApplyClosure => "apply_closure",
            Self::AssignPm => "assign_pm",
            Self::Invite => "invite",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "confirm" => Some(Self::Confirm),
            "decline" => Some(Self::Decline),
            "cancel" => Some(Self::Cancel),
            "complete" => Some(Self::Complete),
            "start_progress" | "start" => Some(Self::StartProgress),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one coordinator call. `from == to` with no PM or legacy change
/// means the call was a no-op and nothing needs persisting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusChange {
    pub project_id: ProjectId,
    pub from: ProjectStatus,
    pub to: ProjectStatus,
    pub action: ProjectAction,
    pub pm_assigned: Option<PartyId>,
    pub legacy_reconciled: Option<LegacyProjectStatus>,
}

impl StatusChange {
    fn unchanged(project: &Project, action: ProjectAction) -> Self {
        Self {
            project_id: project.id.clone(),
            from: project.status,
            to: project.status,
            action,
            pm_assigned: None,
            legacy_reconciled: None,
        }
    }

    pub fn status_changed(&self) -> bool {
        self.from != self.to
    }

    pub fn is_noop(&self) -> bool {
        !self.status_changed() && self.pm_assigned.is_none() && self.legacy_reconciled.is_none()
    }

    pub fn events(&self) -> Vec<EngagementEvent> {
        if self.status_changed() {
            vec![EngagementEvent::ProjectStatusChanged { project_id: self.project_id.clone() }]
        } else {
            Vec::new()
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectStatusCoordinator;

impl ProjectStatusCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Owner or PM driven status change. Repeating an action that already
    /// holds is a no-op rather than an error.
    pub fn apply_action(
        &self,
        project: &mut Project,
        actor: &PartyId,
        action: ProjectAction,
    ) -> Result<StatusChange, DomainError> {
        use ConfirmationStatus as C;
        use ProgressStatus as P;

        let is_owner = &project.owner_id == actor;
        let is_pm = project.is_pm(actor);
        let permitted = match action {
            ProjectAction::Confirm | ProjectAction::Decline | ProjectAction::Cancel => is_owner,
            ProjectAction::Complete | ProjectAction::StartProgress => is_owner || is_pm,
            ProjectAction::ApplyAcceptance
            | ProjectAction::ApplyClosure
            | ProjectAction::AssignPm
            | ProjectAction::Invite => {
                return Err(DomainError::InvariantViolation(format!(
                    "`{action}` is not an explicit project action"
                )))
            }
        };
        if !permitted {
            let reason = match action {
                ProjectAction::Complete | ProjectAction::StartProgress => AuthorizationFailure::OwnerOrPm,
                _ => AuthorizationFailure::OwnerOnly,
            };
            return Err(DomainError::unauthorized(actor, action, reason));
        }

        let current = project.status;
        let (confirmation, progress) = (current.confirmation(), current.progress());
        let target = match (action, confirmation) {
            (ProjectAction::Confirm, C::Confirmed) => None,
            (ProjectAction::Confirm, C::Negotiating) => {
                let progress = if progress == P::Idle { P::Recruiting } else { progress };
                Some((C::Confirmed, progress))
            }
            (ProjectAction::Decline, C::Declined) => None,
            (ProjectAction::Decline, C::Negotiating | C::Confirmed) => {
                Some((C::Declined, P::Cancelled))
            }
            (ProjectAction::Cancel, C::Cancelled) => None,
            (ProjectAction::Cancel, C::Negotiating | C::Confirmed) => {
                Some((C::Cancelled, P::Cancelled))
            }
            (ProjectAction::Complete, C::Completed) => None,
            (ProjectAction::Complete, C::Negotiating | C::Confirmed) => {
                Some((C::Completed, P::Completed))
            }
            (ProjectAction::StartProgress, C::Confirmed) => match progress {
                P::InProgress => None,
                P::Idle | P::Recruiting => Some((C::Confirmed, P::InProgress)),
                P::Completed | P::Cancelled => return Err(invalid(project, action)),
            },
            _ => return Err(invalid(project, action)),
        };

        let mut change = StatusChange::unchanged(project, action);
        if let Some((confirmation, progress)) = target {
            project.status.set(&project.id, confirmation, progress)?;
            change.to = project.status;
        }
        Ok(change)
    }

    /// Aftermath of a committed accept: first acceptance names the PM, and a
    /// project still negotiating becomes confirmed and starts recruiting.
    pub fn on_proposal_accepted(
        &self,
        project: &mut Project,
        performer_id: &PartyId,
    ) -> Result<StatusChange, DomainError> {
        let mut change = StatusChange::unchanged(project, ProjectAction::ApplyAcceptance);

        if project.pm_performer_id.is_none() {
            project.pm_performer_id = Some(performer_id.clone());
            change.pm_assigned = Some(performer_id.clone());
        }

        if project.status.confirmation() == ConfirmationStatus::Negotiating {
            project.status.set(
                &project.id,
                ConfirmationStatus::Confirmed,
                ProgressStatus::Recruiting,
            )?;
            change.to = project.status;
        }

        if project.status.progress() == ProgressStatus::Recruiting
            && project.legacy_status == Some(LegacyProjectStatus::Recruiting)
        {
            project.legacy_status = Some(LegacyProjectStatus::Active);
            change.legacy_reconciled = Some(LegacyProjectStatus::Active);
        }

        Ok(change)
    }

    /// Aftermath of a committed decline or cancel. `proposals` must be a fresh
    /// read of every proposal on the project, including the one just closed.
    pub fn on_proposal_closed(
        &self,
        project: &mut Project,
        closed_as: ClosedAs,
        proposals: &[Proposal],
    ) -> Result<StatusChange, DomainError> {
        let mut change = StatusChange::unchanged(project, ProjectAction::ApplyClosure);

        if project.status.confirmation() != ConfirmationStatus::Negotiating {
            return Ok(change);
        }
        let any_active = proposals
            .iter()
            .filter(|proposal| proposal.project_id == project.id)
            .any(|proposal| proposal.status.is_active());
        if any_active {
            return Ok(change);
        }

        let confirmation = match closed_as {
            ClosedAs::Declined => ConfirmationStatus::Declined,
            ClosedAs::Cancelled => ConfirmationStatus::Cancelled,
        };
        project.status.set(&project.id, confirmation, ProgressStatus::Cancelled)?;
        change.to = project.status;
        Ok(change)
    }

    /// Manual PM pick by the owner. Only a performer holding an accepted
    /// proposal on the project qualifies, and an existing PM is never replaced.
    pub fn assign_pm(
        &self,
        project: &mut Project,
        actor: &PartyId,
        performer_id: &PartyId,
        proposals: &[Proposal],
    ) -> Result<StatusChange, DomainError> {
        if &project.owner_id != actor {
            return Err(DomainError::unauthorized(
                actor,
                ProjectAction::AssignPm,
                AuthorizationFailure::OwnerOnly,
            ));
        }
        if let Some(pm) = &project.pm_performer_id {
            return Err(DomainError::PmAlreadyAssigned {
                project_id: project.id.clone(),
                pm: pm.clone(),
            });
        }
        let eligible = proposals.iter().any(|proposal| {
            proposal.project_id == project.id
                && &proposal.performer_id == performer_id
                && proposal.status == ProposalStatus::Accepted
        });
        if !eligible {
            return Err(DomainError::NotEligibleForPm {
                project_id: project.id.clone(),
                performer: performer_id.clone(),
            });
        }

        let mut change = StatusChange::unchanged(project, ProjectAction::AssignPm);
        project.pm_performer_id = Some(performer_id.clone());
        change.pm_assigned = Some(performer_id.clone());
        Ok(change)
    }
}

/// Re-validates a project read from anywhere other than this module.
pub fn check_invariant(project: &Project) -> Result<(), DomainError> {
    ProjectStatus::from_parts(
        &project.id,
        project.status.confirmation(),
        project.status.progress(),
    )
    .map(|_| ())
}

pub(crate) fn invalid(project: &Project, action: ProjectAction) -> DomainError {
    DomainError::InvalidProjectTransition {
        project_id: project.id.clone(),
        from: project.status.to_string(),
        action,
    }
}
