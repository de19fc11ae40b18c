//! Planning half of inviting performers: who may invite, who is excluded,
//! and what each cloned project looks like. The engine performs the writes.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coordination::{invalid, ProjectAction};
use crate::domain::party::PartyId;
use crate::domain::project::{Project, ProjectId, ProjectStatus};
use crate::domain::proposal::{Proposal, ProposalId};
use crate::errors::{AuthorizationFailure, DomainError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteTerms {
    pub fee: Option<i64>,
    pub role: Option<String>,
    pub message: Option<String>,
}

impl InviteTerms {
    pub fn validate(&self) -> Result<(), DomainError> {
        match self.fee {
            Some(fee) if fee < 0 => Err(DomainError::InvalidAmount(fee)),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutMode {
    /// One new derived project per performer, each with a single proposal.
    CloneFromBrief,
    /// Extra proposals on an existing derived project.
    AddToProject,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutInvite {
    pub performer_id: PartyId,
    pub project_id: ProjectId,
    pub proposal_id: ProposalId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutFailure {
    pub performer_id: PartyId,
    pub reason: String,
}

/// Some invitations committed and some did not. Committed ones stay.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("fan-out partially failed: {} created, {} failed", .succeeded.len(), .failed.len())]
pub struct PartialFanoutFailure {
    pub succeeded: Vec<FanoutInvite>,
    pub failed: Vec<FanoutFailure>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FanoutPlan {
    pub mode: FanoutMode,
    pub invite: Vec<PartyId>,
    pub excluded: Vec<PartyId>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FanoutPlanner;

impl FanoutPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Briefs take invites from their owner. Once a derived project has a PM,
    /// only that PM recruits; before that the owner does.
    pub fn authorize(&self, project: &Project, actor: &PartyId) -> Result<FanoutMode, DomainError> {
        if project.status.confirmation().is_closed() {
            return Err(invalid(project, ProjectAction::Invite));
        }

        let (mode, allowed, reason) = match &project.pm_performer_id {
            _ if project.is_brief() => {
                (FanoutMode::CloneFromBrief, &project.owner_id == actor, AuthorizationFailure::OwnerOnly)
            }
            Some(pm) => (FanoutMode::AddToProject, pm == actor, AuthorizationFailure::PmOnly),
            None => {
                (FanoutMode::AddToProject, &project.owner_id == actor, AuthorizationFailure::OwnerOnly)
            }
        };

        if allowed {
            Ok(mode)
        } else {
            Err(DomainError::unauthorized(actor, ProjectAction::Invite, reason))
        }
    }

    /// Everyone who already holds a proposal of any status in `proposals`,
    /// which for a brief must span the brief and all of its clones.
    pub fn exclusion_set(&self, proposals: &[Proposal]) -> BTreeSet<PartyId> {
        proposals.iter().map(|proposal| proposal.performer_id.clone()).collect()
    }

    pub fn plan(
        &self,
        mode: FanoutMode,
        sender: &PartyId,
        requested: &[PartyId],
        exclusions: &BTreeSet<PartyId>,
    ) -> FanoutPlan {
        let mut seen = BTreeSet::new();
        let mut invite = Vec::new();
        let mut excluded = Vec::new();

        for performer in requested {
            if !seen.insert(performer.clone()) {
                continue;
            }
            if performer == sender || exclusions.contains(performer) {
                excluded.push(performer.clone());
            } else {
                invite.push(performer.clone());
            }
        }

        FanoutPlan { mode, invite, excluded }
    }

    /// Derived project for one performer. The performer is PM from the start
    /// since the clone exists for exactly one candidate.
    pub fn clone_for(&self, brief: &Project, performer_id: &PartyId, now: DateTime<Utc>) -> Project {
        Project {
            id: ProjectId::generate(),
            owner_id: brief.owner_id.clone(),
            client_company_ref: brief.client_company_ref.clone(),
            pm_performer_id: Some(performer_id.clone()),
            parent_project_id: Some(brief.id.clone()),
            title: brief.title.clone(),
            category: brief.category.clone(),
            description: brief.description.clone(),
            visibility: brief.visibility,
            start_date: brief.start_date,
            end_date: brief.end_date,
            schedule: brief.schedule.clone(),
            status: ProjectStatus::negotiating(),
            legacy_status: None,
            budget: None,
            contract_amount: None,
            created_at: now,
        }
    }

    pub fn proposal_for(
        &self,
        project: &Project,
        performer_id: &PartyId,
        sender: &PartyId,
        terms: &InviteTerms,
        now: DateTime<Utc>,
    ) -> Proposal {
        Proposal::new_pending(
            project.id.clone(),
            performer_id.clone(),
            sender.clone(),
            terms.fee,
            terms.role.clone(),
            terms.message.clone(),
            now,
        )
    }
}
