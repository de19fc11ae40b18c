use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use gigbook_core::domain::party::PartyId;
use gigbook_core::domain::project::{Project, ProjectId};
use gigbook_core::errors::{ApplicationError, DomainError};
use gigbook_core::events::EngagementEvent;
use gigbook_core::fanout::{
    FanoutFailure, FanoutInvite, FanoutMode, FanoutPlanner, InviteTerms, PartialFanoutFailure,
};

use crate::context::{EngineContext, RequestContext};

/// Per-performer outcome of one invite request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub mode: FanoutMode,
    pub invited: Vec<FanoutInvite>,
    pub excluded: Vec<PartyId>,
    pub failed: Vec<FanoutFailure>,
}

impl FanoutReport {
    /// Projects that received a new proposal, in invite order. For a brief
    /// these are the freshly cloned derived projects.
    pub fn project_ids(&self) -> Vec<ProjectId> {
        self.invited.iter().map(|invite| invite.project_id.clone()).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turns any per-performer failure into `PartialFanout`, which still
    /// carries every invite that was created.
    pub fn into_result(self) -> Result<Self, ApplicationError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(PartialFanoutFailure { succeeded: self.invited, failed: self.failed }.into())
        }
    }
}

#[derive(Clone)]
pub struct FanoutService {
    context: EngineContext,
    planner: FanoutPlanner,
}

impl FanoutService {
    pub fn new(context: EngineContext) -> Self {
        Self { context, planner: FanoutPlanner::new() }
    }

    /// Clones a brief once per performer, or adds proposals to an existing
    /// derived project. Each invite commits on its own; a failure part way
    /// through leaves earlier invites in place and is listed in the report.
    pub async fn invite(
        &self,
        request: &RequestContext,
        project_id: &ProjectId,
        performers: &[PartyId],
        terms: &InviteTerms,
    ) -> Result<FanoutReport, ApplicationError> {
        if performers.is_empty() {
            return Err(DomainError::InvariantViolation(
                "an invite needs at least one performer".to_owned(),
            )
            .into());
        }
        terms.validate()?;

        let project = self
            .context
            .projects
            .find_by_id(project_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("project", project_id))?;
        let mode = self.planner.authorize(&project, &request.actor)?;
        let exclusions = self.engaged_performers(&project, mode).await?;
        let plan = self.planner.plan(mode, &request.actor, performers, &exclusions);

        let mut report =
            FanoutReport { mode, invited: Vec::new(), excluded: plan.excluded, failed: Vec::new() };

        for performer_id in plan.invite {
            // Another invite may have landed since the plan was made.
            match self.engaged_performers(&project, mode).await {
                Ok(engaged) if engaged.contains(&performer_id) => {
                    report.excluded.push(performer_id);
                    continue;
                }
                Ok(_) => {}
                Err(error) => {
                    report.failed.push(self.failure(request, &project, performer_id, &error));
                    continue;
                }
            }

            match self.create_invite(request, &project, mode, &performer_id, terms).await {
                Ok(invite) => {
                    self.context.events.emit(EngagementEvent::ProposalCreated {
                        proposal_id: invite.proposal_id.clone(),
                    });
                    report.invited.push(invite);
                }
                Err(error) => {
                    report.failed.push(self.failure(request, &project, performer_id, &error));
                }
            }
        }

        info!(
            event_name = "fanout.invite.completed",
            correlation_id = %request.correlation_id,
            project_id = %project.id,
            mode = ?mode,
            invited = report.invited.len(),
            excluded = report.excluded.len(),
            failed = report.failed.len(),
            "invite request processed"
        );
        Ok(report)
    }

    /// Brief-only form: returns the derived project ids, or `PartialFanout`
    /// when some performers could not be invited.
    pub async fn fanout(
        &self,
        request: &RequestContext,
        brief_id: &ProjectId,
        performers: &[PartyId],
        terms: &InviteTerms,
    ) -> Result<Vec<ProjectId>, ApplicationError> {
        let report = self.invite(request, brief_id, performers, terms).await?.into_result()?;
        Ok(report.project_ids())
    }

    /// Everyone already holding a proposal of any status on the casting call:
    /// the brief and all its clones, or the single derived project.
    async fn engaged_performers(
        &self,
        project: &Project,
        mode: FanoutMode,
    ) -> Result<BTreeSet<PartyId>, ApplicationError> {
        let proposals = match mode {
            FanoutMode::CloneFromBrief => {
                let mut scope = vec![project.id.clone()];
                scope.extend(
                    self.context
                        .projects
                        .list_by_parent(&project.id)
                        .await?
                        .into_iter()
                        .map(|derived| derived.id),
                );
                self.context.proposals.list_by_projects(&scope).await?
            }
            FanoutMode::AddToProject => self.context.proposals.list_by_project(&project.id).await?,
        };
        Ok(self.planner.exclusion_set(&proposals))
    }

    async fn create_invite(
        &self,
        request: &RequestContext,
        project: &Project,
        mode: FanoutMode,
        performer_id: &PartyId,
        terms: &InviteTerms,
    ) -> Result<FanoutInvite, ApplicationError> {
        let now = Utc::now();
        let target = match mode {
            FanoutMode::CloneFromBrief => {
                let derived = self.planner.clone_for(project, performer_id, now);
                self.context.projects.insert(derived.clone()).await?;
                derived
            }
            FanoutMode::AddToProject => project.clone(),
        };

        let proposal = self.planner.proposal_for(&target, performer_id, &request.actor, terms, now);
        let proposal_id = proposal.id.clone();
        self.context.proposals.insert(proposal).await?;

        Ok(FanoutInvite { performer_id: performer_id.clone(), project_id: target.id, proposal_id })
    }

    fn failure(
        &self,
        request: &RequestContext,
        project: &Project,
        performer_id: PartyId,
        error: &ApplicationError,
    ) -> FanoutFailure {
        warn!(
            event_name = "fanout.invite.failed",
            correlation_id = %request.correlation_id,
            project_id = %project.id,
            performer_id = %performer_id,
            error = %error,
            "invite could not be created"
        );
        FanoutFailure { performer_id, reason: error.to_string() }
    }
}
