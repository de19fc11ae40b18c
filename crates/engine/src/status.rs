//! Durable side of project status coordination. Every write of a project's
//! status axes or PM goes through here, guarded on the state it was computed
//! from.

use chrono::Utc;
use tracing::{debug, info, warn};

use gigbook_core::coordination::{ProjectAction, ProjectStatusCoordinator, StatusChange};
use gigbook_core::domain::career::CareerEntry;
use gigbook_core::domain::party::PartyId;
use gigbook_core::domain::project::{Project, ProjectId};
use gigbook_core::errors::{ApplicationError, DomainError};
use gigbook_core::negotiation::ClosedAs;

use crate::context::{EngineContext, RequestContext, MAX_WRITE_ATTEMPTS};

#[derive(Clone)]
pub struct ProjectStatusService {
    context: EngineContext,
    coordinator: ProjectStatusCoordinator,
}

impl ProjectStatusService {
    pub fn new(context: EngineContext) -> Self {
        Self { context, coordinator: ProjectStatusCoordinator::new() }
    }

    pub async fn find(&self, project_id: &ProjectId) -> Result<Project, ApplicationError> {
        self.context
            .projects
            .find_by_id(project_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("project", project_id))
    }

    /// Owner or PM driven confirm / decline / cancel / complete / start.
    pub async fn apply_action(
        &self,
        request: &RequestContext,
        project_id: &ProjectId,
        action: ProjectAction,
    ) -> Result<StatusChange, ApplicationError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut project = self.find(project_id).await?;
            let expected = project.status;
            let change = self.coordinator.apply_action(&mut project, &request.actor, action)?;

            if change.is_noop() || self.context.projects.save_status(&project, expected).await? {
                self.finish(request, &change);
                if action == ProjectAction::Complete && change.status_changed() {
                    self.record_completion_careers(request, &project).await;
                }
                return Ok(change);
            }
            debug!(
                event_name = "project.status.write_conflict",
                correlation_id = %request.correlation_id,
                project_id = %project_id,
                action = %action,
                "project status changed underneath; retrying"
            );
        }

        Err(contention(project_id))
    }

    /// Aftermath of a committed accept. The PM claim is a conditional write so
    /// that of two near-simultaneous accepts only one performer becomes PM.
    pub async fn on_proposal_accepted(
        &self,
        request: &RequestContext,
        project_id: &ProjectId,
        performer_id: &PartyId,
    ) -> Result<StatusChange, ApplicationError> {
        let mut claimed = None;
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut project = self.find(project_id).await?;
            let expected = project.status;
            let mut change = self.coordinator.on_proposal_accepted(&mut project, performer_id)?;

            if let Some(pm) = &change.pm_assigned {
                if !self.context.projects.assign_pm_if_unset(project_id, pm).await? {
                    info!(
                        event_name = "project.pm.assignment_lost",
                        correlation_id = %request.correlation_id,
                        project_id = %project_id,
                        performer_id = %pm,
                        "another acceptance claimed the PM slot first"
                    );
                    continue;
                }
                claimed = Some(pm.clone());
            }

            let axes_unchanged = !change.status_changed() && change.legacy_reconciled.is_none();
            if !axes_unchanged && !self.context.projects.save_status(&project, expected).await? {
                continue;
            }

            // A retry after our PM claim landed re-reads the project with the PM set.
            change.pm_assigned = change.pm_assigned.or(claimed);
            self.finish(request, &change);
            if project.is_pm(performer_id) {
                self.record_career(request, &project, performer_id).await;
            }
            return Ok(change);
        }

        Err(contention(project_id))
    }

    /// Aftermath of a committed decline or cancel. Re-reads every proposal on
    /// the project at evaluation time.
    pub async fn on_proposal_closed(
        &self,
        request: &RequestContext,
        project_id: &ProjectId,
        closed_as: ClosedAs,
    ) -> Result<StatusChange, ApplicationError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut project = self.find(project_id).await?;
            let expected = project.status;
            let proposals = self.context.proposals.list_by_project(project_id).await?;
            let change = self.coordinator.on_proposal_closed(&mut project, closed_as, &proposals)?;

            if change.is_noop() || self.context.projects.save_status(&project, expected).await? {
                self.finish(request, &change);
                return Ok(change);
            }
        }

        Err(contention(project_id))
    }

    /// Owner picks a PM by hand among performers holding an accepted proposal.
    pub async fn assign_pm(
        &self,
        request: &RequestContext,
        project_id: &ProjectId,
        performer_id: &PartyId,
    ) -> Result<StatusChange, ApplicationError> {
        let mut project = self.find(project_id).await?;
        let proposals = self.context.proposals.list_by_project(project_id).await?;
        let change =
            self.coordinator.assign_pm(&mut project, &request.actor, performer_id, &proposals)?;

        if !self.context.projects.assign_pm_if_unset(project_id, performer_id).await? {
            let current = self.find(project_id).await?;
            let pm = current.pm_performer_id.unwrap_or_else(|| performer_id.clone());
            return Err(DomainError::PmAlreadyAssigned { project_id: project_id.clone(), pm }.into());
        }

        self.finish(request, &change);
        self.record_career(request, &project, performer_id).await;
        Ok(change)
    }

    fn finish(&self, request: &RequestContext, change: &StatusChange) {
        if change.is_noop() {
            return;
        }
        info!(
            event_name = "project.status.applied",
            correlation_id = %request.correlation_id,
            project_id = %change.project_id,
            action = %change.action,
            from = %change.from,
            to = %change.to,
            pm_assigned = change.pm_assigned.as_ref().map(PartyId::as_str).unwrap_or("none"),
            "project status coordinated"
        );
        self.context.emit_all(change.events());
    }

    /// Best effort: a failed career write is logged and never undoes the
    /// acceptance or the PM assignment.
    async fn record_career(&self, request: &RequestContext, project: &Project, performer_id: &PartyId) {
        let entry = CareerEntry::for_pm(project, performer_id.clone(), Utc::now());
        match self.context.careers.insert_if_absent(entry).await {
            Ok(true) => info!(
                event_name = "career.entry.recorded",
                correlation_id = %request.correlation_id,
                project_id = %project.id,
                performer_id = %performer_id,
                "recorded PM career entry"
            ),
            Ok(false) => {}
            Err(error) => warn!(
                event_name = "career.entry.failed",
                correlation_id = %request.correlation_id,
                project_id = %project.id,
                performer_id = %performer_id,
                error = %error,
                "could not record PM career entry"
            ),
        }
    }

    /// Best effort, like the PM entry: every accepted performer gets a career
    /// line for the completed project unless they already have one.
    async fn record_completion_careers(&self, request: &RequestContext, project: &Project) {
        let proposals = match self.context.proposals.list_by_project(&project.id).await {
            Ok(proposals) => proposals,
            Err(error) => {
                warn!(
                    event_name = "career.completion.failed",
                    correlation_id = %request.correlation_id,
                    project_id = %project.id,
                    error = %error,
                    "could not load proposals for completion career entries"
                );
                return;
            }
        };

        let mut recorded = 0_usize;
        for entry in CareerEntry::for_completed_project(project, &proposals, Utc::now()) {
            let performer_id = entry.performer_id.clone();
            match self.context.careers.insert_if_absent(entry).await {
                Ok(true) => recorded += 1,
                Ok(false) => {}
                Err(error) => warn!(
                    event_name = "career.entry.failed",
                    correlation_id = %request.correlation_id,
                    project_id = %project.id,
                    performer_id = %performer_id,
                    error = %error,
                    "could not record completion career entry"
                ),
            }
        }

        info!(
            event_name = "career.completion.recorded",
            correlation_id = %request.correlation_id,
            project_id = %project.id,
            recorded,
            "recorded career entries for completed project"
        );
    }
}

fn contention(project_id: &ProjectId) -> ApplicationError {
    ApplicationError::Persistence(format!(
        "project {project_id} kept changing during the update; retry the request"
    ))
}
