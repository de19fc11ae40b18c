use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use gigbook_core::coordination::StatusChange;
use gigbook_core::domain::party::PartyId;
use gigbook_core::domain::proposal::{Proposal, ProposalId};
use gigbook_core::errors::ApplicationError;
use gigbook_core::negotiation::{
    mark_read, unread_count, FollowUp, ProposalCommand, ProposalStateMachine, ProposalTransition,
};

use crate::context::{EngineContext, RequestContext, MAX_WRITE_ATTEMPTS};
use crate::status::ProjectStatusService;

/// What a committed proposal command produced. `project_change` is `None`
/// when the command has no project follow-up or the follow-up failed (the
/// failure is logged; the proposal change stands).
#[derive(Clone, Debug)]
pub struct NegotiationOutcome {
    pub proposal: Proposal,
    pub transition: ProposalTransition,
    pub project_change: Option<StatusChange>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProposalSummary {
    pub proposal: Proposal,
    pub unread: usize,
}

#[derive(Clone)]
pub struct NegotiationService {
    context: EngineContext,
    machine: ProposalStateMachine,
    status: ProjectStatusService,
}

impl NegotiationService {
    pub fn new(context: EngineContext) -> Self {
        let status = ProjectStatusService::new(context.clone());
        Self { context, machine: ProposalStateMachine::new(), status }
    }

    pub async fn find(&self, proposal_id: &ProposalId) -> Result<Proposal, ApplicationError> {
        self.context
            .proposals
            .find_by_id(proposal_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("proposal", proposal_id))
    }

    pub async fn send_message(
        &self,
        request: &RequestContext,
        proposal_id: &ProposalId,
        text: impl Into<String>,
    ) -> Result<NegotiationOutcome, ApplicationError> {
        self.execute(request, proposal_id, ProposalCommand::SendMessage { text: text.into() }).await
    }

    pub async fn send_offer(
        &self,
        request: &RequestContext,
        proposal_id: &ProposalId,
        fee: i64,
        text: impl Into<String>,
    ) -> Result<NegotiationOutcome, ApplicationError> {
        self.execute(request, proposal_id, ProposalCommand::SendOffer { fee, text: text.into() })
            .await
    }

    pub async fn accept(
        &self,
        request: &RequestContext,
        proposal_id: &ProposalId,
    ) -> Result<NegotiationOutcome, ApplicationError> {
        self.execute(request, proposal_id, ProposalCommand::Accept).await
    }

    pub async fn decline(
        &self,
        request: &RequestContext,
        proposal_id: &ProposalId,
        reason: Option<String>,
    ) -> Result<NegotiationOutcome, ApplicationError> {
        self.execute(request, proposal_id, ProposalCommand::Decline { reason }).await
    }

    pub async fn cancel(
        &self,
        request: &RequestContext,
        proposal_id: &ProposalId,
        reason: Option<String>,
    ) -> Result<NegotiationOutcome, ApplicationError> {
        self.execute(request, proposal_id, ProposalCommand::Cancel { reason }).await
    }

    /// Read-modify-write of one proposal row. Rule violations are rejected
    /// before any write; a write that loses a race is re-read and re-checked,
    /// so a proposal closed concurrently surfaces as already terminal.
    async fn execute(
        &self,
        request: &RequestContext,
        proposal_id: &ProposalId,
        command: ProposalCommand,
    ) -> Result<NegotiationOutcome, ApplicationError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut proposal = self.find(proposal_id).await?;
            let expected = proposal.status;
            let transition =
                self.machine.apply(&mut proposal, &request.actor, command.clone(), Utc::now())?;

            if !self
                .context
                .proposals
                .record_transition(&proposal, expected, &transition.appended)
                .await?
            {
                debug!(
                    event_name = "negotiation.proposal.write_conflict",
                    correlation_id = %request.correlation_id,
                    proposal_id = %proposal_id,
                    "proposal changed underneath; retrying"
                );
                continue;
            }

            info!(
                event_name = "negotiation.proposal.transitioned",
                correlation_id = %request.correlation_id,
                proposal_id = %proposal_id,
                project_id = %proposal.project_id,
                action = %transition.action,
                from = %transition.from,
                to = %transition.to,
                actor_side = transition.actor_side.as_str(),
                "proposal command committed"
            );
            self.context.emit_all(transition.events());

            let project_change = self.cascade(request, &proposal, &transition).await;
            return Ok(NegotiationOutcome { proposal, transition, project_change });
        }

        Err(ApplicationError::Persistence(format!(
            "proposal {proposal_id} kept changing during the update; retry the request"
        )))
    }

    /// Runs after the proposal row is durable. Failures here are reported in
    /// the log and never roll back the committed proposal change.
    async fn cascade(
        &self,
        request: &RequestContext,
        proposal: &Proposal,
        transition: &ProposalTransition,
    ) -> Option<StatusChange> {
        let result = match &transition.follow_up {
            None => return None,
            Some(FollowUp::ProjectAccepted { performer_id }) => {
                self.status.on_proposal_accepted(request, &proposal.project_id, performer_id).await
            }
            Some(FollowUp::ProjectClosed { closed_as }) => {
                self.status.on_proposal_closed(request, &proposal.project_id, *closed_as).await
            }
        };

        match result {
            Ok(change) => Some(change),
            Err(error) => {
                warn!(
                    event_name = "negotiation.cascade.failed",
                    correlation_id = %request.correlation_id,
                    proposal_id = %proposal.id,
                    project_id = %proposal.project_id,
                    error = %error,
                    "project follow-up failed after the proposal committed"
                );
                None
            }
        }
    }

    /// Marks the proposal read for the requesting party and returns it with
    /// the refreshed marker. Idempotent.
    pub async fn mark_read(
        &self,
        request: &RequestContext,
        proposal_id: &ProposalId,
    ) -> Result<Proposal, ApplicationError> {
        let mut proposal = self.find(proposal_id).await?;
        let marker = mark_read(&mut proposal, &request.actor, Utc::now())?;
        if let Some(side) = proposal.side_of(&request.actor) {
            self.context.proposals.record_read(proposal_id, side, marker).await?;
        }
        Ok(proposal)
    }

    pub async fn unread(
        &self,
        request: &RequestContext,
        proposal_id: &ProposalId,
    ) -> Result<usize, ApplicationError> {
        let proposal = self.find(proposal_id).await?;
        Ok(unread_count(&proposal, &request.actor))
    }

    /// Proposals addressed to the viewer, newest first.
    pub async fn inbox(&self, viewer: &PartyId) -> Result<Vec<ProposalSummary>, ApplicationError> {
        let proposals = self.context.proposals.list_by_performer(viewer).await?;
        Ok(summarize(proposals, viewer))
    }

    /// Proposals the viewer sent, newest first.
    pub async fn outbox(&self, viewer: &PartyId) -> Result<Vec<ProposalSummary>, ApplicationError> {
        let proposals = self.context.proposals.list_by_sender(viewer).await?;
        Ok(summarize(proposals, viewer))
    }

    /// Badge total across inbox and outbox. A proposal that shows up in both
    /// lists is counted once.
    pub async fn unread_badge(&self, viewer: &PartyId) -> Result<usize, ApplicationError> {
        let inbox = self.inbox(viewer).await?;
        let outbox = self.outbox(viewer).await?;

        let mut seen = BTreeSet::new();
        Ok(inbox
            .iter()
            .chain(outbox.iter())
            .filter(|summary| seen.insert(summary.proposal.id.clone()))
            .map(|summary| summary.unread)
            .sum())
    }
}

fn summarize(proposals: Vec<Proposal>, viewer: &PartyId) -> Vec<ProposalSummary> {
    proposals
        .into_iter()
        .map(|proposal| {
            let unread = unread_count(&proposal, viewer);
            ProposalSummary { proposal, unread }
        })
        .collect()
}
