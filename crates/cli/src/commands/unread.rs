use gigbook_core::domain::party::PartyId;
use gigbook_core::domain::project::ProjectId;
use gigbook_core::domain::proposal::{ProposalId, ProposalStatus};
use gigbook_core::errors::ApplicationError;
use gigbook_engine::ProposalSummary;
use serde::Serialize;

use crate::commands::{run_with_app, CommandResult};

#[derive(Debug, Serialize)]
struct UnreadLine {
    proposal_id: ProposalId,
    project_id: ProjectId,
    status: ProposalStatus,
    unread: usize,
}

#[derive(Debug, Serialize)]
struct UnreadReport {
    viewer: PartyId,
    total: usize,
    inbox: Vec<UnreadLine>,
    outbox: Vec<UnreadLine>,
}

fn line(summary: ProposalSummary) -> UnreadLine {
    UnreadLine {
        proposal_id: summary.proposal.id,
        project_id: summary.proposal.project_id,
        status: summary.proposal.status,
        unread: summary.unread,
    }
}

pub fn run(viewer: &str) -> CommandResult {
    let viewer = PartyId::new(viewer.trim());

    run_with_app("unread", "unread activity counted", |app, _correlation_id| async move {
        let negotiation = &app.engine.negotiation;
        let total = negotiation.unread_badge(&viewer).await?;
        let inbox = negotiation.inbox(&viewer).await?.into_iter().map(line).collect();
        let outbox = negotiation.outbox(&viewer).await?.into_iter().map(line).collect();
        Ok::<_, ApplicationError>(UnreadReport { viewer, total, inbox, outbox })
    })
}
