use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::project::ProjectId;
use crate::domain::proposal::{ProposalId, ProposalSide};

/// Notifications the engine publishes after a write commits. Delivery is
/// best-effort; a sink must never fail the transition that produced them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload", rename_all = "snake_case")]
pub enum EngagementEvent {
    ProposalCreated { proposal_id: ProposalId },
    ProposalAccepted { proposal_id: ProposalId },
    ProposalDeclined { proposal_id: ProposalId },
    /// `from_side` is the party that wrote; the other side gets notified.
    NegotiationMessage { proposal_id: ProposalId, from_side: ProposalSide },
    ProjectStatusChanged { project_id: ProjectId },
}

impl EngagementEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ProposalCreated { .. } => "proposal_created",
            Self::ProposalAccepted { .. } => "proposal_accepted",
            Self::ProposalDeclined { .. } => "proposal_declined",
            Self::NegotiationMessage { .. } => "negotiation_message",
            Self::ProjectStatusChanged { .. } => "project_status_changed",
        }
    }

    pub fn subject_id(&self) -> &str {
        match self {
            Self::ProposalCreated { proposal_id }
            | Self::ProposalAccepted { proposal_id }
            | Self::ProposalDeclined { proposal_id }
            | Self::NegotiationMessage { proposal_id, .. } => &proposal_id.0,
            Self::ProjectStatusChanged { project_id } => &project_id.0,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngagementEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<Vec<EngagementEvent>>>,
}

impl InMemoryEventSink {
    pub fn events(&self) -> Vec<EngagementEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn of_type(&self, event_type: &str) -> Vec<EngagementEvent> {
        self.events().into_iter().filter(|event| event.event_type() == event_type).collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn emit(&self, event: EngagementEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Writes each event to the log and nowhere else. Used when outbound
/// notifications are disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: EngagementEvent) {
        info!(
            event_name = "engagement.event.emitted",
            event_type = event.event_type(),
            subject_id = event.subject_id(),
            "engagement event emitted"
        );
    }
}
