use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::party::PartyId;
use crate::domain::proposal::{
    NegotiationEntry, NegotiationEvent, Proposal, ProposalId, ProposalSide, ProposalStatus,
};
use crate::errors::{AuthorizationFailure, DomainError};
use crate::events::EngagementEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalAction {
    SendMessage,
    SendOffer,
    Accept,
    Decline,
    Cancel,
}

impl ProposalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendMessage => "send_message",
            Self::SendOffer => "send_offer",
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ProposalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProposalCommand {
    SendMessage { text: String },
    SendOffer { fee: i64, text: String },
    Accept,
    Decline { reason: Option<String> },
    Cancel { reason: Option<String> },
}

impl ProposalCommand {
    pub fn action(&self) -> ProposalAction {
        match self {
            Self::SendMessage { .. } => ProposalAction::SendMessage,
            Self::SendOffer { .. } => ProposalAction::SendOffer,
            Self::Accept => ProposalAction::Accept,
            Self::Decline { .. } => ProposalAction::Decline,
            Self::Cancel { .. } => ProposalAction::Cancel,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedAs {
    Declined,
    Cancelled,
}

/// Project-level work a committed transition hands to the status coordinator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FollowUp {
    ProjectAccepted { performer_id: PartyId },
    ProjectClosed { closed_as: ClosedAs },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposalTransition {
    pub proposal_id: ProposalId,
    pub from: ProposalStatus,
    pub to: ProposalStatus,
    pub action: ProposalAction,
    pub actor_side: ProposalSide,
    pub appended: NegotiationEvent,
    pub follow_up: Option<FollowUp>,
}

impl ProposalTransition {
    pub fn status_changed(&self) -> bool {
        self.from != self.to
    }

    /// Notifications owed once this transition is durable. Cancellation is an
    /// administrative withdrawal and notifies nobody.
    pub fn events(&self) -> Vec<EngagementEvent> {
        let proposal_id = self.proposal_id.clone();
        match self.action {
            ProposalAction::SendMessage | ProposalAction::SendOffer => {
                vec![EngagementEvent::NegotiationMessage { proposal_id, from_side: self.actor_side }]
            }
            ProposalAction::Accept => vec![EngagementEvent::ProposalAccepted { proposal_id }],
            ProposalAction::Decline => vec![EngagementEvent::ProposalDeclined { proposal_id }],
            ProposalAction::Cancel => Vec::new(),
        }
    }
}

/// Owns the status of a single proposal. Every call either appends exactly one
/// log entry and moves the status, or rejects before touching anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProposalStateMachine;

impl ProposalStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Checks in order: party membership, terminal status, role, amount.
    pub fn check(
        &self,
        proposal: &Proposal,
        actor: &PartyId,
        command: &ProposalCommand,
    ) -> Result<ProposalSide, DomainError> {
        let action = command.action();
        let side = proposal
            .side_of(actor)
            .ok_or_else(|| DomainError::unauthorized(actor, action, AuthorizationFailure::NotAParty))?;

        if proposal.status.is_terminal() {
            return Err(DomainError::AlreadyTerminal {
                proposal_id: proposal.id.clone(),
                status: proposal.status,
            });
        }

        match (command, side) {
            (ProposalCommand::Accept, ProposalSide::Sender) => Err(DomainError::unauthorized(
                actor,
                action,
                AuthorizationFailure::SenderCannotAccept,
            )),
            (ProposalCommand::Cancel { .. }, ProposalSide::Receiver) => {
                Err(DomainError::unauthorized(actor, action, AuthorizationFailure::SenderOnly))
            }
            (ProposalCommand::SendOffer { fee, .. }, _) if *fee < 0 => {
                Err(DomainError::InvalidAmount(*fee))
            }
            _ => Ok(side),
        }
    }

    pub fn apply(
        &self,
        proposal: &mut Proposal,
        actor: &PartyId,
        command: ProposalCommand,
        at: DateTime<Utc>,
    ) -> Result<ProposalTransition, DomainError> {
        let actor_side = self.check(proposal, actor, &command)?;
        let action = command.action();
        let from = proposal.status;

        let (to, text, entry, follow_up) = match command {
            ProposalCommand::SendMessage { text } => {
                let to = if from == ProposalStatus::Pending { ProposalStatus::Negotiating } else { from };
                (to, text, NegotiationEntry::Message, None)
            }
            ProposalCommand::SendOffer { fee, text } => (
                ProposalStatus::Negotiating,
                text,
                NegotiationEntry::Offer { suggested_fee: fee },
                None,
            ),
            ProposalCommand::Accept => (
                ProposalStatus::Accepted,
                "accepted the proposal".to_owned(),
                NegotiationEntry::Accept,
                Some(FollowUp::ProjectAccepted { performer_id: proposal.performer_id.clone() }),
            ),
            ProposalCommand::Decline { reason } => (
                ProposalStatus::Declined,
                reason.unwrap_or_else(|| "declined the proposal".to_owned()),
                NegotiationEntry::Decline,
                Some(FollowUp::ProjectClosed { closed_as: ClosedAs::Declined }),
            ),
            ProposalCommand::Cancel { reason } => (
                ProposalStatus::Cancelled,
                reason.unwrap_or_else(|| "withdrew the proposal".to_owned()),
                NegotiationEntry::Cancel,
                Some(FollowUp::ProjectClosed { closed_as: ClosedAs::Cancelled }),
            ),
        };

        let event = NegotiationEvent::new(at, actor.clone(), text, entry);
        let appended = proposal
            .negotiation_log
            .append(&proposal.sender_id, &proposal.performer_id, event)?
            .clone();
        proposal.status = to;

        Ok(ProposalTransition {
            proposal_id: proposal.id.clone(),
            from,
            to,
            action,
            actor_side,
            appended,
            follow_up,
        })
    }
}
