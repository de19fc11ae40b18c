use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::party::PartyId;
use crate::domain::project::ProjectId;
use crate::negotiation::thread::NegotiationThread;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(pub String);

impl ProposalId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Negotiating,
    Accepted,
    Declined,
    Cancelled,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Negotiating => "negotiating",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "negotiating" => Some(Self::Negotiating),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Declined | Self::Cancelled)
    }

    /// Pending, negotiating and accepted proposals keep an engagement alive.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Negotiating | Self::Accepted)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Negotiating)
    }

    /// Lower wins when several proposals exist for the same performer.
    pub fn dedup_rank(&self) -> u8 {
        match self {
            Self::Accepted => 0,
            Self::Negotiating => 1,
            Self::Pending => 2,
            Self::Declined => 3,
            Self::Cancelled => 4,
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which party of a proposal someone is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalSide {
    Sender,
    Receiver,
}

impl ProposalSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Receiver => "receiver",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Sender => Self::Receiver,
            Self::Receiver => Self::Sender,
        }
    }
}

/// Kind-specific payload of a negotiation log entry. Only offers carry a fee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NegotiationEntry {
    Message,
    Offer { suggested_fee: i64 },
    Accept,
    Decline,
    Cancel,
}

impl NegotiationEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Offer { .. } => "offer",
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Cancel => "cancel",
        }
    }

    pub fn suggested_fee(&self) -> Option<i64> {
        match self {
            Self::Offer { suggested_fee } => Some(*suggested_fee),
            _ => None,
        }
    }

    /// Rebuilds an entry from its stored kind and optional fee column.
    pub fn from_parts(kind: &str, suggested_fee: Option<i64>) -> Option<Self> {
        match (kind.trim().to_ascii_lowercase().as_str(), suggested_fee) {
            ("message", _) => Some(Self::Message),
            ("offer", Some(suggested_fee)) => Some(Self::Offer { suggested_fee }),
            ("accept", _) => Some(Self::Accept),
            ("decline", _) => Some(Self::Decline),
            ("cancel", _) => Some(Self::Cancel),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationEvent {
    pub timestamp: DateTime<Utc>,
    pub actor_id: PartyId,
    pub text: String,
    #[serde(flatten)]
    pub entry: NegotiationEntry,
}

impl NegotiationEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        actor_id: PartyId,
        text: impl Into<String>,
        entry: NegotiationEntry,
    ) -> Self {
        Self { timestamp, actor_id, text: text.into(), entry }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub project_id: ProjectId,
    pub performer_id: PartyId,
    pub sender_id: PartyId,
    pub status: ProposalStatus,
    pub fee: Option<i64>,
    pub role: Option<String>,
    pub details: Option<String>,
    pub negotiation_log: NegotiationThread,
    pub sender_last_read_at: Option<DateTime<Utc>>,
    pub receiver_last_read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Proposal {
    pub fn new_pending(
        project_id: ProjectId,
        performer_id: PartyId,
        sender_id: PartyId,
        fee: Option<i64>,
        role: Option<String>,
        details: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ProposalId::generate(),
            project_id,
            performer_id,
            sender_id,
            status: ProposalStatus::Pending,
            fee,
            role,
            details,
            negotiation_log: NegotiationThread::default(),
            sender_last_read_at: None,
            receiver_last_read_at: None,
            created_at,
        }
    }

    /// The sender side wins when someone sends a proposal to their own profile.
    pub fn side_of(&self, party: &PartyId) -> Option<ProposalSide> {
        if &self.sender_id == party {
            Some(ProposalSide::Sender)
        } else if &self.performer_id == party {
            Some(ProposalSide::Receiver)
        } else {
            None
        }
    }

    pub fn last_read_at(&self, side: ProposalSide) -> Option<DateTime<Utc>> {
        match side {
            ProposalSide::Sender => self.sender_last_read_at,
            ProposalSide::Receiver => self.receiver_last_read_at,
        }
    }

    /// Most recent counter-offer in the log. Offers never rewrite `fee`.
    pub fn latest_offer(&self) -> Option<&NegotiationEvent> {
        self.negotiation_log
            .events()
            .iter()
            .rev()
            .find(|event| matches!(event.entry, NegotiationEntry::Offer { .. }))
    }
}
