use serde::{Deserialize, Serialize};

use crate::domain::party::PartyId;
use crate::domain::proposal::{NegotiationEntry, NegotiationEvent};
use crate::errors::{AuthorizationFailure, DomainError};

/// Append-only negotiation log of one proposal. Insertion order is
/// chronological order; entries are never edited or removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NegotiationThread {
    events: Vec<NegotiationEvent>,
}

impl NegotiationThread {
    /// Rehydrates a log read back from storage, trusting its stored order.
    pub fn from_events(events: Vec<NegotiationEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[NegotiationEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last(&self) -> Option<&NegotiationEvent> {
        self.events.last()
    }

    /// Validates the actor against the two parties and appends. Terminal
    /// status is not checked here; the state machine refuses first.
    pub fn append(
        &mut self,
        sender_id: &PartyId,
        performer_id: &PartyId,
        event: NegotiationEvent,
    ) -> Result<&NegotiationEvent, DomainError> {
        if &event.actor_id != sender_id && &event.actor_id != performer_id {
            return Err(DomainError::unauthorized(
                &event.actor_id,
                event.entry.kind(),
                AuthorizationFailure::NotAParty,
            ));
        }
        if let NegotiationEntry::Offer { suggested_fee } = event.entry {
            if suggested_fee < 0 {
                return Err(DomainError::InvalidAmount(suggested_fee));
            }
        }

        self.events.push(event);
        let index = self.events.len() - 1;
        Ok(&self.events[index])
    }
}
