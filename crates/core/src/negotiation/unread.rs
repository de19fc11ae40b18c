//! Unread activity derived from the negotiation log and the two per-side
//! read markers. There are no per-event read flags.

use chrono::{DateTime, Utc};

use crate::domain::party::PartyId;
use crate::domain::proposal::{Proposal, ProposalSide};
use crate::errors::{AuthorizationFailure, DomainError};

/// Counts events the viewer has not seen. The proposal itself counts as one
/// implicit item from sender to receiver until the receiver first reads it.
///
/// A viewer who is neither party is treated as the receiver, matching how
/// listing surfaces call this for any proposal they render.
pub fn unread_count(proposal: &Proposal, viewer: &PartyId) -> usize {
    let is_sender = &proposal.sender_id == viewer;
    let last_read_at =
        if is_sender { proposal.sender_last_read_at } else { proposal.receiver_last_read_at };

    let history_unread = proposal
        .negotiation_log
        .events()
        .iter()
        .filter(|event| &event.actor_id != viewer)
        .filter(|event| last_read_at.map_or(true, |read_at| event.timestamp > read_at))
        .count();
    let log_is_empty = proposal.negotiation_log.is_empty();

    match last_read_at {
        None if log_is_empty => usize::from(!is_sender),
        None => history_unread + usize::from(!is_sender),
        Some(read_at) if log_is_empty => usize::from(!is_sender && proposal.created_at > read_at),
        Some(_) => history_unread,
    }
}

/// Moves the viewer's read marker to `now`, never backwards. Returns the
/// marker now in effect; calling it twice is a no-op on the count.
pub fn mark_read(
    proposal: &mut Proposal,
    viewer: &PartyId,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, DomainError> {
    let side = proposal.side_of(viewer).ok_or_else(|| {
        DomainError::unauthorized(viewer, "mark_read", AuthorizationFailure::NotAParty)
    })?;

    let marker = match side {
        ProposalSide::Sender => &mut proposal.sender_last_read_at,
        ProposalSide::Receiver => &mut proposal.receiver_last_read_at,
    };
    let next = match *marker {
        Some(existing) if existing >= now => existing,
        _ => now,
    };
    *marker = Some(next);
    Ok(next)
}

pub fn total_unread<'a>(proposals: impl IntoIterator<Item = &'a Proposal>, viewer: &PartyId) -> usize {
    proposals.into_iter().map(|proposal| unread_count(proposal, viewer)).sum()
}
