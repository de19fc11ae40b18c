use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::party::PartyId;
use crate::domain::proposal::{Proposal, ProposalStatus};

/// Keeps one proposal per performer: lowest `dedup_rank` wins, the newest
/// proposal breaks ties. Output is ordered by performer id.
pub fn dedupe_by_performer<'a>(
    proposals: impl IntoIterator<Item = &'a Proposal>,
) -> Vec<&'a Proposal> {
    let mut best: BTreeMap<&PartyId, &Proposal> = BTreeMap::new();
    for proposal in proposals {
        best.entry(&proposal.performer_id)
            .and_modify(|current| {
                let candidate = (proposal.status.dedup_rank(), std::cmp::Reverse(proposal.created_at));
                let incumbent = (current.status.dedup_rank(), std::cmp::Reverse(current.created_at));
                if candidate < incumbent {
                    *current = proposal;
                }
            })
            .or_insert(proposal);
    }
    best.into_values().collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub performer_id: PartyId,
    pub accepted_count: usize,
}

/// Performers ranked by how many of `proposals` they accepted, most first.
/// Callers pass every proposal on the owner's projects.
pub fn frequent_collaborators<'a>(
    proposals: impl IntoIterator<Item = &'a Proposal>,
    limit: usize,
) -> Vec<Collaborator> {
    let mut counts: BTreeMap<&PartyId, usize> = BTreeMap::new();
    for proposal in proposals {
        if proposal.status == ProposalStatus::Accepted {
            *counts.entry(&proposal.performer_id).or_default() += 1;
        }
    }

    let mut ranked: Vec<Collaborator> = counts
        .into_iter()
        .map(|(performer_id, accepted_count)| Collaborator {
            performer_id: performer_id.clone(),
            accepted_count,
        })
        .collect();
    // Stable sort keeps the id order among equal counts.
    ranked.sort_by(|left, right| right.accepted_count.cmp(&left.accepted_count));
    ranked.truncate(limit);
    ranked
}
