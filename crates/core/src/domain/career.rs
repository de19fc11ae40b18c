use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::party::PartyId;
use crate::domain::project::{Project, ProjectId};
use crate::domain::proposal::{Proposal, ProposalStatus};

/// A line on a performer's public career history, written when they run a
/// project as its PM or when a project they were accepted on completes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareerEntry {
    pub performer_id: PartyId,
    pub project_id: ProjectId,
    pub title: String,
    pub role_label: String,
    pub dated_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl CareerEntry {
    pub fn for_pm(project: &Project, performer_id: PartyId, now: DateTime<Utc>) -> Self {
        Self {
            performer_id,
            project_id: project.id.clone(),
            title: project.title.clone(),
            role_label: pm_role_label(project.category.as_deref()),
            dated_on: project.start_date.unwrap_or_else(|| now.date_naive()),
            created_at: now,
        }
    }

    /// Entry for a performer accepted on `project`. The PM keeps the PM label
    /// with their proposal role appended; everyone else is labelled by role,
    /// falling back to the category.
    pub fn for_participant(
        project: &Project,
        performer_id: PartyId,
        role: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let role = role.map(str::trim).filter(|role| !role.is_empty());
        let role_label = if project.is_pm(&performer_id) {
            let pm_label = pm_role_label(project.category.as_deref());
            match role {
                Some(role) => format!("{pm_label} · {role}"),
                None => pm_label,
            }
        } else {
            role.map(str::to_owned).unwrap_or_else(|| {
                category_label(project.category.as_deref()).unwrap_or("Participant").to_owned()
            })
        };

        Self {
            performer_id,
            project_id: project.id.clone(),
            title: project.title.clone(),
            role_label,
            dated_on: project.start_date.unwrap_or_else(|| now.date_naive()),
            created_at: now,
        }
    }

    /// One entry per performer holding an accepted proposal on a completed
    /// project, in proposal order.
    pub fn for_completed_project(
        project: &Project,
        proposals: &[Proposal],
        now: DateTime<Utc>,
    ) -> Vec<Self> {
        let mut entries: Vec<Self> = Vec::new();
        for proposal in proposals {
            if proposal.project_id != project.id
                || proposal.status != ProposalStatus::Accepted
                || entries.iter().any(|entry| entry.performer_id == proposal.performer_id)
            {
                continue;
            }
            entries.push(Self::for_participant(
                project,
                proposal.performer_id.clone(),
                proposal.role.as_deref(),
                now,
            ));
        }
        entries
    }
}

fn category_label(category: Option<&str>) -> Option<&'static str> {
    match category.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
        Some("choreo") => Some("Choreographer"),
        Some("broadcast") => Some("Broadcast cast"),
        Some("performance") => Some("Performer"),
        Some("workshop") => Some("Workshop instructor"),
        Some("judge") => Some("Judge"),
        _ => None,
    }
}

pub fn pm_role_label(category: Option<&str>) -> String {
    format!("{} (PM)", category_label(category).unwrap_or("PM"))
}
