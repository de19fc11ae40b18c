use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use gigbook_core::domain::career::CareerEntry;
use gigbook_core::domain::party::PartyId;
use gigbook_core::domain::project::{Project, ProjectId, ProjectStatus};
use gigbook_core::domain::proposal::{
    NegotiationEvent, Proposal, ProposalId, ProposalSide, ProposalStatus,
};
use gigbook_core::negotiation::NegotiationThread;

use super::{CareerRepository, ProjectRepository, ProposalRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryProjectRepository {
    projects: RwLock<HashMap<String, Project>>,
}

impl InMemoryProjectRepository {
    async fn collect_where(&self, predicate: impl Fn(&Project) -> bool) -> Vec<Project> {
        let projects = self.projects.read().await;
        let mut matching: Vec<Project> =
            projects.values().filter(|project| predicate(project)).cloned().collect();
        matching.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.cmp(&right.id))
        });
        matching
    }
}

#[async_trait::async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn find_by_id(&self, id: &ProjectId) -> Result<Option<Project>, RepositoryError> {
        let projects = self.projects.read().await;
        Ok(projects.get(&id.0).cloned())
    }

    async fn insert(&self, project: Project) -> Result<(), RepositoryError> {
        let mut projects = self.projects.write().await;
        projects.insert(project.id.0.clone(), project);
        Ok(())
    }

    async fn save_status(
        &self,
        project: &Project,
        expected: ProjectStatus,
    ) -> Result<bool, RepositoryError> {
        let mut projects = self.projects.write().await;
        match projects.get_mut(&project.id.0) {
            Some(stored) if stored.status == expected => {
                stored.status = project.status;
                stored.legacy_status = project.legacy_status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn assign_pm_if_unset(
        &self,
        id: &ProjectId,
        performer_id: &PartyId,
    ) -> Result<bool, RepositoryError> {
        let mut projects = self.projects.write().await;
        match projects.get_mut(&id.0) {
            Some(stored) if stored.pm_performer_id.is_none() => {
                stored.pm_performer_id = Some(performer_id.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_by_parent(&self, parent_id: &ProjectId) -> Result<Vec<Project>, RepositoryError> {
        Ok(self.collect_where(|project| project.parent_project_id.as_ref() == Some(parent_id)).await)
    }

    async fn list_by_owner(&self, owner_id: &PartyId) -> Result<Vec<Project>, RepositoryError> {
        Ok(self.collect_where(|project| &project.owner_id == owner_id).await)
    }

    async fn list_by_pm(&self, performer_id: &PartyId) -> Result<Vec<Project>, RepositoryError> {
        Ok(self.collect_where(|project| project.is_pm(performer_id)).await)
    }
}

#[derive(Default)]
pub struct InMemoryProposalRepository {
    proposals: RwLock<HashMap<String, Proposal>>,
}

impl InMemoryProposalRepository {
    async fn collect_where(
        &self,
        predicate: impl Fn(&Proposal) -> bool,
        newest_first: bool,
    ) -> Vec<Proposal> {
        let proposals = self.proposals.read().await;
        let mut matching: Vec<Proposal> =
            proposals.values().filter(|proposal| predicate(proposal)).cloned().collect();
        matching.sort_by(|left, right| {
            let by_time = if newest_first {
                right.created_at.cmp(&left.created_at)
            } else {
                left.created_at.cmp(&right.created_at)
            };
            by_time.then_with(|| left.id.cmp(&right.id))
        });
        matching
    }
}

#[async_trait::async_trait]
impl ProposalRepository for InMemoryProposalRepository {
    async fn find_by_id(&self, id: &ProposalId) -> Result<Option<Proposal>, RepositoryError> {
        let proposals = self.proposals.read().await;
        Ok(proposals.get(&id.0).cloned())
    }

    async fn insert(&self, proposal: Proposal) -> Result<(), RepositoryError> {
        let mut proposals = self.proposals.write().await;
        proposals.insert(proposal.id.0.clone(), proposal);
        Ok(())
    }

    async fn record_transition(
        &self,
        proposal: &Proposal,
        expected: ProposalStatus,
        appended: &NegotiationEvent,
    ) -> Result<bool, RepositoryError> {
        let mut proposals = self.proposals.write().await;
        let Some(stored) = proposals.get_mut(&proposal.id.0) else {
            return Ok(false);
        };
        if stored.status != expected {
            return Ok(false);
        }

        let mut events = stored.negotiation_log.events().to_vec();
        events.push(appended.clone());
        stored.negotiation_log = NegotiationThread::from_events(events);
        stored.status = proposal.status;
        stored.fee = proposal.fee;
        Ok(true)
    }

    async fn record_read(
        &self,
        id: &ProposalId,
        side: ProposalSide,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut proposals = self.proposals.write().await;
        let Some(stored) = proposals.get_mut(&id.0) else {
            return Ok(false);
        };

        let marker = match side {
            ProposalSide::Sender => &mut stored.sender_last_read_at,
            ProposalSide::Receiver => &mut stored.receiver_last_read_at,
        };
        if marker.is_some_and(|current| current >= at) {
            return Ok(false);
        }
        *marker = Some(at);
        Ok(true)
    }

    async fn list_by_project(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<Proposal>, RepositoryError> {
        Ok(self.collect_where(|proposal| &proposal.project_id == project_id, false).await)
    }

    async fn list_by_projects(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<Vec<Proposal>, RepositoryError> {
        Ok(self.collect_where(|proposal| project_ids.contains(&proposal.project_id), false).await)
    }

    async fn list_by_performer(
        &self,
        performer_id: &PartyId,
    ) -> Result<Vec<Proposal>, RepositoryError> {
        Ok(self.collect_where(|proposal| &proposal.performer_id == performer_id, true).await)
    }

    async fn list_by_sender(&self, sender_id: &PartyId) -> Result<Vec<Proposal>, RepositoryError> {
        Ok(self.collect_where(|proposal| &proposal.sender_id == sender_id, true).await)
    }
}

#[derive(Default)]
pub struct InMemoryCareerRepository {
    entries: RwLock<HashMap<(String, String), CareerEntry>>,
}

#[async_trait::async_trait]
impl CareerRepository for InMemoryCareerRepository {
    async fn insert_if_absent(&self, entry: CareerEntry) -> Result<bool, RepositoryError> {
        let mut entries = self.entries.write().await;
        let key = (entry.performer_id.0.clone(), entry.project_id.0.clone());
        if entries.contains_key(&key) {
            return Ok(false);
        }
        entries.insert(key, entry);
        Ok(true)
    }

    async fn list_by_performer(
        &self,
        performer_id: &PartyId,
    ) -> Result<Vec<CareerEntry>, RepositoryError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<CareerEntry> =
            entries.values().filter(|entry| &entry.performer_id == performer_id).cloned().collect();
        matching.sort_by(|left, right| {
            right.dated_on.cmp(&left.dated_on).then_with(|| left.project_id.cmp(&right.project_id))
        });
        Ok(matching)
    }
}
