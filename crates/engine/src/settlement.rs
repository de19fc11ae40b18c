use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use gigbook_core::domain::party::PartyId;
use gigbook_core::domain::project::{Project, ProjectId};
use gigbook_core::errors::{ApplicationError, AuthorizationFailure, DomainError};
use gigbook_core::roster::{frequent_collaborators, Collaborator};
use gigbook_core::settlement::{
    role_of, settle_as, settle_portfolio, Portfolio, PortfolioFilter, Settlement, SettlementRole,
};
use gigbook_core::visibility::{project_visibility, ProjectView};

use crate::context::{EngineContext, RequestContext};

pub const DEFAULT_COLLABORATOR_LIMIT: usize = 20;

/// Read-only books. Every figure is recomputed from the current rows.
#[derive(Clone)]
pub struct SettlementService {
    context: EngineContext,
    collaborator_limit: usize,
}

impl SettlementService {
    pub fn new(context: EngineContext) -> Self {
        Self { context, collaborator_limit: DEFAULT_COLLABORATOR_LIMIT }
    }

    pub fn with_collaborator_limit(mut self, limit: usize) -> Self {
        self.collaborator_limit = limit.max(1);
        self
    }

    /// Settles one project for the requesting party, narrowed to what that
    /// party is allowed to see.
    pub async fn settle(
        &self,
        request: &RequestContext,
        project_id: &ProjectId,
    ) -> Result<Settlement, ApplicationError> {
        let project = self
            .context
            .projects
            .find_by_id(project_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("project", project_id))?;
        let proposals = self.context.proposals.list_by_project(project_id).await?;
        let brief_owner = self.brief_owner(&project).await?;
        let viewer = &request.actor;
        let has_proposal = proposals.iter().any(|proposal| &proposal.performer_id == viewer);

        let role = match project_visibility(&project, brief_owner.as_ref(), viewer, has_proposal) {
            ProjectView::Hidden => {
                return Err(DomainError::unauthorized(
                    viewer,
                    "settle",
                    AuthorizationFailure::NotAParty,
                )
                .into());
            }
            ProjectView::OwnProposalOnly => SettlementRole::Participant,
            ProjectView::Full => match role_of(&project, viewer, &proposals) {
                // Full view through the parent brief reads the owner's books.
                SettlementRole::Outsider => SettlementRole::Owner,
                role => role,
            },
        };

        debug!(
            event_name = "settlement.project.computed",
            correlation_id = %request.correlation_id,
            project_id = %project_id,
            role = ?role,
            "settling project"
        );
        Ok(settle_as(&project, &proposals, viewer, role))
    }

    /// Every derived project the requesting party owns, leads, or holds a
    /// proposal on, settled independently and then totalled.
    pub async fn portfolio(
        &self,
        request: &RequestContext,
        filter: PortfolioFilter,
    ) -> Result<Portfolio, ApplicationError> {
        let perspective = &request.actor;
        let mut projects: BTreeMap<ProjectId, Project> = BTreeMap::new();

        for project in self.context.projects.list_by_owner(perspective).await? {
            projects.insert(project.id.clone(), project);
        }
        for project in self.context.projects.list_by_pm(perspective).await? {
            projects.insert(project.id.clone(), project);
        }
        for proposal in self.context.proposals.list_by_performer(perspective).await? {
            if projects.contains_key(&proposal.project_id) {
                continue;
            }
            if let Some(project) = self.context.projects.find_by_id(&proposal.project_id).await? {
                projects.insert(project.id.clone(), project);
            }
        }

        let ids: Vec<ProjectId> = projects.keys().cloned().collect();
        let proposals = self.context.proposals.list_by_projects(&ids).await?;

        let mut brief_owners: HashMap<ProjectId, Option<PartyId>> = HashMap::new();
        let mut visible = Vec::with_capacity(projects.len());
        for project in projects.into_values() {
            let brief_owner = match &project.parent_project_id {
                Some(parent_id) => match brief_owners.get(parent_id) {
                    Some(owner) => owner.clone(),
                    None => {
                        let owner = self.brief_owner(&project).await?;
                        brief_owners.insert(parent_id.clone(), owner.clone());
                        owner
                    }
                },
                None => None,
            };
            let has_proposal = proposals.iter().any(|proposal| {
                proposal.project_id == project.id && &proposal.performer_id == perspective
            });
            if project_visibility(&project, brief_owner.as_ref(), perspective, has_proposal)
                != ProjectView::Hidden
            {
                visible.push(project);
            }
        }

        Ok(settle_portfolio(visible.iter(), &proposals, perspective, filter))
    }

    /// Performers the owner has worked with most, by accepted proposals.
    pub async fn frequent_collaborators(
        &self,
        owner_id: &PartyId,
    ) -> Result<Vec<Collaborator>, ApplicationError> {
        let ids: Vec<ProjectId> = self
            .context
            .projects
            .list_by_owner(owner_id)
            .await?
            .into_iter()
            .map(|project| project.id)
            .collect();
        let proposals = self.context.proposals.list_by_projects(&ids).await?;
        Ok(frequent_collaborators(&proposals, self.collaborator_limit))
    }

    async fn brief_owner(&self, project: &Project) -> Result<Option<PartyId>, ApplicationError> {
        let Some(parent_id) = &project.parent_project_id else {
            return Ok(None);
        };
        Ok(self.context.projects.find_by_id(parent_id).await?.map(|brief| brief.owner_id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use gigbook_core::domain::party::PartyId;
    use gigbook_core::domain::project::{
        ConfirmationStatus, ProgressStatus, Project, ProjectId, ProjectStatus, Visibility,
    };
    use gigbook_core::domain::proposal::{Proposal, ProposalStatus};
    use gigbook_core::errors::{ApplicationError, DomainError};
    use gigbook_core::settlement::{NetProfit, PortfolioFilter, SettlementRole};

    use super::SettlementService;
    use crate::context::{EngineContext, RequestContext};

    fn project(id: &str, parent: Option<&str>, pm: Option<&str>) -> Project {
        let project_id = ProjectId(id.to_owned());
        Project {
            status: ProjectStatus::from_parts(
                &project_id,
                ConfirmationStatus::Confirmed,
                ProgressStatus::Recruiting,
            )
            .expect("valid status"),
            id: project_id,
            owner_id: PartyId::new("owner-1"),
            client_company_ref: None,
            pm_performer_id: pm.map(PartyId::new),
            parent_project_id: parent.map(|parent| ProjectId(parent.to_owned())),
            title: "Showcase".to_owned(),
            category: None,
            description: None,
            visibility: Visibility::Private,
            start_date: None,
            end_date: None,
            schedule: Vec::new(),
            legacy_status: None,
            budget: None,
            contract_amount: Some(1_000_000),
            created_at: Utc::now(),
        }
    }

    fn accepted(project_id: &str, performer: &str, fee: Option<i64>, offset: i64) -> Proposal {
        let mut proposal = Proposal::new_pending(
            ProjectId(project_id.to_owned()),
            PartyId::new(performer),
            PartyId::new("owner-1"),
            fee,
            None,
            None,
            Utc::now() + Duration::seconds(offset),
        );
        proposal.status = ProposalStatus::Accepted;
        proposal
    }

    async fn seeded() -> (SettlementService, EngineContext) {
        let (context, _sink) = EngineContext::in_memory();
        context.projects.insert(project("brief-1", None, None)).await.expect("brief");
        context
            .projects
            .insert(project("prj-1", Some("brief-1"), Some("dancer-a")))
            .await
            .expect("derived");
        context.proposals.insert(accepted("prj-1", "dancer-a", Some(300_000), 0)).await.expect("a");
        context.proposals.insert(accepted("prj-1", "dancer-b", Some(200_000), 1)).await.expect("b");
        (SettlementService::new(context.clone()), context)
    }

    #[tokio::test]
    async fn owner_and_performers_see_their_own_books() {
        let (service, _context) = seeded().await;
        let project_id = ProjectId("prj-1".to_owned());

        let owner = service
            .settle(&RequestContext::new(PartyId::new("owner-1")), &project_id)
            .await
            .expect("owner settlement");
        assert_eq!(owner.role, SettlementRole::Owner);
        assert_eq!((owner.revenue, owner.expense), (1_000_000, 500_000));
        assert_eq!(owner.net_profit, NetProfit::Settled(500_000));

        let pm = service
            .settle(&RequestContext::new(PartyId::new("dancer-a")), &project_id)
            .await
            .expect("pm settlement");
        assert_eq!(pm.role, SettlementRole::Pm);
        assert_eq!(pm.revenue, 300_000);

        let participant = service
            .settle(&RequestContext::new(PartyId::new("dancer-b")), &project_id)
            .await
            .expect("participant settlement");
        assert_eq!(participant.role, SettlementRole::Participant);
        assert_eq!((participant.revenue, participant.expense), (200_000, 0));

        let stranger =
            service.settle(&RequestContext::new(PartyId::new("stranger")), &project_id).await;
        assert!(matches!(
            stranger,
            Err(ApplicationError::Domain(DomainError::Unauthorized { .. }))
        ));
    }

    #[tokio::test]
    async fn portfolio_skips_briefs_and_flags_open_fees() {
        let (service, context) = seeded().await;
        context.projects.insert(project("prj-2", Some("brief-1"), None)).await.expect("second");
        context.proposals.insert(accepted("prj-2", "dancer-c", None, 2)).await.expect("open fee");

        let portfolio = service
            .portfolio(&RequestContext::new(PartyId::new("owner-1")), PortfolioFilter::All)
            .await
            .expect("portfolio");
        assert_eq!(portfolio.settlements.len(), 2);
        assert_eq!(portfolio.undecided_projects, 1);
        assert_eq!(portfolio.net_profit, NetProfit::Undetermined);

        let dancer = service
            .portfolio(&RequestContext::new(PartyId::new("dancer-b")), PortfolioFilter::Income)
            .await
            .expect("dancer portfolio");
        assert_eq!(dancer.settlements.len(), 1);
        assert_eq!(dancer.revenue, 200_000);
    }

    #[tokio::test]
    async fn collaborators_rank_by_accepted_count() {
        let (service, context) = seeded().await;
        context.projects.insert(project("prj-2", Some("brief-1"), None)).await.expect("second");
        context.proposals.insert(accepted("prj-2", "dancer-b", Some(1), 2)).await.expect("repeat");

        let ranked = service
            .with_collaborator_limit(1)
            .frequent_collaborators(&PartyId::new("owner-1"))
            .await
            .expect("collaborators");
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].performer_id, PartyId::new("dancer-b"));
        assert_eq!(ranked[0].accepted_count, 2);
    }
}
