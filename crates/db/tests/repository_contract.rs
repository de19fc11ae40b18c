use chrono::{DateTime, Duration, Utc};

use gigbook_core::domain::party::PartyId;
use gigbook_core::domain::project::{
    ConfirmationStatus, ProgressStatus, Project, ProjectId, ProjectStatus, Visibility,
};
use gigbook_core::domain::proposal::{
    NegotiationEntry, NegotiationEvent, Proposal, ProposalSide, ProposalStatus,
};
use gigbook_db::repositories::{
    InMemoryProjectRepository, InMemoryProposalRepository, ProjectRepository, ProposalRepository,
    SqlProjectRepository, SqlProposalRepository,
};
use gigbook_db::{connect_with_settings, migrations};

type ContractResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
        .map(|value| value.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn brief() -> Project {
    Project {
        id: ProjectId("brief-1".to_owned()),
        owner_id: PartyId::new("owner-1"),
        client_company_ref: None,
        pm_performer_id: None,
        parent_project_id: None,
        title: "Summer festival".to_owned(),
        category: Some("performance".to_owned()),
        description: None,
        visibility: Visibility::Private,
        start_date: None,
        end_date: None,
        schedule: Vec::new(),
        status: ProjectStatus::negotiating(),
        legacy_status: None,
        budget: Some(2_000_000),
        contract_amount: None,
        created_at: base_time(),
    }
}

fn derived(id: &str) -> Project {
    Project {
        id: ProjectId(id.to_owned()),
        parent_project_id: Some(ProjectId("brief-1".to_owned())),
        budget: None,
        created_at: base_time() + Duration::seconds(1),
        ..brief()
    }
}

/// Accept flow as the engine drives it: guarded status write, then the
/// conditional PM claim, then the project status write.
async fn accept_flow_contract(
    projects: &dyn ProjectRepository,
    proposals: &dyn ProposalRepository,
) -> ContractResult {
    projects.insert(brief()).await.map_err(|error| error.to_string())?;
    let project = derived("prj-a");
    projects.insert(project.clone()).await.map_err(|error| error.to_string())?;

    let proposal = Proposal::new_pending(
        project.id.clone(),
        PartyId::new("dancer-a"),
        PartyId::new("owner-1"),
        Some(300_000),
        None,
        None,
        base_time() + Duration::seconds(2),
    );
    proposals.insert(proposal.clone()).await.map_err(|error| error.to_string())?;

    let mut accepted = proposal.clone();
    accepted.status = ProposalStatus::Accepted;
    let accept = NegotiationEvent::new(
        base_time() + Duration::minutes(5),
        PartyId::new("dancer-a"),
        "accepted the proposal",
        NegotiationEntry::Accept,
    );
    let landed = proposals
        .record_transition(&accepted, ProposalStatus::Pending, &accept)
        .await
        .map_err(|error| error.to_string())?;
    require!(landed, "accept should land on a pending proposal");

    let replay = proposals
        .record_transition(&accepted, ProposalStatus::Pending, &accept)
        .await
        .map_err(|error| error.to_string())?;
    require!(!replay, "a replayed accept must not append twice");

    let won = projects
        .assign_pm_if_unset(&project.id, &PartyId::new("dancer-a"))
        .await
        .map_err(|error| error.to_string())?;
    require!(won, "first accepter should become PM");

    let mut confirmed = project.clone();
    confirmed.status = ProjectStatus::from_parts(
        &project.id,
        ConfirmationStatus::Confirmed,
        ProgressStatus::Recruiting,
    )
    .map_err(|error| error.to_string())?;
    let saved = projects
        .save_status(&confirmed, project.status)
        .await
        .map_err(|error| error.to_string())?;
    require!(saved, "status write should land");

    let stored_project = projects
        .find_by_id(&project.id)
        .await
        .map_err(|error| error.to_string())?
        .ok_or_else(|| "project should exist".to_owned())?;
    require_eq!(stored_project.pm_performer_id, Some(PartyId::new("dancer-a")));
    require!(stored_project.status.can_recruit());

    let stored_proposal = proposals
        .find_by_id(&proposal.id)
        .await
        .map_err(|error| error.to_string())?
        .ok_or_else(|| "proposal should exist".to_owned())?;
    require_eq!(stored_proposal.status, ProposalStatus::Accepted);
    require_eq!(stored_proposal.negotiation_log.len(), 1);

    let tree = proposals
        .list_by_projects(&[ProjectId("brief-1".to_owned()), project.id.clone()])
        .await
        .map_err(|error| error.to_string())?;
    require_eq!(tree.len(), 1);

    let read = proposals
        .record_read(&proposal.id, ProposalSide::Sender, base_time() + Duration::hours(1))
        .await
        .map_err(|error| error.to_string())?;
    require!(read, "first read marker should be written");

    Ok(())
}

#[tokio::test]
async fn sql_repositories_honor_accept_flow_contract() -> ContractResult {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| error.to_string())?;
    migrations::run_pending(&pool).await.map_err(|error| error.to_string())?;

    let projects = SqlProjectRepository::new(pool.clone());
    let proposals = SqlProposalRepository::new(pool.clone());
    accept_flow_contract(&projects, &proposals).await?;

    pool.close().await;
    Ok(())
}

#[tokio::test]
async fn in_memory_repositories_honor_accept_flow_contract() -> ContractResult {
    let projects = InMemoryProjectRepository::default();
    let proposals = InMemoryProposalRepository::default();
    accept_flow_contract(&projects, &proposals).await
}
