use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use gigbook_core::domain::party::PartyId;
use gigbook_core::domain::project::{
    ConfirmationStatus, LegacyProjectStatus, ProgressStatus, Project, ProjectId, ProjectStatus,
    Visibility,
};
use gigbook_core::domain::proposal::{Proposal, ProposalStatus};
use gigbook_core::errors::ApplicationError;
use gigbook_core::events::InMemoryEventSink;
use gigbook_core::fanout::InviteTerms;
use gigbook_core::settlement::NetProfit;
use gigbook_db::repositories::{
    InMemoryProjectRepository, ProjectRepository, RepositoryError,
};
use gigbook_db::{connect_with_settings, migrations};
use gigbook_engine::{Engine, EngineContext, RequestContext};

type ScenarioResult<T = ()> = Result<T, String>;

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

fn step<T, E: std::fmt::Display>(label: &str, result: Result<T, E>) -> ScenarioResult<T> {
    result.map_err(|error| format!("{label}: {error}"))
}

fn party(id: &str) -> PartyId {
    PartyId::new(id)
}

fn as_party(id: &str) -> RequestContext {
    RequestContext::new(party(id))
}

fn project(id: &str, parent: Option<&str>, pm: Option<&str>, contract: Option<i64>) -> Project {
    Project {
        id: ProjectId(id.to_owned()),
        owner_id: party("owner-1"),
        client_company_ref: None,
        pm_performer_id: pm.map(PartyId::new),
        parent_project_id: parent.map(|parent| ProjectId(parent.to_owned())),
        title: "Music video shoot".to_owned(),
        category: Some("broadcast".to_owned()),
        description: Some("two days, downtown".to_owned()),
        visibility: Visibility::Private,
        start_date: None,
        end_date: None,
        schedule: Vec::new(),
        status: ProjectStatus::negotiating(),
        legacy_status: None,
        budget: None,
        contract_amount: contract,
        created_at: Utc::now(),
    }
}

fn terms(fee: i64) -> InviteTerms {
    InviteTerms { fee: Some(fee), role: Some("dancer".to_owned()), message: Some("join us".to_owned()) }
}

async fn sql_engine() -> ScenarioResult<(Engine, EngineContext, InMemoryEventSink)> {
    let pool = step("connect", connect_with_settings("sqlite::memory:", 1, 30).await)?;
    step("migrate", migrations::run_pending(&pool).await)?;
    let sink = InMemoryEventSink::default();
    let context = EngineContext::sql(pool, Arc::new(sink.clone()));
    Ok((Engine::new(context.clone()), context, sink))
}

async fn only_proposal_of(context: &EngineContext, performer: &str) -> ScenarioResult<Proposal> {
    let proposals = step("list inbox", context.proposals.list_by_performer(&party(performer)).await)?;
    require_eq!(proposals.len(), 1);
    proposals.into_iter().next().ok_or_else(|| format!("{performer} has no proposal"))
}

async fn stored_project(context: &EngineContext, id: &ProjectId) -> ScenarioResult<Project> {
    step("find project", context.projects.find_by_id(id).await)?
        .ok_or_else(|| format!("project {id} missing"))
}

#[tokio::test]
async fn first_acceptance_confirms_only_its_own_clone() -> ScenarioResult {
    let (engine, context, sink) = sql_engine().await?;
    step("insert brief", context.projects.insert(project("brief-1", None, None, None)).await)?;
    let owner = as_party("owner-1");
    let brief_id = ProjectId("brief-1".to_owned());

    let for_a =
        step("fan out to A", engine.fanout.fanout(&owner, &brief_id, &[party("dancer-a")], &terms(500_000)).await)?;
    let for_b =
        step("fan out to B", engine.fanout.fanout(&owner, &brief_id, &[party("dancer-b")], &terms(700_000)).await)?;
    require_eq!(for_a.len(), 1);
    require_eq!(for_b.len(), 1);
    require!(for_a[0] != for_b[0], "each performer gets a separate clone");

    let proposal_a = only_proposal_of(&context, "dancer-a").await?;
    require_eq!(proposal_a.fee, Some(500_000));
    step("A accepts", engine.negotiation.accept(&as_party("dancer-a"), &proposal_a.id).await)?;

    let project_a = stored_project(&context, &for_a[0]).await?;
    require_eq!(project_a.status.confirmation(), ConfirmationStatus::Confirmed);
    require_eq!(project_a.status.progress(), ProgressStatus::Recruiting);
    require_eq!(project_a.pm_performer_id, Some(party("dancer-a")));
    require_eq!(project_a.parent_project_id, Some(brief_id.clone()));
    require_eq!(project_a.budget, None::<i64>);

    let project_b = stored_project(&context, &for_b[0]).await?;
    require_eq!(project_b.status.confirmation(), ConfirmationStatus::Negotiating);
    require_eq!(project_b.status.progress(), ProgressStatus::Idle);
    require_eq!(project_b.pm_performer_id, Some(party("dancer-b")));
    require_eq!(only_proposal_of(&context, "dancer-b").await?.status, ProposalStatus::Pending);

    let brief = stored_project(&context, &brief_id).await?;
    require_eq!(brief.status, ProjectStatus::negotiating());

    require_eq!(sink.of_type("proposal_created").len(), 2);
    require_eq!(sink.of_type("proposal_accepted").len(), 1);
    require_eq!(sink.of_type("project_status_changed").len(), 1);

    let careers = step("careers", context.careers.list_by_performer(&party("dancer-a")).await)?;
    require_eq!(careers.len(), 1);
    require_eq!(careers[0].role_label.as_str(), "Broadcast cast (PM)");
    Ok(())
}

#[tokio::test]
async fn acceptance_on_a_legacy_only_project_confirms_and_reconciles_the_flag() -> ScenarioResult {
    let pool = step("connect", connect_with_settings("sqlite::memory:", 1, 30).await)?;
    step("migrate", migrations::run_pending(&pool).await)?;
    step(
        "insert legacy row",
        sqlx::query(
            "INSERT INTO project (id, owner_id, title, category, legacy_status, created_at)
             VALUES ('old-1', 'owner-1', 'Festival stage', 'performance', 'recruiting',
                     '2025-11-02T09:00:00Z')",
        )
        .execute(&pool)
        .await,
    )?;
    let sink = InMemoryEventSink::default();
    let context = EngineContext::sql(pool, Arc::new(sink.clone()));
    let engine = Engine::new(context.clone());
    let project_id = ProjectId("old-1".to_owned());

    let proposal = Proposal::new_pending(
        project_id.clone(),
        party("dancer-a"),
        party("owner-1"),
        Some(250_000),
        None,
        None,
        Utc::now(),
    );
    let proposal_id = proposal.id.clone();
    step("insert proposal", context.proposals.insert(proposal).await)?;

    let outcome = step("A accepts", engine.negotiation.accept(&as_party("dancer-a"), &proposal_id).await)?;
    require!(outcome.project_change.is_some(), "the project follow-up should commit");

    let project = stored_project(&context, &project_id).await?;
    require_eq!(project.status.confirmation(), ConfirmationStatus::Confirmed);
    require_eq!(project.status.progress(), ProgressStatus::Recruiting);
    require_eq!(project.legacy_status, Some(LegacyProjectStatus::Active));
    require_eq!(project.pm_performer_id, Some(party("dancer-a")));
    require_eq!(sink.of_type("project_status_changed").len(), 1);
    Ok(())
}

#[tokio::test]
async fn fanout_to_n_performers_creates_n_clones_with_one_pending_proposal_each() -> ScenarioResult {
    let (engine, context, _sink) = sql_engine().await?;
    step("insert brief", context.projects.insert(project("brief-1", None, None, None)).await)?;
    let brief_id = ProjectId("brief-1".to_owned());
    let performers = [party("dancer-a"), party("dancer-b"), party("dancer-c")];

    let derived = step(
        "fan out",
        engine.fanout.fanout(&as_party("owner-1"), &brief_id, &performers, &terms(100_000)).await,
    )?;
    require_eq!(derived.len(), 3);

    let clones = step("list clones", context.projects.list_by_parent(&brief_id).await)?;
    require_eq!(clones.len(), 3);
    for clone in &clones {
        let proposals = step("list proposals", context.proposals.list_by_project(&clone.id).await)?;
        require_eq!(proposals.len(), 1);
        require_eq!(proposals[0].status, ProposalStatus::Pending);
        require_eq!(clone.pm_performer_id.as_ref(), Some(&proposals[0].performer_id));
    }

    let repeat = step(
        "repeat fan out",
        engine.fanout.invite(&as_party("owner-1"), &brief_id, &performers, &terms(100_000)).await,
    )?;
    require!(repeat.invited.is_empty(), "every performer is already engaged under the brief");
    require_eq!(repeat.excluded.len(), 3);
    Ok(())
}

#[tokio::test]
async fn owner_and_participants_settle_the_same_project_differently() -> ScenarioResult {
    let (engine, context, _sink) = sql_engine().await?;
    step("insert brief", context.projects.insert(project("brief-1", None, None, None)).await)?;
    step(
        "insert derived",
        context
            .projects
            .insert(project("prj-1", Some("brief-1"), Some("lead-1"), Some(1_000_000)))
            .await,
    )?;
    let lead = as_party("lead-1");
    let project_id = ProjectId("prj-1".to_owned());
    let report = step(
        "lead invites",
        engine.fanout.invite(&lead, &project_id, &[party("dancer-a")], &terms(300_000)).await,
    )?;
    require_eq!(report.invited.len(), 1);
    step(
        "lead invites again",
        engine.fanout.invite(&lead, &project_id, &[party("dancer-b")], &terms(200_000)).await,
    )?;

    for performer in ["dancer-a", "dancer-b"] {
        let proposal = only_proposal_of(&context, performer).await?;
        step("accept", engine.negotiation.accept(&as_party(performer), &proposal.id).await)?;
    }

    let owner = step("owner books", engine.settlement.settle(&as_party("owner-1"), &project_id).await)?;
    require_eq!(owner.revenue, 1_000_000);
    require_eq!(owner.expense, 500_000);
    require_eq!(owner.net_profit, NetProfit::Settled(500_000));
    require!(!owner.has_undecided);

    let dancer_a = step("A books", engine.settlement.settle(&as_party("dancer-a"), &project_id).await)?;
    require_eq!((dancer_a.revenue, dancer_a.expense), (300_000, 0));
    let dancer_b = step("B books", engine.settlement.settle(&as_party("dancer-b"), &project_id).await)?;
    require_eq!((dancer_b.revenue, dancer_b.expense), (200_000, 0));

    let project = stored_project(&context, &project_id).await?;
    require_eq!(project.pm_performer_id, Some(party("lead-1")));
    require_eq!(project.status.confirmation(), ConfirmationStatus::Confirmed);
    Ok(())
}

#[tokio::test]
async fn sender_unread_counts_only_newer_activity_from_the_other_side() -> ScenarioResult {
    let (engine, context, _sink) = sql_engine().await?;
    step(
        "insert derived",
        context.projects.insert(project("prj-1", Some("brief-1"), None, None)).await,
    )?;
    let report = step(
        "invite",
        engine
            .fanout
            .invite(&as_party("owner-1"), &ProjectId("prj-1".to_owned()), &[party("dancer-a")], &terms(350_000))
            .await,
    )?;
    let proposal_id = report.invited[0].proposal_id.clone();
    let owner = party("owner-1");
    let dancer = as_party("dancer-a");
    let pause = || tokio::time::sleep(Duration::from_millis(5));

    require_eq!(step("badge", engine.negotiation.unread_badge(&owner).await)?, 0);
    require_eq!(step("receiver badge", engine.negotiation.unread_badge(&party("dancer-a")).await)?, 1);

    step("offer", engine.negotiation.send_offer(&dancer, &proposal_id, 400_000, "counter").await)?;
    pause().await;
    step("owner reads", engine.negotiation.mark_read(&as_party("owner-1"), &proposal_id).await)?;
    pause().await;
    step("message", engine.negotiation.send_message(&dancer, &proposal_id, "ok").await)?;
    require_eq!(step("unread", engine.negotiation.unread(&as_party("owner-1"), &proposal_id).await)?, 1);

    pause().await;
    let outcome = step("accept", engine.negotiation.accept(&dancer, &proposal_id).await)?;
    require_eq!(outcome.proposal.fee, Some(350_000));
    require_eq!(
        outcome.proposal.latest_offer().and_then(|event| event.entry.suggested_fee()),
        Some(400_000)
    );
    require_eq!(step("badge", engine.negotiation.unread_badge(&owner).await)?, 2);

    step("owner reads again", engine.negotiation.mark_read(&as_party("owner-1"), &proposal_id).await)?;
    step("owner reads twice", engine.negotiation.mark_read(&as_party("owner-1"), &proposal_id).await)?;
    require_eq!(step("badge", engine.negotiation.unread_badge(&owner).await)?, 0);
    Ok(())
}

#[tokio::test]
async fn closing_every_proposal_winds_the_project_down() -> ScenarioResult {
    let (engine, context, sink) = sql_engine().await?;
    step(
        "insert derived",
        context.projects.insert(project("prj-1", Some("brief-1"), None, None)).await,
    )?;
    let project_id = ProjectId("prj-1".to_owned());
    let report = step(
        "invite",
        engine
            .fanout
            .invite(&as_party("owner-1"), &project_id, &[party("dancer-a"), party("dancer-b")], &terms(1))
            .await,
    )?;
    require_eq!(report.invited.len(), 2);

    step(
        "A declines",
        engine.negotiation.decline(&as_party("dancer-a"), &report.invited[0].proposal_id, None).await,
    )?;
    require_eq!(
        stored_project(&context, &project_id).await?.status.confirmation(),
        ConfirmationStatus::Negotiating
    );

    step(
        "B declines",
        engine.negotiation.decline(&as_party("dancer-b"), &report.invited[1].proposal_id, None).await,
    )?;
    let project = stored_project(&context, &project_id).await?;
    require_eq!(project.status.confirmation(), ConfirmationStatus::Declined);
    require!(project.is_deletable());
    require_eq!(sink.of_type("proposal_declined").len(), 2);

    let late = engine.negotiation.accept(&as_party("dancer-b"), &report.invited[1].proposal_id).await;
    match late {
        Err(ApplicationError::Domain(error)) => require!(error.is_invalid_transition()),
        other => return Err(format!("expected an invalid transition, got {other:?}")),
    }
    Ok(())
}

#[tokio::test]
async fn simultaneous_acceptances_leave_one_pm_and_two_accepted_proposals() -> ScenarioResult {
    let (context, _sink) = EngineContext::in_memory();
    let engine = Engine::new(context.clone());
    step(
        "insert derived",
        context.projects.insert(project("prj-1", Some("brief-1"), None, None)).await,
    )?;
    let project_id = ProjectId("prj-1".to_owned());
    let report = step(
        "invite",
        engine
            .fanout
            .invite(&as_party("owner-1"), &project_id, &[party("dancer-a"), party("dancer-b")], &terms(1))
            .await,
    )?;

    let dancer_a = as_party("dancer-a");
    let dancer_b = as_party("dancer-b");
    let (first, second) = tokio::join!(
        engine.negotiation.accept(&dancer_a, &report.invited[0].proposal_id),
        engine.negotiation.accept(&dancer_b, &report.invited[1].proposal_id),
    );
    let first = step("A accepts", first)?;
    let second = step("B accepts", second)?;
    require_eq!(first.proposal.status, ProposalStatus::Accepted);
    require_eq!(second.proposal.status, ProposalStatus::Accepted);

    let project = stored_project(&context, &project_id).await?;
    let pm = project.pm_performer_id.clone().ok_or("no PM assigned")?;
    require!(pm == party("dancer-a") || pm == party("dancer-b"));
    require_eq!(project.status.confirmation(), ConfirmationStatus::Confirmed);

    let careers_a = step("careers", context.careers.list_by_performer(&party("dancer-a")).await)?;
    let careers_b = step("careers", context.careers.list_by_performer(&party("dancer-b")).await)?;
    require_eq!(careers_a.len() + careers_b.len(), 1);
    Ok(())
}

/// Refuses to store a clone led by one specific performer.
struct FlakyProjects {
    inner: InMemoryProjectRepository,
    refuse_pm: PartyId,
}

#[async_trait::async_trait]
impl ProjectRepository for FlakyProjects {
    async fn find_by_id(&self, id: &ProjectId) -> Result<Option<Project>, RepositoryError> {
        self.inner.find_by_id(id).await
    }

    async fn insert(&self, project: Project) -> Result<(), RepositoryError> {
        if project.pm_performer_id.as_ref() == Some(&self.refuse_pm) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.insert(project).await
    }

    async fn save_status(
        &self,
        project: &Project,
        expected: ProjectStatus,
    ) -> Result<bool, RepositoryError> {
        self.inner.save_status(project, expected).await
    }

    async fn assign_pm_if_unset(
        &self,
        id: &ProjectId,
        performer_id: &PartyId,
    ) -> Result<bool, RepositoryError> {
        self.inner.assign_pm_if_unset(id, performer_id).await
    }

    async fn list_by_parent(&self, parent_id: &ProjectId) -> Result<Vec<Project>, RepositoryError> {
        self.inner.list_by_parent(parent_id).await
    }

    async fn list_by_owner(&self, owner_id: &PartyId) -> Result<Vec<Project>, RepositoryError> {
        self.inner.list_by_owner(owner_id).await
    }

    async fn list_by_pm(&self, performer_id: &PartyId) -> Result<Vec<Project>, RepositoryError> {
        self.inner.list_by_pm(performer_id).await
    }
}

#[tokio::test]
async fn partial_fanout_reports_both_created_and_failed_invites() -> ScenarioResult {
    let (mut context, sink) = EngineContext::in_memory();
    context.projects =
        Arc::new(FlakyProjects { inner: InMemoryProjectRepository::default(), refuse_pm: party("dancer-x") });
    let engine = Engine::new(context.clone());
    step("insert brief", context.projects.insert(project("brief-1", None, None, None)).await)?;
    let brief_id = ProjectId("brief-1".to_owned());

    let result = engine
        .fanout
        .fanout(
            &as_party("owner-1"),
            &brief_id,
            &[party("dancer-a"), party("dancer-x"), party("dancer-c")],
            &terms(100_000),
        )
        .await;

    let failure = match result {
        Err(ApplicationError::PartialFanout(failure)) => failure,
        other => return Err(format!("expected a partial fan-out, got {other:?}")),
    };
    require_eq!(failure.succeeded.len(), 2);
    require_eq!(failure.failed.len(), 1);
    require_eq!(failure.failed[0].performer_id, party("dancer-x"));

    let clones = step("list clones", context.projects.list_by_parent(&brief_id).await)?;
    require_eq!(clones.len(), 2);
    require_eq!(sink.of_type("proposal_created").len(), 2);

    let interface = ApplicationError::PartialFanout(failure).into_interface("req-9");
    require_eq!(interface.class(), "partially_applied");
    Ok(())
}
