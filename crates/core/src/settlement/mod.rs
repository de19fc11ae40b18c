//! Perspective-dependent money for one project or a portfolio. Pure
//! projections over current records; nothing here is cached or persisted.

use serde::{Deserialize, Serialize};

use crate::domain::party::PartyId;
use crate::domain::project::{ConfirmationStatus, Project, ProjectId};
use crate::domain::proposal::{Proposal, ProposalStatus};
use crate::roster::dedupe_by_performer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementRole {
    Owner,
    Pm,
    Participant,
    Outsider,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetProfit {
    Settled(i64),
    /// At least one contributing fee is still open.
    Undetermined,
}

impl NetProfit {
    pub fn amount(&self) -> Option<i64> {
        match self {
            Self::Settled(amount) => Some(*amount),
            Self::Undetermined => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Pending,
    Partial,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub project_id: ProjectId,
    pub role: SettlementRole,
    pub revenue: i64,
    pub pending_revenue: i64,
    pub expense: i64,
    pub pending_expense: i64,
    pub has_undecided: bool,
    pub net_profit: NetProfit,
    pub status: SettlementStatus,
    pub revenue_items: usize,
    pub expense_items: usize,
}

/// One line feeding a settlement: an amount that may still be unknown and
/// whether it is confirmed.
#[derive(Clone, Copy, Debug)]
struct Item {
    fee: Option<i64>,
    confirmed: bool,
}

#[derive(Default)]
struct Tally {
    confirmed: i64,
    pending: i64,
    undecided: bool,
    items: usize,
    confirmed_items: usize,
}

impl Tally {
    fn add(&mut self, item: Item) {
        self.items += 1;
        if item.confirmed {
            self.confirmed_items += 1;
        }
        match (item.fee, item.confirmed) {
            (Some(fee), true) => self.confirmed = self.confirmed.saturating_add(fee),
            (Some(fee), false) => self.pending = self.pending.saturating_add(fee),
            (None, _) => self.undecided = true,
        }
    }
}

fn proposal_item(proposal: &Proposal) -> Item {
    Item { fee: proposal.fee, confirmed: proposal.status == ProposalStatus::Accepted }
}

pub fn role_of(project: &Project, perspective: &PartyId, proposals: &[Proposal]) -> SettlementRole {
    if &project.owner_id == perspective {
        SettlementRole::Owner
    } else if project.is_pm(perspective) {
        SettlementRole::Pm
    } else if proposals
        .iter()
        .any(|proposal| proposal.project_id == project.id && &proposal.performer_id == perspective)
    {
        SettlementRole::Participant
    } else {
        SettlementRole::Outsider
    }
}

/// Settles `project` for `perspective`. `proposals` may hold proposals of
/// other projects; only this project's are read, deduplicated per performer,
/// and only active ones contribute.
pub fn settle(project: &Project, proposals: &[Proposal], perspective: &PartyId) -> Settlement {
    let role = role_of(project, perspective, proposals);
    settle_as(project, proposals, perspective, role)
}

/// Same as [`settle`] with the role fixed by the caller, used when a viewer's
/// visibility narrows what they may be shown.
pub fn settle_as(
    project: &Project,
    proposals: &[Proposal],
    perspective: &PartyId,
    role: SettlementRole,
) -> Settlement {
    let contributing: Vec<&Proposal> = dedupe_by_performer(
        proposals.iter().filter(|proposal| proposal.project_id == project.id),
    )
    .into_iter()
    .filter(|proposal| proposal.status.is_active())
    .collect();
    let own = contributing.iter().find(|proposal| &proposal.performer_id == perspective);
    let others = contributing.iter().filter(|proposal| &proposal.performer_id != perspective);

    let mut revenue = Tally::default();
    let mut expense = Tally::default();

    match role {
        SettlementRole::Owner => {
            revenue.add(owner_item(project));
            others.for_each(|proposal| expense.add(proposal_item(proposal)));
        }
        SettlementRole::Pm => {
            match own {
                Some(proposal) => revenue.add(proposal_item(proposal)),
                None => revenue.add(Item {
                    fee: project.contract_amount,
                    confirmed: project.status.confirmation() != ConfirmationStatus::Negotiating,
                }),
            }
            others.for_each(|proposal| expense.add(proposal_item(proposal)));
        }
        SettlementRole::Participant => {
            if let Some(proposal) = own {
                revenue.add(proposal_item(proposal));
            }
        }
        SettlementRole::Outsider => {}
    }

    let has_undecided = revenue.undecided || expense.undecided;
    let net_profit = if has_undecided {
        NetProfit::Undetermined
    } else {
        NetProfit::Settled(revenue.confirmed.saturating_sub(expense.confirmed))
    };

    let items = revenue.items + expense.items;
    let confirmed_items = revenue.confirmed_items + expense.confirmed_items;
    let status = if items > 0 && confirmed_items == items && !has_undecided {
        SettlementStatus::Completed
    } else if confirmed_items > 0 {
        SettlementStatus::Partial
    } else {
        SettlementStatus::Pending
    };

    Settlement {
        project_id: project.id.clone(),
        role,
        revenue: revenue.confirmed,
        pending_revenue: revenue.pending,
        expense: expense.confirmed,
        pending_expense: expense.pending,
        has_undecided,
        net_profit,
        status,
        revenue_items: revenue.items,
        expense_items: expense.items,
    }
}

/// The owner's side of the books: the contract figure, else the budget,
/// confirmed once the deal is.
fn owner_item(project: &Project) -> Item {
    let confirmed = matches!(
        project.status.confirmation(),
        ConfirmationStatus::Confirmed | ConfirmationStatus::Completed
    );
    Item { fee: project.revenue_figure(), confirmed }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioFilter {
    #[default]
    All,
    Income,
    Expense,
}

impl PortfolioFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }

    fn keeps(&self, settlement: &Settlement) -> bool {
        match self {
            Self::All => true,
            Self::Income => settlement.revenue_items > 0,
            Self::Expense => settlement.expense_items > 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub settlements: Vec<Settlement>,
    pub revenue: i64,
    pub pending_revenue: i64,
    pub expense: i64,
    pub pending_expense: i64,
    pub undecided_projects: usize,
    pub net_profit: NetProfit,
}

/// Settles each project on its own and only then totals, so one project's
/// revenue is never netted against another's expense. Briefs and projects
/// the perspective has no part in are skipped.
pub fn settle_portfolio<'a>(
    projects: impl IntoIterator<Item = &'a Project>,
    proposals: &[Proposal],
    perspective: &PartyId,
    filter: PortfolioFilter,
) -> Portfolio {
    let settlements: Vec<Settlement> = projects
        .into_iter()
        .filter(|project| project.is_derived())
        .map(|project| settle(project, proposals, perspective))
        .filter(|settlement| settlement.role != SettlementRole::Outsider)
        .filter(|settlement| filter.keeps(settlement))
        .collect();

    let undecided_projects =
        settlements.iter().filter(|settlement| settlement.has_undecided).count();
    let revenue = total(settlements.iter().map(|settlement| settlement.revenue));
    let expense = total(settlements.iter().map(|settlement| settlement.expense));
    let net_profit = if undecided_projects > 0 {
        NetProfit::Undetermined
    } else {
        NetProfit::Settled(revenue.saturating_sub(expense))
    };

    Portfolio {
        revenue,
        pending_revenue: total(settlements.iter().map(|settlement| settlement.pending_revenue)),
        expense,
        pending_expense: total(settlements.iter().map(|settlement| settlement.pending_expense)),
        undecided_projects,
        net_profit,
        settlements,
    }
}

/// Money sums clamp at the `i64` bounds instead of overflowing.
fn total(amounts: impl Iterator<Item = i64>) -> i64 {
    amounts.fold(0, i64::saturating_add)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{
        settle, settle_portfolio, NetProfit, PortfolioFilter, SettlementRole, SettlementStatus,
    };
    use crate::domain::party::PartyId;
    use crate::domain::project::{
        ConfirmationStatus, ProgressStatus, Project, ProjectId, ProjectStatus, Visibility,
    };
    use crate::domain::proposal::{Proposal, ProposalStatus};

    fn owner() -> PartyId {
        PartyId::new("owner-1")
    }

    fn project(id: &str, contract_amount: Option<i64>) -> Project {
        let project_id = ProjectId(id.to_owned());
        Project {
            status: ProjectStatus::from_parts(
                &project_id,
                ConfirmationStatus::Confirmed,
                ProgressStatus::Recruiting,
            )
            .expect("valid"),
            id: project_id,
            owner_id: owner(),
            client_company_ref: None,
            pm_performer_id: None,
            parent_project_id: Some(ProjectId("brief-1".to_owned())),
            title: "Gala".to_owned(),
            category: None,
            description: None,
            visibility: Visibility::Private,
            start_date: None,
            end_date: None,
            schedule: Vec::new(),
            legacy_status: None,
            budget: None,
            contract_amount,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn proposal(project: &str, performer: &str, status: ProposalStatus, fee: Option<i64>) -> Proposal {
        let mut proposal = Proposal::new_pending(
            ProjectId(project.to_owned()),
            PartyId::new(performer),
            owner(),
            fee,
            None,
            None,
            Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap(),
        );
        proposal.status = status;
        proposal
    }

    #[test]
    fn owner_and_participants_see_different_books() {
        let project = project("prj-1", Some(1_000_000));
        let proposals = vec![
            proposal("prj-1", "dancer-a", ProposalStatus::Accepted, Some(300_000)),
            proposal("prj-1", "dancer-b", ProposalStatus::Accepted, Some(200_000)),
        ];

        let books = settle(&project, &proposals, &owner());
        assert_eq!(books.role, SettlementRole::Owner);
        assert_eq!((books.revenue, books.expense), (1_000_000, 500_000));
        assert_eq!(books.net_profit, NetProfit::Settled(500_000));
        assert_eq!(books.status, SettlementStatus::Completed);

        let a = settle(&project, &proposals, &PartyId::new("dancer-a"));
        assert_eq!((a.role, a.revenue, a.expense), (SettlementRole::Participant, 300_000, 0));
        let b = settle(&project, &proposals, &PartyId::new("dancer-b"));
        assert_eq!((b.revenue, b.expense), (200_000, 0));
    }

    #[test]
    fn missing_fee_makes_net_profit_undetermined() {
        let project = project("prj-1", Some(1_000_000));
        let proposals = vec![
            proposal("prj-1", "dancer-a", ProposalStatus::Accepted, Some(300_000)),
            proposal("prj-1", "dancer-b", ProposalStatus::Accepted, None),
        ];

        let books = settle(&project, &proposals, &owner());

        assert!(books.has_undecided);
        assert_eq!(books.net_profit, NetProfit::Undetermined);
        assert_eq!(books.net_profit.amount(), None);
        assert_eq!(books.expense, 300_000);
    }

    #[test]
    fn owner_without_contract_or_budget_is_undecided() {
        let books = settle(&project("prj-1", None), &[], &owner());
        assert!(books.has_undecided);
        assert_eq!(books.net_profit, NetProfit::Undetermined);
    }

    #[test]
    fn pending_amounts_stay_out_of_confirmed_totals() {
        let mut project = project("prj-1", Some(900_000));
        project.pm_performer_id = Some(PartyId::new("dancer-a"));
        let proposals = vec![
            proposal("prj-1", "dancer-a", ProposalStatus::Accepted, Some(400_000)),
            proposal("prj-1", "dancer-b", ProposalStatus::Negotiating, Some(150_000)),
            proposal("prj-1", "dancer-c", ProposalStatus::Accepted, Some(100_000)),
            proposal("prj-1", "dancer-d", ProposalStatus::Declined, None),
        ];

        let pm = settle(&project, &proposals, &PartyId::new("dancer-a"));

        assert_eq!(pm.role, SettlementRole::Pm);
        assert_eq!(pm.revenue, 400_000);
        assert_eq!(pm.expense, 100_000);
        assert_eq!(pm.pending_expense, 150_000);
        assert_eq!(pm.net_profit, NetProfit::Settled(300_000));
        assert_eq!(pm.status, SettlementStatus::Partial);
    }

    #[test]
    fn reoffer_history_counts_once_per_performer() {
        let project = project("prj-1", Some(1_000_000));
        let proposals = vec![
            proposal("prj-1", "dancer-a", ProposalStatus::Accepted, Some(300_000)),
            proposal("prj-1", "dancer-a", ProposalStatus::Pending, Some(350_000)),
            proposal("prj-1", "dancer-b", ProposalStatus::Declined, Some(999_999)),
        ];

        let books = settle(&project, &proposals, &owner());

        assert_eq!(books.expense, 300_000);
        assert_eq!(books.pending_expense, 0);
        assert_eq!(books.expense_items, 1);
    }

    #[test]
    fn participant_pending_fee_is_pending_revenue() {
        let project = project("prj-1", Some(1_000_000));
        let proposals = vec![proposal("prj-1", "dancer-a", ProposalStatus::Pending, Some(250_000))];

        let books = settle(&project, &proposals, &PartyId::new("dancer-a"));

        assert_eq!(books.revenue, 0);
        assert_eq!(books.pending_revenue, 250_000);
        assert_eq!(books.status, SettlementStatus::Pending);
        assert_eq!(books.net_profit, NetProfit::Settled(0));
    }

    #[test]
    fn portfolio_totals_per_project_and_flags_undecided() {
        let first = project("prj-1", Some(1_000_000));
        let second = project("prj-2", None);
        let mut brief = project("brief-1", Some(5_000_000));
        brief.parent_project_id = None;
        let proposals = vec![
            proposal("prj-1", "dancer-a", ProposalStatus::Accepted, Some(300_000)),
            proposal("prj-2", "dancer-b", ProposalStatus::Accepted, Some(200_000)),
        ];

        let portfolio = settle_portfolio([&first, &second, &brief], &proposals, &owner(), PortfolioFilter::All);

        assert_eq!(portfolio.settlements.len(), 2);
        assert_eq!(portfolio.revenue, 1_000_000);
        assert_eq!(portfolio.expense, 500_000);
        assert_eq!(portfolio.undecided_projects, 1);
        assert_eq!(portfolio.net_profit, NetProfit::Undetermined);

        let dancer = settle_portfolio(
            [&first, &second],
            &proposals,
            &PartyId::new("dancer-a"),
            PortfolioFilter::Expense,
        );
        assert!(dancer.settlements.is_empty());
        assert_eq!(dancer.net_profit, NetProfit::Settled(0));

        let income = settle_portfolio(
            [&first, &second],
            &proposals,
            &PartyId::new("dancer-a"),
            PortfolioFilter::Income,
        );
        assert_eq!(income.settlements.len(), 1);
        assert_eq!(income.revenue, 300_000);
    }

    #[test]
    fn oversized_sums_clamp_instead_of_overflowing() {
        let big = project("prj-big", Some(1_000));
        let proposals = vec![
            proposal("prj-big", "dancer-a", ProposalStatus::Accepted, Some(i64::MAX)),
            proposal("prj-big", "dancer-b", ProposalStatus::Accepted, Some(i64::MAX)),
            proposal("prj-big", "dancer-c", ProposalStatus::Pending, Some(i64::MAX)),
            proposal("prj-big", "dancer-d", ProposalStatus::Negotiating, Some(i64::MAX)),
        ];

        let settlement = settle(&big, &proposals, &owner());
        assert_eq!(settlement.expense, i64::MAX);
        assert_eq!(settlement.pending_expense, i64::MAX);
        assert_eq!(settlement.net_profit, NetProfit::Settled(1_000 - i64::MAX));

        let projects = [project("prj-1", Some(i64::MAX)), project("prj-2", Some(i64::MAX))];
        let portfolio = settle_portfolio(projects.iter(), &[], &owner(), PortfolioFilter::All);
        assert_eq!(portfolio.revenue, i64::MAX);
        assert_eq!(portfolio.net_profit, NetProfit::Settled(i64::MAX));
    }
}
