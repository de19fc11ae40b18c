use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use thiserror::Error;

use gigbook_core::domain::career::CareerEntry;
use gigbook_core::domain::party::PartyId;
use gigbook_core::domain::project::{Project, ProjectId, ProjectStatus};
use gigbook_core::domain::proposal::{
    NegotiationEvent, Proposal, ProposalId, ProposalSide, ProposalStatus,
};
use gigbook_core::errors::{ApplicationError, DomainError};

pub mod career;
pub mod memory;
pub mod project;
pub mod proposal;

pub use career::SqlCareerRepository;
pub use memory::{InMemoryCareerRepository, InMemoryProjectRepository, InMemoryProposalRepository};
pub use project::SqlProjectRepository;
pub use proposal::SqlProposalRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Domain(error) => ApplicationError::Domain(error),
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProjectId) -> Result<Option<Project>, RepositoryError>;

    async fn insert(&self, project: Project) -> Result<(), RepositoryError>;

    /// Persists the status axes and legacy flag of `project`, but only while the
    /// stored axes still equal `expected`. Returns whether the write landed.
    async fn save_status(
        &self,
        project: &Project,
        expected: ProjectStatus,
    ) -> Result<bool, RepositoryError>;

    /// First writer wins. Returns `false` when a PM was already set.
    async fn assign_pm_if_unset(
        &self,
        id: &ProjectId,
        performer_id: &PartyId,
    ) -> Result<bool, RepositoryError>;

    async fn list_by_parent(&self, parent_id: &ProjectId) -> Result<Vec<Project>, RepositoryError>;

    async fn list_by_owner(&self, owner_id: &PartyId) -> Result<Vec<Project>, RepositoryError>;

    async fn list_by_pm(&self, performer_id: &PartyId) -> Result<Vec<Project>, RepositoryError>;
}

#[async_trait]
pub trait ProposalRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProposalId) -> Result<Option<Proposal>, RepositoryError>;

    async fn insert(&self, proposal: Proposal) -> Result<(), RepositoryError>;

    /// Writes the status and fee of `proposal` and appends `appended` to its log
    /// in one unit, provided the stored status is still `expected`. Returns
    /// `false` without writing anything when another writer got there first.
    async fn record_transition(
        &self,
        proposal: &Proposal,
        expected: ProposalStatus,
        appended: &NegotiationEvent,
    ) -> Result<bool, RepositoryError>;

    /// Moves one side's read marker forward. Never moves it backward.
    async fn record_read(
        &self,
        id: &ProposalId,
        side: ProposalSide,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn list_by_project(&self, project_id: &ProjectId)
        -> Result<Vec<Proposal>, RepositoryError>;

    async fn list_by_projects(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<Vec<Proposal>, RepositoryError>;

    async fn list_by_performer(
        &self,
        performer_id: &PartyId,
    ) -> Result<Vec<Proposal>, RepositoryError>;

    async fn list_by_sender(&self, sender_id: &PartyId) -> Result<Vec<Proposal>, RepositoryError>;
}

#[async_trait]
pub trait CareerRepository: Send + Sync {
    /// Returns `false` when the performer already has an entry for the project.
    async fn insert_if_absent(&self, entry: CareerEntry) -> Result<bool, RepositoryError>;

    async fn list_by_performer(
        &self,
        performer_id: &PartyId,
    ) -> Result<Vec<CareerEntry>, RepositoryError>;
}

/// Fixed-width UTC encoding, so stored timestamps also compare correctly as text.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

pub(crate) fn parse_date(column: &str, value: String) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|error| {
        RepositoryError::Decode(format!("invalid date in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_optional_date(
    column: &str,
    value: Option<String>,
) -> Result<Option<NaiveDate>, RepositoryError> {
    value.map(|date| parse_date(column, date)).transpose()
}
