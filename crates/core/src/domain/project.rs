use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::party::PartyId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Commercial axis: does a deal exist at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationStatus {
    Negotiating,
    Confirmed,
    Declined,
    Cancelled,
    Completed,
}

impl ConfirmationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negotiating => "negotiating",
            Self::Confirmed => "confirmed",
            Self::Declined => "declined",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "negotiating" => Some(Self::Negotiating),
            "confirmed" => Some(Self::Confirmed),
            "declined" => Some(Self::Declined),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Declined | Self::Cancelled | Self::Completed)
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational axis: is staffing or execution happening.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Idle,
    Recruiting,
    InProgress,
    Completed,
    Cancelled,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recruiting => "recruiting",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "recruiting" => Some(Self::Recruiting),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-column status carried by projects created before the two-axis split.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyProjectStatus {
    Recruiting,
    Active,
    Completed,
    Cancelled,
}

impl LegacyProjectStatus {
    pub const ALL: [Self; 4] = [Self::Recruiting, Self::Active, Self::Completed, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recruiting => "recruiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "recruiting" => Some(Self::Recruiting),
            "active" => Some(Self::Active),
            "completed" | "done" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Both status axes of a project. Fields are private: the coordination module
/// is the only writer, and every constructor checks the cross-axis invariant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectStatus {
    confirmation: ConfirmationStatus,
    progress: ProgressStatus,
}

impl ProjectStatus {
    pub fn negotiating() -> Self {
        Self { confirmation: ConfirmationStatus::Negotiating, progress: ProgressStatus::Idle }
    }

    /// Rebuilds a stored status, surfacing an invariant violation instead of
    /// silently repairing it.
    pub fn from_parts(
        project_id: &ProjectId,
        confirmation: ConfirmationStatus,
        progress: ProgressStatus,
    ) -> Result<Self, DomainError> {
        match invariant_violation(confirmation, progress) {
            Some(detail) => Err(DomainError::InconsistentProjectState {
                project_id: project_id.clone(),
                detail,
            }),
            None => Ok(Self { confirmation, progress }),
        }
    }

    pub fn from_legacy(legacy: LegacyProjectStatus) -> Self {
        let (confirmation, progress) = match legacy {
            LegacyProjectStatus::Recruiting => {
                (ConfirmationStatus::Negotiating, ProgressStatus::Idle)
            }
            LegacyProjectStatus::Active => {
                (ConfirmationStatus::Confirmed, ProgressStatus::Recruiting)
            }
            LegacyProjectStatus::Completed => {
                (ConfirmationStatus::Completed, ProgressStatus::Completed)
            }
            LegacyProjectStatus::Cancelled => {
                (ConfirmationStatus::Cancelled, ProgressStatus::Cancelled)
            }
        };
        Self { confirmation, progress }
    }

    /// The legacy flag whose derived axes equal this status, if any.
    pub fn legacy_equivalent(&self) -> Option<LegacyProjectStatus> {
        LegacyProjectStatus::ALL.into_iter().find(|legacy| Self::from_legacy(*legacy) == *self)
    }

    pub fn confirmation(&self) -> ConfirmationStatus {
        self.confirmation
    }

    pub fn progress(&self) -> ProgressStatus {
        self.progress
    }

    pub fn can_recruit(&self) -> bool {
        self.confirmation == ConfirmationStatus::Confirmed
            && self.progress == ProgressStatus::Recruiting
    }

    pub(crate) fn set(
        &mut self,
        project_id: &ProjectId,
        confirmation: ConfirmationStatus,
        progress: ProgressStatus,
    ) -> Result<(), DomainError> {
        *self = Self::from_parts(project_id, confirmation, progress)?;
        Ok(())
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.confirmation, self.progress)
    }
}

impl Default for ProjectStatus {
    fn default() -> Self {
        Self::negotiating()
    }
}

pub fn invariant_violation(
    confirmation: ConfirmationStatus,
    progress: ProgressStatus,
) -> Option<String> {
    let staffing = matches!(progress, ProgressStatus::Recruiting | ProgressStatus::InProgress);
    if staffing && confirmation != ConfirmationStatus::Confirmed {
        return Some(format!(
            "progress `{progress}` requires confirmation `confirmed`, found `{confirmation}`"
        ));
    }

    let dead = matches!(confirmation, ConfirmationStatus::Declined | ConfirmationStatus::Cancelled);
    if dead && progress != ProgressStatus::Cancelled {
        return Some(format!(
            "confirmation `{confirmation}` requires progress `cancelled`, found `{progress}`"
        ));
    }

    None
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub starts_on: NaiveDate,
    pub ends_on: Option<NaiveDate>,
    pub label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub owner_id: PartyId,
    pub client_company_ref: Option<String>,
    pub pm_performer_id: Option<PartyId>,
    pub parent_project_id: Option<ProjectId>,
    pub title: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub visibility: Visibility,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub schedule: Vec<ScheduleSlot>,
    pub status: ProjectStatus,
    pub legacy_status: Option<LegacyProjectStatus>,
    pub budget: Option<i64>,
    pub contract_amount: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// A parentless project only ever serves as a fan-out template.
    pub fn is_brief(&self) -> bool {
        self.parent_project_id.is_none()
    }

    pub fn is_derived(&self) -> bool {
        self.parent_project_id.is_some()
    }

    pub fn is_deletable(&self) -> bool {
        self.status.confirmation().is_closed()
    }

    pub fn is_pm(&self, party: &PartyId) -> bool {
        self.pm_performer_id.as_ref() == Some(party)
    }

    /// Owner-side revenue figure: the contract amount when set, else the budget.
    pub fn revenue_figure(&self) -> Option<i64> {
        self.contract_amount.or(self.budget)
    }
}
