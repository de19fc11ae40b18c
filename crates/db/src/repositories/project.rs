use sqlx::{sqlite::SqliteRow, Row};

use gigbook_core::domain::party::PartyId;
use gigbook_core::domain::project::{
    ConfirmationStatus, LegacyProjectStatus, ProgressStatus, Project, ProjectId, ProjectStatus,
    ScheduleSlot, Visibility,
};

use super::{
    encode_timestamp, parse_date, parse_optional_date, parse_timestamp, ProjectRepository,
    RepositoryError,
};
use crate::DbPool;

const PROJECT_COLUMNS: &str = "SELECT
        id,
        owner_id,
        client_company_ref,
        pm_performer_id,
        parent_project_id,
        title,
        category,
        description,
        visibility,
        start_date,
        end_date,
        confirmation_status,
        progress_status,
        legacy_status,
        budget,
        contract_amount,
        created_at
     FROM project";

pub struct SqlProjectRepository {
    pool: DbPool,
}

impl SqlProjectRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_schedule(&self, id: &ProjectId) -> Result<Vec<ScheduleSlot>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT starts_on, ends_on, label
             FROM project_schedule
             WHERE project_id = ?
             ORDER BY position ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(schedule_from_row).collect()
    }

    async fn hydrate(&self, rows: Vec<SqliteRow>) -> Result<Vec<Project>, RepositoryError> {
        let mut projects = Vec::with_capacity(rows.len());
        for row in rows {
            let mut project = project_from_row(row)?;
            project.schedule = self.load_schedule(&project.id).await?;
            projects.push(project);
        }
        Ok(projects)
    }
}

#[async_trait::async_trait]
impl ProjectRepository for SqlProjectRepository {
    async fn find_by_id(&self, id: &ProjectId) -> Result<Option<Project>, RepositoryError> {
        let row = sqlx::query(&format!("{PROJECT_COLUMNS} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn insert(&self, project: Project) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO project (
                id,
                owner_id,
                client_company_ref,
                pm_performer_id,
                parent_project_id,
                title,
                category,
                description,
                visibility,
                start_date,
                end_date,
                confirmation_status,
                progress_status,
                legacy_status,
                budget,
                contract_amount,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&project.id.0)
        .bind(project.owner_id.as_str())
        .bind(project.client_company_ref.as_deref())
        .bind(project.pm_performer_id.as_ref().map(PartyId::as_str))
        .bind(project.parent_project_id.as_ref().map(|id| id.0.as_str()))
        .bind(&project.title)
        .bind(project.category.as_deref())
        .bind(project.description.as_deref())
        .bind(project.visibility.as_str())
        .bind(project.start_date.map(|date| date.to_string()))
        .bind(project.end_date.map(|date| date.to_string()))
        .bind(project.status.confirmation().as_str())
        .bind(project.status.progress().as_str())
        .bind(project.legacy_status.as_ref().map(LegacyProjectStatus::as_str))
        .bind(project.budget)
        .bind(project.contract_amount)
        .bind(encode_timestamp(project.created_at))
        .execute(&mut *tx)
        .await?;

        for (position, slot) in project.schedule.iter().enumerate() {
            sqlx::query(
                "INSERT INTO project_schedule (project_id, position, starts_on, ends_on, label)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&project.id.0)
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .bind(slot.starts_on.to_string())
            .bind(slot.ends_on.map(|date| date.to_string()))
            .bind(slot.label.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save_status(
        &self,
        project: &Project,
        expected: ProjectStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE project
             SET confirmation_status = ?, progress_status = ?, legacy_status = ?
             WHERE id = ?
               AND ((confirmation_status = ? AND progress_status = ?)
                 OR (confirmation_status IS NULL AND progress_status IS NULL
                     AND legacy_status = ?))",
        )
        .bind(project.status.confirmation().as_str())
        .bind(project.status.progress().as_str())
        .bind(project.legacy_status.as_ref().map(LegacyProjectStatus::as_str))
        .bind(&project.id.0)
        .bind(expected.confirmation().as_str())
        .bind(expected.progress().as_str())
        // Legacy-only rows are guarded on the flag their axes were derived from.
        .bind(expected.legacy_equivalent().as_ref().map(LegacyProjectStatus::as_str))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn assign_pm_if_unset(
        &self,
        id: &ProjectId,
        performer_id: &PartyId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE project SET pm_performer_id = ? WHERE id = ? AND pm_performer_id IS NULL",
        )
        .bind(performer_id.as_str())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_by_parent(&self, parent_id: &ProjectId) -> Result<Vec<Project>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{PROJECT_COLUMNS} WHERE parent_project_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(&parent_id.0)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn list_by_owner(&self, owner_id: &PartyId) -> Result<Vec<Project>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{PROJECT_COLUMNS} WHERE owner_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(owner_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn list_by_pm(&self, performer_id: &PartyId) -> Result<Vec<Project>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{PROJECT_COLUMNS} WHERE pm_performer_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(performer_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }
}

fn project_from_row(row: SqliteRow) -> Result<Project, RepositoryError> {
    let id = ProjectId(row.try_get("id")?);

    let visibility_raw = row.try_get::<String, _>("visibility")?;
    let visibility = Visibility::parse(&visibility_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown project visibility `{visibility_raw}`"))
    })?;

    let legacy_status = row
        .try_get::<Option<String>, _>("legacy_status")?
        .map(|value| {
            LegacyProjectStatus::parse(&value).ok_or_else(|| {
                RepositoryError::Decode(format!("unknown legacy project status `{value}`"))
            })
        })
        .transpose()?;

    let status = decode_status(
        &id,
        row.try_get("confirmation_status")?,
        row.try_get("progress_status")?,
        legacy_status,
    )?;

    Ok(Project {
        owner_id: PartyId(row.try_get("owner_id")?),
        client_company_ref: row.try_get("client_company_ref")?,
        pm_performer_id: row.try_get::<Option<String>, _>("pm_performer_id")?.map(PartyId),
        parent_project_id: row.try_get::<Option<String>, _>("parent_project_id")?.map(ProjectId),
        title: row.try_get("title")?,
        category: row.try_get("category")?,
        description: row.try_get("description")?,
        visibility,
        start_date: parse_optional_date("start_date", row.try_get("start_date")?)?,
        end_date: parse_optional_date("end_date", row.try_get("end_date")?)?,
        schedule: Vec::new(),
        status,
        legacy_status,
        budget: row.try_get("budget")?,
        contract_amount: row.try_get("contract_amount")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        id,
    })
}

/// Rows written before the two-axis split carry only `legacy_status`; their axes
/// are derived from it. A stored pair that breaks the cross-axis rule is
/// reported as a domain error rather than repaired.
fn decode_status(
    id: &ProjectId,
    confirmation: Option<String>,
    progress: Option<String>,
    legacy: Option<LegacyProjectStatus>,
) -> Result<ProjectStatus, RepositoryError> {
    match (confirmation, progress, legacy) {
        (Some(confirmation), Some(progress), _) => {
            let confirmation = ConfirmationStatus::parse(&confirmation).ok_or_else(|| {
                RepositoryError::Decode(format!("unknown confirmation status `{confirmation}`"))
            })?;
            let progress = ProgressStatus::parse(&progress).ok_or_else(|| {
                RepositoryError::Decode(format!("unknown progress status `{progress}`"))
            })?;
            Ok(ProjectStatus::from_parts(id, confirmation, progress)?)
        }
        (None, None, Some(legacy)) => Ok(ProjectStatus::from_legacy(legacy)),
        _ => Err(RepositoryError::Decode(format!(
            "project `{id}` has an incomplete status and no legacy status to derive it from"
        ))),
    }
}

fn schedule_from_row(row: SqliteRow) -> Result<ScheduleSlot, RepositoryError> {
    Ok(ScheduleSlot {
        starts_on: parse_date("starts_on", row.try_get("starts_on")?)?,
        ends_on: parse_optional_date("ends_on", row.try_get("ends_on")?)?,
        label: row.try_get("label")?,
    })
}
