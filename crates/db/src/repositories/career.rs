use sqlx::{sqlite::SqliteRow, Row};

use gigbook_core::domain::career::CareerEntry;
use gigbook_core::domain::party::PartyId;
use gigbook_core::domain::project::ProjectId;

use super::{encode_timestamp, parse_date, parse_timestamp, CareerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCareerRepository {
    pool: DbPool,
}

impl SqlCareerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CareerRepository for SqlCareerRepository {
    async fn insert_if_absent(&self, entry: CareerEntry) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO career_entry (
                performer_id,
                project_id,
                title,
                role_label,
                dated_on,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(performer_id, project_id) DO NOTHING",
        )
        .bind(entry.performer_id.as_str())
        .bind(&entry.project_id.0)
        .bind(&entry.title)
        .bind(&entry.role_label)
        .bind(entry.dated_on.to_string())
        .bind(encode_timestamp(entry.created_at))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_by_performer(
        &self,
        performer_id: &PartyId,
    ) -> Result<Vec<CareerEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT performer_id, project_id, title, role_label, dated_on, created_at
             FROM career_entry
             WHERE performer_id = ?
             ORDER BY dated_on DESC, project_id ASC",
        )
        .bind(performer_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(career_from_row).collect()
    }
}

fn career_from_row(row: SqliteRow) -> Result<CareerEntry, RepositoryError> {
    Ok(CareerEntry {
        performer_id: PartyId(row.try_get("performer_id")?),
        project_id: ProjectId(row.try_get("project_id")?),
        title: row.try_get("title")?,
        role_label: row.try_get("role_label")?,
        dated_on: parse_date("dated_on", row.try_get("dated_on")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, Utc};

    use gigbook_core::domain::career::CareerEntry;
    use gigbook_core::domain::party::PartyId;
    use gigbook_core::domain::project::ProjectId;

    use super::SqlCareerRepository;
    use crate::migrations;
    use crate::repositories::CareerRepository;
    use crate::connect_with_settings;

    #[tokio::test]
    async fn career_entry_is_written_once_per_performer_and_project() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        sqlx::query(
            "INSERT INTO project (id, owner_id, title, confirmation_status, progress_status, created_at)
             VALUES ('prj-1', 'owner-1', 'Spring showcase', 'confirmed', 'recruiting', '2026-03-01T09:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert project");

        let repo = SqlCareerRepository::new(pool.clone());
        let entry = CareerEntry {
            performer_id: PartyId::new("dancer-a"),
            project_id: ProjectId("prj-1".to_owned()),
            title: "Spring showcase".to_owned(),
            role_label: "Choreographer (PM)".to_owned(),
            dated_on: NaiveDate::from_ymd_opt(2026, 4, 10).expect("valid date"),
            created_at: DateTime::parse_from_rfc3339("2026-03-02T12:00:00Z")
                .expect("valid rfc3339")
                .with_timezone(&Utc),
        };

        assert!(repo.insert_if_absent(entry.clone()).await.expect("first insert"));
        assert!(!repo.insert_if_absent(entry.clone()).await.expect("duplicate insert"));

        let entries = repo.list_by_performer(&PartyId::new("dancer-a")).await.expect("list");
        assert_eq!(entries, vec![entry]);
        pool.close().await;
    }
}
