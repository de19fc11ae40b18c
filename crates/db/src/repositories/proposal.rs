use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use gigbook_core::domain::party::PartyId;
use gigbook_core::domain::project::ProjectId;
use gigbook_core::domain::proposal::{
    NegotiationEntry, NegotiationEvent, Proposal, ProposalId, ProposalSide, ProposalStatus,
};
use gigbook_core::negotiation::NegotiationThread;

use super::{
    encode_timestamp, parse_optional_timestamp, parse_timestamp, ProposalRepository,
    RepositoryError,
};
use crate::DbPool;

const PROPOSAL_COLUMNS: &str = "SELECT
        id,
        project_id,
        performer_id,
        sender_id,
        status,
        fee,
        role,
        details,
        sender_last_read_at,
        receiver_last_read_at,
        created_at
     FROM proposal";

pub struct SqlProposalRepository {
    pool: DbPool,
}

impl SqlProposalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_thread(&self, id: &ProposalId) -> Result<NegotiationThread, RepositoryError> {
        let rows = sqlx::query(
            "SELECT occurred_at, actor_id, kind, text, suggested_fee
             FROM negotiation_event
             WHERE proposal_id = ?
             ORDER BY sequence ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        let events = rows.into_iter().map(event_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(NegotiationThread::from_events(events))
    }

    async fn hydrate(&self, rows: Vec<SqliteRow>) -> Result<Vec<Proposal>, RepositoryError> {
        let mut proposals = Vec::with_capacity(rows.len());
        for row in rows {
            let mut proposal = proposal_from_row(row)?;
            proposal.negotiation_log = self.load_thread(&proposal.id).await?;
            proposals.push(proposal);
        }
        Ok(proposals)
    }
}

#[async_trait::async_trait]
impl ProposalRepository for SqlProposalRepository {
    async fn find_by_id(&self, id: &ProposalId) -> Result<Option<Proposal>, RepositoryError> {
        let row = sqlx::query(&format!("{PROPOSAL_COLUMNS} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn insert(&self, proposal: Proposal) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO proposal (
                id,
                project_id,
                performer_id,
                sender_id,
                status,
                fee,
                role,
                details,
                sender_last_read_at,
                receiver_last_read_at,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&proposal.id.0)
        .bind(&proposal.project_id.0)
        .bind(proposal.performer_id.as_str())
        .bind(proposal.sender_id.as_str())
        .bind(proposal.status.as_str())
        .bind(proposal.fee)
        .bind(proposal.role.as_deref())
        .bind(proposal.details.as_deref())
        .bind(proposal.sender_last_read_at.map(encode_timestamp))
        .bind(proposal.receiver_last_read_at.map(encode_timestamp))
        .bind(encode_timestamp(proposal.created_at))
        .execute(&mut *tx)
        .await?;

        for (sequence, event) in proposal.negotiation_log.events().iter().enumerate() {
            insert_event(&mut tx, &proposal.id, sequence_number(sequence), event).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn record_transition(
        &self,
        proposal: &Proposal,
        expected: ProposalStatus,
        appended: &NegotiationEvent,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // The guarded update takes the write lock before the sequence is read,
        // so concurrent appenders serialize instead of colliding.
        let updated = sqlx::query("UPDATE proposal SET status = ?, fee = ? WHERE id = ? AND status = ?")
            .bind(proposal.status.as_str())
            .bind(proposal.fee)
            .bind(&proposal.id.0)
            .bind(expected.as_str())
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let next_sequence = sqlx::query(
            "SELECT COALESCE(MAX(sequence) + 1, 0) AS next_sequence
             FROM negotiation_event
             WHERE proposal_id = ?",
        )
        .bind(&proposal.id.0)
        .fetch_one(&mut *tx)
        .await?
        .try_get::<i64, _>("next_sequence")?;

        insert_event(&mut tx, &proposal.id, next_sequence, appended).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn record_read(
        &self,
        id: &ProposalId,
        side: ProposalSide,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let statement = match side {
            ProposalSide::Sender => {
                "UPDATE proposal SET sender_last_read_at = ?
                 WHERE id = ? AND (sender_last_read_at IS NULL OR sender_last_read_at < ?)"
            }
            ProposalSide::Receiver => {
                "UPDATE proposal SET receiver_last_read_at = ?
                 WHERE id = ? AND (receiver_last_read_at IS NULL OR receiver_last_read_at < ?)"
            }
        };
        let encoded = encode_timestamp(at);

        let result = sqlx::query(statement)
            .bind(&encoded)
            .bind(&id.0)
            .bind(&encoded)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_by_project(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<Proposal>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{PROPOSAL_COLUMNS} WHERE project_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(&project_id.0)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn list_by_projects(
        &self,
        project_ids: &[ProjectId],
    ) -> Result<Vec<Proposal>, RepositoryError> {
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(PROPOSAL_COLUMNS);
        builder.push(" WHERE project_id IN (");
        let mut separated = builder.separated(", ");
        for project_id in project_ids {
            separated.push_bind(project_id.0.as_str());
        }
        separated.push_unseparated(") ORDER BY created_at ASC, id ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        self.hydrate(rows).await
    }

    async fn list_by_performer(
        &self,
        performer_id: &PartyId,
    ) -> Result<Vec<Proposal>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{PROPOSAL_COLUMNS} WHERE performer_id = ? ORDER BY created_at DESC, id ASC"
        ))
        .bind(performer_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn list_by_sender(&self, sender_id: &PartyId) -> Result<Vec<Proposal>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{PROPOSAL_COLUMNS} WHERE sender_id = ? ORDER BY created_at DESC, id ASC"
        ))
        .bind(sender_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }
}

async fn insert_event(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    proposal_id: &ProposalId,
    sequence: i64,
    event: &NegotiationEvent,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO negotiation_event (
            proposal_id,
            sequence,
            occurred_at,
            actor_id,
            kind,
            text,
            suggested_fee
         ) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&proposal_id.0)
    .bind(sequence)
    .bind(encode_timestamp(event.timestamp))
    .bind(event.actor_id.as_str())
    .bind(event.entry.kind())
    .bind(&event.text)
    .bind(event.entry.suggested_fee())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn sequence_number(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

fn proposal_from_row(row: SqliteRow) -> Result<Proposal, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = ProposalStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown proposal status `{status_raw}`")))?;

    Ok(Proposal {
        id: ProposalId(row.try_get("id")?),
        project_id: ProjectId(row.try_get("project_id")?),
        performer_id: PartyId(row.try_get("performer_id")?),
        sender_id: PartyId(row.try_get("sender_id")?),
        status,
        fee: row.try_get("fee")?,
        role: row.try_get("role")?,
        details: row.try_get("details")?,
        negotiation_log: NegotiationThread::default(),
        sender_last_read_at: parse_optional_timestamp(
            "sender_last_read_at",
            row.try_get("sender_last_read_at")?,
        )?,
        receiver_last_read_at: parse_optional_timestamp(
            "receiver_last_read_at",
            row.try_get("receiver_last_read_at")?,
        )?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn event_from_row(row: SqliteRow) -> Result<NegotiationEvent, RepositoryError> {
    let kind = row.try_get::<String, _>("kind")?;
    let suggested_fee = row.try_get::<Option<i64>, _>("suggested_fee")?;
    let entry = NegotiationEntry::from_parts(&kind, suggested_fee).ok_or_else(|| {
        RepositoryError::Decode(format!("malformed negotiation event of kind `{kind}`"))
    })?;

    Ok(NegotiationEvent {
        timestamp: parse_timestamp("occurred_at", row.try_get("occurred_at")?)?,
        actor_id: PartyId(row.try_get("actor_id")?),
        text: row.try_get("text")?,
        entry,
    })
}
