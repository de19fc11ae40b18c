use std::sync::Arc;

use gigbook_core::domain::party::PartyId;
use gigbook_core::events::{EventSink, InMemoryEventSink};
use gigbook_db::repositories::{
    CareerRepository, InMemoryCareerRepository, InMemoryProjectRepository,
    InMemoryProposalRepository, ProjectRepository, ProposalRepository, SqlCareerRepository,
    SqlProjectRepository, SqlProposalRepository,
};
use gigbook_db::DbPool;
use uuid::Uuid;

/// Storage handles and the event sink shared by every service.
#[derive(Clone)]
pub struct EngineContext {
    pub projects: Arc<dyn ProjectRepository>,
    pub proposals: Arc<dyn ProposalRepository>,
    pub careers: Arc<dyn CareerRepository>,
    pub events: Arc<dyn EventSink>,
}

impl EngineContext {
    pub fn sql(pool: DbPool, events: Arc<dyn EventSink>) -> Self {
        Self {
            projects: Arc::new(SqlProjectRepository::new(pool.clone())),
            proposals: Arc::new(SqlProposalRepository::new(pool.clone())),
            careers: Arc::new(SqlCareerRepository::new(pool)),
            events,
        }
    }

    /// In-memory storage wired to a recording sink, returned alongside so
    /// callers can inspect what was emitted.
    pub fn in_memory() -> (Self, InMemoryEventSink) {
        let sink = InMemoryEventSink::default();
        let context = Self {
            projects: Arc::new(InMemoryProjectRepository::default()),
            proposals: Arc::new(InMemoryProposalRepository::default()),
            careers: Arc::new(InMemoryCareerRepository::default()),
            events: Arc::new(sink.clone()),
        };
        (context, sink)
    }

    pub(crate) fn emit_all(&self, events: impl IntoIterator<Item = gigbook_core::EngagementEvent>) {
        for event in events {
            self.events.emit(event);
        }
    }
}

/// Who is acting, plus the id that ties their request's log lines together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub actor: PartyId,
    pub correlation_id: String,
}

impl RequestContext {
    pub fn new(actor: PartyId) -> Self {
        Self { actor, correlation_id: Uuid::new_v4().to_string() }
    }

    pub fn with_correlation_id(actor: PartyId, correlation_id: impl Into<String>) -> Self {
        Self { actor, correlation_id: correlation_id.into() }
    }
}

/// Guarded writes that lose a race are re-read and re-applied this many times.
pub(crate) const MAX_WRITE_ATTEMPTS: usize = 3;
