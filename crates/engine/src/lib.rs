//! Async services over the engagement core: each operation is a short
//! read-modify-write against the repositories, followed by event emission.

pub mod bootstrap;
pub mod context;
pub mod fanout;
pub mod negotiation;
pub mod notify;
pub mod settlement;
pub mod status;

pub use bootstrap::{bootstrap, bootstrap_with_config, Application, BootstrapError};
pub use context::{EngineContext, RequestContext};
pub use fanout::{FanoutReport, FanoutService};
pub use negotiation::{NegotiationOutcome, NegotiationService, ProposalSummary};
pub use notify::{build_event_sink, WebhookEventSink};
pub use settlement::SettlementService;
pub use status::ProjectStatusService;

/// Every service wired to one shared context.
#[derive(Clone)]
pub struct Engine {
    pub negotiation: NegotiationService,
    pub status: ProjectStatusService,
    pub fanout: FanoutService,
    pub settlement: SettlementService,
}

impl Engine {
    pub fn new(context: EngineContext) -> Self {
        Self {
            negotiation: NegotiationService::new(context.clone()),
            status: ProjectStatusService::new(context.clone()),
            fanout: FanoutService::new(context.clone()),
            settlement: SettlementService::new(context),
        }
    }

    pub fn with_collaborator_limit(mut self, limit: usize) -> Self {
        self.settlement = self.settlement.with_collaborator_limit(limit);
        self
    }
}
