pub mod config;
pub mod coordination;
pub mod domain;
pub mod errors;
pub mod events;
pub mod fanout;
pub mod negotiation;
pub mod roster;
pub mod settlement;
pub mod visibility;

pub use coordination::{ProjectAction, ProjectStatusCoordinator, StatusChange};
pub use domain::career::CareerEntry;
pub use domain::party::PartyId;
pub use domain::project::{
    ConfirmationStatus, LegacyProjectStatus, ProgressStatus, Project, ProjectId, ProjectStatus,
    ScheduleSlot, Visibility,
};
pub use domain::proposal::{
    NegotiationEntry, NegotiationEvent, Proposal, ProposalId, ProposalSide, ProposalStatus,
};
pub use errors::{ApplicationError, AuthorizationFailure, DomainError, InterfaceError};
pub use events::{EngagementEvent, EventSink, InMemoryEventSink, TracingEventSink};
pub use fanout::{FanoutInvite, FanoutMode, FanoutPlanner, InviteTerms, PartialFanoutFailure};
pub use negotiation::{
    ClosedAs, FollowUp, NegotiationThread, ProposalAction, ProposalCommand, ProposalStateMachine,
    ProposalTransition,
};
pub use settlement::{NetProfit, Portfolio, PortfolioFilter, Settlement, SettlementRole};
pub use visibility::{project_visibility, ProjectView};
