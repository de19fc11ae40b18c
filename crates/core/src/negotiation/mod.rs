pub mod machine;
pub mod thread;
pub mod unread;

pub use machine::{
    ClosedAs, FollowUp, ProposalAction, ProposalCommand, ProposalStateMachine, ProposalTransition,
};
pub use thread::NegotiationThread;
pub use unread::{mark_read, total_unread, unread_count};
