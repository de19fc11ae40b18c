pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_configured, connect_with_settings, DbPool};
pub use repositories::{
    CareerRepository, InMemoryCareerRepository, InMemoryProjectRepository,
    InMemoryProposalRepository, ProjectRepository, ProposalRepository, RepositoryError,
    SqlCareerRepository, SqlProjectRepository, SqlProposalRepository,
};
