pub mod career;
pub mod party;
pub mod project;
pub mod proposal;
