pub mod jobs;
pub mod migrate;
pub mod plans;
pub mod users;
