//! jobrig core: remote job orchestration over ssh and docker.

pub mod cli;
pub mod command;
pub mod data;
pub mod error;
pub mod help;
pub mod infrastructure;
pub mod jobs;
pub mod response;
pub mod rig;
pub mod store;
pub mod sys;
pub mod types;
