//! The compute host: connection settings and ssh/docker execution.

pub mod config;
pub mod remote;
