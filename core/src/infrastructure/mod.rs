//! Process execution backends.

pub mod runner;
