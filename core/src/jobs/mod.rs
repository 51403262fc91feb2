//! Remote job orchestration.

pub mod analysis;
pub mod artifacts;
pub mod clock;
pub mod format;
pub mod gpu;
pub mod ids;
pub mod manager;
pub mod queue;
pub mod records;
pub mod scanner;
pub mod script;
pub mod status;
pub mod templates;
pub mod watch;

#[cfg(test)]
pub(crate) mod testutil;
