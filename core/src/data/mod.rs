//! Config-dir documents.

pub mod settings;
