//! Shared plain-data types.

pub mod config;
