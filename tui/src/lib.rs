pub mod dashboard;
pub mod tui;
