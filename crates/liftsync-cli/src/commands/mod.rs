pub mod common;
pub mod completions;
pub mod config;
pub mod schedule;
pub mod sync;
pub mod workout;
