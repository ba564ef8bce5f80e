//! File-backed inputs for the host: plans, scripted behaviours and config.

pub mod config;
pub mod plan_file;
pub mod script;
