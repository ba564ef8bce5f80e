//! Slip-stack reactive planning engine.
//!
//! A plan written in LAP is compiled into a tree of drives, competences and
//! action patterns, then evaluated one step at a time against the actions
//! and senses behaviours register. Each step fires at most one action.
//!
//! - **[`lap`]**: lexing, parsing and rendering plan text.
//! - **[`builder`]**: resolving plan names against a [`registry`] and building
//!   the execution tree.
//! - **[`core`]**: the execution tree and its clocks. No I/O of its own.
//! - **[`io`]**: plan files, scripted behaviours and configuration.
//!
//! [`agent`] ties a compiled plan to its clock; [`looping`] runs it.

pub mod agent;
pub mod builder;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod lap;
pub mod logging;
pub mod looping;
pub mod registry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{Agent, compile};
pub use core::drive::DriveOutcome;
pub use core::timer::StepDiscipline;
pub use error::CompileError;
pub use registry::{Behaviour, CapabilityRegistry};
