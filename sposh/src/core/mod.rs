//! The execution tree and its clocks.
//!
//! Core modules do no I/O of their own. Side effects happen only inside the
//! registered capabilities they call, and the real-time timer's sleep.

pub mod action;
pub mod action_pattern;
pub mod competence;
pub mod drive;
pub mod element;
pub mod sense;
pub mod timer;
pub mod value;
