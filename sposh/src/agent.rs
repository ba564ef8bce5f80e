//! The agent: a compiled plan plus the clock that drives it.

use anyhow::Result;
use tracing::debug;

use crate::builder::{BuiltPlan, build};
use crate::core::drive::{DriveCollection, DriveOutcome};
use crate::core::element::PlanLibrary;
use crate::core::timer::{StepDiscipline, Timer};
use crate::error::CompileError;
use crate::lap::parser::parse_plan;
use crate::lap::plan::{Docstring, PlanSource};
use crate::registry::CapabilityRegistry;

/// Parse `source` and bind it against `registry`.
pub fn compile(source: &str, registry: &CapabilityRegistry) -> Result<Agent, CompileError> {
    let plan = parse_plan(source)?;
    Agent::from_plan(&plan, registry)
}

#[derive(Debug)]
pub struct Agent {
    library: PlanLibrary,
    drive_collection: DriveCollection,
    discipline: StepDiscipline,
    timer: Box<dyn Timer>,
    docstring: Option<Docstring>,
}

impl Agent {
    pub fn from_plan(plan: &PlanSource, registry: &CapabilityRegistry) -> Result<Self, CompileError> {
        let BuiltPlan {
            library,
            drive_collection,
            discipline,
            docstring,
        } = build(plan, registry)?;
        debug!(collection = %drive_collection.name(), ?discipline, "agent compiled");
        let mut timer = discipline.timer();
        timer.reset();
        Ok(Self {
            library,
            drive_collection,
            discipline,
            timer,
            docstring,
        })
    }

    /// Wait for the step slot, fire the drive collection once, and close the
    /// step. Capability errors abort the step and are returned as-is.
    pub fn evaluate_step(&mut self) -> Result<DriveOutcome> {
        self.timer.loop_wait();
        let now = self.timer.time();
        let outcome = self.drive_collection.fire(&self.library, now)?;
        self.timer.loop_end();
        Ok(outcome)
    }

    /// Replace the clock. The new timer starts from zero.
    pub fn set_step_discipline(&mut self, discipline: StepDiscipline) {
        self.discipline = discipline;
        self.set_timer(discipline.timer());
    }

    /// Install a custom clock, for hosts that need their own pacing.
    pub fn set_timer(&mut self, mut timer: Box<dyn Timer>) {
        timer.reset();
        self.timer = timer;
    }

    pub fn step_discipline(&self) -> StepDiscipline {
        self.discipline
    }

    /// Current timestamp of the agent's clock.
    pub fn time(&self) -> i64 {
        self.timer.time()
    }

    /// Return every cursor, retry counter and timestamp to its initial state
    /// and restart the clock.
    pub fn reset(&mut self) {
        self.drive_collection.reset();
        self.timer.reset();
    }

    pub fn name(&self) -> &str {
        self.drive_collection.name()
    }

    pub fn drive_collection(&self) -> &DriveCollection {
        &self.drive_collection
    }

    pub fn library(&self) -> &PlanLibrary {
        &self.library
    }

    pub fn docstring(&self) -> Option<&Docstring> {
        self.docstring.as_ref()
    }
}
