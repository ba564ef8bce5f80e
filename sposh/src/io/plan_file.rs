//! Reading LAP plan files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::agent::Agent;
use crate::lap::parser::parse_plan;
use crate::lap::plan::PlanSource;
use crate::registry::CapabilityRegistry;

pub fn read_plan_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read plan {}", path.display()))
}

/// Read and parse a plan file.
pub fn load_plan(path: &Path) -> Result<PlanSource> {
    let text = read_plan_text(path)?;
    let plan = parse_plan(&text).with_context(|| format!("parse plan {}", path.display()))?;
    debug!(plan = %path.display(), root = plan.root_name().unwrap_or("?"), "plan loaded");
    Ok(plan)
}

/// Read, parse and build a plan file against `registry`.
pub fn load_agent(path: &Path, registry: &CapabilityRegistry) -> Result<Agent> {
    let plan = load_plan(path)?;
    Agent::from_plan(&plan, registry).with_context(|| format!("build plan {}", path.display()))
}
