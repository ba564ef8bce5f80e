//! Engine configuration merging.
//!
//! Applies case-specific overrides to the default engine configuration.

use anyhow::Result;
use sposh::io::config::EngineConfig;

use crate::case::CaseConfig;

/// Apply case configuration overrides to the base engine config.
pub fn apply_case_config(mut base: EngineConfig, overrides: &CaseConfig) -> Result<EngineConfig> {
    if let Some(max_steps) = overrides.max_steps {
        base.max_steps = max_steps;
    }
    if let Some(stop_on_lost) = overrides.stop_on_lost {
        base.stop_on_lost = stop_on_lost;
    }
    base.validate()?;
    Ok(base)
}
