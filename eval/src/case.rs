//! Case file parsing and validation.
//!
//! Cases are TOML files naming a plan, the scripted behaviours to run it
//! against, and the checks a run must pass. See `eval/cases/` for examples.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use sposh::io::script::{BehaviourScript, ScriptFile};
use sposh::looping::LoopStop;

/// A parsed case file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CaseFile {
    pub case: CaseMeta,
    #[serde(default)]
    pub config: CaseConfig,
    #[serde(default, rename = "behaviour")]
    pub behaviours: Vec<BehaviourScript>,
    #[serde(default)]
    pub checks: Vec<Check>,
}

/// Case metadata.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CaseMeta {
    /// Unique identifier (slug format: `[a-z0-9_-]+`).
    pub id: String,
    pub description: String,
    /// Plan file, relative to the case file.
    pub plan: PathBuf,
}

/// Engine configuration overrides for the case.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CaseConfig {
    pub max_steps: Option<u64>,
    pub stop_on_lost: Option<bool>,
}

/// Verification check applied to a finished run.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Check {
    /// The loop stopped for the given reason.
    Outcome { expect: LoopStop },
    /// The loop stopped within `steps` steps.
    StepsAtMost { steps: u64 },
    /// The named action fired exactly `count` times.
    ActionCount { name: String, count: usize },
    /// The activity log starts with these action names.
    ActionSequence { names: Vec<String> },
}

impl CaseFile {
    /// Load and validate a case file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read case {}", path.display()))?;
        Self::parse_str(&contents).with_context(|| format!("load case {}", path.display()))
    }

    pub fn parse_str(contents: &str) -> Result<Self> {
        let case: CaseFile = toml::from_str(contents).context("parse case")?;
        case.validate()?;
        Ok(case)
    }

    /// The plan path, resolved against the directory holding the case file.
    pub fn plan_path(&self, case_path: &Path) -> PathBuf {
        match case_path.parent() {
            Some(dir) => dir.join(&self.case.plan),
            None => self.case.plan.clone(),
        }
    }

    pub fn script(&self) -> ScriptFile {
        ScriptFile {
            behaviours: self.behaviours.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        validate_case_id(&self.case.id)?;
        if self.case.description.trim().is_empty() {
            bail!("case.description must be non-empty");
        }
        if self.case.plan.as_os_str().is_empty() {
            bail!("case.plan must be non-empty");
        }
        if let Some(max_steps) = self.config.max_steps
            && max_steps == 0
        {
            bail!("config.max_steps must be > 0");
        }
        self.script().validate().context("behaviour invalid")?;
        if self.checks.is_empty() {
            bail!("checks must be a non-empty array");
        }
        for (index, check) in self.checks.iter().enumerate() {
            check
                .validate()
                .with_context(|| format!("checks[{}] invalid", index))?;
        }
        Ok(())
    }
}

impl Check {
    fn validate(&self) -> Result<()> {
        match self {
            Check::Outcome { .. } => {}
            Check::StepsAtMost { steps } => {
                if *steps == 0 {
                    bail!("steps_at_most.steps must be > 0");
                }
            }
            Check::ActionCount { name, .. } => {
                if name.trim().is_empty() {
                    bail!("action_count.name must be non-empty");
                }
            }
            Check::ActionSequence { names } => {
                if names.is_empty() || names.iter().any(|n| n.trim().is_empty()) {
                    bail!("action_sequence.names must be a non-empty array of names");
                }
            }
        }
        Ok(())
    }
}

/// Discover and load all case files from a directory.
///
/// Returns `(path, case)` pairs sorted by id. Errors if duplicate ids are found.
pub fn discover_cases(dir: &Path) -> Result<Vec<(PathBuf, CaseFile)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut cases = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read cases dir {}", dir.display()))? {
        let entry = entry.context("read case entry")?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        let case = CaseFile::load(&path)?;
        cases.push((path, case));
    }
    cases.sort_by(|left, right| left.1.case.id.cmp(&right.1.case.id));
    for pair in cases.windows(2) {
        if pair[0].1.case.id == pair[1].1.case.id {
            return Err(anyhow!("duplicate case.id {}", pair[0].1.case.id));
        }
    }
    Ok(cases)
}

fn validate_case_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("case.id must be non-empty");
    }
    if id.contains('/') || id.contains('\\') {
        bail!("case.id must not contain path separators");
    }
    if id.contains("..") {
        bail!("case.id must not contain '..'");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("case.id must use [a-z0-9_-] only");
    }
    Ok(())
}
