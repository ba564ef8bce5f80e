//! Check execution and outcome recording.
//!
//! Applies a case's checks to the record of a finished run.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sposh::looping::LoopStop;
use tracing::{debug, instrument};

use crate::case::Check;

/// What a run did, as seen by the checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRecord {
    /// Why the loop stopped. `None` when the run failed with an error.
    pub stop: Option<LoopStop>,
    pub steps: u64,
    /// Fired action names, in order.
    pub actions: Vec<String>,
}

/// Collected check outcomes for a run.
#[derive(Debug, Serialize, Deserialize)]
pub struct Judgment {
    pub checks: Vec<CheckOutcome>,
}

impl Judgment {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(CheckOutcome::passed)
    }
}

/// Result of applying a single check.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckOutcome {
    Outcome {
        expect: LoopStop,
        actual: Option<LoopStop>,
        passed: bool,
    },
    StepsAtMost {
        steps: u64,
        actual: u64,
        passed: bool,
    },
    ActionCount {
        name: String,
        count: usize,
        actual: usize,
        passed: bool,
    },
    ActionSequence {
        names: Vec<String>,
        actual: Vec<String>,
        passed: bool,
    },
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        match self {
            CheckOutcome::Outcome { passed, .. }
            | CheckOutcome::StepsAtMost { passed, .. }
            | CheckOutcome::ActionCount { passed, .. }
            | CheckOutcome::ActionSequence { passed, .. } => *passed,
        }
    }

    /// Stable label used to aggregate pass rates across runs.
    pub fn label(&self) -> String {
        match self {
            CheckOutcome::Outcome { expect, .. } => format!("outcome({expect})"),
            CheckOutcome::StepsAtMost { steps, .. } => format!("steps_at_most({steps})"),
            CheckOutcome::ActionCount { name, count, .. } => {
                format!("action_count({name}={count})")
            }
            CheckOutcome::ActionSequence { names, .. } => {
                format!("action_sequence({})", names.join(" "))
            }
        }
    }
}

/// Apply all checks to a run record.
#[instrument(skip_all, fields(check_count = checks.len()))]
pub fn run_checks(checks: &[Check], record: &RunRecord) -> Judgment {
    let mut outcomes = Vec::with_capacity(checks.len());
    for check in checks {
        let outcome = match check {
            Check::Outcome { expect } => CheckOutcome::Outcome {
                expect: *expect,
                actual: record.stop,
                passed: record.stop == Some(*expect),
            },
            Check::StepsAtMost { steps } => CheckOutcome::StepsAtMost {
                steps: *steps,
                actual: record.steps,
                passed: record.stop.is_some() && record.steps <= *steps,
            },
            Check::ActionCount { name, count } => {
                let actual = record.actions.iter().filter(|a| *a == name).count();
                CheckOutcome::ActionCount {
                    name: name.clone(),
                    count: *count,
                    actual,
                    passed: actual == *count,
                }
            }
            Check::ActionSequence { names } => {
                let actual: Vec<String> = record.actions.iter().take(names.len()).cloned().collect();
                CheckOutcome::ActionSequence {
                    names: names.clone(),
                    passed: actual == *names,
                    actual,
                }
            }
        };
        debug!(check = %outcome.label(), passed = outcome.passed(), "check result");
        outcomes.push(outcome);
    }
    Judgment { checks: outcomes }
}

pub fn write_judgment(path: &Path, judgment: &Judgment) -> Result<()> {
    let contents = serde_json::to_string_pretty(judgment).context("serialize checks")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RunRecord {
        RunRecord {
            stop: Some(LoopStop::Won),
            steps: 4,
            actions: vec!["look".to_string(), "eat".to_string(), "look".to_string()],
        }
    }

    #[test]
    fn outcome_and_steps() {
        let checks = vec![
            Check::Outcome {
                expect: LoopStop::Won,
            },
            Check::StepsAtMost { steps: 3 },
        ];
        let judgment = run_checks(&checks, &record());
        assert!(judgment.checks[0].passed());
        assert!(!judgment.checks[1].passed());
        assert!(!judgment.all_passed());
    }

    #[test]
    fn action_count_and_sequence() {
        let checks = vec![
            Check::ActionCount {
                name: "look".to_string(),
                count: 2,
            },
            Check::ActionSequence {
                names: vec!["look".to_string(), "eat".to_string()],
            },
            Check::ActionSequence {
                names: vec!["eat".to_string()],
            },
        ];
        let judgment = run_checks(&checks, &record());
        let passed: Vec<bool> = judgment.checks.iter().map(CheckOutcome::passed).collect();
        assert_eq!(passed, vec![true, true, false]);
    }

    #[test]
    fn failed_run_fails_outcome_and_step_checks() {
        let record = RunRecord {
            stop: None,
            steps: 1,
            actions: Vec::new(),
        };
        let checks = vec![
            Check::Outcome {
                expect: LoopStop::StepLimit,
            },
            Check::StepsAtMost { steps: 10 },
        ];
        let judgment = run_checks(&checks, &record);
        assert!(judgment.checks.iter().all(|c| !c.passed()));
    }

    #[test]
    fn labels_are_stable() {
        let judgment = run_checks(
            &[Check::ActionCount {
                name: "eat".to_string(),
                count: 1,
            }],
            &record(),
        );
        assert_eq!(judgment.checks[0].label(), "action_count(eat=1)");
    }
}
