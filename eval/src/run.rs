//! Case execution orchestration.
//!
//! Builds the scripted world and the agent in-process, drives the host loop,
//! applies checks and captures results.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use sposh::agent::Agent;
use sposh::io::config::EngineConfig;
use sposh::io::plan_file::load_plan;
use sposh::io::script::Activity;
use sposh::looping::{LoopOutcome, StepReport, run_loop};
use tracing::{debug, info, instrument, warn};

use crate::case::CaseFile;
use crate::config::apply_case_config;
use crate::judge::{RunRecord, run_checks, write_judgment};
use crate::outcome::{Outcome, classify_outcome};
use crate::results::{CaptureInput, capture_results, update_outcome};

/// Result of running a single case.
#[derive(Debug)]
pub struct RunOutcome {
    /// Unique identifier for this eval run.
    pub eval_run_id: String,
    /// Path to the results directory.
    pub results_dir: PathBuf,
    /// Classified outcome.
    pub outcome: Outcome,
}

/// Run a case end-to-end: build, loop, checks, result capture.
///
/// Plan and behaviour errors are recorded as an `error` outcome rather than
/// failing the eval command. Only result capture failures are returned.
#[instrument(skip_all, fields(case_id = %case.case.id))]
pub fn run_case(repo_root: &Path, case_path: &Path, case: &CaseFile) -> Result<RunOutcome> {
    info!("case run started");

    let config = apply_case_config(EngineConfig::default(), &case.config)?;
    let plan_path = case.plan_path(case_path);

    let started_at = Utc::now();
    let eval_run_id = eval_run_id(&started_at.format("%Y%m%d_%H%M%S").to_string());

    let mut trace: Vec<StepReport> = Vec::new();
    let mut activity: Vec<Activity> = Vec::new();
    let result = execute(case, &plan_path, &config, &mut trace, &mut activity);
    let finished_at = Utc::now();

    let (loop_outcome, error) = match result {
        Ok(outcome) => (Some(outcome), None),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "case run failed");
            (None, Some(format!("{err:#}")))
        }
    };
    info!(
        stop = ?loop_outcome.as_ref().map(|o| o.stop),
        steps = trace.len(),
        "host loop finished"
    );

    let record = RunRecord {
        stop: loop_outcome.as_ref().map(|o| o.stop),
        steps: trace.len() as u64,
        actions: activity.iter().map(|a| a.action.clone()).collect(),
    };

    debug!("capturing results");
    let capture_input = CaptureInput {
        case_id: &case.case.id,
        case_path,
        plan_path: &plan_path,
        eval_run_id: &eval_run_id,
        stop: record.stop,
        steps: record.steps,
        lost_steps: loop_outcome.as_ref().map_or(0, |o| o.lost_steps),
        error,
        trace: &trace,
        activity: &activity,
        started_at,
        finished_at,
        repo_root,
    };
    let results_dir = capture_results(&repo_root.join("eval").join("results"), &capture_input)
        .context("capture results")?;

    debug!("running checks");
    let judgment = run_checks(&case.checks, &record);
    write_judgment(&results_dir.join("checks.json"), &judgment).context("write checks")?;

    let outcome = classify_outcome(&record, &judgment);
    update_outcome(&results_dir, outcome).context("update outcome")?;

    info!(outcome = ?outcome, results_dir = %results_dir.display(), "case run complete");

    Ok(RunOutcome {
        eval_run_id,
        results_dir,
        outcome,
    })
}

/// Build the world and agent, then run the loop, recording steps and
/// activity even when the run fails part way.
fn execute(
    case: &CaseFile,
    plan_path: &Path,
    config: &EngineConfig,
    trace: &mut Vec<StepReport>,
    activity: &mut Vec<Activity>,
) -> Result<LoopOutcome> {
    let plan = load_plan(plan_path)?;
    let world = case.script().build().context("build behaviours")?;
    let mut agent = Agent::from_plan(&plan, &world.registry)
        .with_context(|| format!("build plan {}", plan_path.display()))?;

    let result = run_loop(&mut agent, config, |report| trace.push(*report));
    activity.extend(world.activity.borrow().iter().cloned());
    result
}

fn eval_run_id(timestamp: &str) -> String {
    format!("eval-{timestamp}-{}", generate_short_id())
}

fn generate_short_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::judge::Judgment;
    use crate::results::EvalMeta;

    #[test]
    fn eval_run_id_format() {
        let id = eval_run_id("20260101_120000");
        assert!(id.starts_with("eval-20260101_120000-"));
        assert_eq!(id.len(), "eval-20260101_120000-".len() + 6);
    }

    const CASE: &str = r#"
[case]
id = "door"
description = "push the door open"
plan = "door.lap"

[config]
max_steps = 5

[[behaviour]]
name = "Door"

[[behaviour.action]]
name = "push"
effects = { open = true }

[[behaviour.sense]]
name = "open"
initial = false

[[checks]]
type = "outcome"
expect = "won"

[[checks]]
type = "action_count"
name = "push"
count = 1
"#;

    #[test]
    fn runs_a_case_in_process() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cases = temp.path().join("eval/cases");
        fs::create_dir_all(&cases).expect("cases dir");
        let case_path = cases.join("door.toml");
        fs::write(&case_path, CASE).expect("case");
        fs::write(
            cases.join("door.lap"),
            "((SDC d (goal ((open true))) (drives ((e nil push)))))",
        )
        .expect("plan");

        let case = CaseFile::load(&case_path).expect("load");
        let outcome = run_case(temp.path(), &case_path, &case).expect("run");
        assert_eq!(outcome.outcome, Outcome::Success);

        let meta: EvalMeta = serde_json::from_str(
            &fs::read_to_string(outcome.results_dir.join("meta.json")).expect("meta"),
        )
        .expect("parse meta");
        assert_eq!(meta.steps, 2);
        let judgment: Judgment = serde_json::from_str(
            &fs::read_to_string(outcome.results_dir.join("checks.json")).expect("checks"),
        )
        .expect("parse checks");
        assert!(judgment.all_passed());
    }

    #[test]
    fn plan_errors_are_recorded_as_error_outcome() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cases = temp.path().join("eval/cases");
        fs::create_dir_all(&cases).expect("cases dir");
        let case_path = cases.join("door.toml");
        fs::write(&case_path, CASE).expect("case");
        fs::write(cases.join("door.lap"), "((SDC d nil (drives ((e nil kick)))))").expect("plan");

        let case = CaseFile::load(&case_path).expect("load");
        let outcome = run_case(temp.path(), &case_path, &case).expect("run");
        assert_eq!(outcome.outcome, Outcome::Error);

        let meta: EvalMeta = serde_json::from_str(
            &fs::read_to_string(outcome.results_dir.join("meta.json")).expect("meta"),
        )
        .expect("parse meta");
        assert!(meta.error.as_deref().is_some_and(|e| e.contains("kick")));
    }
}
