use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sposh::looping::LoopStop;

use crate::judge::Judgment;
use crate::outcome::Outcome;
use crate::results::EvalMeta;

#[derive(Debug, Default)]
pub struct ReportSummary {
    pub runs: usize,
    pub success: usize,
    pub fail: usize,
    pub error: usize,
    pub won: usize,
    pub lost: usize,
    pub step_limit: usize,
    pub avg_steps: Option<f64>,
    pub avg_duration_secs: Option<f64>,
    pub check_pass_rates: BTreeMap<String, (usize, usize)>,
}

pub fn load_run_dirs(case_results_dir: &Path) -> Result<Vec<PathBuf>> {
    if !case_results_dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(case_results_dir)
        .with_context(|| format!("read {}", case_results_dir.display()))?
    {
        let entry = entry.context("read entry")?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

pub fn aggregate(case_results_dir: &Path) -> Result<(ReportSummary, Vec<String>)> {
    let mut summary = ReportSummary::default();
    let mut warnings = Vec::new();

    for run_dir in load_run_dirs(case_results_dir)? {
        let meta: EvalMeta = match read_json(&run_dir.join("meta.json")) {
            Ok(meta) => meta,
            Err(err) => {
                warnings.push(format!("skip {}: meta.json invalid ({err})", run_dir.display()));
                continue;
            }
        };
        let judgment: Judgment = match read_json(&run_dir.join("checks.json")) {
            Ok(judgment) => judgment,
            Err(err) => {
                warnings.push(format!("skip {}: checks.json invalid ({err})", run_dir.display()));
                continue;
            }
        };

        summary.runs += 1;
        match meta.outcome {
            Some(Outcome::Success) => summary.success += 1,
            Some(Outcome::Fail) => summary.fail += 1,
            Some(Outcome::Error) | None => summary.error += 1,
        }
        match meta.stop {
            Some(LoopStop::Won) => summary.won += 1,
            Some(LoopStop::Lost) => summary.lost += 1,
            Some(LoopStop::StepLimit) => summary.step_limit += 1,
            None => {}
        }

        let runs = summary.runs as f64;
        summary.avg_steps = Some(running_mean(summary.avg_steps, meta.steps as f64, runs));
        summary.avg_duration_secs =
            Some(running_mean(summary.avg_duration_secs, meta.duration_secs, runs));

        update_check_pass_rates(&mut summary.check_pass_rates, &judgment);
    }

    Ok((summary, warnings))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

fn running_mean(mean: Option<f64>, value: f64, count: f64) -> f64 {
    match mean {
        None => value,
        Some(mean) => (mean * (count - 1.0) + value) / count,
    }
}

fn update_check_pass_rates(stats: &mut BTreeMap<String, (usize, usize)>, judgment: &Judgment) {
    for check in &judgment.checks {
        let entry = stats.entry(check.label()).or_insert((0, 0));
        if check.passed() {
            entry.0 += 1;
        }
        entry.1 += 1;
    }
}
