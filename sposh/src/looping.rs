//! Multi-step host loop for `sposh run`.

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::Agent;
use crate::core::drive::DriveOutcome;
use crate::io::config::EngineConfig;

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStop {
    /// The drive collection goal was satisfied.
    Won,
    /// No drive element was ready and `stop_on_lost` is set.
    Lost,
    /// `max_steps` steps ran without either of the above.
    StepLimit,
}

impl fmt::Display for LoopStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopStop::Won => "won",
            LoopStop::Lost => "lost",
            LoopStop::StepLimit => "step_limit",
        })
    }
}

/// One evaluated step, as reported to `on_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// 1-based step number.
    pub step: u64,
    /// Agent clock when the step ended.
    pub time: i64,
    pub outcome: DriveOutcome,
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopOutcome {
    pub steps_executed: u64,
    pub lost_steps: u64,
    pub stop: LoopStop,
}

/// Evaluate the agent repeatedly until it wins, loses (when configured to stop
/// on a lost step), or reaches `max_steps`.
///
/// The agent's clock is replaced according to `config.timer` before the first
/// step. Capability errors stop the loop immediately.
pub fn run_loop<F: FnMut(&StepReport)>(
    agent: &mut Agent,
    config: &EngineConfig,
    mut on_step: F,
) -> Result<LoopOutcome> {
    config.validate()?;
    agent.set_timer(config.timer.timer(agent.step_discipline()));
    info!(agent = %agent.name(), max_steps = config.max_steps, "loop started");

    let mut steps_executed = 0u64;
    let mut lost_steps = 0u64;
    while steps_executed < config.max_steps {
        let outcome = agent.evaluate_step()?;
        steps_executed += 1;
        on_step(&StepReport {
            step: steps_executed,
            time: agent.time(),
            outcome,
        });

        let stop = match outcome {
            DriveOutcome::Won => Some(LoopStop::Won),
            DriveOutcome::Lost => {
                lost_steps += 1;
                config.stop_on_lost.then_some(LoopStop::Lost)
            }
            DriveOutcome::Followed => None,
        };
        if let Some(stop) = stop {
            info!(agent = %agent.name(), steps = steps_executed, %stop, "loop stopped");
            return Ok(LoopOutcome {
                steps_executed,
                lost_steps,
                stop,
            });
        }
    }

    info!(agent = %agent.name(), steps = steps_executed, "step limit reached");
    Ok(LoopOutcome {
        steps_executed,
        lost_steps,
        stop: LoopStop::StepLimit,
    })
}
