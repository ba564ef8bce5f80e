//! Host loop configuration (`sposh.toml` or `--config <path>`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::core::timer::{DEFAULT_PERIOD_MS, DEFAULT_WINDOW, RealTimeTimer, StepDiscipline, SteppedTimer, Timer};

/// Engine configuration (TOML).
///
/// Missing fields take their defaults, so an empty file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Stop after this many evaluation steps.
    pub max_steps: u64,

    /// Stop as soon as a step reports that no drive element was ready.
    pub stop_on_lost: bool,

    pub timer: TimerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 1_000,
            stop_on_lost: false,
            timer: TimerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisciplineChoice {
    /// Whatever the drive collection tag asks for.
    #[default]
    Plan,
    Stepped,
    RealTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimerConfig {
    pub discipline: DisciplineChoice,

    /// Real-time step period. Unset keeps the plan's period.
    pub period_ms: Option<u64>,

    /// Samples in the real-time step cost average.
    pub window: usize,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            discipline: DisciplineChoice::Plan,
            period_ms: None,
            window: DEFAULT_WINDOW,
        }
    }
}

impl TimerConfig {
    /// Resolve the discipline to run with, given the one the plan declares.
    pub fn discipline(&self, plan: StepDiscipline) -> StepDiscipline {
        let base = match self.discipline {
            DisciplineChoice::Plan => plan,
            DisciplineChoice::Stepped => StepDiscipline::Stepped,
            DisciplineChoice::RealTime => match plan {
                StepDiscipline::RealTime { .. } => plan,
                StepDiscipline::Stepped => StepDiscipline::RealTime {
                    period_ms: DEFAULT_PERIOD_MS,
                },
            },
        };
        match (base, self.period_ms) {
            (StepDiscipline::RealTime { .. }, Some(period_ms)) => StepDiscipline::RealTime { period_ms },
            _ => base,
        }
    }

    /// Build the clock for a plan declaring `plan`.
    pub fn timer(&self, plan: StepDiscipline) -> Box<dyn Timer> {
        match self.discipline(plan) {
            StepDiscipline::Stepped => Box::new(SteppedTimer::new()),
            StepDiscipline::RealTime { period_ms } => {
                Box::new(RealTimeTimer::with_window(period_ms, self.window))
            }
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            bail!("max_steps must be > 0");
        }
        if self.timer.period_ms == Some(0) {
            bail!("timer.period_ms must be > 0");
        }
        if self.timer.window == 0 {
            bail!("timer.window must be > 0");
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Parse and validate config text.
pub fn parse_config(contents: &str) -> Result<EngineConfig> {
    let cfg: EngineConfig = toml::from_str(contents)?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("sposh.toml");
        fs::write(&path, "stop_on_lost = true\n[timer]\ndiscipline = \"stepped\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert!(cfg.stop_on_lost);
        assert_eq!(cfg.max_steps, EngineConfig::default().max_steps);
        assert_eq!(cfg.timer.discipline, DisciplineChoice::Stepped);
        assert_eq!(cfg.timer.window, DEFAULT_WINDOW);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = parse_config("max_steps = 0").expect_err("zero steps");
        assert!(err.to_string().contains("max_steps"));
        let err = parse_config("[timer]\nwindow = 0").expect_err("zero window");
        assert!(err.to_string().contains("window"));
        assert!(parse_config("[timer]\ndiscipline = \"sometimes\"").is_err());
    }

    #[test]
    fn discipline_resolution() {
        let real_time = StepDiscipline::RealTime { period_ms: 20 };
        let mut timer = TimerConfig::default();
        assert_eq!(timer.discipline(real_time), real_time);
        assert_eq!(timer.discipline(StepDiscipline::Stepped), StepDiscipline::Stepped);

        timer.period_ms = Some(5);
        assert_eq!(timer.discipline(real_time), StepDiscipline::RealTime { period_ms: 5 });
        assert_eq!(timer.discipline(StepDiscipline::Stepped), StepDiscipline::Stepped);

        timer.discipline = DisciplineChoice::RealTime;
        assert_eq!(
            timer.discipline(StepDiscipline::Stepped),
            StepDiscipline::RealTime { period_ms: 5 }
        );

        timer.discipline = DisciplineChoice::Stepped;
        assert_eq!(timer.discipline(real_time), StepDiscipline::Stepped);
    }
}
