//! Clocks for frequency gating and step pacing.
//!
//! The agent calls `loop_wait` before and `loop_end` after each evaluation.
//! `time` is the timestamp drive elements compare their intervals against.

use std::collections::VecDeque;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

/// Period of a real-time drive collection unless the host overrides it.
pub const DEFAULT_PERIOD_MS: u64 = 20;

/// Samples in the processing-cost rolling average.
pub const DEFAULT_WINDOW: usize = 5;

pub trait Timer: fmt::Debug {
    fn reset(&mut self);
    /// Milliseconds (or logical steps) since the last reset.
    fn time(&self) -> i64;
    fn loop_end(&mut self);
    fn loop_wait(&mut self);
    fn set_period(&mut self, period_ms: u64);
}

/// How the agent paces evaluation steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDiscipline {
    /// Time advances by one per step; no waiting.
    Stepped,
    /// Wall-clock time; each step is padded out to `period_ms`.
    RealTime { period_ms: u64 },
}

impl StepDiscipline {
    pub fn timer(self) -> Box<dyn Timer> {
        match self {
            StepDiscipline::Stepped => Box::new(SteppedTimer::new()),
            StepDiscipline::RealTime { period_ms } => Box::new(RealTimeTimer::new(period_ms)),
        }
    }
}

/// Logical clock counting completed steps.
#[derive(Debug, Default)]
pub struct SteppedTimer {
    steps: i64,
}

impl SteppedTimer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Timer for SteppedTimer {
    fn reset(&mut self) {
        self.steps = 0;
    }

    fn time(&self) -> i64 {
        self.steps
    }

    fn loop_end(&mut self) {
        self.steps += 1;
    }

    fn loop_wait(&mut self) {}

    fn set_period(&mut self, _period_ms: u64) {}
}

/// Wall-clock timer that sleeps so consecutive steps start one period apart.
///
/// `loop_end` records how long the step took. `loop_wait` sleeps for the
/// period minus the average recent step cost minus the time already spent
/// since the last step ended, never less than zero.
#[derive(Debug)]
pub struct RealTimeTimer {
    period: Duration,
    window: usize,
    base: Instant,
    step_started: Option<Instant>,
    last_end: Option<Instant>,
    costs: VecDeque<Duration>,
}

impl RealTimeTimer {
    pub fn new(period_ms: u64) -> Self {
        Self::with_window(period_ms, DEFAULT_WINDOW)
    }

    pub fn with_window(period_ms: u64, window: usize) -> Self {
        Self {
            period: Duration::from_millis(period_ms),
            window: window.max(1),
            base: Instant::now(),
            step_started: None,
            last_end: None,
            costs: VecDeque::new(),
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period.as_millis() as u64
    }

    /// Mean of the recorded step costs, zero before the first step.
    pub fn average_cost(&self) -> Duration {
        if self.costs.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.costs.iter().sum();
        total / self.costs.len() as u32
    }

    /// How long `loop_wait` would sleep if called now.
    pub fn pending_wait(&self) -> Duration {
        let Some(last_end) = self.last_end else {
            return Duration::ZERO;
        };
        self.period
            .saturating_sub(self.average_cost())
            .saturating_sub(last_end.elapsed())
    }

    fn record_cost(&mut self, cost: Duration) {
        self.costs.push_back(cost);
        while self.costs.len() > self.window {
            self.costs.pop_front();
        }
    }
}

impl Timer for RealTimeTimer {
    fn reset(&mut self) {
        self.base = Instant::now();
        self.step_started = None;
        self.last_end = None;
        self.costs.clear();
    }

    fn time(&self) -> i64 {
        self.base.elapsed().as_millis() as i64
    }

    fn loop_end(&mut self) {
        let now = Instant::now();
        if let Some(started) = self.step_started.take() {
            self.record_cost(now.duration_since(started));
        }
        self.last_end = Some(now);
    }

    fn loop_wait(&mut self) {
        let wait = self.pending_wait();
        if !wait.is_zero() {
            thread::sleep(wait);
        }
        self.step_started = Some(Instant::now());
    }

    fn set_period(&mut self, period_ms: u64) {
        self.period = Duration::from_millis(period_ms);
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepped_timer_counts_loop_ends() {
        let mut timer = SteppedTimer::new();
        timer.loop_wait();
        assert_eq!(timer.time(), 0);
        timer.loop_end();
        timer.loop_end();
        assert_eq!(timer.time(), 2);
        timer.set_period(100);
        assert_eq!(timer.time(), 2);
        timer.reset();
        assert_eq!(timer.time(), 0);
    }

    #[test]
    fn rolling_average_keeps_last_window() {
        let mut timer = RealTimeTimer::with_window(20, 2);
        timer.record_cost(Duration::from_millis(10));
        timer.record_cost(Duration::from_millis(2));
        timer.record_cost(Duration::from_millis(4));
        assert_eq!(timer.average_cost(), Duration::from_millis(3));
    }

    #[test]
    fn no_wait_before_first_step() {
        let timer = RealTimeTimer::new(50);
        assert_eq!(timer.pending_wait(), Duration::ZERO);
    }

    #[test]
    fn wait_is_bounded_by_period() {
        let mut timer = RealTimeTimer::new(30);
        timer.loop_wait();
        timer.loop_end();
        assert!(timer.pending_wait() <= Duration::from_millis(30));
    }

    #[test]
    fn expensive_steps_do_not_wait() {
        let mut timer = RealTimeTimer::new(5);
        timer.record_cost(Duration::from_millis(50));
        timer.loop_end();
        assert_eq!(timer.pending_wait(), Duration::ZERO);
    }

    #[test]
    fn set_period_resets() {
        let mut timer = RealTimeTimer::new(20);
        timer.loop_wait();
        timer.loop_end();
        timer.set_period(40);
        assert_eq!(timer.period_ms(), 40);
        assert_eq!(timer.average_cost(), Duration::ZERO);
        assert_eq!(timer.pending_wait(), Duration::ZERO);
    }

    #[test]
    fn real_time_paces_steps() {
        let mut timer = RealTimeTimer::new(15);
        let start = Instant::now();
        for _ in 0..3 {
            timer.loop_wait();
            timer.loop_end();
        }
        // Two waits follow a completed step.
        assert!(start.elapsed() >= Duration::from_millis(25));
    }
}
