//! Test-only helpers for building capabilities, registries and plan files.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::core::action::Action;
use crate::core::sense::Sense;
use crate::core::value::SenseValue;
use crate::registry::{ActionFn, Behaviour, Capability, CapabilityRegistry, SenseFn};

/// Names of fired actions, in firing order.
pub type CallLog = Rc<RefCell<Vec<String>>>;

pub fn call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// An action returning `results` in order, then repeating the last one.
pub fn scripted_action(name: &str, results: &[bool]) -> Rc<Action> {
    let results = results.to_vec();
    let calls = Cell::new(0usize);
    let call: ActionFn = Rc::new(move || -> Result<bool> {
        let i = calls.get();
        calls.set(i + 1);
        Ok(results
            .get(i)
            .or_else(|| results.last())
            .copied()
            .unwrap_or(true))
    });
    Rc::new(Action::new(&test_capability(call), name))
}

/// An action with a fixed result and a shared call counter.
pub fn counting_action(name: &str, result: bool) -> (Rc<Action>, Rc<Cell<u32>>) {
    let calls = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&calls);
    let call: ActionFn = Rc::new(move || -> Result<bool> {
        counter.set(counter.get() + 1);
        Ok(result)
    });
    (Rc::new(Action::new(&test_capability(call), name)), calls)
}

/// A bare sense that always reads `value`.
pub fn constant_sense(name: &str, value: impl Into<SenseValue>) -> Sense {
    let value = value.into();
    let call: SenseFn = Rc::new(move || -> Result<SenseValue> { Ok(value.clone()) });
    Sense::sense_act(&test_capability(call), name)
}

fn test_capability<F>(call: F) -> Capability<F> {
    Capability {
        owner: "Test".to_string(),
        call,
    }
}

/// A behaviour whose actions append their name to `log` and return a fixed
/// result, and whose senses read constant values.
pub fn recording_behaviour(
    name: &str,
    actions: &[(&str, bool)],
    senses: &[(&str, SenseValue)],
    log: &CallLog,
) -> Behaviour {
    let mut behaviour = Behaviour::new(name);
    for (action, result) in actions {
        let log = Rc::clone(log);
        let action = action.to_string();
        let result = *result;
        behaviour = behaviour.action(action.clone(), move || {
            log.borrow_mut().push(action.clone());
            Ok(result)
        });
    }
    for (sense, value) in senses {
        let value = value.clone();
        behaviour = behaviour.sense(*sense, move || Ok(value.clone()));
    }
    behaviour
}

/// Registry holding one [`recording_behaviour`] named `Test`.
pub fn recording_registry(
    actions: &[(&str, bool)],
    senses: &[(&str, SenseValue)],
    log: &CallLog,
) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry
        .register(recording_behaviour("Test", actions, senses, log))
        .expect("register test behaviour");
    registry
}

/// A temporary directory for plan, behaviour and config files.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp dir")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}
