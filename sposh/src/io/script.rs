//! Scripted behaviours described in TOML.
//!
//! A script stands in for a real world when checking or exercising a plan:
//! actions return canned results and write blackboard values, senses replay
//! canned readings or read the blackboard.
//!
//! ```toml
//! [[behaviour]]
//! name = "Forager"
//!
//! [[behaviour.action]]
//! name = "eat"
//! results = [true]
//! effects = { hungry = false }
//!
//! [[behaviour.sense]]
//! name = "hungry"
//! initial = true
//! ```

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::value::SenseValue;
use crate::registry::{Behaviour, CapabilityRegistry};

/// Shared world state that action effects write and senses read.
pub type Blackboard = Rc<RefCell<BTreeMap<String, SenseValue>>>;

/// Every action firing, in order.
pub type ActivityLog = Rc<RefCell<Vec<Activity>>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub behaviour: String,
    pub action: String,
    pub succeeded: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScriptFile {
    #[serde(default, rename = "behaviour")]
    pub behaviours: Vec<BehaviourScript>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BehaviourScript {
    pub name: String,
    #[serde(default, rename = "action")]
    pub actions: Vec<ActionScript>,
    #[serde(default, rename = "sense")]
    pub senses: Vec<SenseScript>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ActionScript {
    pub name: String,
    /// Results returned by successive firings. Empty means always succeed.
    #[serde(default)]
    pub results: Vec<bool>,
    #[serde(default)]
    pub repeat: Repeat,
    /// Blackboard writes applied whenever the action succeeds.
    #[serde(default)]
    pub effects: BTreeMap<String, SenseValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SenseScript {
    pub name: String,
    /// Readings returned by successive reads.
    #[serde(default)]
    pub values: Vec<SenseValue>,
    #[serde(default)]
    pub repeat: Repeat,
    /// Starting blackboard value. The sense then reads the blackboard.
    pub initial: Option<SenseValue>,
}

/// What a sequence does once it runs out.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Repeat {
    /// Keep returning the last item.
    #[default]
    Last,
    /// Start again from the first item.
    Cycle,
}

/// A registry built from a script, plus handles on its state.
#[derive(Debug)]
pub struct ScriptedWorld {
    pub registry: CapabilityRegistry,
    pub blackboard: Blackboard,
    pub activity: ActivityLog,
}

impl ScriptedWorld {
    /// Number of firings of `action`, successful or not.
    pub fn fired(&self, action: &str) -> usize {
        self.activity
            .borrow()
            .iter()
            .filter(|a| a.action == action)
            .count()
    }

    /// Action names in firing order.
    pub fn action_names(&self) -> Vec<String> {
        self.activity.borrow().iter().map(|a| a.action.clone()).collect()
    }
}

struct Sequence<T> {
    items: Vec<T>,
    repeat: Repeat,
    next: Cell<usize>,
}

impl<T: Clone> Sequence<T> {
    fn new(items: Vec<T>, repeat: Repeat) -> Self {
        Self {
            items,
            repeat,
            next: Cell::new(0),
        }
    }

    fn advance(&self) -> Option<T> {
        let i = self.next.get();
        self.next.set(i + 1);
        match self.repeat {
            Repeat::Last => self.items.get(i).or_else(|| self.items.last()).cloned(),
            Repeat::Cycle if self.items.is_empty() => None,
            Repeat::Cycle => self.items.get(i % self.items.len()).cloned(),
        }
    }
}

impl ScriptFile {
    pub fn validate(&self) -> Result<()> {
        for behaviour in &self.behaviours {
            if behaviour.name.trim().is_empty() {
                bail!("behaviour name must not be empty");
            }
            for action in &behaviour.actions {
                if action.name.trim().is_empty() {
                    bail!("behaviour '{}': action name must not be empty", behaviour.name);
                }
            }
            for sense in &behaviour.senses {
                match (sense.values.is_empty(), &sense.initial) {
                    (true, None) => bail!(
                        "behaviour '{}': sense '{}' needs either values or an initial value",
                        behaviour.name,
                        sense.name
                    ),
                    (false, Some(_)) => bail!(
                        "behaviour '{}': sense '{}' cannot have both values and an initial value",
                        behaviour.name,
                        sense.name
                    ),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Build fresh capabilities with their own blackboard and activity log.
    pub fn build(&self) -> Result<ScriptedWorld> {
        self.validate()?;
        let blackboard: Blackboard = Rc::default();
        let activity: ActivityLog = Rc::default();

        let mut registry = CapabilityRegistry::new();
        for script in &self.behaviours {
            let behaviour = behaviour(script, &blackboard, &activity);
            registry
                .register(behaviour)
                .with_context(|| format!("register behaviour '{}'", script.name))?;
        }
        Ok(ScriptedWorld {
            registry,
            blackboard,
            activity,
        })
    }
}

fn behaviour(script: &BehaviourScript, blackboard: &Blackboard, activity: &ActivityLog) -> Behaviour {
    let mut behaviour = Behaviour::new(script.name.clone());

    for action in &script.actions {
        let owner = script.name.clone();
        let name = action.name.clone();
        let results = Sequence::new(action.results.clone(), action.repeat);
        let effects = action.effects.clone();
        let blackboard = Rc::clone(blackboard);
        let activity = Rc::clone(activity);
        behaviour = behaviour.action(action.name.clone(), move || {
            let succeeded = results.advance().unwrap_or(true);
            trace!(action = %name, succeeded, "scripted action");
            if succeeded {
                let mut board = blackboard.borrow_mut();
                for (key, value) in &effects {
                    board.insert(key.clone(), value.clone());
                }
            }
            activity.borrow_mut().push(Activity {
                behaviour: owner.clone(),
                action: name.clone(),
                succeeded,
            });
            Ok(succeeded)
        });
    }

    for sense in &script.senses {
        let name = sense.name.clone();
        if let Some(initial) = &sense.initial {
            blackboard.borrow_mut().insert(name.clone(), initial.clone());
            let blackboard = Rc::clone(blackboard);
            behaviour = behaviour.sense(sense.name.clone(), move || {
                blackboard
                    .borrow()
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| anyhow!("blackboard has no value for '{name}'"))
            });
        } else {
            let values = Sequence::new(sense.values.clone(), sense.repeat);
            behaviour = behaviour.sense(sense.name.clone(), move || {
                values
                    .advance()
                    .ok_or_else(|| anyhow!("sense '{name}' has no values"))
            });
        }
    }

    behaviour
}

/// Parse and validate script text.
pub fn parse_script(contents: &str) -> Result<ScriptFile> {
    let script: ScriptFile = toml::from_str(contents)?;
    script.validate()?;
    Ok(script)
}

pub fn load_script(path: &Path) -> Result<ScriptFile> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_script(&contents).with_context(|| format!("parse {}", path.display()))
}
