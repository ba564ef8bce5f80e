//! Capability registry: the actions and senses behaviours provide to plans.
//!
//! Capabilities are plain closures. Actions report success as a boolean,
//! senses return a [`SenseValue`]. Both may fail with an `anyhow::Error`,
//! which aborts the current evaluation step and reaches the host unchanged.
//! Action and sense names share one namespace across all behaviours.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::core::value::SenseValue;
use crate::error::{CapabilityKind, NameResolutionError, RegistryError};

pub type ActionFn = Rc<dyn Fn() -> anyhow::Result<bool>>;
pub type SenseFn = Rc<dyn Fn() -> anyhow::Result<SenseValue>>;

/// A named bundle of actions and senses, registered as a unit.
pub struct Behaviour {
    name: String,
    actions: Vec<(String, ActionFn)>,
    senses: Vec<(String, SenseFn)>,
}

impl Behaviour {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            senses: Vec::new(),
        }
    }

    pub fn action<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<bool> + 'static,
    {
        self.actions.push((name.into(), Rc::new(f)));
        self
    }

    pub fn sense<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> anyhow::Result<SenseValue> + 'static,
    {
        self.senses.push((name.into(), Rc::new(f)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Behaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behaviour")
            .field("name", &self.name)
            .field("actions", &self.actions.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("senses", &self.senses.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

/// A registered callable and the behaviour that owns it.
#[derive(Clone)]
pub struct Capability<F> {
    pub owner: String,
    pub call: F,
}

impl<F> Capability<F> {
    /// `Behaviour.name`, the name nodes log under.
    pub fn qualified_name(&self, name: &str) -> String {
        format!("{}.{name}", self.owner)
    }
}

impl<F> fmt::Debug for Capability<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct CapabilityRegistry {
    behaviours: Vec<String>,
    actions: BTreeMap<String, Capability<ActionFn>>,
    senses: BTreeMap<String, Capability<SenseFn>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from behaviours, stopping at the first conflict.
    pub fn with_behaviours(
        behaviours: impl IntoIterator<Item = Behaviour>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for behaviour in behaviours {
            registry.register(behaviour)?;
        }
        Ok(registry)
    }

    /// Add every capability of `behaviour`. Nothing is added on error.
    pub fn register(&mut self, behaviour: Behaviour) -> Result<(), RegistryError> {
        if self.behaviours.iter().any(|b| b == &behaviour.name) {
            return Err(RegistryError::DuplicateBehaviour(behaviour.name));
        }

        let mut seen: Vec<&str> = Vec::new();
        let declared = behaviour
            .actions
            .iter()
            .map(|(n, _)| (CapabilityKind::Action, n.as_str()))
            .chain(
                behaviour
                    .senses
                    .iter()
                    .map(|(n, _)| (CapabilityKind::Sense, n.as_str())),
            );
        for (kind, name) in declared {
            let first = if seen.contains(&name) {
                Some(behaviour.name.clone())
            } else {
                self.owner_of(name).map(str::to_string)
            };
            if let Some(first) = first {
                return Err(RegistryError::DuplicateCapability {
                    kind,
                    name: name.to_string(),
                    first,
                    second: behaviour.name.clone(),
                });
            }
            seen.push(name);
        }

        let Behaviour {
            name: owner,
            actions,
            senses,
        } = behaviour;
        for (name, call) in actions {
            self.actions.insert(
                name,
                Capability {
                    owner: owner.clone(),
                    call,
                },
            );
        }
        for (name, call) in senses {
            self.senses.insert(
                name,
                Capability {
                    owner: owner.clone(),
                    call,
                },
            );
        }
        tracing::debug!(behaviour = %owner, "registered behaviour");
        self.behaviours.push(owner);
        Ok(())
    }

    pub fn lookup_action(&self, name: &str) -> Result<&Capability<ActionFn>, NameResolutionError> {
        self.actions
            .get(name)
            .ok_or_else(|| NameResolutionError::CapabilityNotFound {
                kind: CapabilityKind::Action,
                name: name.to_string(),
            })
    }

    pub fn lookup_sense(&self, name: &str) -> Result<&Capability<SenseFn>, NameResolutionError> {
        self.senses
            .get(name)
            .ok_or_else(|| NameResolutionError::CapabilityNotFound {
                kind: CapabilityKind::Sense,
                name: name.to_string(),
            })
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn has_sense(&self, name: &str) -> bool {
        self.senses.contains_key(name)
    }

    /// Owning behaviour of an action or sense.
    pub fn owner_of(&self, name: &str) -> Option<&str> {
        self.actions
            .get(name)
            .map(|c| c.owner.as_str())
            .or_else(|| self.senses.get(name).map(|c| c.owner.as_str()))
    }

    pub fn behaviour_names(&self) -> &[String] {
        &self.behaviours
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn sense_names(&self) -> impl Iterator<Item = &str> {
        self.senses.keys().map(String::as_str)
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("behaviours", &self.behaviours)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("senses", &self.senses.keys().collect::<Vec<_>>())
            .finish()
    }
}
