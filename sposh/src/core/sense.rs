//! Sense checks and triggers.

use std::fmt;

use anyhow::Result;
use tracing::trace;

use crate::core::value::{Predicate, SenseValue};
use crate::registry::{Capability, SenseFn};

#[derive(Debug, Clone, PartialEq)]
enum SenseTest {
    Truthy,
    Compare(Predicate, SenseValue),
}

/// A registered sense bound to an optional literal comparison.
pub struct Sense {
    name: String,
    read: SenseFn,
    test: SenseTest,
}

impl Sense {
    /// A bare sense-act: passes when the reading is truthy.
    pub fn sense_act(capability: &Capability<SenseFn>, sense: &str) -> Self {
        Self::new(capability, sense, None, None)
    }

    /// `value` is coerced once here. Without a value, or with an operator
    /// that is not recognised, the check falls back to truthiness.
    pub fn new(
        capability: &Capability<SenseFn>,
        sense: &str,
        value: Option<&str>,
        predicate: Option<&str>,
    ) -> Self {
        let test = match value.filter(|v| !v.is_empty()) {
            None => SenseTest::Truthy,
            Some(literal) => {
                let op = match predicate {
                    None => Some(Predicate::Eq),
                    Some(text) => Predicate::from_token(text),
                };
                match op {
                    Some(op) => SenseTest::Compare(op, SenseValue::parse_literal(literal)),
                    None => SenseTest::Truthy,
                }
            }
        };
        Self {
            name: capability.qualified_name(sense),
            read: capability.call.clone(),
            test,
        }
    }

    /// `Behaviour.sense`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fire(&self) -> Result<bool> {
        let reading = (self.read)()?;
        let passed = match &self.test {
            SenseTest::Truthy => reading.truthy(),
            SenseTest::Compare(op, literal) => reading.matches(*op, literal),
        };
        trace!(sense = %self.name, %reading, passed, "sense fired");
        Ok(passed)
    }
}

impl fmt::Debug for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sense")
            .field("name", &self.name)
            .field("test", &self.test)
            .finish_non_exhaustive()
    }
}

/// Conjunction of sense checks. Never empty: an empty trigger is absent.
#[derive(Debug)]
pub struct Trigger {
    senses: Vec<Sense>,
}

impl Trigger {
    /// `None` for an empty sense list.
    pub fn new(senses: Vec<Sense>) -> Option<Self> {
        (!senses.is_empty()).then_some(Self { senses })
    }

    pub fn senses(&self) -> &[Sense] {
        &self.senses
    }

    /// True when every sense passes. Stops at the first failure.
    pub fn fire(&self) -> Result<bool> {
        for sense in &self.senses {
            if !sense.fire()? {
                trace!(sense = %sense.name(), "trigger failed");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// An absent trigger or goal counts as satisfied.
pub(crate) fn satisfied(trigger: Option<&Trigger>) -> Result<bool> {
    match trigger {
        Some(trigger) => trigger.fire(),
        None => Ok(true),
    }
}
