//! Competences: prioritised, goal-directed choice between elements.

use std::rc::Rc;

use anyhow::Result;
use tracing::trace;

use crate::core::action::Action;
use crate::core::element::{FireResult, NodeSlot, PlanLibrary, Target};
use crate::core::sense::{Trigger, satisfied};

#[derive(Debug)]
pub struct CompetenceElementDef {
    name: String,
    trigger: Option<Trigger>,
    target: Target,
    max_retries: i64,
}

impl CompetenceElementDef {
    pub(crate) fn new(
        name: impl Into<String>,
        trigger: Option<Trigger>,
        target: Target,
        max_retries: i64,
    ) -> Self {
        Self {
            name: name.into(),
            trigger,
            target,
            max_retries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Negative means unbounded.
    pub fn max_retries(&self) -> i64 {
        self.max_retries
    }
}

#[derive(Debug)]
pub struct CompetenceDef {
    name: String,
    goal: Option<Trigger>,
    priorities: Vec<Vec<Rc<CompetenceElementDef>>>,
}

impl CompetenceDef {
    pub(crate) fn new(
        name: impl Into<String>,
        goal: Option<Trigger>,
        priorities: Vec<Vec<CompetenceElementDef>>,
    ) -> Self {
        Self {
            name: name.into(),
            goal,
            priorities: priorities
                .into_iter()
                .map(|level| level.into_iter().map(Rc::new).collect())
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn goal(&self) -> Option<&Trigger> {
        self.goal.as_ref()
    }

    pub fn priorities(&self) -> &[Vec<Rc<CompetenceElementDef>>] {
        &self.priorities
    }
}

/// An element together with the retries it has consumed and, for a
/// competence or action-pattern target, its own instance of that node.
#[derive(Debug)]
pub struct CompetenceElement {
    def: Rc<CompetenceElementDef>,
    retries: i64,
    target: ElementTarget,
}

#[derive(Debug)]
enum ElementTarget {
    Action(Rc<Action>),
    Node(NodeSlot),
}

impl CompetenceElement {
    fn new(def: Rc<CompetenceElementDef>) -> Self {
        let target = match &def.target {
            Target::Action(action) => ElementTarget::Action(Rc::clone(action)),
            Target::Node(node) => ElementTarget::Node(NodeSlot::new(*node)),
        };
        Self {
            def,
            retries: 0,
            target,
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn retries(&self) -> i64 {
        self.retries
    }

    /// The target instance, once the element has handed off to it.
    pub fn slot(&self) -> Option<&NodeSlot> {
        match &self.target {
            ElementTarget::Action(_) => None,
            ElementTarget::Node(slot) => Some(slot),
        }
    }

    /// Clears the retry count and resets the target instance, if any.
    pub fn reset(&mut self) {
        self.retries = 0;
        if let ElementTarget::Node(slot) = &mut self.target {
            slot.reset();
        }
    }

    /// Check readiness and fire in one step. `None` when not ready.
    ///
    /// Ready means the trigger holds and the retry budget allows another
    /// attempt (`retries <= max_retries`, or unbounded). Being ready consumes
    /// one retry.
    pub fn try_fire(&mut self, library: &PlanLibrary) -> Result<Option<FireResult>> {
        if !satisfied(self.def.trigger.as_ref())? {
            return Ok(None);
        }
        if self.def.max_retries >= 0 && self.retries > self.def.max_retries {
            trace!(element = %self.def.name, retries = self.retries, "retry limit exceeded");
            return Ok(None);
        }
        self.retries += 1;
        trace!(element = %self.def.name, retries = self.retries, "competence element fired");

        match &mut self.target {
            ElementTarget::Action(action) => {
                action.fire()?;
                Ok(Some(FireResult::Stop))
            }
            ElementTarget::Node(slot) => Ok(Some(FireResult::Handoff(slot.enter(library)))),
        }
    }
}

/// Elements of equal priority. The first ready one fires.
#[derive(Debug)]
pub struct CompetencePriorityElement {
    elements: Vec<CompetenceElement>,
}

impl CompetencePriorityElement {
    pub fn elements(&self) -> &[CompetenceElement] {
        &self.elements
    }

    pub fn reset(&mut self) {
        for element in &mut self.elements {
            element.reset();
        }
    }

    /// `None` when no element was ready.
    pub fn fire(&mut self, library: &PlanLibrary) -> Result<Option<FireResult>> {
        for element in &mut self.elements {
            if let Some(result) = element.try_fire(library)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }
}

#[derive(Debug)]
pub struct Competence {
    def: Rc<CompetenceDef>,
    priorities: Vec<CompetencePriorityElement>,
}

impl Competence {
    pub fn new(def: Rc<CompetenceDef>) -> Self {
        let priorities = def
            .priorities
            .iter()
            .map(|level| CompetencePriorityElement {
                elements: level
                    .iter()
                    .map(|e| CompetenceElement::new(Rc::clone(e)))
                    .collect(),
            })
            .collect();
        Self { def, priorities }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn priorities(&self) -> &[CompetencePriorityElement] {
        &self.priorities
    }

    pub fn reset(&mut self) {
        for level in &mut self.priorities {
            level.reset();
        }
    }

    /// A reached goal stops. Otherwise the first level with a ready element
    /// decides; if none has one the competence has failed and stops.
    pub fn fire(&mut self, library: &PlanLibrary) -> Result<FireResult> {
        if let Some(goal) = &self.def.goal
            && goal.fire()?
        {
            trace!(competence = %self.def.name, "goal satisfied");
            return Ok(FireResult::Stop);
        }
        for level in &mut self.priorities {
            if let Some(result) = level.fire(library)? {
                return Ok(result);
            }
        }
        trace!(competence = %self.def.name, "no element ready");
        Ok(FireResult::Stop)
    }
}
