use std::rc::Rc;

use anyhow::Result;
use tracing::trace;

use crate::core::element::{FireResult, NodeRef, NodeSlot, PatternStep, PlanLibrary};

/// An ordered sequence of steps, at most the last being a competence.
#[derive(Debug)]
pub struct ActionPatternDef {
    name: String,
    steps: Vec<PatternStep>,
}

impl ActionPatternDef {
    pub(crate) fn new(name: impl Into<String>, steps: Vec<PatternStep>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[PatternStep] {
        &self.steps
    }
}

/// A running action pattern: a definition, the index of the next step and
/// this pattern's own instance of a trailing competence.
#[derive(Debug)]
pub struct ActionPattern {
    def: Rc<ActionPatternDef>,
    cursor: usize,
    handoff: Option<NodeSlot>,
}

impl ActionPattern {
    pub fn new(def: Rc<ActionPatternDef>) -> Self {
        let handoff = match def.steps.last() {
            Some(PatternStep::Competence(id)) => Some(NodeSlot::new(NodeRef::Competence(*id))),
            _ => None,
        };
        Self {
            def,
            cursor: 0,
            handoff,
        }
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }

    /// Index of the step the next `fire` evaluates.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The trailing competence instance, once it has been handed off to.
    pub fn handoff(&self) -> Option<&NodeSlot> {
        self.handoff.as_ref()
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        if let Some(slot) = &mut self.handoff {
            slot.reset();
        }
    }

    /// Evaluate the step under the cursor.
    ///
    /// A failing step or the end of the sequence resets the cursor and stops.
    /// A successful step in the middle continues with the next one. A
    /// trailing competence is handed off to the parent.
    pub fn fire(&mut self, library: &PlanLibrary) -> Result<FireResult> {
        let Some(step) = self.def.steps.get(self.cursor) else {
            self.cursor = 0;
            return Ok(FireResult::Stop);
        };
        trace!(pattern = %self.def.name, cursor = self.cursor, "action pattern fired");

        let succeeded = match step {
            PatternStep::Action(action) => action.fire()?,
            PatternStep::Sense(sense) => sense.fire()?,
            PatternStep::Competence(id) => {
                self.cursor = 0;
                let slot = self
                    .handoff
                    .get_or_insert_with(|| NodeSlot::new(NodeRef::Competence(*id)));
                return Ok(FireResult::Handoff(slot.enter(library)));
            }
        };

        if !succeeded {
            trace!(pattern = %self.def.name, cursor = self.cursor, "step failed");
            self.cursor = 0;
            return Ok(FireResult::Stop);
        }
        self.cursor += 1;
        if self.cursor >= self.def.steps.len() {
            self.cursor = 0;
            return Ok(FireResult::Stop);
        }
        Ok(FireResult::Continue)
    }
}
