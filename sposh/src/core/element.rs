//! Shared vocabulary of the execution tree: targets, fire results, and the
//! library of competence and action-pattern definitions.
//!
//! Definitions are immutable and live in [`PlanLibrary`], addressed by id.
//! Mutable per-use state (retry counters, the action-pattern cursor) lives in
//! instances. Every place a plan refers to a competence or action pattern
//! owns a [`NodeSlot`] holding its own instance, so a definition used from
//! several places never shares state between them. An instance keeps its
//! state across entries until an explicit `reset`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::action::Action;
use crate::core::action_pattern::{ActionPattern, ActionPatternDef};
use crate::core::competence::{Competence, CompetenceDef};
use crate::core::sense::Sense;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompetenceId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatternId(pub(crate) usize);

/// A composite node that can be descended into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Competence(CompetenceId),
    ActionPattern(PatternId),
}

/// What a drive or competence element fires.
#[derive(Debug, Clone)]
pub enum Target {
    Action(Rc<Action>),
    Node(NodeRef),
}

/// One step of an action pattern. Only the last step may be a competence.
#[derive(Debug)]
pub enum PatternStep {
    Action(Rc<Action>),
    Sense(Sense),
    Competence(CompetenceId),
}

/// A live node shared between the reference site owning it and the drive
/// element cursor currently resting on it.
pub type NodeHandle = Rc<RefCell<Node>>;

/// Outcome of firing a composite node.
#[derive(Debug, Clone)]
pub enum FireResult {
    /// Fire the same node again on the next step.
    Continue,
    /// Return to the drive element's root.
    Stop,
    /// Descend into the given instance on the next step.
    Handoff(NodeHandle),
}

impl PartialEq for FireResult {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FireResult::Continue, FireResult::Continue) | (FireResult::Stop, FireResult::Stop) => {
                true
            }
            (FireResult::Handoff(left), FireResult::Handoff(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl Eq for FireResult {}

/// The instance of a competence or action pattern owned by one reference
/// site.
///
/// The instance is created on first entry and kept afterwards. Creating it
/// lazily keeps mutually recursive plans finite.
#[derive(Debug)]
pub struct NodeSlot {
    node: NodeRef,
    instance: Option<NodeHandle>,
}

impl NodeSlot {
    pub fn new(node: NodeRef) -> Self {
        Self {
            node,
            instance: None,
        }
    }

    pub fn node(&self) -> NodeRef {
        self.node
    }

    /// The instance, if this site has been entered since it was built.
    pub fn instance(&self) -> Option<&NodeHandle> {
        self.instance.as_ref()
    }

    /// This site's instance, created on first use.
    pub fn enter(&mut self, library: &PlanLibrary) -> NodeHandle {
        let node = self.node;
        Rc::clone(
            self.instance
                .get_or_insert_with(|| Rc::new(RefCell::new(library.instantiate(node)))),
        )
    }

    pub fn reset(&mut self) {
        if let Some(instance) = &self.instance {
            instance.borrow_mut().reset();
        }
    }
}

/// A live node under a drive element's cursor.
#[derive(Debug)]
pub enum Node {
    Action(Rc<Action>),
    Competence(Competence),
    ActionPattern(ActionPattern),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Action(action) => action.name(),
            Node::Competence(competence) => competence.name(),
            Node::ActionPattern(pattern) => pattern.name(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Node::Action(_) => {}
            Node::Competence(competence) => competence.reset(),
            Node::ActionPattern(pattern) => pattern.reset(),
        }
    }
}

/// Every competence and action pattern a plan defines.
#[derive(Debug, Default)]
pub struct PlanLibrary {
    competences: Vec<Rc<CompetenceDef>>,
    patterns: Vec<Rc<ActionPatternDef>>,
}

impl PlanLibrary {
    pub(crate) fn new(competences: Vec<CompetenceDef>, patterns: Vec<ActionPatternDef>) -> Self {
        Self {
            competences: competences.into_iter().map(Rc::new).collect(),
            patterns: patterns.into_iter().map(Rc::new).collect(),
        }
    }

    pub fn competence(&self, id: CompetenceId) -> &Rc<CompetenceDef> {
        &self.competences[id.0]
    }

    pub fn pattern(&self, id: PatternId) -> &Rc<ActionPatternDef> {
        &self.patterns[id.0]
    }

    pub fn competences(&self) -> impl Iterator<Item = &Rc<CompetenceDef>> {
        self.competences.iter()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &Rc<ActionPatternDef>> {
        self.patterns.iter()
    }

    /// A new instance with zeroed state. Only reference sites call this,
    /// once each.
    pub fn instantiate(&self, node: NodeRef) -> Node {
        match node {
            NodeRef::Competence(id) => Node::Competence(Competence::new(Rc::clone(self.competence(id)))),
            NodeRef::ActionPattern(id) => {
                Node::ActionPattern(ActionPattern::new(Rc::clone(self.pattern(id))))
            }
        }
    }

    pub fn instantiate_target(&self, target: &Target) -> Node {
        match target {
            Target::Action(action) => Node::Action(Rc::clone(action)),
            Target::Node(node) => self.instantiate(*node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::competence::CompetenceElementDef;
    use crate::test_support::counting_action;

    fn library() -> PlanLibrary {
        let (act, _) = counting_action("act", true);
        PlanLibrary::new(
            vec![CompetenceDef::new(
                "c",
                None,
                vec![vec![CompetenceElementDef::new("ce", None, Target::Action(act), 0)]],
            )],
            Vec::new(),
        )
    }

    #[test]
    fn slot_instance_is_created_once() {
        let library = library();
        let mut slot = NodeSlot::new(NodeRef::Competence(CompetenceId(0)));
        assert!(slot.instance().is_none());

        let first = slot.enter(&library);
        let second = slot.enter(&library);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(FireResult::Handoff(first), FireResult::Handoff(second));
    }

    #[test]
    fn separate_slots_have_separate_instances() {
        let library = library();
        let node = NodeRef::Competence(CompetenceId(0));
        let first = NodeSlot::new(node).enter(&library);
        let second = NodeSlot::new(node).enter(&library);
        assert_ne!(FireResult::Handoff(first), FireResult::Handoff(second));
    }
}
