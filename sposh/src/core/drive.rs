//! The drive collection: the root of every plan.
//!
//! Each drive element keeps a slip-stack cursor. While a descended node keeps
//! returning `Continue` or hands off further down, the element resumes there
//! on its next firing. A `Stop` slips the cursor back to the element's root.
//! The cursor points at the instance owned by the reference site it
//! descended through, so state such as retry counts outlives the descent.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use anyhow::Result;
use serde::Serialize;
use tracing::trace;

use crate::core::element::{FireResult, Node, NodeHandle, PlanLibrary, Target};
use crate::core::sense::{Trigger, satisfied};

/// `last_fired` before the first firing and after `reset`.
///
/// Intervals of up to 100 s are satisfied at time zero. Under the real-time
/// timer a longer interval first fires that long minus 100 s after `reset`.
pub const INITIAL_LAST_FIRED: i64 = -100_000;

/// Result of one evaluation of the drive collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveOutcome {
    /// The goal is satisfied.
    Won,
    /// A drive element fired.
    Followed,
    /// No drive element was ready.
    Lost,
}

impl fmt::Display for DriveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DriveOutcome::Won => "won",
            DriveOutcome::Followed => "followed",
            DriveOutcome::Lost => "lost",
        })
    }
}

#[derive(Debug)]
pub struct DriveElement {
    name: String,
    trigger: Option<Trigger>,
    root: NodeHandle,
    current: Option<NodeHandle>,
    interval_ms: Option<i64>,
    last_fired: i64,
}

impl DriveElement {
    pub(crate) fn new(
        name: impl Into<String>,
        trigger: Option<Trigger>,
        target: &Target,
        interval_ms: Option<i64>,
        library: &PlanLibrary,
    ) -> Self {
        Self {
            name: name.into(),
            trigger,
            root: Rc::new(RefCell::new(library.instantiate_target(target))),
            current: None,
            interval_ms,
            last_fired: INITIAL_LAST_FIRED,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node the next firing evaluates.
    pub fn current(&self) -> Ref<'_, Node> {
        self.current.as_ref().unwrap_or(&self.root).borrow()
    }

    pub fn last_fired(&self) -> i64 {
        self.last_fired
    }

    pub fn reset(&mut self) {
        self.root.borrow_mut().reset();
        self.current = None;
        self.last_fired = INITIAL_LAST_FIRED;
    }

    /// Fire if the trigger holds and the interval since the last firing has
    /// passed. Returns whether the element fired.
    pub fn try_fire(&mut self, library: &PlanLibrary, now: i64) -> Result<bool> {
        if !satisfied(self.trigger.as_ref())? {
            return Ok(false);
        }
        if let Some(interval) = self.interval_ms
            && interval >= 0
            && now - self.last_fired < interval
        {
            trace!(element = %self.name, now, last_fired = self.last_fired, "firing interval not reached");
            return Ok(false);
        }
        self.last_fired = now;
        self.fire(library)?;
        Ok(true)
    }

    fn fire(&mut self, library: &PlanLibrary) -> Result<()> {
        let handle = Rc::clone(self.current.as_ref().unwrap_or(&self.root));
        let result = {
            let mut node = handle.borrow_mut();
            trace!(element = %self.name, node = %node.name(), "drive element fired");
            match &mut *node {
                Node::Action(action) => {
                    action.fire()?;
                    FireResult::Stop
                }
                Node::Competence(competence) => competence.fire(library)?,
                Node::ActionPattern(pattern) => pattern.fire(library)?,
            }
        };

        match result {
            FireResult::Continue => {}
            FireResult::Handoff(next) => self.current = Some(next),
            FireResult::Stop => self.current = None,
        }
        Ok(())
    }
}

/// Drive elements of equal priority. The first ready one fires.
#[derive(Debug)]
pub struct DrivePriorityElement {
    elements: Vec<DriveElement>,
}

impl DrivePriorityElement {
    pub(crate) fn new(elements: Vec<DriveElement>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &[DriveElement] {
        &self.elements
    }

    pub fn reset(&mut self) {
        for element in &mut self.elements {
            element.reset();
        }
    }

    pub fn fire(&mut self, library: &PlanLibrary, now: i64) -> Result<bool> {
        for element in &mut self.elements {
            if element.try_fire(library, now)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[derive(Debug)]
pub struct DriveCollection {
    name: String,
    goal: Option<Trigger>,
    priorities: Vec<DrivePriorityElement>,
}

impl DriveCollection {
    pub(crate) fn new(
        name: impl Into<String>,
        goal: Option<Trigger>,
        priorities: Vec<DrivePriorityElement>,
    ) -> Self {
        Self {
            name: name.into(),
            goal,
            priorities,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priorities(&self) -> &[DrivePriorityElement] {
        &self.priorities
    }

    pub fn reset(&mut self) {
        for level in &mut self.priorities {
            level.reset();
        }
    }

    /// One pass over the plan at timestamp `now` (milliseconds).
    pub fn fire(&mut self, library: &PlanLibrary, now: i64) -> Result<DriveOutcome> {
        if let Some(goal) = &self.goal
            && goal.fire()?
        {
            trace!(collection = %self.name, "goal satisfied");
            return Ok(DriveOutcome::Won);
        }
        for level in &mut self.priorities {
            if level.fire(library, now)? {
                return Ok(DriveOutcome::Followed);
            }
        }
        trace!(collection = %self.name, "no drive element ready");
        Ok(DriveOutcome::Lost)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::core::action::Action;
    use crate::core::action_pattern::ActionPatternDef;
    use crate::core::competence::{CompetenceDef, CompetenceElementDef};
    use crate::core::element::{CompetenceId, NodeRef, PatternId, PatternStep};
    use crate::registry::{ActionFn, Capability};
    use crate::test_support::{constant_sense, counting_action, scripted_action};

    fn single(element: DriveElement) -> DriveCollection {
        DriveCollection::new("d", None, vec![DrivePriorityElement::new(vec![element])])
    }

    #[test]
    fn interval_limits_firing_rate() {
        let library = PlanLibrary::default();
        let (act, calls) = counting_action("act", true);
        let mut dc = single(DriveElement::new("e", None, &Target::Action(act), Some(3), &library));

        let outcomes: Vec<DriveOutcome> = (0..10)
            .map(|now| dc.fire(&library, now).expect("fire"))
            .collect();
        assert_eq!(calls.get(), 4);
        assert_eq!(outcomes[0], DriveOutcome::Followed);
        assert_eq!(outcomes[1], DriveOutcome::Lost);
        assert_eq!(outcomes[3], DriveOutcome::Followed);
    }

    #[test]
    fn negative_interval_is_unthrottled() {
        let library = PlanLibrary::default();
        let (act, calls) = counting_action("act", true);
        let mut element = DriveElement::new("e", None, &Target::Action(act), Some(-1), &library);
        for now in 0..5 {
            assert!(element.try_fire(&library, now).expect("fire"));
        }
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn interval_longer_than_initial_offset_waits_after_reset() {
        let library = PlanLibrary::default();
        let (act, calls) = counting_action("act", true);
        let mut element = DriveElement::new("e", None, &Target::Action(act), Some(150_000), &library);
        assert!(!element.try_fire(&library, 0).expect("fire"));
        assert!(element.try_fire(&library, 50_000).expect("fire"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn goal_wins_before_firing() {
        let library = PlanLibrary::default();
        let (act, calls) = counting_action("act", true);
        let element = DriveElement::new("e", None, &Target::Action(act), None, &library);
        let mut dc = DriveCollection::new(
            "d",
            Trigger::new(vec![constant_sense("done", true)]),
            vec![DrivePriorityElement::new(vec![element])],
        );
        assert_eq!(dc.fire(&library, 0).expect("fire"), DriveOutcome::Won);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn untriggered_collection_is_lost() {
        let library = PlanLibrary::default();
        let (act, _) = counting_action("act", true);
        let trigger = Trigger::new(vec![constant_sense("never", false)]);
        let mut dc = single(DriveElement::new("e", trigger, &Target::Action(act), None, &library));
        assert_eq!(dc.fire(&library, 0).expect("fire"), DriveOutcome::Lost);
    }

    /// Root pattern hands off to a competence; the cursor stays there until
    /// the competence stops.
    #[test]
    fn cursor_descends_and_slips_back() {
        let (inner, inner_calls) = counting_action("inner", true);
        let library = PlanLibrary::new(
            vec![CompetenceDef::new(
                "c",
                None,
                vec![vec![CompetenceElementDef::new("ce", None, Target::Action(inner), -1)]],
            )],
            vec![ActionPatternDef::new(
                "p",
                vec![
                    PatternStep::Action(scripted_action("first", &[true])),
                    PatternStep::Competence(CompetenceId(0)),
                ],
            )],
        );
        let root = Target::Node(NodeRef::ActionPattern(PatternId(0)));
        let mut element = DriveElement::new("e", None, &root, None, &library);

        element.try_fire(&library, 0).expect("fire");
        assert_eq!(element.current().name(), "p");
        element.try_fire(&library, 1).expect("fire");
        assert_eq!(element.current().name(), "c");
        element.try_fire(&library, 2).expect("fire");
        assert_eq!(inner_calls.get(), 1);
        assert_eq!(element.current().name(), "p");
    }

    #[test]
    fn reset_restores_root_and_timestamp() {
        let library = PlanLibrary::new(
            Vec::new(),
            vec![ActionPatternDef::new(
                "p",
                vec![
                    PatternStep::Action(scripted_action("a", &[true])),
                    PatternStep::Action(scripted_action("b", &[true])),
                ],
            )],
        );
        let root = Target::Node(NodeRef::ActionPattern(PatternId(0)));
        let mut element = DriveElement::new("e", None, &root, Some(10), &library);
        element.try_fire(&library, 5).expect("fire");
        assert_eq!(element.last_fired(), 5);
        match &*element.current() {
            Node::ActionPattern(pattern) => assert_eq!(pattern.cursor(), 1),
            other => panic!("unexpected node {other:?}"),
        }

        element.reset();
        assert_eq!(element.last_fired(), INITIAL_LAST_FIRED);
        match &*element.current() {
            Node::ActionPattern(pattern) => assert_eq!(pattern.cursor(), 0),
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn capability_errors_propagate() {
        let library = PlanLibrary::default();
        let call: ActionFn = Rc::new(|| -> Result<bool> { Err(anyhow::anyhow!("motor jammed")) });
        let capability = Capability {
            owner: "Arm".to_string(),
            call,
        };
        let action = Rc::new(Action::new(&capability, "lift"));
        let mut dc = single(DriveElement::new("e", None, &Target::Action(action), None, &library));
        let err = dc.fire(&library, 0).expect_err("should fail");
        assert!(err.to_string().contains("motor jammed"));
    }
}
