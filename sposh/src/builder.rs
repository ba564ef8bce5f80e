//! Plan builder: binds parsed descriptors to registered capabilities.
//!
//! Building runs in strict phases so that competences and action patterns
//! may refer to each other in any order:
//!
//! 1. name checks across plan nodes and the registry,
//! 2. id stubs (with goals) for every competence and action pattern,
//! 3. filling element lists, resolving every reference by name,
//! 4. drive collection construction, which also picks the timer discipline.
//!
//! Any error aborts the build. No partial tree is returned.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::core::action::Action;
use crate::core::action_pattern::ActionPatternDef;
use crate::core::competence::{CompetenceDef, CompetenceElementDef};
use crate::core::drive::{DriveCollection, DriveElement, DrivePriorityElement};
use crate::core::element::{CompetenceId, NodeRef, PatternId, PatternStep, PlanLibrary, Target};
use crate::core::sense::{Sense, Trigger};
use crate::core::timer::{DEFAULT_PERIOD_MS, StepDiscipline};
use crate::error::{
    CapabilityKind, CompileError, NameResolutionError, NodeKind, UnsupportedVariantError,
};
use crate::lap::plan::{
    ActionPatternSpec, CompetenceSpec, Docstring, DriveCollectionSpec, PatternStepSpec,
    PlanSource, SenseSpec,
};
use crate::registry::CapabilityRegistry;

/// A fully bound plan, ready to be driven by an agent.
#[derive(Debug)]
pub struct BuiltPlan {
    pub library: PlanLibrary,
    pub drive_collection: DriveCollection,
    pub discipline: StepDiscipline,
    pub docstring: Option<Docstring>,
}

/// Timer discipline selected by a drive collection tag.
pub fn discipline_for_tag(tag: &str) -> Result<StepDiscipline, UnsupportedVariantError> {
    match tag {
        "SDC" => Ok(StepDiscipline::Stepped),
        "SRDC" => Ok(StepDiscipline::RealTime {
            period_ms: DEFAULT_PERIOD_MS,
        }),
        "DC" => {
            warn!(tag, "POSH drive collection run with slip-stack semantics");
            Ok(StepDiscipline::Stepped)
        }
        "RDC" => {
            warn!(tag, "POSH real-time drive collection run with slip-stack semantics");
            Ok(StepDiscipline::RealTime {
                period_ms: DEFAULT_PERIOD_MS,
            })
        }
        other => Err(UnsupportedVariantError {
            tag: other.to_string(),
        }),
    }
}

pub fn build(plan: &PlanSource, registry: &CapabilityRegistry) -> Result<BuiltPlan, CompileError> {
    check_names(plan, registry)?;
    let mut builder = PlanBuilder::new(plan, registry);

    let goals = builder.competence_stubs()?;
    let competences = plan
        .competences
        .iter()
        .zip(goals)
        .map(|(spec, goal)| builder.competence(spec, goal))
        .collect::<Result<Vec<_>, _>>()?;
    let patterns = plan
        .action_patterns
        .iter()
        .map(|spec| builder.action_pattern(spec))
        .collect::<Result<Vec<_>, _>>()?;
    let library = PlanLibrary::new(competences, patterns);
    debug!(
        competences = plan.competences.len(),
        action_patterns = plan.action_patterns.len(),
        actions = builder.actions.len(),
        "plan library built"
    );

    let (drive_collection, discipline) = match &plan.drive_collection {
        Some(spec) => builder.drive_collection(spec, &library)?,
        None => builder.implicit_drive_collection(&library)?,
    };

    Ok(BuiltPlan {
        library,
        drive_collection,
        discipline,
        docstring: plan.docstring.clone(),
    })
}

/// Competence and action-pattern names must be unique among themselves and
/// must not shadow a registered action or sense.
fn check_names(plan: &PlanSource, registry: &CapabilityRegistry) -> Result<(), NameResolutionError> {
    let mut nodes: HashMap<&str, NodeKind> = HashMap::new();
    let declared = plan
        .competences
        .iter()
        .map(|c| (c.name.as_str(), NodeKind::Competence))
        .chain(
            plan.action_patterns
                .iter()
                .map(|ap| (ap.name.as_str(), NodeKind::ActionPattern)),
        );

    for (name, kind) in declared {
        if let Some(other) = nodes.insert(name, kind) {
            return Err(if other == kind {
                NameResolutionError::DuplicateNode {
                    kind,
                    name: name.to_string(),
                }
            } else {
                NameResolutionError::NodeClash {
                    kind,
                    name: name.to_string(),
                    other,
                }
            });
        }
        let capability = if registry.has_action(name) {
            Some(CapabilityKind::Action)
        } else if registry.has_sense(name) {
            Some(CapabilityKind::Sense)
        } else {
            None
        };
        if let Some(capability) = capability {
            return Err(NameResolutionError::CapabilityClash {
                kind,
                name: name.to_string(),
                capability,
            });
        }
    }
    Ok(())
}

struct PlanBuilder<'a> {
    plan: &'a PlanSource,
    registry: &'a CapabilityRegistry,
    competence_ids: HashMap<&'a str, CompetenceId>,
    pattern_ids: HashMap<&'a str, PatternId>,
    actions: HashMap<String, Rc<Action>>,
}

impl<'a> PlanBuilder<'a> {
    fn new(plan: &'a PlanSource, registry: &'a CapabilityRegistry) -> Self {
        let competence_ids = plan
            .competences
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.as_str(), CompetenceId(i)))
            .collect();
        let pattern_ids = plan
            .action_patterns
            .iter()
            .enumerate()
            .map(|(i, ap)| (ap.name.as_str(), PatternId(i)))
            .collect();
        Self {
            plan,
            registry,
            competence_ids,
            pattern_ids,
            actions: HashMap::new(),
        }
    }

    /// Goals of every competence, in declaration order.
    fn competence_stubs(&mut self) -> Result<Vec<Option<Trigger>>, NameResolutionError> {
        let plan = self.plan;
        plan.competences
            .iter()
            .map(|c| self.trigger(c.goal.as_deref()))
            .collect()
    }

    fn competence(
        &mut self,
        spec: &CompetenceSpec,
        goal: Option<Trigger>,
    ) -> Result<CompetenceDef, NameResolutionError> {
        let mut priorities = Vec::with_capacity(spec.priorities.len());
        for level in &spec.priorities {
            let mut elements = Vec::with_capacity(level.len());
            for element in level {
                let trigger = self.trigger(element.trigger.as_deref())?;
                let target = self.target(&element.target)?;
                elements.push(CompetenceElementDef::new(
                    element.name.clone(),
                    trigger,
                    target,
                    element.max_retries,
                ));
            }
            priorities.push(elements);
        }
        debug!(competence = %spec.name, levels = priorities.len(), "competence built");
        Ok(CompetenceDef::new(spec.name.clone(), goal, priorities))
    }

    fn action_pattern(&mut self, spec: &ActionPatternSpec) -> Result<ActionPatternDef, NameResolutionError> {
        let last = spec.steps.len().saturating_sub(1);
        let mut steps = Vec::with_capacity(spec.steps.len());
        for (i, step) in spec.steps.iter().enumerate() {
            let built = match step {
                PatternStepSpec::Sense {
                    name,
                    value,
                    predicate,
                } => PatternStep::Sense(self.sense(name, value.as_deref(), predicate.as_deref())?),
                PatternStepSpec::Named { name } => self.pattern_step(&spec.name, name, i == last)?,
            };
            steps.push(built);
        }
        debug!(pattern = %spec.name, steps = steps.len(), "action pattern built");
        Ok(ActionPatternDef::new(spec.name.clone(), steps))
    }

    /// A bare step name is a sense-act, else an action. Only the last step
    /// may name a competence.
    fn pattern_step(
        &mut self,
        pattern: &str,
        name: &str,
        is_last: bool,
    ) -> Result<PatternStep, NameResolutionError> {
        if self.registry.has_sense(name) {
            return Ok(PatternStep::Sense(self.sense(name, None, None)?));
        }
        if self.registry.has_action(name) {
            self.ensure_no_node_named(name)?;
            return Ok(PatternStep::Action(self.action(name)?));
        }

        let illegal = |reason| NameResolutionError::IllegalPatternStep {
            pattern: pattern.to_string(),
            name: name.to_string(),
            reason,
        };
        if let Some(id) = self.competence_ids.get(name) {
            if is_last {
                return Ok(PatternStep::Competence(*id));
            }
            return Err(illegal("a competence may only be the last step"));
        }
        if self.pattern_ids.contains_key(name) {
            return Err(illegal("action patterns cannot be nested"));
        }
        Err(NameResolutionError::NotFound {
            name: name.to_string(),
        })
    }

    fn target(&mut self, name: &str) -> Result<Target, NameResolutionError> {
        if self.registry.has_action(name) {
            self.ensure_no_node_named(name)?;
            return Ok(Target::Action(self.action(name)?));
        }
        if let Some(id) = self.competence_ids.get(name) {
            return Ok(Target::Node(NodeRef::Competence(*id)));
        }
        if let Some(id) = self.pattern_ids.get(name) {
            return Ok(Target::Node(NodeRef::ActionPattern(*id)));
        }
        Err(NameResolutionError::NotFound {
            name: name.to_string(),
        })
    }

    fn ensure_no_node_named(&self, name: &str) -> Result<(), NameResolutionError> {
        if self.competence_ids.contains_key(name) || self.pattern_ids.contains_key(name) {
            return Err(NameResolutionError::ActionClash {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// One shared instance per action name.
    fn action(&mut self, name: &str) -> Result<Rc<Action>, NameResolutionError> {
        if let Some(action) = self.actions.get(name) {
            return Ok(Rc::clone(action));
        }
        let capability = self.registry.lookup_action(name)?;
        let action = Rc::new(Action::new(capability, name));
        self.actions.insert(name.to_string(), Rc::clone(&action));
        Ok(action)
    }

    fn sense(
        &self,
        name: &str,
        value: Option<&str>,
        predicate: Option<&str>,
    ) -> Result<Sense, NameResolutionError> {
        let capability = self.registry.lookup_sense(name)?;
        Ok(Sense::new(capability, name, value, predicate))
    }

    fn trigger(&self, senses: Option<&[SenseSpec]>) -> Result<Option<Trigger>, NameResolutionError> {
        let Some(senses) = senses else {
            return Ok(None);
        };
        let built = senses
            .iter()
            .map(|spec| match spec {
                SenseSpec::SenseAct { name } => self.sense(name, None, None),
                SenseSpec::Check {
                    name,
                    value,
                    predicate,
                } => self.sense(name, value.as_deref(), predicate.as_deref()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Trigger::new(built))
    }

    fn drive_collection(
        &mut self,
        spec: &DriveCollectionSpec,
        library: &PlanLibrary,
    ) -> Result<(DriveCollection, StepDiscipline), CompileError> {
        let discipline = discipline_for_tag(&spec.kind)?;
        let goal = self.trigger(spec.goal.as_deref())?;

        let mut priorities = Vec::with_capacity(spec.priorities.len());
        for level in &spec.priorities {
            let mut elements = Vec::with_capacity(level.len());
            for element in level {
                let trigger = self.trigger(element.trigger.as_deref())?;
                let target = self.target(&element.target)?;
                elements.push(DriveElement::new(
                    element.name.clone(),
                    trigger,
                    &target,
                    element.interval_ms,
                    library,
                ));
            }
            priorities.push(DrivePriorityElement::new(elements));
        }
        debug!(collection = %spec.name, kind = %spec.kind, levels = priorities.len(), "drive collection built");
        Ok((DriveCollection::new(spec.name.clone(), goal, priorities), discipline))
    }

    /// A plan of a single competence or action pattern runs under a stepped
    /// drive collection with one untriggered element rooted at it.
    fn implicit_drive_collection(
        &mut self,
        library: &PlanLibrary,
    ) -> Result<(DriveCollection, StepDiscipline), CompileError> {
        let plan = self.plan;
        let Some(root) = plan.root_name() else {
            return Err(NameResolutionError::NoRoot.into());
        };
        let target = self.target(root)?;
        let element = DriveElement::new(root, None, &target, None, library);
        debug!(root, "implicit drive collection built");
        Ok((
            DriveCollection::new(root, None, vec![DrivePriorityElement::new(vec![element])]),
            StepDiscipline::Stepped,
        ))
    }
}
