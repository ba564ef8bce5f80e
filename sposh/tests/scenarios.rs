//! End-to-end plan scenarios: compile a LAP plan against a registry and
//! drive it step by step under the stepped clock.

use sposh::core::element::Node;
use sposh::core::value::SenseValue;
use sposh::error::{CompileError, NameResolutionError};
use sposh::io::script::parse_script;
use sposh::lap::parse_plan;
use sposh::test_support::{call_log, recording_registry};
use sposh::{DriveOutcome, compile};

fn steps(agent: &mut sposh::Agent, n: usize) -> Vec<DriveOutcome> {
    (0..n).map(|_| agent.evaluate_step().expect("step")).collect()
}

#[test]
fn single_action_drive_always_follows() {
    let log = call_log();
    let registry = recording_registry(&[("doThing", true)], &[], &log);
    let mut agent =
        compile("((SDC d nil (drives ((e1 nil doThing nil)))))", &registry).expect("compile");

    assert!(steps(&mut agent, 5).iter().all(|o| *o == DriveOutcome::Followed));
    assert_eq!(log.borrow().len(), 5);
}

#[test]
fn unregistered_action_fails_to_compile() {
    let registry = recording_registry(&[], &[], &call_log());
    let err = compile("((SDC d nil (drives ((e1 nil doThing nil)))))", &registry)
        .expect_err("unresolved");
    assert!(matches!(err, CompileError::NameResolution(_)), "{err:?}");
    assert!(err.to_string().contains("doThing"));
}

#[test]
fn competence_falls_through_to_lower_priority() {
    let log = call_log();
    let registry = recording_registry(
        &[("act1", true), ("act2", true)],
        &[("never", SenseValue::Bool(false))],
        &log,
    );
    let mut agent = compile(
        "((C c nil nil (elements ((ce1 (trigger ((never))) act1)) ((ce2 nil act2))))
          (SDC d nil (drives ((e nil c)))))",
        &registry,
    )
    .expect("compile");

    agent.evaluate_step().expect("step");
    assert_eq!(*log.borrow(), vec!["act2"]);
}

#[test]
fn failing_pattern_step_resets_cursor() {
    let world = parse_script(
        r#"
[[behaviour]]
name = "Arm"
[[behaviour.action]]
name = "a1"
results = [true, false]
[[behaviour.action]]
name = "a2"
"#,
    )
    .expect("script")
    .build()
    .expect("world");
    let mut agent = compile(
        "((AP p nil (a1 a2)) (SDC d nil (drives ((e nil p)))))",
        &world.registry,
    )
    .expect("compile");

    // a1 succeeds, a2 completes the pattern, then a1 fails.
    steps(&mut agent, 3);
    assert_eq!(world.action_names(), vec!["a1", "a2", "a1"]);
    let element = &agent.drive_collection().priorities()[0].elements()[0];
    match &*element.current() {
        Node::ActionPattern(pattern) => assert_eq!(pattern.cursor(), 0),
        other => panic!("unexpected node {other:?}"),
    }
    assert_eq!(world.fired("a2"), 1);
}

#[test]
fn interval_allows_one_firing_per_window() {
    let log = call_log();
    let registry = recording_registry(&[("tick", true)], &[], &log);
    let mut agent =
        compile("((SDC d nil (drives ((e nil tick (none 3))))))", &registry).expect("compile");

    let outcomes = steps(&mut agent, 12);
    for window in outcomes.windows(3) {
        let fired = window.iter().filter(|o| **o == DriveOutcome::Followed).count();
        assert!(fired <= 1, "{outcomes:?}");
    }
    assert_eq!(log.borrow().len(), 4);
}

#[test]
fn retry_budget_is_spent_then_restored_by_reset() {
    let log = call_log();
    let registry = recording_registry(&[("act", true)], &[], &log);
    let mut agent = compile(
        "((C c nil nil (elements ((ce nil act 2)))) (SDC d nil (drives ((e nil c)))))",
        &registry,
    )
    .expect("compile");

    steps(&mut agent, 6);
    assert_eq!(log.borrow().len(), 3);

    agent.reset();
    steps(&mut agent, 6);
    assert_eq!(log.borrow().len(), 6);
}

#[test]
fn competence_entered_from_competence_keeps_its_retry_budget() {
    let log = call_log();
    let registry = recording_registry(&[("act", true)], &[], &log);
    let mut agent = compile(
        "((C root nil nil (elements ((enter nil inner))))
          (C inner nil nil (elements ((push nil act 0))))
          (SDC d nil (drives ((e nil root)))))",
        &registry,
    )
    .expect("compile");

    // Every other step re-enters `inner`; `push` may only be found ready once.
    steps(&mut agent, 6);
    assert_eq!(log.borrow().len(), 1);
    steps(&mut agent, 6);
    assert_eq!(log.borrow().len(), 1);

    agent.reset();
    steps(&mut agent, 6);
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn competence_entered_from_pattern_keeps_its_retry_budget() {
    let log = call_log();
    let registry = recording_registry(&[("prepare", true), ("act", true)], &[], &log);
    let mut agent = compile(
        "((AP p nil (prepare inner))
          (C inner nil nil (elements ((push nil act 0))))
          (SDC d nil (drives ((e nil p)))))",
        &registry,
    )
    .expect("compile");

    steps(&mut agent, 9);
    assert_eq!(*log.borrow(), vec!["prepare", "act", "prepare", "prepare"]);

    agent.reset();
    steps(&mut agent, 3);
    assert_eq!(log.borrow().iter().filter(|name| *name == "act").count(), 2);
}

#[test]
fn shared_pattern_has_independent_cursors() {
    let world = parse_script(
        r#"
[[behaviour]]
name = "B"
[[behaviour.action]]
name = "a"
[[behaviour.action]]
name = "b"
[[behaviour.sense]]
name = "urgent"
values = [true, false]
"#,
    )
    .expect("script")
    .build()
    .expect("world");
    let mut agent = compile(
        "((AP p nil (a b))
          (SDC d nil (drives ((first (trigger ((urgent))) p)) ((second nil p)))))",
        &world.registry,
    )
    .expect("compile");

    steps(&mut agent, 3);
    // The second element starts its own copy of `p` from the first step.
    assert_eq!(world.action_names(), vec!["a", "a", "b"]);
}

#[test]
fn mutual_references_hand_off_back_and_forth() {
    let log = call_log();
    let registry = recording_registry(&[("act", true)], &[], &log);
    let mut agent = compile(
        "((C c nil nil (elements ((ce nil p))))
          (AP p nil (act c))
          (SDC d nil (drives ((e nil c)))))",
        &registry,
    )
    .expect("compile");

    let outcomes = steps(&mut agent, 6);
    assert!(outcomes.iter().all(|o| *o == DriveOutcome::Followed));
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn node_names_may_not_shadow_capabilities() {
    let registry = recording_registry(&[("act", true)], &[("ready", SenseValue::Bool(true))], &call_log());
    let err = compile(
        "((AP ready nil (act)) (SDC d nil (drives ((e nil ready)))))",
        &registry,
    )
    .expect_err("clash");
    assert!(
        matches!(
            err,
            CompileError::NameResolution(NameResolutionError::CapabilityClash { .. })
        ),
        "{err:?}"
    );
}

#[test]
fn goal_ends_the_run() {
    let world = parse_script(
        r#"
[[behaviour]]
name = "Door"
[[behaviour.action]]
name = "push"
effects = { open = true }
[[behaviour.sense]]
name = "open"
initial = false
"#,
    )
    .expect("script")
    .build()
    .expect("world");
    let mut agent = compile(
        "((SDC d (goal ((open true))) (drives ((e nil push)))))",
        &world.registry,
    )
    .expect("compile");

    assert_eq!(steps(&mut agent, 2), vec![DriveOutcome::Followed, DriveOutcome::Won]);
}

#[test]
fn canonical_form_round_trips() {
    let source = "(
        (documentation \"Doc\" \"me\" \"memo\")
        (C c (minutes 0.5) (goal ((level 3 >=) (ok))) (elements ((ce (trigger ((x 'abc))) a 4) (cf nil p))))
        (AP p (hours 1) (a (level 2.5 <) b))
        (RDC d (goal (done)) (drives ((e nil c (pm 30))) ((f (trigger (x)) a nil))))
    )";
    let plan = parse_plan(source).expect("parse");
    let reparsed = parse_plan(&plan.to_string()).expect("reparse canonical");
    assert_eq!(reparsed, plan);
}
