use crate::common::*;
use stackscope::backend::protocol::{Scope, StopReason, VarRef};
use stackscope::backend::ResponseBody;
use stackscope::SessionState;

#[test]
fn test_expand_is_idempotent_within_a_stop() {
    let mut t = stopped_session();

    // the locals scope was resolved during the stop sequence
    t.session.expand(LOCALS).unwrap();
    t.backend.expect_none();

    // a child: the first expand fetches, the second is free even while the
    // fetch is still in flight
    t.session.expand(ITEMS).unwrap();
    let fetch = t.backend.expect_one("variables");
    t.session.expand(ITEMS).unwrap();
    t.backend.expect_none();

    t.process(ok(
        fetch.seq,
        ResponseBody::Variables(vec![variable("0", "1", VarRef::NONE)]),
    ));
    t.session.expand(ITEMS).unwrap();
    t.backend.expect_none();
    assert_eq!(t.session.variables(ITEMS).unwrap().len(), 1);
}

#[test]
fn test_leaf_references_never_fetch() {
    let mut t = stopped_session();
    t.session.expand(VarRef::NONE).unwrap();
    t.backend.expect_none();
}

#[test]
fn test_no_reference_survives_a_resume() {
    let mut t = stopped_session();
    assert!(t.session.variables(LOCALS).is_some());

    t.session.resume().unwrap();
    t.backend.expect_one("continue");
    assert!(t.session.variables(LOCALS).is_none());

    t.process(state_event(SessionState::Running, Some(THREAD)));
    t.process(stopped_event(StopReason::Step, THREAD));
    let stack_trace = t.backend.expect_one("stackTrace");
    t.process(ok(
        stack_trace.seq,
        ResponseBody::StackTrace(vec![frame(FRAME_MAIN, "main", 11)]),
    ));

    // the backend reuses the same numeric reference for the new stop: the
    // engine must fetch it afresh, not serve the old children
    let scopes_req = t.backend.expect_one("scopes");
    t.process(ok(
        scopes_req.seq,
        ResponseBody::Scopes(vec![scope("Locals", LOCALS, false)]),
    ));
    let fetch = t.backend.expect_one("variables");
    t.process(ok(
        fetch.seq,
        ResponseBody::Variables(vec![variable("counter", "43", VarRef::NONE)]),
    ));
    assert_eq!(t.session.variables(LOCALS).unwrap()[0].value, "43");
}

#[test]
fn test_stale_variables_response_is_dropped() {
    let mut t = stopped_session();
    t.session.expand(ITEMS).unwrap();
    let in_flight = t.backend.expect_one("variables");

    t.session.step_over().unwrap();
    t.backend.expect_one("stepOver");

    // the answer to the pre-resume fetch arrives late
    t.process(ok(
        in_flight.seq,
        ResponseBody::Variables(vec![variable("0", "1", VarRef::NONE)]),
    ));

    assert!(t.session.variables(ITEMS).is_none());
    assert_eq!(t.session.stale_drops(), 1);
}

#[test]
fn test_collapse_is_view_state_only() {
    let mut t = stopped_session();
    assert!(t.session.is_expanded(LOCALS));

    t.session.collapse(LOCALS);
    assert!(!t.session.is_expanded(LOCALS));
    assert!(t.session.variables(LOCALS).is_some());

    t.session.expand(LOCALS).unwrap();
    t.backend.expect_none();
    assert!(t.session.is_expanded(LOCALS));
}

#[test]
fn test_frame_reselection_keeps_sibling_subtrees() {
    let mut t = stopped_session();
    t.session.select_frame(FRAME_CALLER).unwrap();
    let scopes_req = t.backend.expect_one("scopes");
    assert!(t.session.scopes().is_empty());

    let caller_locals = VarRef(300);
    t.process(ok(
        scopes_req.seq,
        ResponseBody::Scopes(vec![scope("Locals", caller_locals, false)]),
    ));
    assert_eq!(t.session.scopes()[0].variables_reference, caller_locals);
    assert_eq!(t.session.selected_frame(), Some(FRAME_CALLER));

    // references are scoped to the stop, not the frame: frame 0 subtrees
    // stay retrievable without a refetch
    assert!(t.session.variables(LOCALS).is_some());
    t.session.expand(LOCALS).unwrap();
    t.backend.expect_none();
}

#[test]
fn test_scopes_for_a_superseded_selection_are_dropped() {
    let mut t = stopped_session();
    t.session.select_frame(FRAME_CALLER).unwrap();
    let first = t.backend.expect_one("scopes");
    t.session.select_frame(FRAME_MAIN).unwrap();
    let second = t.backend.expect_one("scopes");

    t.process(ok(
        first.seq,
        ResponseBody::Scopes(vec![scope("Locals", VarRef(300), false)]),
    ));
    assert!(t.session.scopes().is_empty());

    t.process(ok(
        second.seq,
        ResponseBody::Scopes(vec![scope("Locals", VarRef(301), false)]),
    ));
    assert_eq!(t.session.scopes()[0].variables_reference, VarRef(301));
}

fn stop_with_scopes(t: &mut TestSession, scopes: Vec<Scope>) {
    t.launch_ok();
    t.process(state_event(SessionState::Running, Some(THREAD)));
    t.process(stopped_event(StopReason::Breakpoint, THREAD));
    let stack_trace = t.backend.expect_one("stackTrace");
    t.process(ok(
        stack_trace.seq,
        ResponseBody::StackTrace(vec![frame(FRAME_MAIN, "main", 1)]),
    ));
    let scopes_req = t.backend.expect_one("scopes");
    t.process(ok(scopes_req.seq, ResponseBody::Scopes(scopes)));
}

#[test]
fn test_auto_expand_prefers_the_local_scope() {
    let mut t = session();
    stop_with_scopes(
        &mut t,
        vec![
            scope("Arguments", VarRef(51), false),
            scope("Locals", VarRef(52), false),
        ],
    );

    let fetch = t.backend.expect_one("variables");
    t.process(ok(
        fetch.seq,
        ResponseBody::Variables(vec![variable("x", "1", VarRef::NONE)]),
    ));
    assert!(t.session.is_expanded(VarRef(52)));
    assert!(!t.session.is_expanded(VarRef(51)));
}

#[test]
fn test_auto_expand_falls_back_to_the_first_cheap_scope() {
    let mut t = session();
    stop_with_scopes(
        &mut t,
        vec![
            scope("Registers", VarRef(50), true),
            scope("Arguments", VarRef(51), false),
        ],
    );

    let fetch = t.backend.expect_one("variables");
    t.process(ok(
        fetch.seq,
        ResponseBody::Variables(vec![variable("argc", "1", VarRef::NONE)]),
    ));
    assert!(t.session.is_expanded(VarRef(51)));
}

#[test]
fn test_expensive_scopes_are_not_auto_expanded() {
    let mut t = session();
    stop_with_scopes(&mut t, vec![scope("Globals", GLOBALS, true)]);
    t.backend.expect_none();
    assert!(!t.session.is_expanded(GLOBALS));
}

#[test]
fn test_partial_stop_sequence_failure_keeps_the_stack() {
    let mut t = session();
    t.launch_ok();
    t.process(state_event(SessionState::Running, Some(THREAD)));
    t.process(stopped_event(StopReason::Exception, THREAD));

    let stack_trace = t.backend.expect_one("stackTrace");
    t.process(ok(
        stack_trace.seq,
        ResponseBody::StackTrace(vec![frame(FRAME_MAIN, "main", 3)]),
    ));
    let scopes_req = t.backend.expect_one("scopes");
    t.process(err(scopes_req.seq, "scopes unavailable"));

    // the stack is still shown; only the scope panel is empty
    assert_eq!(t.session.state(), SessionState::Stopped);
    assert_eq!(t.session.stack_frames().len(), 1);
    assert!(t.session.scopes().is_empty());
}
