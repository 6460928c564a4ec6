use crate::common::*;
use stackscope::console::ConsoleCategory;
use stackscope::{Error, SessionState};

#[test]
fn test_step_commands_are_noops_unless_stopped() {
    let mut t = session();
    t.launch_ok();
    t.process(state_event(SessionState::Running, Some(THREAD)));

    assert!(matches!(
        t.session.step_over(),
        Err(Error::CommandNotAvailable { .. })
    ));
    assert!(matches!(
        t.session.step_into(),
        Err(Error::CommandNotAvailable { .. })
    ));
    assert!(matches!(
        t.session.step_out(),
        Err(Error::CommandNotAvailable { .. })
    ));
    assert!(matches!(
        t.session.resume(),
        Err(Error::CommandNotAvailable { .. })
    ));
    t.backend.expect_none();
    assert_eq!(t.session.state(), SessionState::Running);
}

#[test]
fn test_step_while_stopped_issues_exactly_one_call() {
    let mut t = stopped_session();
    t.session.step_over().unwrap();
    t.backend.expect_one("stepOver");
}

#[test]
fn test_rapid_double_resume_is_suppressed() {
    let mut t = stopped_session();
    t.session.resume().unwrap();
    t.backend.expect_one("continue");

    // the state did not change optimistically, only the latch guards us
    assert_eq!(t.session.state(), SessionState::Stopped);
    assert!(matches!(t.session.resume(), Err(Error::ResumeInFlight)));
    assert!(matches!(t.session.step_over(), Err(Error::ResumeInFlight)));
    t.backend.expect_none();

    t.process(state_event(SessionState::Running, Some(THREAD)));
    assert_eq!(t.session.state(), SessionState::Running);
}

#[test]
fn test_rejected_resume_is_logged_and_leaves_state_alone() {
    let mut t = stopped_session();
    t.session.step_over().unwrap();
    let step = t.backend.expect_one("stepOver");

    t.process(err(step.seq, "cannot step here"));

    assert_eq!(t.session.state(), SessionState::Stopped);
    let last = t.session.console().last().unwrap();
    assert_eq!(last.category, ConsoleCategory::Stderr);
    assert!(last.text.contains("stepOver failed"));

    // the latch is cleared so the user can retry
    t.session.step_over().unwrap();
    t.backend.expect_one("stepOver");
}

#[test]
fn test_pause_requires_a_running_debuggee() {
    let mut t = session();
    t.launch_ok();
    assert!(matches!(
        t.session.pause(),
        Err(Error::CommandNotAvailable { .. })
    ));
    t.backend.expect_none();

    t.process(state_event(SessionState::Running, Some(THREAD)));
    t.session.pause().unwrap();
    t.backend.expect_one("pause");
}

#[test]
fn test_pause_is_rejected_while_stopped() {
    let mut t = stopped_session();
    assert!(matches!(
        t.session.pause(),
        Err(Error::CommandNotAvailable { .. })
    ));
    t.backend.expect_none();
}

#[test]
fn test_terminate_is_allowed_in_any_active_state() {
    let mut t = session();
    assert!(matches!(
        t.session.terminate(),
        Err(Error::CommandNotAvailable { .. })
    ));

    t.launch_ok();
    t.session.terminate().unwrap();
    t.backend.expect_one("terminate");

    t.process(state_event(SessionState::Running, Some(THREAD)));
    t.session.terminate().unwrap();
    t.backend.expect_one("terminate");
}
