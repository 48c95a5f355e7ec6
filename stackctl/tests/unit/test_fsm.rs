//! Activation FSM tests

use stackctl::deploy::fsm::{ActivationEvent, ActivationFsm, ActivationState};

#[test]
fn test_fsm_initial_state() {
    let fsm = ActivationFsm::new();
    assert_eq!(fsm.state(), &ActivationState::Reconciling);
    assert!(fsm.error().is_none());
    assert!(!fsm.is_terminal());
}

#[test]
fn test_fsm_reconcile_failure_skips_submission() {
    let mut fsm = ActivationFsm::new();

    fsm.process(ActivationEvent::ReconcileFailed("permission denied".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), &ActivationState::Failed);
    assert_eq!(fsm.error(), Some("permission denied"));
    assert!(fsm.is_terminal());
}

#[test]
fn test_fsm_rejects_submission_before_reconcile() {
    let mut fsm = ActivationFsm::new();

    assert!(fsm.process(ActivationEvent::Submitted).is_err());
    assert!(fsm.process(ActivationEvent::RolledBack).is_err());
    assert_eq!(fsm.state(), &ActivationState::Reconciling);
}

#[test]
fn test_fsm_terminal_states_accept_nothing() {
    let mut fsm = ActivationFsm::new();
    fsm.process(ActivationEvent::Reconciled).unwrap();
    fsm.process(ActivationEvent::Submitted).unwrap();

    assert!(fsm.process(ActivationEvent::Reconciled).is_err());
    assert!(fsm
        .process(ActivationEvent::SubmitFailed("late".to_string()))
        .is_err());
    assert_eq!(fsm.state(), &ActivationState::Succeeded);
}

#[test]
fn test_fsm_rolling_back_must_finish() {
    let mut fsm = ActivationFsm::new();
    fsm.process(ActivationEvent::Reconciled).unwrap();
    fsm.process(ActivationEvent::SubmitFailed("unhealthy".to_string()))
        .unwrap();

    assert!(fsm.process(ActivationEvent::Submitted).is_err());
    assert_eq!(fsm.state(), &ActivationState::RollingBack);

    fsm.process(ActivationEvent::RolledBack).unwrap();
    assert_eq!(fsm.state(), &ActivationState::Failed);
}
