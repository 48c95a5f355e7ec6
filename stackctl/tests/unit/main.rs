//! Integration tests for stackctl

mod test_activator;
mod test_fsm;
mod test_reconcile;
mod test_server;
