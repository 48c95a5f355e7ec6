//! Deployment module

pub mod activator;
pub mod engine;
pub mod fsm;
pub mod ledger;
pub mod process;
pub mod reconcile;
