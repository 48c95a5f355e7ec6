//! stackctl library
//!
//! Compose descriptor augmentation, network provisioning and stack activation.

pub mod app;
pub mod compose;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod secrets;
pub mod server;
pub mod storage;
pub mod utils;
