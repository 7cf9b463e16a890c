//! Pure logic for hardware reconfiguration.
//!
//! Core modules are free of I/O. They hold the desired hardware state, its
//! validation, and the translation into a remote request.

pub mod hardware;
pub mod reconfig;
pub mod types;
