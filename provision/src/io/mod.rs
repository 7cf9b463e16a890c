//! I/O collaborators for the hardware step.

pub mod config;
pub mod context;
pub mod govc;
pub mod process;
pub mod remote;
pub mod reporter;
