//! Hardware reconfiguration step for a VM build pipeline.
//!
//! Given a VM that an earlier step created, the hardware step applies CPU and
//! memory sizing through the management API and waits for the change to
//! finish. The crate is split the same way as the pipeline it serves:
//!
//! - **[`core`]**: Pure logic (hardware config, validation, request building).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (config files, the `govc`
//!   client, child processes, operator output).
//!
//! [`pipeline`] sequences steps over shared state and [`step`] implements the
//! hardware step itself.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
