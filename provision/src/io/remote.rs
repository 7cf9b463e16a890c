//! Remote reconfiguration abstraction.
//!
//! [`ReconfigureClient`] decouples the hardware step from the management
//! backend (currently `govc`). Tests use scripted clients that record requests
//! and return predetermined task results without touching a hypervisor.

use thiserror::Error;

use crate::core::reconfig::ReconfigSpec;
use crate::core::types::VmRef;
use crate::io::context::{Cancelled, ExecutionContext};

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request was not accepted (transport, auth, invalid handle).
    #[error("submit reconfigure for {vm}: {reason}")]
    Submit { vm: VmRef, reason: String },
    /// The request was accepted but failed while running.
    #[error("reconfigure task {task} failed: {reason}")]
    Task { task: String, reason: String },
    /// The execution context ended while waiting for the task.
    #[error("reconfigure task {task} aborted: {cause}")]
    Cancelled { task: String, cause: Cancelled },
}

/// Issues VM reconfiguration requests.
pub trait ReconfigureClient {
    /// Submit `spec` for `vm`. Returns a handle to the in-flight task.
    fn reconfigure(
        &self,
        vm: &VmRef,
        ctx: &ExecutionContext,
        spec: &ReconfigSpec,
    ) -> Result<Box<dyn ReconfigTask>, RemoteError>;
}

/// In-flight reconfiguration.
pub trait ReconfigTask {
    fn id(&self) -> &str;

    /// Block until the task finishes or `ctx` is cancelled or expires.
    ///
    /// Backends that submit and wait in one call may surface a rejected
    /// submission here as [`RemoteError::Submit`].
    fn wait(self: Box<Self>, ctx: &ExecutionContext) -> Result<(), RemoteError>;
}
