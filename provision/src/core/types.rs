//! Shared types passed between the pipeline runner and its steps.

use std::fmt;

/// Handle to an existing virtual machine (inventory path or name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VmRef(String);

impl VmRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the runner should do after a step returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Proceed to the next step.
    Continue,
    /// Stop the sequence. The step has recorded its error in shared state.
    Halt,
}
