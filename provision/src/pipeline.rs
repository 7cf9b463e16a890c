//! Sequential step runner with typed shared state.
//!
//! Steps run strictly in order against one [`PipelineState`]. The first step
//! that returns [`StepAction::Halt`] stops the sequence; every step whose
//! `run` was invoked then has `cleanup` invoked, last step first.

use thiserror::Error;
use tracing::{info, info_span, warn};

use crate::core::types::{StepAction, VmRef};
use crate::io::context::{Cancelled, ExecutionContext};
use crate::io::reporter::Reporter;

/// State shared by every step of one pipeline run.
pub struct PipelineState {
    /// Target VM, produced by whichever step created or located it.
    pub vm: VmRef,
    pub ctx: ExecutionContext,
    pub reporter: Box<dyn Reporter>,
    /// Failure recorded by the step that halted the pipeline.
    pub error: Option<anyhow::Error>,
}

impl PipelineState {
    pub fn new(vm: VmRef, ctx: ExecutionContext, reporter: Box<dyn Reporter>) -> Self {
        Self {
            vm,
            ctx,
            reporter,
            error: None,
        }
    }
}

impl std::fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineState")
            .field("vm", &self.vm)
            .field("ctx", &self.ctx)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// One unit of work in a pipeline.
pub trait Step {
    fn name(&self) -> &str;

    /// Do the work. On failure, record the error in `state.error` and return `Halt`.
    fn run(&mut self, state: &mut PipelineState) -> StepAction;

    /// Release anything `run` acquired. Called once after the sequence stops,
    /// whatever `run` returned.
    fn cleanup(&mut self, state: &mut PipelineState);
}

/// The pipeline stopped before a step because its context had ended.
#[derive(Debug, Error)]
#[error("pipeline cancelled before step '{step}': {cause}")]
pub struct PipelineCancelled {
    pub step: String,
    pub cause: Cancelled,
}

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every step returned `Continue`.
    Completed,
    /// `step` returned `Halt`.
    Halted { step: String },
    /// The context ended before `step` could run.
    Cancelled { step: String },
}

pub struct Pipeline {
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    pub fn run(&mut self, state: &mut PipelineState) -> PipelineOutcome {
        let mut executed = 0usize;
        let mut outcome = PipelineOutcome::Completed;

        for step in &mut self.steps {
            let name = step.name().to_string();
            if let Err(cause) = state.ctx.check() {
                warn!(step = %name, %cause, "pipeline cancelled");
                if state.error.is_none() {
                    state.error = Some(
                        PipelineCancelled {
                            step: name.clone(),
                            cause,
                        }
                        .into(),
                    );
                }
                outcome = PipelineOutcome::Cancelled { step: name };
                break;
            }

            let span = info_span!("step", step = %name);
            let _enter = span.enter();
            info!("running step");
            executed += 1;
            match step.run(state) {
                StepAction::Continue => info!("step finished"),
                StepAction::Halt => {
                    warn!(error = ?state.error.as_ref().map(|e| format!("{e:#}")), "step halted");
                    outcome = PipelineOutcome::Halted { step: name };
                    break;
                }
            }
        }

        for step in self.steps[..executed].iter_mut().rev() {
            let span = info_span!("cleanup", step = %step.name());
            let _enter = span.enter();
            step.cleanup(state);
        }

        outcome
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.steps.iter().map(|s| s.name()).collect();
        f.debug_struct("Pipeline").field("steps", &names).finish()
    }
}
