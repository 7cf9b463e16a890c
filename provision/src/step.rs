//! Pipeline step that applies CPU and memory settings to an existing VM.

use tracing::{debug, info, instrument, warn};

use crate::core::hardware::HardwareConfig;
use crate::core::reconfig::ReconfigSpec;
use crate::core::types::StepAction;
use crate::io::remote::ReconfigureClient;
use crate::pipeline::{PipelineState, Step};

pub const STEP_NAME: &str = "configure-hardware";

/// Reconfigures the VM in `state.vm` with the given hardware settings.
///
/// `hardware` must already have passed [`HardwareConfig::validate`]; the step
/// does not re-check it. Hardware changes are not rolled back on cleanup.
#[derive(Debug)]
pub struct StepConfigureHardware<C: ReconfigureClient> {
    hardware: HardwareConfig,
    client: C,
}

impl<C: ReconfigureClient> StepConfigureHardware<C> {
    pub fn new(hardware: HardwareConfig, client: C) -> Self {
        Self { hardware, client }
    }
}

impl<C: ReconfigureClient> Step for StepConfigureHardware<C> {
    fn name(&self) -> &str {
        STEP_NAME
    }

    #[instrument(skip_all, fields(vm = %state.vm))]
    fn run(&mut self, state: &mut PipelineState) -> StepAction {
        if self.hardware.is_empty() {
            debug!("no hardware customization requested");
            return StepAction::Continue;
        }

        state.reporter.say("Customizing hardware parameters...");

        let spec = ReconfigSpec::from_hardware(&self.hardware);
        debug!(?spec, "built reconfigure request");

        let task = match self.client.reconfigure(&state.vm, &state.ctx, &spec) {
            Ok(task) => task,
            Err(err) => {
                warn!(%err, "reconfigure submission failed");
                state.error = Some(err.into());
                return StepAction::Halt;
            }
        };

        let task_id = task.id().to_string();
        // The only point where this step blocks on the remote side.
        if let Err(err) = task.wait(&state.ctx) {
            warn!(task = %task_id, %err, "reconfigure task failed");
            state.error = Some(err.into());
            return StepAction::Halt;
        }

        info!(task = %task_id, "hardware reconfigured");
        StepAction::Continue
    }

    fn cleanup(&mut self, _state: &mut PipelineState) {}
}
