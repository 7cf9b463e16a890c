//! Reconfiguration client backed by the `govc` CLI.
//!
//! `govc vm.change` submits a `ReconfigVM_Task` and blocks until the task
//! finishes, so the spawned process is the task handle: a non-zero exit is a
//! remote failure, and cancelling the context kills the process.
//!
//! Login, connection, and VM lookup happen inside the same process before the
//! task exists. Those failures are recognised from govc's stderr and reported
//! as [`RemoteError::Submit`]; everything else is [`RemoteError::Task`].

use std::process::{Command, ExitStatus};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::core::reconfig::ReconfigSpec;
use crate::core::types::VmRef;
use crate::io::config::RemoteConfig;
use crate::io::context::ExecutionContext;
use crate::io::process::{RunningCommand, spawn_captured};
use crate::io::remote::{ReconfigTask, ReconfigureClient, RemoteError};

#[derive(Debug, Clone)]
pub struct GovcClient {
    config: RemoteConfig,
}

impl GovcClient {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }

    /// Build the `govc vm.change` invocation for `spec`.
    ///
    /// Zero-valued sizes and allocations are left off the command line, matching
    /// how the API omits zero fields on the wire. The reserve-all flag is always
    /// sent explicitly.
    pub fn command(&self, vm: &VmRef, spec: &ReconfigSpec) -> Command {
        let (program, prefix) = match self.config.command.split_first() {
            Some((program, prefix)) => (program.as_str(), prefix),
            None => ("govc", &[][..]),
        };
        let mut cmd = Command::new(program);
        cmd.args(prefix);
        cmd.args(change_args(vm, spec));
        cmd
    }
}

fn change_args(vm: &VmRef, spec: &ReconfigSpec) -> Vec<String> {
    let mut args = vec!["vm.change".to_string(), "-vm".to_string(), vm.to_string()];
    let mut push = |flag: &str, value: i64| {
        if value != 0 {
            args.push(flag.to_string());
            args.push(value.to_string());
        }
    };
    push("-c", i64::from(spec.num_cpus));
    push("-m", spec.memory_mb);
    push("-cpu.reservation", spec.cpu_allocation.reservation);
    if let Some(limit) = spec.cpu_allocation.limit {
        push("-cpu.limit", limit);
    }
    push("-mem.reservation", spec.memory_allocation.reservation);
    if let Some(limit) = spec.memory_allocation.limit {
        push("-mem.limit", limit);
    }
    args.push(format!(
        "-memory-pin={}",
        spec.memory_reservation_locked_to_max
    ));
    args
}

impl ReconfigureClient for GovcClient {
    #[instrument(skip_all, fields(vm = %vm))]
    fn reconfigure(
        &self,
        vm: &VmRef,
        ctx: &ExecutionContext,
        spec: &ReconfigSpec,
    ) -> Result<Box<dyn ReconfigTask>, RemoteError> {
        if let Err(cause) = ctx.check() {
            return Err(RemoteError::Submit {
                vm: vm.clone(),
                reason: cause.to_string(),
            });
        }

        let cmd = self.command(vm, spec);
        debug!(cmd = ?cmd, "submitting reconfigure");
        let running = spawn_captured(cmd, self.config.output_limit_bytes).map_err(|err| {
            RemoteError::Submit {
                vm: vm.clone(),
                reason: format!("{err:#}"),
            }
        })?;

        let id = format!("govc-vm.change-{}", running.id());
        info!(task = %id, "reconfigure submitted");
        Ok(Box::new(GovcTask {
            id,
            vm: vm.clone(),
            running,
            poll: Duration::from_millis(self.config.poll_interval_ms),
        }))
    }
}

/// A running `govc vm.change` process.
#[derive(Debug)]
pub struct GovcTask {
    id: String,
    vm: VmRef,
    running: RunningCommand,
    poll: Duration,
}

impl ReconfigTask for GovcTask {
    fn id(&self) -> &str {
        &self.id
    }

    #[instrument(skip_all, fields(task = %self.id))]
    fn wait(self: Box<Self>, ctx: &ExecutionContext) -> Result<(), RemoteError> {
        let GovcTask {
            id,
            vm,
            running,
            poll,
        } = *self;
        let output = running.wait(ctx, poll).map_err(|err| RemoteError::Task {
            task: id.clone(),
            reason: format!("{err:#}"),
        })?;

        if let Some(cause) = output.cancelled {
            warn!(%cause, "reconfigure wait aborted");
            return Err(RemoteError::Cancelled { task: id, cause });
        }
        if !output.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if is_submit_rejection(&stderr) {
                warn!(reason = %stderr, "reconfigure rejected before task creation");
                return Err(RemoteError::Submit { vm, reason: stderr });
            }
            let reason = if stderr.is_empty() {
                exit_reason(output.status)
            } else {
                format!("{stderr}{}", output.stderr_truncated_notice("govc"))
            };
            warn!(%reason, "reconfigure failed");
            return Err(RemoteError::Task { task: id, reason });
        }

        info!("reconfigure completed");
        Ok(())
    }
}

/// Lowercase stderr fragments govc prints when it fails before a task exists.
const SUBMIT_REJECTION_MARKERS: &[&str] = &[
    " not found",
    "cannot complete login",
    "notauthenticated",
    "invalidlogin",
    "x509:",
    "connection refused",
    "no such host",
    "specify an esx or vcenter url",
];

fn is_submit_rejection(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    SUBMIT_REJECTION_MARKERS
        .iter()
        .any(|marker| stderr.contains(marker))
}

fn exit_reason(status: Option<ExitStatus>) -> String {
    match status.and_then(|status| status.code()) {
        Some(code) => format!("govc exited with status {code}"),
        None => "govc was killed by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hardware::HardwareConfig;

    fn spec(hw: HardwareConfig) -> ReconfigSpec {
        ReconfigSpec::from_hardware(&hw)
    }

    #[test]
    fn args_include_only_non_zero_values() {
        let args = change_args(
            &VmRef::new("build-01"),
            &spec(HardwareConfig {
                cpus: 4,
                ram: 8192,
                ..Default::default()
            }),
        );
        assert_eq!(
            args,
            vec![
                "vm.change",
                "-vm",
                "build-01",
                "-c",
                "4",
                "-m",
                "8192",
                "-memory-pin=false"
            ]
        );
    }

    #[test]
    fn args_carry_allocations_and_pin() {
        let args = change_args(
            &VmRef::new("/dc1/vm/build-01"),
            &spec(HardwareConfig {
                cpu_reservation: 500,
                cpu_limit: 2000,
                ram: 4096,
                ram_reserve_all: true,
                ..Default::default()
            }),
        );
        assert_eq!(
            args,
            vec![
                "vm.change",
                "-vm",
                "/dc1/vm/build-01",
                "-m",
                "4096",
                "-cpu.reservation",
                "500",
                "-cpu.limit",
                "2000",
                "-memory-pin=true"
            ]
        );
    }

    #[test]
    fn command_uses_configured_prefix() {
        let client = GovcClient::new(RemoteConfig {
            command: vec!["env".to_string(), "govc".to_string()],
            ..RemoteConfig::default()
        });
        let cmd = client.command(&VmRef::new("vm"), &ReconfigSpec::default());
        assert_eq!(cmd.get_program().to_string_lossy(), "env");
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args[0], "govc");
        assert_eq!(args[1], "vm.change");
    }

    #[test]
    fn missing_binary_is_a_submit_error() {
        let client = GovcClient::new(RemoteConfig {
            command: vec!["definitely-not-govc-xyz".to_string()],
            ..RemoteConfig::default()
        });
        let err = client
            .reconfigure(
                &VmRef::new("vm"),
                &ExecutionContext::background(),
                &ReconfigSpec::default(),
            )
            .err()
            .expect("submit should fail");
        assert!(matches!(err, RemoteError::Submit { .. }));
    }

    #[test]
    fn classifies_pre_task_failures() {
        assert!(is_submit_rejection("govc: vm 'build-01' not found"));
        assert!(is_submit_rejection("govc: Post \"https://vc/sdk\": dial tcp 10.0.0.1:443: connect: connection refused"));
        assert!(is_submit_rejection("govc: ServerFaultCode: NotAuthenticated"));
        assert!(!is_submit_rejection("govc: Insufficient resources to satisfy configured failover level"));
        assert!(!is_submit_rejection(""));
    }

    #[test]
    fn cancelled_context_refuses_submission() {
        let ctx = ExecutionContext::background();
        ctx.cancel();
        let client = GovcClient::new(RemoteConfig::default());
        let err = client
            .reconfigure(&VmRef::new("vm"), &ctx, &ReconfigSpec::default())
            .err()
            .expect("submit should fail");
        assert!(err.to_string().contains("context cancelled"));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        fn sh_client(script: &str) -> GovcClient {
            // `sh -c <script> <$0> <args...>`: the govc arguments land in $0..$n and are ignored.
            GovcClient::new(RemoteConfig {
                command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
                poll_interval_ms: 10,
                ..RemoteConfig::default()
            })
        }

        fn submit(client: &GovcClient, ctx: &ExecutionContext) -> Box<dyn ReconfigTask> {
            client
                .reconfigure(&VmRef::new("vm"), ctx, &ReconfigSpec::default())
                .map_err(|err| err.to_string())
                .expect("submit")
        }

        #[test]
        fn zero_exit_is_success() {
            let ctx = ExecutionContext::background();
            let task = submit(&sh_client("exit 0"), &ctx);
            assert!(task.id().starts_with("govc-vm.change-"));
            task.wait(&ctx).expect("wait");
        }

        #[test]
        fn non_zero_exit_reports_stderr() {
            let ctx = ExecutionContext::background();
            let task = submit(&sh_client("echo 'insufficient host memory' >&2; exit 1"), &ctx);
            let err = task.wait(&ctx).unwrap_err();
            match err {
                RemoteError::Task { reason, .. } => assert_eq!(reason, "insufficient host memory"),
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn non_zero_exit_without_stderr_reports_code() {
            let ctx = ExecutionContext::background();
            let task = submit(&sh_client("exit 7"), &ctx);
            let err = task.wait(&ctx).unwrap_err();
            match err {
                RemoteError::Task { reason, .. } => assert_eq!(reason, "govc exited with status 7"),
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn signal_exit_reports_kill() {
            let ctx = ExecutionContext::background();
            let task = submit(&sh_client("kill -9 $$"), &ctx);
            let err = task.wait(&ctx).unwrap_err();
            match err {
                RemoteError::Task { reason, .. } => assert_eq!(reason, "govc was killed by signal"),
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn missing_vm_is_a_submit_error() {
            let ctx = ExecutionContext::background();
            let task = submit(&sh_client("echo \"govc: vm 'nope' not found\" >&2; exit 1"), &ctx);
            let err = task.wait(&ctx).unwrap_err();
            match err {
                RemoteError::Submit { vm, reason } => {
                    assert_eq!(vm.as_str(), "vm");
                    assert_eq!(reason, "govc: vm 'nope' not found");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn login_failure_is_a_submit_error() {
            let ctx = ExecutionContext::background();
            let task = submit(
                &sh_client(
                    "echo 'govc: ServerFaultCode: Cannot complete login due to an incorrect user name or password.' >&2; exit 1",
                ),
                &ctx,
            );
            let err = task.wait(&ctx).unwrap_err();
            assert!(matches!(err, RemoteError::Submit { .. }));
        }

        #[test]
        fn deadline_while_waiting_is_cancellation() {
            let ctx = ExecutionContext::background().with_timeout(Duration::from_millis(100));
            let task = submit(&sh_client("exec sleep 30"), &ctx);
            let err = task.wait(&ctx).unwrap_err();
            assert!(matches!(err, RemoteError::Cancelled { .. }));
        }
    }
}
