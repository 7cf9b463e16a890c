//! Scripted collaborators for exercising steps and pipelines without a hypervisor.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::core::reconfig::ReconfigSpec;
use crate::core::types::VmRef;
use crate::io::context::ExecutionContext;
use crate::io::remote::{ReconfigTask, ReconfigureClient, RemoteError};
use crate::io::reporter::Reporter;

/// How a scripted task resolves when waited on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedWait {
    Succeed,
    Fail(String),
    /// Poll the context until it is cancelled or expires.
    BlockUntilCancelled,
}

/// One scripted response to `reconfigure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedReconfigure {
    /// `Err(reason)` rejects the submission.
    pub submit: Result<ScriptedWait, String>,
}

impl ScriptedReconfigure {
    pub fn succeed() -> Self {
        Self {
            submit: Ok(ScriptedWait::Succeed),
        }
    }

    pub fn reject(reason: &str) -> Self {
        Self {
            submit: Err(reason.to_string()),
        }
    }

    pub fn fail_task(reason: &str) -> Self {
        Self {
            submit: Ok(ScriptedWait::Fail(reason.to_string())),
        }
    }

    pub fn block_until_cancelled() -> Self {
        Self {
            submit: Ok(ScriptedWait::BlockUntilCancelled),
        }
    }
}

/// A request received by [`ScriptedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub vm: VmRef,
    pub spec: ReconfigSpec,
}

#[derive(Debug, Default)]
struct ScriptState {
    script: VecDeque<ScriptedReconfigure>,
    requests: Vec<RecordedRequest>,
    waits: usize,
}

/// Client that replays scripted responses in order and records every request.
///
/// Clones share the script and the recorded requests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedClient {
    inner: Arc<Mutex<ScriptState>>,
}

impl ScriptedClient {
    pub fn new(script: Vec<ScriptedReconfigure>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptState {
                script: script.into(),
                ..ScriptState::default()
            })),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.inner).requests.clone()
    }

    /// Number of `wait` calls made on tasks returned by this client.
    pub fn waits(&self) -> usize {
        lock(&self.inner).waits
    }
}

impl ReconfigureClient for ScriptedClient {
    fn reconfigure(
        &self,
        vm: &VmRef,
        _ctx: &ExecutionContext,
        spec: &ReconfigSpec,
    ) -> Result<Box<dyn ReconfigTask>, RemoteError> {
        let mut state = lock(&self.inner);
        state.requests.push(RecordedRequest {
            vm: vm.clone(),
            spec: *spec,
        });
        let seq = state.requests.len();
        let next = state.script.pop_front().unwrap_or_else(|| {
            ScriptedReconfigure::reject("no scripted response left")
        });
        match next.submit {
            Ok(wait) => Ok(Box::new(ScriptedTask {
                id: format!("task-{seq}"),
                wait,
                inner: Arc::clone(&self.inner),
            })),
            Err(reason) => Err(RemoteError::Submit {
                vm: vm.clone(),
                reason,
            }),
        }
    }
}

struct ScriptedTask {
    id: String,
    wait: ScriptedWait,
    inner: Arc<Mutex<ScriptState>>,
}

impl ReconfigTask for ScriptedTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn wait(self: Box<Self>, ctx: &ExecutionContext) -> Result<(), RemoteError> {
        lock(&self.inner).waits += 1;
        match self.wait {
            ScriptedWait::Succeed => Ok(()),
            ScriptedWait::Fail(reason) => Err(RemoteError::Task {
                task: self.id,
                reason,
            }),
            ScriptedWait::BlockUntilCancelled => loop {
                if let Err(cause) = ctx.check() {
                    return Err(RemoteError::Cancelled {
                        task: self.id,
                        cause,
                    });
                }
                thread::sleep(Duration::from_millis(5));
            },
        }
    }
}

/// Reporter that keeps every message as `"say: ..."` or `"error: ..."`.
///
/// Clones share one message log.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

impl Reporter for RecordingReporter {
    fn say(&self, message: &str) {
        lock(&self.messages).push(format!("say: {message}"));
    }

    fn error(&self, message: &str) {
        lock(&self.messages).push(format!("error: {message}"));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking test thread must not hide the recorded state from the assertions.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
