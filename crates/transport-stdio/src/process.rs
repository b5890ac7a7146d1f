//! A long-lived child process speaking line-delimited JSON-RPC over
//! stdin/stdout, with request correlation, a health loop, and auto-restart.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::Mutex;

use aegis_domain::config::StdioConfig;
use aegis_domain::entities::HealthStatus;

use crate::correlation::CorrelationMap;
use crate::env_guard::is_dangerous_env_var;
use crate::health::{HealthSampler, HealthVerdict};
use crate::protocol::{JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::state::{ProcessState, StateCell};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("subprocess I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("subprocess protocol serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("subprocess is not running")]
    NotRunning,
    #[error("rejected environment variable: {0}")]
    DeniedEnvVar(String),
    #[error("request timed out")]
    Timeout,
    #[error("subprocess returned an error: {0}")]
    Rpc(#[from] JsonRpcError),
    #[error("subprocess exited or response channel closed")]
    Disconnected,
    #[error("subprocess entered the failed state and requires operator intervention")]
    Failed,
}

#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

struct SharedHandles {
    stdin: Mutex<ChildStdin>,
    child: Mutex<Child>,
}

/// One managed subprocess record. Shared via `Arc` between the reader task,
/// the health-loop task, and every caller invoking a capability.
pub struct ManagedProcess {
    spec: SpawnSpec,
    config: StdioConfig,
    state: StateCell,
    handles: SyncMutex<Option<Arc<SharedHandles>>>,
    correlation: Arc<CorrelationMap>,
    last_activity: SyncMutex<Instant>,
    restart_count: AtomicU32,
    shutdown_requested: std::sync::atomic::AtomicBool,
    fatal_breach: std::sync::atomic::AtomicBool,
    pid: AtomicU64,
    generation: AtomicU64,
}

impl ManagedProcess {
    pub fn new(spec: SpawnSpec, config: StdioConfig) -> Arc<Self> {
        Arc::new(Self {
            spec,
            config,
            state: StateCell::new(ProcessState::Idle),
            handles: SyncMutex::new(None),
            correlation: Arc::new(CorrelationMap::new()),
            last_activity: SyncMutex::new(Instant::now()),
            restart_count: AtomicU32::new(0),
            shutdown_requested: std::sync::atomic::AtomicBool::new(false),
            fatal_breach: std::sync::atomic::AtomicBool::new(false),
            pid: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        })
    }

    pub fn state(&self) -> ProcessState {
        self.state.get()
    }

    fn validate_env(&self) -> Result<(), ProcessError> {
        for key in self.spec.env.keys() {
            if is_dangerous_env_var(key) {
                return Err(ProcessError::DeniedEnvVar(key.clone()));
            }
        }
        Ok(())
    }

    pub fn start(
        self: &Arc<Self>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ProcessError>> + Send>>
    {
        let this = self.clone();
        Box::pin(async move {
            if !this.state.transition(ProcessState::Idle, ProcessState::Starting)
                && !this.state.transition(ProcessState::Crashed, ProcessState::Starting)
            {
                return Ok(());
            }
            this.validate_env()?;
            this.fatal_breach.store(false, Ordering::Release);

            let mut cmd = tokio::process::Command::new(&this.spec.command);
            cmd.args(&this.spec.args)
                .envs(&this.spec.env)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let mut child = match cmd.spawn() {
                Ok(c) => c,
                Err(e) => {
                    this.state.set(ProcessState::Failed);
                    return Err(ProcessError::Io(e));
                }
            };

            this.pid.store(child.id().unwrap_or(0) as u64, Ordering::Release);
            let stdin = child.stdin.take().ok_or(ProcessError::NotRunning)?;
            let stdout = child.stdout.take().ok_or(ProcessError::NotRunning)?;

            let handles = Arc::new(SharedHandles {
                stdin: Mutex::new(stdin),
                child: Mutex::new(child),
            });
            *this.handles.lock() = Some(handles.clone());
            *this.last_activity.lock() = Instant::now();
            this.generation.fetch_add(1, Ordering::AcqRel);

            this.state.set(ProcessState::Running);

            let reader_this = this.clone();
            tokio::spawn(async move {
                reader_this.reader_loop(BufReader::new(stdout)).await;
            });

            Ok(())
        })
    }

    async fn reader_loop(self: Arc<Self>, mut stdout: BufReader<tokio::process::ChildStdout>) {
        let mut line = String::new();
        loop {
            line.clear();
            let bytes = match stdout.read_line(&mut line).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(resource = %self.spec.command, error = %e, "stdio read error");
                    0
                }
            };
            if bytes == 0 {
                self.on_eof().await;
                return;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            *self.last_activity.lock() = Instant::now();

            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(resp) => {
                    if let Some(id) = resp.id {
                        let result = resp.result_or_error();
                        self.correlation.complete(id, result);
                    }
                    // Responses with no id are notifications; nothing to route yet.
                }
                Err(_) => {
                    tracing::debug!(line = %trimmed, "skipping non-JSON line from subprocess stdout");
                }
            }
        }
    }

    async fn on_eof(self: &Arc<Self>) {
        let was_stopping = self.state.get() == ProcessState::Stopping;
        self.correlation.fail_all("subprocess exited");
        *self.handles.lock() = None;

        if was_stopping || self.shutdown_requested.load(Ordering::Acquire) {
            self.state.set(ProcessState::Idle);
            return;
        }

        if self.fatal_breach.load(Ordering::Acquire) {
            tracing::error!(command = %self.spec.command, "subprocess terminated for resource breach, not restarting");
            self.state.set(ProcessState::Failed);
            return;
        }

        self.state.set(ProcessState::Crashed);
        if self.restart_count.load(Ordering::Acquire) < self.config.max_restart_attempts {
            self.restart_count.fetch_add(1, Ordering::AcqRel);
            tracing::warn!(command = %self.spec.command, "subprocess crashed, restarting");
            let this = self.clone();
            tokio::spawn(async move {
                let _ = this.start().await;
            });
        } else {
            tracing::error!(command = %self.spec.command, "subprocess exhausted restart budget");
            self.state.set(ProcessState::Failed);
        }
    }

    async fn write_line(&self, json: &str) -> Result<(), ProcessError> {
        let handles = self.handles.lock().clone().ok_or(ProcessError::NotRunning)?;
        let mut stdin = handles.stdin.lock().await;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    pub async fn call(
        self: &Arc<Self>,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, ProcessError> {
        if self.state.get() == ProcessState::Failed {
            return Err(ProcessError::Failed);
        }
        if self.state.get() != ProcessState::Running {
            return Err(ProcessError::NotRunning);
        }

        let (id, rx) = self.correlation.register();
        let req = JsonRpcRequest::new(id, method, params);
        let json = serde_json::to_string(&req)?;

        if let Err(e) = self.write_line(&json).await {
            self.correlation.cancel(id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(rpc_err))) => Err(ProcessError::Rpc(rpc_err)),
            Ok(Err(_)) => Err(ProcessError::Disconnected),
            Err(_) => {
                self.correlation.cancel(id);
                Err(ProcessError::Timeout)
            }
        }
    }

    /// Fire-and-forget cancellation notice; does not kill the subprocess.
    pub async fn notify_cancel(&self, request_id: u64) {
        let params = serde_json::json!({ "requestId": request_id });
        let notif = JsonRpcNotification::new("$/cancelRequest", Some(params));
        if let Ok(json) = serde_json::to_string(&notif) {
            let _ = self.write_line(&json).await;
        }
    }

    pub async fn health(&self, sampler: &mut HealthSampler) -> HealthStatus {
        if self.state.get() != ProcessState::Running {
            return HealthStatus::Unhealthy;
        }
        let idle = self.last_activity.lock().elapsed();
        if sampler.check_hang(idle, &self.config) {
            tracing::warn!(command = %self.spec.command, idle_secs = idle.as_secs(), "subprocess hang detected");
            return HealthStatus::Unhealthy;
        }
        let pid = self.pid.load(Ordering::Acquire) as u32;
        if pid == 0 {
            return HealthStatus::Unhealthy;
        }
        for verdict in sampler.sample(pid, &self.config) {
            match verdict {
                HealthVerdict::MemoryBreach { rss_mb } => {
                    tracing::error!(command = %self.spec.command, rss_mb, "subprocess memory breach, killing");
                    self.fatal_breach.store(true, Ordering::Release);
                    self.kill().await;
                    return HealthStatus::Unhealthy;
                }
                HealthVerdict::FdBreach { fds } => {
                    tracing::error!(command = %self.spec.command, fds, "subprocess fd breach, killing");
                    self.fatal_breach.store(true, Ordering::Release);
                    self.kill().await;
                    return HealthStatus::Unhealthy;
                }
                HealthVerdict::CpuWarning { percent } => {
                    tracing::warn!(command = %self.spec.command, percent, "subprocess cpu usage elevated");
                }
                HealthVerdict::Ok | HealthVerdict::Hung => {}
            }
        }
        HealthStatus::Healthy
    }

    async fn kill(&self) {
        let handles = self.handles.lock().clone();
        if let Some(handles) = handles {
            let mut child = handles.child.lock().await;
            let _ = child.kill().await;
        }
    }

    pub async fn stop(self: &Arc<Self>) {
        self.shutdown_requested.store(true, Ordering::Release);
        if !self.state.transition(ProcessState::Running, ProcessState::Stopping) {
            return;
        }
        self.correlation.fail_all("subprocess is shutting down");

        let handles = self.handles.lock().clone();
        if let Some(handles) = handles {
            {
                let mut stdin = handles.stdin.lock().await;
                let _ = stdin.shutdown().await;
            }
            let mut child = handles.child.lock().await;
            let wait = tokio::time::timeout(
                Duration::from_secs(self.config.stop_timeout_secs),
                child.wait(),
            )
            .await;
            if wait.is_err() {
                tracing::warn!(command = %self.spec.command, "subprocess did not exit gracefully, force-killing");
                let _ = child.kill().await;
            }
        }
        *self.handles.lock() = None;
        self.state.set(ProcessState::Idle);
    }

    pub fn pending_requests(&self) -> usize {
        self.correlation.pending_count()
    }
}

impl JsonRpcResponse {
    fn result_or_error(self) -> crate::correlation::SlotResult {
        self.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn echo_spec() -> SpawnSpec {
        // Reads one JSON-RPC line and immediately echoes back a matching
        // success response, then keeps reading (never exits on its own).
        SpawnSpec {
            command: "sh".into(),
            args: vec![
                "-c".into(),
                r#"while read -r line; do id=$(echo "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p'); echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"ok\"}],\"is_error\":false}}"; done"#.into(),
            ],
            env: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn start_transitions_to_running_and_calls_succeed() {
        let process = ManagedProcess::new(echo_spec(), StdioConfig::default());
        process.start().await.unwrap();
        assert_eq!(process.state(), ProcessState::Running);

        let result = process
            .call("capability/invoke", None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result["content"][0]["text"], "ok");

        process.stop().await;
        assert_eq!(process.state(), ProcessState::Idle);
    }

    #[tokio::test]
    async fn denied_env_var_blocks_start() {
        let mut env = HashMap::new();
        env.insert("LD_PRELOAD".to_string(), "evil.so".to_string());
        let process = ManagedProcess::new(
            SpawnSpec {
                command: "sh".into(),
                args: vec![],
                env,
            },
            StdioConfig::default(),
        );
        let err = process.start().await.unwrap_err();
        assert!(matches!(err, ProcessError::DeniedEnvVar(_)));
    }

    #[tokio::test]
    async fn call_before_start_is_not_running() {
        let process = ManagedProcess::new(echo_spec(), StdioConfig::default());
        let err = process
            .call("capability/invoke", None, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::NotRunning));
    }

    #[tokio::test]
    async fn exit_fails_outstanding_requests() {
        let spec = SpawnSpec {
            command: "sh".into(),
            args: vec!["-c".into(), "exit 1".into()],
            env: HashMap::new(),
        };
        let process = ManagedProcess::new(spec, StdioConfig {
            max_restart_attempts: 0,
            ..StdioConfig::default()
        });
        process.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(process.state(), ProcessState::Failed);
    }

    #[tokio::test]
    async fn fatal_breach_enters_failed_instead_of_restarting() {
        let process = ManagedProcess::new(echo_spec(), StdioConfig::default());
        process.start().await.unwrap();
        assert_eq!(process.state(), ProcessState::Running);

        process.fatal_breach.store(true, Ordering::Release);
        process.on_eof().await;

        assert_eq!(process.state(), ProcessState::Failed);
        assert_eq!(process.restart_count.load(Ordering::Acquire), 0);
    }
}
