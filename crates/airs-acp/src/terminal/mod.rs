//! Terminal Manager
//!
//! Terminals are client-side resources: the client owns the subprocess
//! handles and satisfies the agent's `terminal/*` requests against this
//! manager. Every successful `create` must eventually see a `release` or a
//! transport close (which releases all); no subprocess is leaked.

// Layer 1: Standard library imports
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

// Layer 3: Internal module imports
use crate::dispatcher::CloseListener;
use crate::protocol::{
    AcpError, AcpResult, CreateTerminalRequest, CreateTerminalResponse, TerminalExitStatus,
    TerminalId, TerminalOutputResponse,
};

/// Captured output buffer of one stream
type OutputBuffer = Arc<Mutex<Vec<u8>>>;

/// One tracked terminal subprocess
struct TerminalEntry {
    command: String,
    pid: Option<u32>,
    stdout: OutputBuffer,
    stderr: OutputBuffer,
    exit_rx: watch::Receiver<Option<TerminalExitStatus>>,
    started_at: DateTime<Utc>,
}

impl TerminalEntry {
    fn exit_status(&self) -> Option<TerminalExitStatus> {
        self.exit_rx.borrow().clone()
    }

    fn is_running(&self) -> bool {
        self.exit_status().is_none()
    }

    fn elapsed_ms(&self) -> u64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// Render a raw signal number as its conventional name
fn signal_name(signal: i32) -> String {
    match Signal::try_from(signal) {
        Ok(signal) => signal.as_str().to_string(),
        Err(_) => format!("SIG{signal}"),
    }
}

/// Parse a signal name; accepts both `SIGTERM` and `TERM`
fn parse_signal(name: &str) -> AcpResult<Signal> {
    let upper = name.to_ascii_uppercase();
    let canonical = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::from_str(&canonical)
        .map_err(|_| AcpError::invalid_params(format!("unknown signal: {name}")))
}

/// Manager for the client's terminal resources
///
/// Owns a map `terminalId -> TerminalEntry`; operations on a released (or
/// never-created) terminal fail with `ResourceNotFound`.
#[derive(Default)]
pub struct TerminalManager {
    terminals: DashMap<TerminalId, TerminalEntry>,
}

impl TerminalManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live terminals
    pub fn len(&self) -> usize {
        self.terminals.len()
    }

    /// Whether the manager tracks no terminals
    pub fn is_empty(&self) -> bool {
        self.terminals.is_empty()
    }

    /// Spawn a subprocess and start tracking it
    ///
    /// The parent environment is inherited and overlaid with the provided
    /// variables. Stdout and stderr are captured into growing buffers. If a
    /// command timeout is set, a timer SIGKILLs the process on expiry and
    /// the exit status reports `timedOut = true`.
    pub async fn create(&self, request: CreateTerminalRequest) -> AcpResult<CreateTerminalResponse> {
        let mut command = Command::new(&request.command);
        command
            .args(&request.args)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &request.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|e| {
            AcpError::internal_error(format!("failed to spawn '{}': {e}", request.command))
        })?;
        let pid = child.id();

        let stdout_buffer: OutputBuffer = Arc::new(Mutex::new(Vec::new()));
        let stderr_buffer: OutputBuffer = Arc::new(Mutex::new(Vec::new()));

        let stdout_task = child.stdout.take().map(|stream| {
            tokio::spawn(drain_stream(stream, Arc::clone(&stdout_buffer)))
        });
        let stderr_task = child.stderr.take().map(|stream| {
            tokio::spawn(drain_stream(stream, Arc::clone(&stderr_buffer)))
        });

        let (exit_tx, exit_rx) = watch::channel(None);
        let started_at = Utc::now();
        let timed_out = Arc::new(AtomicBool::new(false));

        // Command timeout: SIGKILL on expiry; the wait task observes the
        // signal-kill and the timed_out flag distinguishes it for callers.
        if let Some(timeout_ms) = request.timeout {
            let flag = Arc::clone(&timed_out);
            let mut exit_watch = exit_rx.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = sleep(Duration::from_millis(timeout_ms)) => {
                        if let Some(pid) = pid {
                            flag.store(true, Ordering::SeqCst);
                            warn!(pid, "terminal command timeout, sending SIGKILL");
                            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
                        }
                    }
                    _ = exit_watch.wait_for(|status| status.is_some()) => {}
                }
            });
        }

        // Reap the child and publish the exit status once output is drained.
        {
            let timed_out = Arc::clone(&timed_out);
            tokio::spawn(async move {
                let status = child.wait().await;

                if let Some(task) = stdout_task {
                    let _ = task.await;
                }
                if let Some(task) = stderr_task {
                    let _ = task.await;
                }

                let duration = Utc::now()
                    .signed_duration_since(started_at)
                    .num_milliseconds()
                    .max(0) as u64;

                let exit_status = match status {
                    Ok(status) => {
                        let signal = status.signal();
                        TerminalExitStatus {
                            exit_code: status.code(),
                            signal: signal.map(signal_name),
                            signaled: Some(signal.is_some()),
                            timed_out: timed_out.load(Ordering::SeqCst),
                            duration,
                        }
                    }
                    Err(e) => {
                        warn!(%e, "failed to reap terminal subprocess");
                        TerminalExitStatus {
                            exit_code: None,
                            signal: None,
                            signaled: None,
                            timed_out: timed_out.load(Ordering::SeqCst),
                            duration,
                        }
                    }
                };

                let _ = exit_tx.send(Some(exit_status));
            });
        }

        let terminal_id = TerminalId::generate();
        debug!(%terminal_id, command = %request.command, ?pid, "terminal created");

        self.terminals.insert(
            terminal_id.clone(),
            TerminalEntry {
                command: request.command,
                pid,
                stdout: stdout_buffer,
                stderr: stderr_buffer,
                exit_rx,
                started_at,
            },
        );

        Ok(CreateTerminalResponse { terminal_id, pid })
    }

    /// Snapshot the captured output
    pub async fn output(&self, terminal_id: &TerminalId) -> AcpResult<TerminalOutputResponse> {
        let entry = self
            .terminals
            .get(terminal_id)
            .ok_or_else(|| AcpError::resource_not_found(terminal_id))?;

        let stdout = String::from_utf8_lossy(&entry.stdout.lock().await).into_owned();
        let stderr = String::from_utf8_lossy(&entry.stderr.lock().await).into_owned();
        Ok(TerminalOutputResponse {
            stdout,
            stderr,
            complete: entry.exit_status().is_some(),
        })
    }

    /// Await subprocess exit
    ///
    /// With a wait timeout, resolves `{exitCode: null, timedOut: true}` when
    /// it elapses first, without killing the process.
    pub async fn wait_for_exit(
        &self,
        terminal_id: &TerminalId,
        wait_timeout_ms: Option<u64>,
    ) -> AcpResult<TerminalExitStatus> {
        let (mut exit_rx, elapsed) = {
            let entry = self
                .terminals
                .get(terminal_id)
                .ok_or_else(|| AcpError::resource_not_found(terminal_id))?;
            (entry.exit_rx.clone(), entry.elapsed_ms())
        };

        if let Some(status) = exit_rx.borrow().clone() {
            return Ok(status);
        }

        let wait = exit_rx.wait_for(|status| status.is_some());
        match wait_timeout_ms {
            Some(ms) => match timeout(Duration::from_millis(ms), wait).await {
                Ok(Ok(status)) => Ok(status
                    .clone()
                    .unwrap_or_else(|| unreachable_status(elapsed))),
                Ok(Err(_)) => Err(AcpError::internal_error("terminal exit channel dropped")),
                Err(_) => Ok(TerminalExitStatus {
                    exit_code: None,
                    signal: None,
                    signaled: None,
                    timed_out: true,
                    duration: elapsed + ms,
                }),
            },
            None => match wait.await {
                Ok(status) => Ok(status.clone().unwrap_or_else(|| unreachable_status(elapsed))),
                Err(_) => Err(AcpError::internal_error("terminal exit channel dropped")),
            },
        }
    }

    /// Send a signal to the subprocess (default SIGTERM)
    pub async fn kill(&self, terminal_id: &TerminalId, signal: Option<&str>) -> AcpResult<()> {
        let entry = self
            .terminals
            .get(terminal_id)
            .ok_or_else(|| AcpError::resource_not_found(terminal_id))?;

        let signal = match signal {
            Some(name) => parse_signal(name)?,
            None => Signal::SIGTERM,
        };

        let Some(pid) = entry.pid else {
            return Ok(());
        };
        if entry.is_running() {
            debug!(%terminal_id, ?signal, "signaling terminal subprocess");
            kill(Pid::from_raw(pid as i32), signal)
                .map_err(|e| AcpError::internal_error(format!("signal delivery failed: {e}")))?;
        }
        Ok(())
    }

    /// Release a terminal
    ///
    /// A running subprocess gets SIGKILL and is awaited; then the entry is
    /// removed. Releasing an unknown terminal is a no-op.
    pub async fn release(&self, terminal_id: &TerminalId) -> AcpResult<()> {
        let Some((_, entry)) = self.terminals.remove(terminal_id) else {
            return Ok(());
        };

        if entry.is_running() {
            if let Some(pid) = entry.pid {
                debug!(%terminal_id, pid, "releasing running terminal, sending SIGKILL");
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
            }
            let mut exit_rx = entry.exit_rx.clone();
            let _ = exit_rx.wait_for(|status| status.is_some()).await;
        }

        debug!(%terminal_id, command = %entry.command, "terminal released");
        Ok(())
    }

    /// Release every terminal (transport closed)
    pub async fn release_all(&self) {
        let ids: Vec<TerminalId> = self
            .terminals
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        futures::future::join_all(ids.iter().map(|id| self.release(id))).await;
    }
}

fn unreachable_status(elapsed: u64) -> TerminalExitStatus {
    // wait_for(|s| s.is_some()) only returns with a populated status
    TerminalExitStatus {
        exit_code: None,
        signal: None,
        signaled: None,
        timed_out: false,
        duration: elapsed,
    }
}

async fn drain_stream<R>(mut stream: R, buffer: OutputBuffer)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buffer.lock().await.extend_from_slice(&chunk[..n]),
            Err(_) => break,
        }
    }
}

#[async_trait]
impl CloseListener for TerminalManager {
    async fn on_transport_close(&self) {
        debug!(count = self.len(), "transport closed, releasing all terminals");
        self.release_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codes;
    use std::collections::HashMap;

    fn echo_request(args: &[&str]) -> CreateTerminalRequest {
        CreateTerminalRequest {
            command: "echo".to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: None,
            env: HashMap::new(),
            timeout: None,
        }
    }

    #[tokio::test]
    async fn test_echo_run_to_completion() {
        // S5: create -> wait_for_exit -> output -> release
        let manager = TerminalManager::new();

        let created = manager.create(echo_request(&["ok"])).await.unwrap();
        assert!(created.pid.is_some());

        let status = manager
            .wait_for_exit(&created.terminal_id, None)
            .await
            .unwrap();
        assert_eq!(status.exit_code, Some(0));
        assert!(!status.timed_out);

        let output = manager.output(&created.terminal_id).await.unwrap();
        assert_eq!(output.stdout, "ok\n");
        assert_eq!(output.stderr, "");
        assert!(output.complete);

        manager.release(&created.terminal_id).await.unwrap();

        // Subsequent operations fail with ResourceNotFound
        let err = manager.output(&created.terminal_id).await.unwrap_err();
        assert_eq!(err.code, codes::RESOURCE_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_env_overlay() {
        let manager = TerminalManager::new();

        let mut env = HashMap::new();
        env.insert("ACP_TEST_VALUE".to_string(), "overlay".to_string());
        let request = CreateTerminalRequest {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), "printf '%s' \"$ACP_TEST_VALUE\"".to_string()],
            cwd: None,
            env,
            timeout: None,
        };

        let created = manager.create(request).await.unwrap();
        manager
            .wait_for_exit(&created.terminal_id, None)
            .await
            .unwrap();
        let output = manager.output(&created.terminal_id).await.unwrap();
        assert_eq!(output.stdout, "overlay");
        manager.release(&created.terminal_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_command_timeout_kills_and_flags() {
        let manager = TerminalManager::new();

        let request = CreateTerminalRequest {
            command: "sleep".to_string(),
            args: vec!["30".to_string()],
            cwd: None,
            env: HashMap::new(),
            timeout: Some(100),
        };

        let created = manager.create(request).await.unwrap();
        let status = manager
            .wait_for_exit(&created.terminal_id, None)
            .await
            .unwrap();

        assert!(status.timed_out);
        assert_eq!(status.exit_code, None);
        assert_eq!(status.signaled, Some(true));
        assert_eq!(status.signal.as_deref(), Some("SIGKILL"));

        manager.release(&created.terminal_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_timeout_does_not_kill() {
        let manager = TerminalManager::new();

        let request = CreateTerminalRequest {
            command: "sleep".to_string(),
            args: vec!["30".to_string()],
            cwd: None,
            env: HashMap::new(),
            timeout: None,
        };

        let created = manager.create(request).await.unwrap();
        let status = manager
            .wait_for_exit(&created.terminal_id, Some(100))
            .await
            .unwrap();

        // The waiter timed out; the process is still alive
        assert!(status.timed_out);
        assert_eq!(status.exit_code, None);
        let output = manager.output(&created.terminal_id).await.unwrap();
        assert!(!output.complete);

        manager.release(&created.terminal_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_kill_delivers_sigterm() {
        let manager = TerminalManager::new();

        let request = CreateTerminalRequest {
            command: "sleep".to_string(),
            args: vec!["30".to_string()],
            cwd: None,
            env: HashMap::new(),
            timeout: None,
        };

        let created = manager.create(request).await.unwrap();
        manager.kill(&created.terminal_id, None).await.unwrap();

        let status = manager
            .wait_for_exit(&created.terminal_id, None)
            .await
            .unwrap();
        assert_eq!(status.signal.as_deref(), Some("SIGTERM"));
        assert_eq!(status.signaled, Some(true));
        assert!(!status.timed_out);

        manager.release(&created.terminal_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_unknown_is_noop() {
        let manager = TerminalManager::new();
        manager
            .release(&TerminalId::new("never-created"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_release_all_kills_running() {
        let manager = TerminalManager::new();

        for _ in 0..3 {
            let request = CreateTerminalRequest {
                command: "sleep".to_string(),
                args: vec!["30".to_string()],
                cwd: None,
                env: HashMap::new(),
                timeout: None,
            };
            manager.create(request).await.unwrap();
        }
        assert_eq!(manager.len(), 3);

        manager.release_all().await;
        assert!(manager.is_empty());
    }

    #[test]
    fn test_signal_parsing() {
        assert_eq!(parse_signal("SIGTERM").unwrap(), Signal::SIGTERM);
        assert_eq!(parse_signal("term").unwrap(), Signal::SIGTERM);
        assert_eq!(parse_signal("KILL").unwrap(), Signal::SIGKILL);
        assert!(parse_signal("SIGNOPE").is_err());
    }

    #[test]
    fn test_signal_naming() {
        assert_eq!(signal_name(9), "SIGKILL");
        assert_eq!(signal_name(15), "SIGTERM");
    }
}
