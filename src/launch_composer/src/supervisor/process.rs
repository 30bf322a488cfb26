//! Managed process abstraction

use crate::{
    error::SupervisorError,
    record::{OutputMode, ResolvedDirective},
};
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
    sync::mpsc,
    task::JoinHandle,
};

/// Process status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Process is pending start
    Pending,
    /// Process is running
    Running,
    /// Process has stopped with exit code
    Stopped(Option<i32>),
    /// Process failed to start
    Failed,
}

impl ProcessStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessStatus::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, ProcessStatus::Stopped(_) | ProcessStatus::Failed)
    }
}

/// Event emitted by a managed process
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    /// Process started
    Started { pid: u32 },
    /// Process output line (stdout or stderr), screen mode only
    Output { line: String, is_stderr: bool },
    /// Process exited; `None` when killed by a signal
    Exited { code: Option<i32> },
    /// Process failed to start
    Failed { error: String },
}

pub type EventSender = mpsc::UnboundedSender<(String, ProcessEvent)>;

/// A child process started for one directive
pub struct ManagedProcess {
    /// Unique supervisor key
    pub name: String,
    pub directive: ResolvedDirective,
    pub status: ProcessStatus,
    /// Process ID (if running)
    pub pid: Option<u32>,
    pub started_at: Option<Instant>,
    child: Option<Child>,
    event_tx: Option<EventSender>,
    readers: Vec<JoinHandle<()>>,
}

impl ManagedProcess {
    pub fn new(name: String, directive: ResolvedDirective) -> Self {
        Self {
            name,
            directive,
            status: ProcessStatus::Pending,
            pid: None,
            started_at: None,
            child: None,
            event_tx: None,
            readers: Vec::new(),
        }
    }

    /// Set the event sender for this process
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn emit(&self, event: ProcessEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send((self.name.clone(), event));
        }
    }

    /// Path of this process's log file under `log_dir`.
    pub fn log_path(&self, log_dir: &Path) -> PathBuf {
        let file_name = self.name.trim_start_matches('/').replace('/', "_");
        log_dir.join(format!("{}.log", file_name))
    }

    /// Start the process
    pub async fn start(&mut self, log_dir: &Path) -> Result<(), SupervisorError> {
        if self.status.is_running() {
            return Err(SupervisorError::AlreadyRunning(self.name.clone()));
        }

        log::info!("[{}] Starting: {}", self.name, self.directive.cmd.join(" "));

        let mut cmd = Command::new(&self.directive.executable);
        cmd.args(self.directive.cmd.iter().skip(1))
            .envs(self.directive.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        for name in &self.directive.env_remove {
            cmd.env_remove(name);
        }
        if let Some(dir) = &self.directive.cwd {
            cmd.current_dir(dir);
        }

        match self.directive.output {
            OutputMode::Screen => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            OutputMode::Log => {
                let path = self.log_path(log_dir);
                let (stdout, stderr) = open_log_file(&path)?;
                log::debug!("[{}] Logging output to {}", self.name, path.display());
                cmd.stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));
            }
            OutputMode::Suppressed => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.status = ProcessStatus::Failed;
                log::error!("[{}] Failed to spawn process: {}", self.name, e);
                self.emit(ProcessEvent::Failed {
                    error: e.to_string(),
                });
                return Err(SupervisorError::ProcessStart {
                    name: self.name.clone(),
                    source: e,
                });
            }
        };

        let pid = child.id().unwrap_or(0);
        self.pid = Some(pid);
        self.status = ProcessStatus::Running;
        self.started_at = Some(Instant::now());
        self.emit(ProcessEvent::Started { pid });

        // Spawn output readers
        if let Some(tx) = &self.event_tx {
            if let Some(stdout) = child.stdout.take() {
                self.readers
                    .push(spawn_line_reader(self.name.clone(), stdout, false, tx.clone()));
            }
            if let Some(stderr) = child.stderr.take() {
                self.readers
                    .push(spawn_line_reader(self.name.clone(), stderr, true, tx.clone()));
            }
        }

        self.child = Some(child);
        Ok(())
    }

    /// Stop the process gracefully (SIGTERM, then SIGKILL after timeout)
    pub async fn stop(&mut self, timeout: Duration) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        log::info!("[{}] Stopping process...", self.name);

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.pid {
                if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    log::debug!("[{}] SIGTERM failed: {}", self.name, e);
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = child.start_kill();
        }

        let code = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => status.code(),
            Ok(Err(e)) => {
                log::error!("[{}] Error waiting for process: {}", self.name, e);
                None
            }
            Err(_) => {
                log::warn!("[{}] Process did not exit gracefully, forcing kill", self.name);
                if let Err(e) = child.kill().await {
                    log::error!("[{}] Failed to kill process: {}", self.name, e);
                }
                None
            }
        };

        log::info!("[{}] Process exited with code: {:?}", self.name, code);
        self.status = ProcessStatus::Stopped(code);
        self.pid = None;
        self.emit(ProcessEvent::Exited { code });
    }

    /// Poll the child without blocking, recording an exit if it happened.
    pub fn check_status(&mut self) -> ProcessStatus {
        if let Some(child) = &mut self.child {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let code = status.code();
                    self.status = ProcessStatus::Stopped(code);
                    self.pid = None;
                    self.child = None;
                    self.emit(ProcessEvent::Exited { code });
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("[{}] Error checking process status: {}", self.name, e);
                }
            }
        }

        self.status
    }

    pub fn uptime(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }

    /// Wait for the output readers to reach end of stream, so every line the
    /// process wrote has been sent as an event. Readers still open after
    /// `timeout` (a detached grandchild holding the pipe) are abandoned.
    pub async fn finish_output(&mut self, timeout: Duration) {
        for reader in self.readers.drain(..) {
            match tokio::time::timeout(timeout, reader).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::debug!("[{}] Output reader failed: {}", self.name, e),
                Err(_) => log::debug!("[{}] Output still open, not waiting", self.name),
            }
        }
    }
}

fn open_log_file(path: &Path) -> Result<(File, File), SupervisorError> {
    let log_err = |source| SupervisorError::LogFile {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(log_err)?;
    }
    let stdout = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(log_err)?;
    let stderr = stdout.try_clone().map_err(log_err)?;
    Ok((stdout, stderr))
}

fn spawn_line_reader<R>(
    name: String,
    stream: R,
    is_stderr: bool,
    tx: EventSender,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let _ = tx.send((name.clone(), ProcessEvent::Output { line, is_stderr }));
        }
    })
}
