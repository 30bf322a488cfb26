//! Process supervisor - starts, monitors and stops the processes of a composition

pub mod process;

pub use process::{ManagedProcess, ProcessEvent, ProcessStatus};

use crate::{error::SupervisorError, record::ResolvedDirective};
use indexmap::IndexMap;
use std::{path::PathBuf, time::Duration};
use tokio::sync::{mpsc, watch};

/// How directives are started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMode {
    /// One after another, in composition order.
    #[default]
    Sequential,
    /// All at once.
    Concurrent,
}

/// What to do when a process fails to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartFailurePolicy {
    /// Keep the processes that did start.
    Continue,
    /// Stop everything already started and report the failure.
    #[default]
    ShutdownAll,
}

/// Supervisor configuration
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Grace period between SIGTERM and SIGKILL
    pub shutdown_timeout: Duration,
    pub start_mode: StartMode,
    pub on_start_failure: StartFailurePolicy,
    /// Directory for `output="log"` processes
    pub log_dir: PathBuf,
    /// How often exits are polled while waiting
    pub poll_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(5),
            start_mode: StartMode::default(),
            on_start_failure: StartFailurePolicy::default(),
            log_dir: std::env::temp_dir().join("launch_composer").join("log"),
            poll_interval: Duration::from_millis(200),
        }
    }
}

/// Outcome of [`Supervisor::launch`].
#[derive(Debug, Default)]
pub struct LaunchReport {
    /// Names of the processes that started, in start order.
    pub started: Vec<String>,
    /// Processes that failed to start. Only populated under [`StartFailurePolicy::Continue`].
    pub failures: Vec<SupervisorError>,
}

pub struct Supervisor {
    config: SupervisorConfig,
    processes: IndexMap<String, ManagedProcess>,
    event_tx: mpsc::UnboundedSender<(String, ProcessEvent)>,
    event_rx: mpsc::UnboundedReceiver<(String, ProcessEvent)>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            config,
            processes: IndexMap::new(),
            event_tx,
            event_rx,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Start one process per directive.
    pub async fn launch(
        &mut self,
        directives: &[ResolvedDirective],
    ) -> Result<LaunchReport, SupervisorError> {
        log::info!("Launching {} process(es)...", directives.len());

        let mut names = Vec::with_capacity(directives.len());
        for directive in directives {
            let name = self.unique_name(&directive.name);
            let process = ManagedProcess::new(name.clone(), directive.clone())
                .with_event_sender(self.event_tx.clone());
            self.processes.insert(name.clone(), process);
            names.push(name);
        }

        let results = match self.config.start_mode {
            StartMode::Sequential => self.start_sequential(&names).await,
            StartMode::Concurrent => self.start_concurrent(&names).await,
        };

        let mut report = LaunchReport::default();
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Some(Ok(())) => report.started.push(name),
                Some(Err(e)) => match self.config.on_start_failure {
                    StartFailurePolicy::ShutdownAll => {
                        log::error!("{}; shutting down started processes", e);
                        self.shutdown().await;
                        return Err(e);
                    }
                    StartFailurePolicy::Continue => {
                        log::error!("{}; continuing", e);
                        report.failures.push(e);
                    }
                },
                // Not attempted after an earlier failure
                None => {}
            }
        }

        log::info!(
            "{} process(es) started, {} failed",
            report.started.len(),
            report.failures.len()
        );
        Ok(report)
    }

    async fn start_sequential(
        &mut self,
        names: &[String],
    ) -> Vec<Option<Result<(), SupervisorError>>> {
        let mut results = Vec::with_capacity(names.len());
        let mut failed = false;
        for name in names {
            if failed && self.config.on_start_failure == StartFailurePolicy::ShutdownAll {
                results.push(None);
                continue;
            }
            let result = match self.processes.get_mut(name) {
                Some(process) => process.start(&self.config.log_dir).await,
                None => {
                    results.push(None);
                    continue;
                }
            };
            failed |= result.is_err();
            results.push(Some(result));
        }
        results
    }

    async fn start_concurrent(
        &mut self,
        names: &[String],
    ) -> Vec<Option<Result<(), SupervisorError>>> {
        let log_dir = self.config.log_dir.clone();
        let starts = self
            .processes
            .iter_mut()
            .filter(|(name, _)| names.contains(*name))
            .map(|(_, process)| process.start(&log_dir));
        futures::future::join_all(starts)
            .await
            .into_iter()
            .map(Some)
            .collect()
    }

    fn unique_name(&self, name: &str) -> String {
        if !self.processes.contains_key(name) {
            return name.to_string();
        }
        (2..)
            .map(|n| format!("{}-{}", name, n))
            .find(|candidate| !self.processes.contains_key(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    /// Forward events until shutdown is requested or every process has exited.
    pub async fn wait(&mut self, mut shutdown_rx: watch::Receiver<()>) {
        let mut shutdown_open = true;
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                changed = shutdown_rx.changed(), if shutdown_open => {
                    if changed.is_ok() {
                        log::info!("Shutdown signal received");
                        break;
                    }
                    shutdown_open = false;
                }

                event = self.event_rx.recv() => {
                    if let Some((name, event)) = event {
                        log_event(&name, event);
                    }
                }

                // Check process status periodically
                _ = ticker.tick() => {
                    if self.refresh() == 0 {
                        self.finish_output().await;
                        self.drain_events();
                        log::info!("All processes have stopped");
                        break;
                    }
                }
            }
        }
    }

    /// Poll every process; returns how many are still running.
    pub fn refresh(&mut self) -> usize {
        self.processes
            .values_mut()
            .map(|p| p.check_status())
            .filter(|s| s.is_running())
            .count()
    }

    async fn finish_output(&mut self) {
        let timeout = self.config.shutdown_timeout;
        for process in self.processes.values_mut() {
            process.finish_output(timeout).await;
        }
    }

    fn drain_events(&mut self) {
        while let Ok((name, event)) = self.event_rx.try_recv() {
            log_event(&name, event);
        }
    }

    /// Stop all processes in reverse start order
    pub async fn shutdown(&mut self) {
        log::info!("Shutting down all processes...");
        let timeout = self.config.shutdown_timeout;
        for process in self.processes.values_mut().rev() {
            if process.check_status().is_running() {
                process.stop(timeout).await;
            }
        }
        self.finish_output().await;
        self.drain_events();
        log::info!("All processes shut down");
    }

    /// Number of processes last seen running.
    pub fn running_count(&self) -> usize {
        self.processes
            .values()
            .filter(|p| p.status.is_running())
            .count()
    }

    pub fn status(&self) -> Vec<(&str, ProcessStatus)> {
        self.processes
            .iter()
            .map(|(name, proc)| (name.as_str(), proc.status))
            .collect()
    }

    pub fn process(&self, name: &str) -> Option<&ManagedProcess> {
        self.processes.get(name)
    }

    pub fn processes(&self) -> impl Iterator<Item = &ManagedProcess> {
        self.processes.values()
    }
}

fn log_event(name: &str, event: ProcessEvent) {
    match event {
        ProcessEvent::Output { line, is_stderr } => {
            if is_stderr {
                log::warn!("[{}] {}", name, line);
            } else {
                log::info!("[{}] {}", name, line);
            }
        }
        ProcessEvent::Exited { code } => {
            log::info!("[{}] Process exited with code: {:?}", name, code);
        }
        ProcessEvent::Failed { error } => {
            log::error!("[{}] Process failed: {}", name, error);
        }
        ProcessEvent::Started { pid } => {
            log::info!("[{}] Process started with PID: {}", name, pid);
        }
    }
}
