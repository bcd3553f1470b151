//! Concurrent fleet execution with per-host failure isolation.
//!
//! One task per host, bounded by a semaphore; within a host, commands run
//! strictly in sequence (creation order matters), across hosts no ordering
//! is implied. The run barriers on every host task finishing and returns one
//! [`HostReport`] per host. A failing command is recorded against its host
//! only: remaining commands on that host still run (best-effort
//! continuation) and sibling hosts are never delayed or cancelled. There is
//! no retry; because apply plans are not safely re-appliable, re-driving a
//! partially applied host is an operator decision (usually a remove-then-
//! apply cycle).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use fleetem_tc::ShapingPlan;

use crate::hosts::Host;
use crate::transport::Transport;

/// Default cap on concurrently active hosts.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// The unit of work for one host: optional raw device-preparation commands
/// followed by the compiled shaping plan.
#[derive(Debug, Clone)]
pub struct HostJob {
    pub host: Host,
    pub prep: Vec<Vec<String>>,
    pub plan: ShapingPlan,
}

impl HostJob {
    pub fn new(host: Host, plan: ShapingPlan) -> Self {
        Self { host, prep: Vec::new(), plan }
    }

    /// Prepend raw setup commands (run before the plan, treated like
    /// creations: their failures surface).
    pub fn with_prep(mut self, prep: Vec<Vec<String>>) -> Self {
        self.prep = prep;
        self
    }
}

/// The first failing command on a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// Position in the host's combined prep + plan stream.
    pub index: usize,
    /// The rendered command line.
    pub command: String,
    /// Trimmed stderr from the remote side.
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Terminal state of one host's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutcome {
    /// Every command succeeded (delete no-ops included).
    Completed,
    /// At least one creation command failed; the stream still ran to the
    /// end and the first failure is recorded.
    Failed { first: CommandFailure, failures: usize },
    /// A command exceeded the per-command timeout; the stream was abandoned
    /// at that point.
    TimedOut { index: usize, command: String },
    /// The run was cancelled before this host's stream finished.
    Cancelled,
}

impl HostOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// The terminal artifact for one host in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostReport {
    pub host: Host,
    pub outcome: HostOutcome,
}

/// Dispatches compiled plans across the fleet.
#[derive(Debug)]
pub struct FleetExecutor<T> {
    transport: Arc<T>,
    max_in_flight: usize,
    command_timeout: Duration,
    cancel: CancellationToken,
}

impl<T: Transport> FleetExecutor<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// Cap the number of hosts driven concurrently.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Set the per-command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// A token that aborts the run between commands when cancelled; the
    /// barrier wait can therefore never stall forever on one unresponsive
    /// host.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every job to completion and return one report per job, in input
    /// order. Never fails as a whole: failures live in the reports.
    pub async fn execute(&self, jobs: Vec<HostJob>) -> Vec<HostReport> {
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let transport = Arc::clone(&self.transport);
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let timeout = self.command_timeout;

            tasks.spawn(async move {
                // The semaphore is never closed, so acquisition only fails
                // if the runtime is shutting down; run unthrottled then.
                let _permit = semaphore.acquire_owned().await.ok();
                (index, run_host(transport.as_ref(), job, timeout, &cancel).await)
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(indexed) => reports.push(indexed),
                Err(e) => tracing::error!(error = %e, "host task failed to join"),
            }
        }

        reports.sort_by_key(|(index, _)| *index);
        reports.into_iter().map(|(_, report)| report).collect()
    }
}

/// Drive one host's command stream to its terminal state.
async fn run_host<T: Transport + ?Sized>(
    transport: &T,
    job: HostJob,
    timeout: Duration,
    cancel: &CancellationToken,
) -> HostReport {
    let host = job.host;
    let stream: Vec<(Vec<String>, bool)> = job
        .prep
        .into_iter()
        .map(|argv| (argv, false))
        .chain(job.plan.iter().map(|cmd| (cmd.render(), cmd.is_delete())))
        .collect();

    let mut first: Option<CommandFailure> = None;
    let mut failures = 0usize;

    for (index, (argv, is_delete)) in stream.into_iter().enumerate() {
        let attempt = tokio::select! {
            () = cancel.cancelled() => {
                tracing::warn!(host = %host.addr, index, "run cancelled");
                return HostReport { host, outcome: HostOutcome::Cancelled };
            }
            attempt = tokio::time::timeout(timeout, transport.run(host.addr, &argv)) => attempt,
        };

        match attempt {
            Err(_elapsed) => {
                let command = argv.join(" ");
                tracing::warn!(host = %host.addr, index, %command, "remote command timed out");
                return HostReport { host, outcome: HostOutcome::TimedOut { index, command } };
            }
            Ok(Ok(output)) if output.success => {}
            Ok(Ok(output)) => {
                if is_delete {
                    // Deleting an already-absent structure; remove stays
                    // re-issuable.
                    tracing::debug!(host = %host.addr, index, "delete of absent structure, ignoring");
                    continue;
                }
                failures += 1;
                if first.is_none() {
                    first = Some(CommandFailure {
                        index,
                        command: argv.join(" "),
                        stderr: output.stderr.trim().to_string(),
                        exit_code: output.exit_code,
                    });
                }
            }
            Ok(Err(e)) => {
                failures += 1;
                if first.is_none() {
                    first = Some(CommandFailure {
                        index,
                        command: argv.join(" "),
                        stderr: e.to_string(),
                        exit_code: None,
                    });
                }
            }
        }
    }

    let outcome = match first {
        None => HostOutcome::Completed,
        Some(first) => {
            tracing::warn!(
                host = %host.addr,
                first_command = %first.command,
                failures,
                "host stream completed with failures"
            );
            HostOutcome::Failed { first, failures }
        }
    };
    HostReport { host, outcome }
}
