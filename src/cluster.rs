//! Splits gateway shards across OS processes and keeps those processes alive.
//!
//! The supervisor re-executes the current binary once per cluster, passing the
//! shard range through environment variables (see [`ClusterAssignment`]).
//! Children are asked to stop by closing their stdin; a child that ignores the
//! request is killed once the grace period runs out.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serenity::all::Http;
use tokio::process::{Child, Command};
use tokio::sync::{RwLock, watch};
use tokio::task::JoinSet;

use crate::Error;
use crate::config::{ClusterAssignment, Config};
use crate::error::BotError;
use crate::health;

const MAX_BACKOFF_SECS: u64 = 60;

/// Inclusive range of shard ids handled by one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShardRange {
    pub first: u32,
    pub last: u32,
    pub total: u32,
}

impl ShardRange {
    pub fn len(&self) -> u32 {
        self.last - self.first + 1
    }

    /// Half-open form expected by serenity's `start_shard_range`.
    pub fn as_range(&self) -> Range<u32> {
        self.first..self.last + 1
    }

    pub fn contains(&self, shard_id: u32) -> bool {
        (self.first..=self.last).contains(&shard_id)
    }
}

/// Splits `total_shards` into `cluster_count` contiguous ranges.
///
/// The first `total_shards % cluster_count` clusters carry one extra shard.
pub fn plan(total_shards: u32, cluster_count: u32) -> Result<Vec<ShardRange>, BotError> {
    if total_shards == 0 {
        return Err(BotError::Cluster("shard count must be positive".to_owned()));
    }
    if cluster_count == 0 {
        return Err(BotError::Cluster("cluster count must be positive".to_owned()));
    }
    if cluster_count > total_shards {
        return Err(BotError::Cluster(format!(
            "{cluster_count} clusters cannot share {total_shards} shards"
        )));
    }

    let base = total_shards / cluster_count;
    let extra = total_shards % cluster_count;

    let mut ranges = Vec::with_capacity(cluster_count as usize);
    let mut next = 0;
    for cluster in 0..cluster_count {
        let len = base + u32::from(cluster < extra);
        ranges.push(ShardRange {
            first: next,
            last: next + len - 1,
            total: total_shards,
        });
        next += len;
    }

    Ok(ranges)
}

/// Uses the configured shard count, or asks the gateway for its recommendation.
pub async fn resolve_shard_count(config: &Config, http: &Http) -> Result<u32, Error> {
    if let Some(count) = config.shard_count {
        return Ok(count);
    }

    let gateway = http.get_bot_gateway().await?;
    tracing::info!(
        shards = gateway.shards,
        "using gateway recommended shard count"
    );
    Ok(gateway.shards)
}

pub fn restart_backoff(restarts: u32) -> Duration {
    let secs = 1u64
        .checked_shl(restarts)
        .unwrap_or(MAX_BACKOFF_SECS)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterState {
    Starting,
    Running,
    Restarting,
    Stopped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterStatus {
    pub id: u32,
    pub shards: ShardRange,
    pub state: ClusterState,
    pub pid: Option<u32>,
    pub restarts: u32,
    pub last_exit_code: Option<i32>,
}

/// Shared view of every cluster, read by the health sidecar.
#[derive(Debug, Clone, Default)]
pub struct ClusterRegistry {
    inner: Arc<RwLock<Vec<ClusterStatus>>>,
}

impl ClusterRegistry {
    pub fn new(plan: &[ShardRange]) -> Self {
        let statuses = plan
            .iter()
            .enumerate()
            .map(|(id, shards)| ClusterStatus {
                id: id as u32,
                shards: *shards,
                state: ClusterState::Starting,
                pid: None,
                restarts: 0,
                last_exit_code: None,
            })
            .collect();

        Self {
            inner: Arc::new(RwLock::new(statuses)),
        }
    }

    pub async fn update(&self, id: u32, f: impl FnOnce(&mut ClusterStatus)) {
        let mut statuses = self.inner.write().await;
        if let Some(status) = statuses.iter_mut().find(|s| s.id == id) {
            f(status);
        }
    }

    pub async fn snapshot(&self) -> Vec<ClusterStatus> {
        self.inner.read().await.clone()
    }

    pub async fn all_running(&self) -> bool {
        let statuses = self.inner.read().await;
        !statuses.is_empty() && statuses.iter().all(|s| s.state == ClusterState::Running)
    }
}

pub struct Supervisor {
    config: Config,
    plan: Vec<ShardRange>,
    registry: ClusterRegistry,
    exe: PathBuf,
}

impl Supervisor {
    pub fn new(config: Config, plan: Vec<ShardRange>) -> Result<Self, BotError> {
        let exe = std::env::current_exe()?;
        let registry = ClusterRegistry::new(&plan);

        Ok(Self {
            config,
            plan,
            registry,
            exe,
        })
    }

    /// Runs until a shutdown signal arrives or every cluster has given up.
    pub async fn run(self) -> Result<(), Error> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let listener = tokio::net::TcpListener::bind(self.config.health_addr).await?;
        tracing::info!(addr = %self.config.health_addr, "health sidecar listening");
        let mut health_shutdown = shutdown_rx.clone();
        let health_server = tokio::spawn(
            axum::serve(listener, health::router(self.registry.clone()))
                .with_graceful_shutdown(async move {
                    let _ = health_shutdown.wait_for(|stop| *stop).await;
                })
                .into_future(),
        );

        let mut clusters = JoinSet::new();
        for (id, shards) in self.plan.iter().enumerate() {
            let assignment = ClusterAssignment {
                id: id as u32,
                shards: *shards,
            };
            clusters.spawn(supervise(
                assignment,
                self.exe.clone(),
                ChildPolicy {
                    max_restarts: self.config.max_restarts,
                    grace: Duration::from_secs(self.config.shutdown_grace_secs),
                },
                self.registry.clone(),
                shutdown_rx.clone(),
            ));
        }

        tokio::select! {
            _ = shutdown_signal() => {
                tracing::info!("shutdown requested, stopping clusters");
            }
            _ = async { while clusters.join_next().await.is_some() {} } => {
                tracing::warn!("every cluster has exited");
            }
        }

        let _ = shutdown_tx.send(true);
        while let Some(result) = clusters.join_next().await {
            if let Err(e) = result {
                tracing::error!("cluster task panicked: {e}");
            }
        }

        match health_server.await {
            Ok(Err(e)) => tracing::error!("health sidecar failed: {e}"),
            Err(e) => tracing::error!("health sidecar task panicked: {e}"),
            Ok(Ok(())) => {}
        }

        tracing::info!("supervisor stopped");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct ChildPolicy {
    max_restarts: u32,
    grace: Duration,
}

async fn supervise(
    assignment: ClusterAssignment,
    exe: PathBuf,
    policy: ChildPolicy,
    registry: ClusterRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    let id = assignment.id;
    let mut restarts = 0;

    loop {
        if *shutdown.borrow() {
            registry.update(id, |s| s.state = ClusterState::Stopped).await;
            return;
        }

        registry.update(id, |s| s.state = ClusterState::Starting).await;

        let exit = match spawn_child(&exe, &assignment) {
            Ok(mut child) => {
                let pid = child.id();
                tracing::info!(cluster = id, ?pid, shards = ?assignment.shards, "cluster started");
                registry
                    .update(id, |s| {
                        s.state = ClusterState::Running;
                        s.pid = pid;
                    })
                    .await;

                let exited = tokio::select! {
                    status = child.wait() => Some(status.ok()),
                    _ = shutdown.wait_for(|stop| *stop) => None,
                };

                match exited {
                    Some(status) => status,
                    None => stop_child(id, &mut child, policy.grace).await,
                }
            }
            Err(e) => {
                tracing::error!(cluster = id, "failed to spawn cluster: {e}");
                None
            }
        };

        let code = exit.and_then(|status| status.code());
        registry
            .update(id, |s| {
                s.pid = None;
                s.last_exit_code = code;
            })
            .await;

        if *shutdown.borrow() {
            tracing::info!(cluster = id, ?code, "cluster stopped");
            registry.update(id, |s| s.state = ClusterState::Stopped).await;
            return;
        }

        if restarts >= policy.max_restarts {
            tracing::error!(cluster = id, restarts, "restart budget exhausted");
            registry.update(id, |s| s.state = ClusterState::Failed).await;
            return;
        }

        let backoff = restart_backoff(restarts);
        restarts += 1;
        tracing::warn!(cluster = id, ?code, ?backoff, restarts, "cluster exited, restarting");
        registry
            .update(id, |s| {
                s.state = ClusterState::Restarting;
                s.restarts = restarts;
            })
            .await;

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = shutdown.wait_for(|stop| *stop) => {}
        }
    }
}

fn spawn_child(exe: &Path, assignment: &ClusterAssignment) -> std::io::Result<Child> {
    Command::new(exe)
        .envs(assignment.to_env_pairs())
        .stdin(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
}

/// Closes the child's stdin and waits out the grace period before killing it.
async fn stop_child(id: u32, child: &mut Child, grace: Duration) -> Option<ExitStatus> {
    drop(child.stdin.take());

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status.ok(),
        Err(_) => {
            tracing::warn!(cluster = id, "cluster ignored shutdown, killing");
            if let Err(e) = child.kill().await {
                tracing::error!(cluster = id, "failed to kill cluster: {e}");
            }
            child.wait().await.ok()
        }
    }
}

/// Completes on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_covers_every_shard_once() {
        let ranges = plan(10, 3).unwrap();
        assert_eq!(
            ranges,
            vec![
                ShardRange { first: 0, last: 3, total: 10 },
                ShardRange { first: 4, last: 6, total: 10 },
                ShardRange { first: 7, last: 9, total: 10 },
            ]
        );

        let mut covered: Vec<u32> = ranges.iter().flat_map(|r| r.as_range()).collect();
        covered.sort_unstable();
        assert_eq!(covered, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn plan_single_cluster_takes_all() {
        let ranges = plan(4, 1).unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].len(), 4);
        assert_eq!(ranges[0].as_range(), 0..4);
    }

    #[test]
    fn plan_rejects_bad_input() {
        assert!(plan(0, 1).is_err());
        assert!(plan(4, 0).is_err());
        assert!(plan(2, 3).is_err());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(restart_backoff(0), Duration::from_secs(1));
        assert_eq!(restart_backoff(3), Duration::from_secs(8));
        assert_eq!(restart_backoff(6), Duration::from_secs(60));
        assert_eq!(restart_backoff(200), Duration::from_secs(60));
    }

    #[test]
    fn shard_range_contains() {
        let range = ShardRange { first: 2, last: 4, total: 6 };
        assert!(range.contains(2));
        assert!(range.contains(4));
        assert!(!range.contains(5));
    }

    #[tokio::test]
    async fn registry_tracks_running_state() {
        let registry = ClusterRegistry::new(&plan(4, 2).unwrap());
        assert!(!registry.all_running().await);

        registry.update(0, |s| s.state = ClusterState::Running).await;
        assert!(!registry.all_running().await);

        registry.update(1, |s| s.state = ClusterState::Running).await;
        assert!(registry.all_running().await);

        registry
            .update(1, |s| {
                s.state = ClusterState::Restarting;
                s.restarts = 1;
            })
            .await;
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot[1].restarts, 1);
        assert!(!registry.all_running().await);
    }

    #[cfg(unix)]
    fn assignment() -> ClusterAssignment {
        ClusterAssignment {
            id: 0,
            shards: ShardRange { first: 0, last: 0, total: 1 },
        }
    }

    #[cfg(unix)]
    async fn wait_for_state(registry: &ClusterRegistry, state: ClusterState) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.snapshot().await[0].state != state {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spent_restart_budget_marks_cluster_failed() {
        let registry = ClusterRegistry::new(&[assignment().shards]);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let policy = ChildPolicy {
            max_restarts: 0,
            grace: Duration::from_secs(5),
        };

        tokio::time::timeout(
            Duration::from_secs(10),
            supervise(assignment(), PathBuf::from("/bin/true"), policy, registry.clone(), shutdown_rx),
        )
        .await
        .unwrap();

        let status = &registry.snapshot().await[0];
        assert_eq!(status.state, ClusterState::Failed);
        assert_eq!(status.last_exit_code, Some(0));
        assert_eq!(status.restarts, 0);
        assert_eq!(status.pid, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shutdown_closes_stdin_and_stops_cluster() {
        let registry = ClusterRegistry::new(&[assignment().shards]);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let policy = ChildPolicy {
            max_restarts: 3,
            grace: Duration::from_secs(30),
        };

        let task = tokio::spawn(supervise(
            assignment(),
            PathBuf::from("/bin/cat"),
            policy,
            registry.clone(),
            shutdown_rx,
        ));
        wait_for_state(&registry, ClusterState::Running).await;
        assert!(registry.snapshot().await[0].pid.is_some());

        shutdown_tx.send(true).unwrap();
        // cat exits on EOF, long before the grace period would force a kill
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();

        let status = &registry.snapshot().await[0];
        assert_eq!(status.state, ClusterState::Stopped);
        assert_eq!(status.last_exit_code, Some(0));
        assert_eq!(status.restarts, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn child_ignoring_shutdown_is_killed_after_grace() {
        let mut child = Command::new("/bin/sleep")
            .arg("30")
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap();

        let started = std::time::Instant::now();
        let status = stop_child(0, &mut child, Duration::from_millis(200))
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!status.success());
        assert_eq!(status.code(), None);
    }
}
