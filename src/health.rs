//! HTTP sidecar served by the supervisor so orchestrators can probe the bot.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::cluster::{ClusterRegistry, ClusterState, ClusterStatus};

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub running: usize,
    pub clusters: usize,
}

pub fn router(registry: ClusterRegistry) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/clusters", get(clusters))
        .with_state(registry)
}

async fn health(State(registry): State<ClusterRegistry>) -> (StatusCode, Json<HealthReport>) {
    let snapshot = registry.snapshot().await;
    report(&snapshot)
}

async fn clusters(State(registry): State<ClusterRegistry>) -> Json<Vec<ClusterStatus>> {
    Json(registry.snapshot().await)
}

fn report(snapshot: &[ClusterStatus]) -> (StatusCode, Json<HealthReport>) {
    let running = snapshot
        .iter()
        .filter(|s| s.state == ClusterState::Running)
        .count();
    let healthy = !snapshot.is_empty() && running == snapshot.len();

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthReport {
            status: if healthy { "ok" } else { "degraded" },
            running,
            clusters: snapshot.len(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::plan;

    #[tokio::test]
    async fn healthy_when_all_clusters_run() {
        let registry = ClusterRegistry::new(&plan(2, 2).unwrap());
        registry.update(0, |s| s.state = ClusterState::Running).await;
        registry.update(1, |s| s.state = ClusterState::Running).await;

        let (status, Json(body)) = health(State(registry)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.running, 2);
    }

    #[tokio::test]
    async fn degraded_when_a_cluster_is_down() {
        let registry = ClusterRegistry::new(&plan(2, 2).unwrap());
        registry.update(0, |s| s.state = ClusterState::Running).await;
        registry.update(1, |s| s.state = ClusterState::Failed).await;

        let (status, Json(body)) = health(State(registry)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.running, 1);
        assert_eq!(body.clusters, 2);
    }

    #[tokio::test]
    async fn clusters_lists_snapshot() {
        let registry = ClusterRegistry::new(&plan(3, 3).unwrap());
        let Json(list) = clusters(State(registry)).await;
        assert_eq!(list.len(), 3);
        assert_eq!(list[2].shards.first, 2);
    }

    #[test]
    fn empty_registry_is_unhealthy() {
        let (status, _) = report(&[]);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
