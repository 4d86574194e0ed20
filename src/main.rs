use companion_bot::cluster::{self, Supervisor};
use companion_bot::config::{ClusterAssignment, Config};
use companion_bot::{Error, bot};
use poise::serenity_prelude as serenity;
use tracing::Instrument;

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,serenity=warn,songbird=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = Config::from_env()?;

    match ClusterAssignment::from_lookup(|key| std::env::var(key).ok())? {
        Some(assignment) => {
            let span = tracing::info_span!("cluster", id = assignment.id);
            bot::run_cluster(config, assignment).instrument(span).await
        }
        None => supervise(config).await,
    }
}

async fn supervise(config: Config) -> Result<(), Error> {
    let http = serenity::Http::new(&config.token);
    let total = cluster::resolve_shard_count(&config, &http).await?;
    let plan = cluster::plan(total, config.cluster_count)?;

    tracing::info!(
        shards = total,
        clusters = plan.len(),
        "starting supervisor"
    );

    Supervisor::new(config, plan)?.run().await
}
