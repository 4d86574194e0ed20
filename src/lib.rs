use tokio::sync::OnceCell;

pub mod api;
pub mod bot;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod health;
pub mod puzzle;

use api::ApiClient;
use config::{ClusterAssignment, Config};
use db::Database;

/// Shared by every command invocation on this cluster.
pub struct Data {
    pub db: Database,
    pub api: ApiClient,
    pub config: Config,
    pub cluster: ClusterAssignment,
    /// Pokémon species names, fetched on first use.
    pub species: OnceCell<Vec<String>>,
}

impl Data {
    pub fn new(config: Config, cluster: ClusterAssignment) -> Result<Self, Error> {
        let db = Database::open(&config.database_path)?;

        Ok(Self {
            db,
            api: ApiClient::new(reqwest::Client::new()),
            config,
            cluster,
            species: OnceCell::new(),
        })
    }

    pub async fn species_names(&self) -> Result<&[String], Error> {
        let names = self
            .species
            .get_or_try_init(|| self.api.species_names())
            .await?;
        Ok(names)
    }
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
