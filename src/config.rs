use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::cluster::ShardRange;
use crate::error::BotError;

pub const CLUSTER_ID_VAR: &str = "BOT_CLUSTER_ID";
pub const SHARD_FIRST_VAR: &str = "BOT_SHARD_FIRST";
pub const SHARD_LAST_VAR: &str = "BOT_SHARD_LAST";
pub const SHARD_TOTAL_VAR: &str = "BOT_SHARD_TOTAL";

#[derive(Clone)]
pub struct Config {
    pub token: String,
    pub database_path: String,
    pub prefix: String,
    pub shard_count: Option<u32>,
    pub cluster_count: u32,
    pub health_addr: SocketAddr,
    pub max_restarts: u32,
    pub shutdown_grace_secs: u64,
    pub dev_guild_id: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, BotError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BotError> {
        let token = lookup("DISCORD_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BotError::Config("DISCORD_TOKEN not set".to_owned()))?;

        Ok(Self {
            token,
            database_path: lookup("DATABASE_PATH").unwrap_or_else(|| "bot.db".to_owned()),
            prefix: lookup("BOT_PREFIX").unwrap_or_else(|| "!".to_owned()),
            shard_count: parse_opt(&lookup, "SHARD_COUNT")?,
            cluster_count: parse_opt(&lookup, "CLUSTER_COUNT")?.unwrap_or(1),
            health_addr: parse_opt(&lookup, "HEALTH_ADDR")?
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080))),
            max_restarts: parse_opt(&lookup, "MAX_RESTARTS")?.unwrap_or(5),
            shutdown_grace_secs: parse_opt(&lookup, "SHUTDOWN_GRACE_SECS")?.unwrap_or(10),
            dev_guild_id: parse_opt(&lookup, "DEV_GUILD_ID")?,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("database_path", &self.database_path)
            .field("prefix", &self.prefix)
            .field("shard_count", &self.shard_count)
            .field("cluster_count", &self.cluster_count)
            .field("health_addr", &self.health_addr)
            .field("max_restarts", &self.max_restarts)
            .field("shutdown_grace_secs", &self.shutdown_grace_secs)
            .field("dev_guild_id", &self.dev_guild_id)
            .finish()
    }
}

/// Identity handed from the supervisor to a cluster process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterAssignment {
    pub id: u32,
    pub shards: ShardRange,
}

impl ClusterAssignment {
    /// Returns `Ok(None)` when this process was not spawned by a supervisor.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, BotError> {
        let Some(id) = parse_opt(&lookup, CLUSTER_ID_VAR)? else {
            return Ok(None);
        };

        let first = parse_required(&lookup, SHARD_FIRST_VAR)?;
        let last = parse_required(&lookup, SHARD_LAST_VAR)?;
        let total = parse_required(&lookup, SHARD_TOTAL_VAR)?;

        if first > last || last >= total {
            return Err(BotError::Config(format!(
                "invalid shard range {first}..={last} of {total}"
            )));
        }

        Ok(Some(Self {
            id,
            shards: ShardRange { first, last, total },
        }))
    }

    pub fn to_env_pairs(&self) -> [(&'static str, String); 4] {
        [
            (CLUSTER_ID_VAR, self.id.to_string()),
            (SHARD_FIRST_VAR, self.shards.first.to_string()),
            (SHARD_LAST_VAR, self.shards.last.to_string()),
            (SHARD_TOTAL_VAR, self.shards.total.to_string()),
        ]
    }
}

fn parse_opt<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, BotError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| BotError::Config(format!("{key} has invalid value `{raw}`"))),
    }
}

fn parse_required<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<T, BotError> {
    parse_opt(lookup, key)?.ok_or_else(|| BotError::Config(format!("{key} not set")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("DISCORD_TOKEN", "abc")])).unwrap();
        assert_eq!(config.prefix, "!");
        assert_eq!(config.database_path, "bot.db");
        assert_eq!(config.cluster_count, 1);
        assert_eq!(config.shard_count, None);
        assert_eq!(config.health_addr.port(), 8080);
        assert_eq!(config.max_restarts, 5);
    }

    #[test]
    fn debug_output_hides_token() {
        let config = Config::from_lookup(lookup(&[("DISCORD_TOKEN", "s3cret.token")])).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("s3cret.token"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("bot.db"));
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("DISCORD_TOKEN"));
    }

    #[test]
    fn bad_number_names_the_variable() {
        let err = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "abc"),
            ("CLUSTER_COUNT", "two"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CLUSTER_COUNT"));
    }

    #[test]
    fn assignment_round_trips_through_env_pairs() {
        let assignment = ClusterAssignment {
            id: 2,
            shards: ShardRange {
                first: 4,
                last: 5,
                total: 8,
            },
        };
        let pairs = assignment.to_env_pairs();
        let owned: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (*k, v.as_str())).collect();

        let parsed = ClusterAssignment::from_lookup(lookup(&owned)).unwrap();
        assert_eq!(parsed, Some(assignment));
    }

    #[test]
    fn no_cluster_id_means_supervisor() {
        assert_eq!(ClusterAssignment::from_lookup(lookup(&[])).unwrap(), None);
    }

    #[test]
    fn assignment_rejects_out_of_range_shards() {
        let err = ClusterAssignment::from_lookup(lookup(&[
            (CLUSTER_ID_VAR, "0"),
            (SHARD_FIRST_VAR, "3"),
            (SHARD_LAST_VAR, "4"),
            (SHARD_TOTAL_VAR, "4"),
        ]))
        .unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }
}
