use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, params};

use crate::error::BotError;

mod collections;
mod guilds;
mod moderation;
mod reviews;
mod tickets;

pub use collections::CollectionEntry;
pub use guilds::GuildSettings;
pub use moderation::{ModAction, ModCase};
pub use reviews::{LeaderboardEntry, Review, ReviewSummary};
pub use tickets::{Ticket, TicketStatus};

pub type DiscordId = u64;

type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS guilds (
        id                 INTEGER PRIMARY KEY,
        mod_log_channel_id INTEGER,
        ticket_category_id INTEGER,
        support_role_id    INTEGER,
        ticket_counter     INTEGER NOT NULL DEFAULT 0
    ) STRICT;

    CREATE TABLE IF NOT EXISTS collections (
        user_id INTEGER NOT NULL,
        pokemon TEXT    NOT NULL,
        shiny   INTEGER NOT NULL DEFAULT 0,
        count   INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (user_id, pokemon, shiny)
    ) STRICT;

    CREATE TABLE IF NOT EXISTS mod_actions (
        guild_id     INTEGER NOT NULL,
        case_number  INTEGER NOT NULL,
        action       TEXT    NOT NULL,
        target_id    INTEGER NOT NULL,
        moderator_id INTEGER NOT NULL,
        reason       TEXT,
        created_at   INTEGER NOT NULL,
        active       INTEGER NOT NULL DEFAULT 1,
        PRIMARY KEY (guild_id, case_number),
        FOREIGN KEY (guild_id) REFERENCES guilds(id)
    ) STRICT;

    CREATE TABLE IF NOT EXISTS tickets (
        guild_id   INTEGER NOT NULL,
        number     INTEGER NOT NULL,
        channel_id INTEGER UNIQUE,
        owner_id   INTEGER NOT NULL,
        reason     TEXT,
        status     TEXT    NOT NULL DEFAULT 'open',
        created_at INTEGER NOT NULL,
        closed_at  INTEGER,
        closed_by  INTEGER,
        PRIMARY KEY (guild_id, number),
        FOREIGN KEY (guild_id) REFERENCES guilds(id)
    ) STRICT;

    CREATE TABLE IF NOT EXISTS reviews (
        guild_id    INTEGER NOT NULL,
        reviewer_id INTEGER NOT NULL,
        target_id   INTEGER NOT NULL,
        rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
        comment     TEXT,
        created_at  INTEGER NOT NULL,
        PRIMARY KEY (guild_id, reviewer_id, target_id)
    ) STRICT;
";

pub struct Database {
    pool: r2d2::Pool<SqliteConnectionManager>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, BotError> {
        if path == ":memory:" {
            return Self::open_in_memory();
        }

        let manager = SqliteConnectionManager::file(path).with_init(init_connection);
        Self::with_pool(r2d2::Pool::new(manager)?)
    }

    /// An in-memory database lives in a single connection, so the pool is
    /// capped at one to make every checkout see the same data.
    pub fn open_in_memory() -> Result<Self, BotError> {
        let manager = SqliteConnectionManager::memory().with_init(init_connection);
        Self::with_pool(r2d2::Pool::builder().max_size(1).build(manager)?)
    }

    fn with_pool(pool: r2d2::Pool<SqliteConnectionManager>) -> Result<Self, BotError> {
        let db = Self { pool };
        db.conn()?.execute_batch(SCHEMA)?;
        Ok(db)
    }

    fn conn(&self) -> Result<PooledConnection, BotError> {
        Ok(self.pool.get()?)
    }
}

fn init_connection(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    conn.pragma_update(None, "foreign_keys", "ON")
}

/// Makes sure the guild row exists before anything references it.
fn ensure_guild(conn: &Connection, guild_id: DiscordId) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO guilds (id) VALUES (?1)",
        params![guild_id],
    )?;
    Ok(())
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.conn().unwrap().execute_batch(SCHEMA).unwrap();
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn().unwrap();
        let result = conn.execute(
            "INSERT INTO mod_actions (guild_id, case_number, action, target_id, moderator_id, created_at)
             VALUES (1, 1, 'warn', 2, 3, 0)",
            [],
        );
        assert!(result.is_err());
    }
}
