use rusqlite::{OptionalExtension, params};

use super::{Database, DiscordId, ensure_guild};
use crate::error::BotError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuildSettings {
    pub mod_log_channel_id: Option<DiscordId>,
    pub ticket_category_id: Option<DiscordId>,
    pub support_role_id: Option<DiscordId>,
}

impl Database {
    pub fn guild_settings(&self, guild_id: DiscordId) -> Result<GuildSettings, BotError> {
        let conn = self.conn()?;

        let settings = conn
            .query_row(
                "SELECT mod_log_channel_id, ticket_category_id, support_role_id
                 FROM guilds WHERE id = ?1",
                params![guild_id],
                |row| {
                    Ok(GuildSettings {
                        mod_log_channel_id: row.get(0)?,
                        ticket_category_id: row.get(1)?,
                        support_role_id: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(settings.unwrap_or_default())
    }

    pub fn set_mod_log_channel(
        &self,
        guild_id: DiscordId,
        channel_id: DiscordId,
    ) -> Result<(), BotError> {
        let conn = self.conn()?;
        ensure_guild(&conn, guild_id)?;

        conn.execute(
            "UPDATE guilds SET mod_log_channel_id = ?2 WHERE id = ?1",
            params![guild_id, channel_id],
        )?;

        Ok(())
    }

    pub fn set_ticket_config(
        &self,
        guild_id: DiscordId,
        category_id: DiscordId,
        support_role_id: DiscordId,
    ) -> Result<(), BotError> {
        let conn = self.conn()?;
        ensure_guild(&conn, guild_id)?;

        conn.execute(
            "UPDATE guilds SET ticket_category_id = ?2, support_role_id = ?3 WHERE id = ?1",
            params![guild_id, category_id, support_role_id],
        )?;

        Ok(())
    }
}
