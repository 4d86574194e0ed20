use std::fmt;

use rusqlite::params;

use super::{Database, DiscordId, ensure_guild, now};
use crate::error::BotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModAction {
    Warn,
    Kick,
    Ban,
    Unban,
    Timeout,
    Untimeout,
    Purge,
}

impl ModAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModAction::Warn => "warn",
            ModAction::Kick => "kick",
            ModAction::Ban => "ban",
            ModAction::Unban => "unban",
            ModAction::Timeout => "timeout",
            ModAction::Untimeout => "untimeout",
            ModAction::Purge => "purge",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "warn" => ModAction::Warn,
            "kick" => ModAction::Kick,
            "ban" => ModAction::Ban,
            "unban" => ModAction::Unban,
            "timeout" => ModAction::Timeout,
            "untimeout" => ModAction::Untimeout,
            "purge" => ModAction::Purge,
            _ => return None,
        })
    }
}

impl fmt::Display for ModAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModCase {
    pub guild_id: DiscordId,
    pub number: u32,
    pub action: ModAction,
    pub target_id: DiscordId,
    pub moderator_id: DiscordId,
    pub reason: Option<String>,
    pub created_at: i64,
}

impl Database {
    /// Records a moderation action and returns the new case.
    pub fn record_case(
        &self,
        guild_id: DiscordId,
        action: ModAction,
        target_id: DiscordId,
        moderator_id: DiscordId,
        reason: Option<&str>,
    ) -> Result<ModCase, BotError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_guild(&tx, guild_id)?;

        let number: u32 = tx.query_row(
            "SELECT COALESCE(MAX(case_number), 0) + 1 FROM mod_actions WHERE guild_id = ?1",
            params![guild_id],
            |row| row.get(0),
        )?;
        let created_at = now();

        tx.execute(
            "INSERT INTO mod_actions (guild_id, case_number, action, target_id, moderator_id, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![guild_id, number, action.as_str(), target_id, moderator_id, reason, created_at],
        )?;
        tx.commit()?;

        Ok(ModCase {
            guild_id,
            number,
            action,
            target_id,
            moderator_id,
            reason: reason.map(str::to_owned),
            created_at,
        })
    }

    /// Active warnings for a member, oldest first.
    pub fn warnings(
        &self,
        guild_id: DiscordId,
        target_id: DiscordId,
    ) -> Result<Vec<ModCase>, BotError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT case_number, action, moderator_id, reason, created_at FROM mod_actions
             WHERE guild_id = ?1 AND target_id = ?2 AND action = 'warn' AND active = 1
             ORDER BY case_number ASC",
        )?;

        let cases = stmt
            .query_map(params![guild_id, target_id], |row| {
                let action: String = row.get(1)?;
                Ok(ModCase {
                    guild_id,
                    number: row.get(0)?,
                    action: ModAction::parse(&action).unwrap_or(ModAction::Warn),
                    target_id,
                    moderator_id: row.get(2)?,
                    reason: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(cases)
    }

    /// Deactivates a member's warnings and returns how many were cleared.
    /// The cases stay in the log.
    pub fn clear_warnings(
        &self,
        guild_id: DiscordId,
        target_id: DiscordId,
    ) -> Result<usize, BotError> {
        let conn = self.conn()?;
        let cleared = conn.execute(
            "UPDATE mod_actions SET active = 0
             WHERE guild_id = ?1 AND target_id = ?2 AND action = 'warn' AND active = 1",
            params![guild_id, target_id],
        )?;
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_numbers_are_per_guild() {
        let db = Database::open_in_memory().unwrap();
        let a = db.record_case(1, ModAction::Kick, 10, 99, Some("spam")).unwrap();
        let b = db.record_case(1, ModAction::Ban, 11, 99, None).unwrap();
        let c = db.record_case(2, ModAction::Warn, 10, 99, None).unwrap();

        assert_eq!((a.number, b.number, c.number), (1, 2, 1));
        assert_eq!(a.reason.as_deref(), Some("spam"));
    }

    #[test]
    fn warnings_only_lists_active_warns() {
        let db = Database::open_in_memory().unwrap();
        db.record_case(1, ModAction::Warn, 10, 99, Some("first")).unwrap();
        db.record_case(1, ModAction::Kick, 10, 99, None).unwrap();
        db.record_case(1, ModAction::Warn, 10, 99, Some("second")).unwrap();
        db.record_case(1, ModAction::Warn, 11, 99, None).unwrap();

        let warns = db.warnings(1, 10).unwrap();
        let reasons: Vec<_> = warns.iter().map(|w| w.reason.as_deref()).collect();
        assert_eq!(reasons, vec![Some("first"), Some("second")]);

        assert_eq!(db.clear_warnings(1, 10).unwrap(), 2);
        assert!(db.warnings(1, 10).unwrap().is_empty());
        assert_eq!(db.warnings(1, 11).unwrap().len(), 1);

        // cleared cases still take up case numbers
        let next = db.record_case(1, ModAction::Warn, 10, 99, None).unwrap();
        assert_eq!(next.number, 5);
    }
}
