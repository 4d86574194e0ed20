use rusqlite::{OptionalExtension, Row, params};

use super::{Database, DiscordId, ensure_guild, now};
use crate::error::BotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub guild_id: DiscordId,
    pub number: u32,
    pub channel_id: Option<DiscordId>,
    pub owner_id: DiscordId,
    pub reason: Option<String>,
    pub status: TicketStatus,
    pub created_at: i64,
    pub closed_at: Option<i64>,
    pub closed_by: Option<DiscordId>,
}

const TICKET_COLUMNS: &str =
    "guild_id, number, channel_id, owner_id, reason, status, created_at, closed_at, closed_by";

fn ticket_from_row(row: &Row<'_>) -> Result<Ticket, rusqlite::Error> {
    let status: String = row.get(5)?;
    Ok(Ticket {
        guild_id: row.get(0)?,
        number: row.get(1)?,
        channel_id: row.get(2)?,
        owner_id: row.get(3)?,
        reason: row.get(4)?,
        status: if status == "closed" {
            TicketStatus::Closed
        } else {
            TicketStatus::Open
        },
        created_at: row.get(6)?,
        closed_at: row.get(7)?,
        closed_by: row.get(8)?,
    })
}

impl Database {
    pub fn open_ticket_of(
        &self,
        guild_id: DiscordId,
        owner_id: DiscordId,
    ) -> Result<Option<Ticket>, BotError> {
        let conn = self.conn()?;
        let ticket = conn
            .query_row(
                &format!(
                    "SELECT {TICKET_COLUMNS} FROM tickets
                     WHERE guild_id = ?1 AND owner_id = ?2 AND status = 'open'"
                ),
                params![guild_id, owner_id],
                ticket_from_row,
            )
            .optional()?;
        Ok(ticket)
    }

    /// Reserves the next ticket number for `owner_id`. The channel is attached
    /// afterwards with [`Database::attach_ticket_channel`].
    ///
    /// Returns `None` when the owner already has an open ticket in the guild.
    pub fn create_ticket(
        &self,
        guild_id: DiscordId,
        owner_id: DiscordId,
        reason: Option<&str>,
    ) -> Result<Option<u32>, BotError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_guild(&tx, guild_id)?;

        let existing: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM tickets WHERE guild_id = ?1 AND owner_id = ?2 AND status = 'open')",
            params![guild_id, owner_id],
            |row| row.get(0),
        )?;
        if existing {
            return Ok(None);
        }

        let number: u32 = tx.query_row(
            "UPDATE guilds SET ticket_counter = ticket_counter + 1 WHERE id = ?1
             RETURNING ticket_counter",
            params![guild_id],
            |row| row.get(0),
        )?;

        tx.execute(
            "INSERT INTO tickets (guild_id, number, owner_id, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![guild_id, number, owner_id, reason, now()],
        )?;
        tx.commit()?;

        Ok(Some(number))
    }

    pub fn attach_ticket_channel(
        &self,
        guild_id: DiscordId,
        number: u32,
        channel_id: DiscordId,
    ) -> Result<(), BotError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE tickets SET channel_id = ?3 WHERE guild_id = ?1 AND number = ?2",
            params![guild_id, number, channel_id],
        )?;
        Ok(())
    }

    /// Drops a reservation whose channel could not be created.
    pub fn discard_ticket(&self, guild_id: DiscordId, number: u32) -> Result<(), BotError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM tickets WHERE guild_id = ?1 AND number = ?2 AND channel_id IS NULL",
            params![guild_id, number],
        )?;
        Ok(())
    }

    pub fn ticket_by_channel(&self, channel_id: DiscordId) -> Result<Option<Ticket>, BotError> {
        let conn = self.conn()?;
        let ticket = conn
            .query_row(
                &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE channel_id = ?1"),
                params![channel_id],
                ticket_from_row,
            )
            .optional()?;
        Ok(ticket)
    }

    /// Marks the ticket in `channel_id` closed. Fails with
    /// [`BotError::NotATicket`] unless it is an open ticket.
    pub fn close_ticket(
        &self,
        channel_id: DiscordId,
        closed_by: DiscordId,
    ) -> Result<Ticket, BotError> {
        let conn = self.conn()?;
        let closed = conn
            .query_row(
                &format!(
                    "UPDATE tickets SET status = 'closed', closed_at = ?3, closed_by = ?2
                     WHERE channel_id = ?1 AND status = 'open'
                     RETURNING {TICKET_COLUMNS}"
                ),
                params![channel_id, closed_by, now()],
                ticket_from_row,
            )
            .optional()?;

        closed.ok_or(BotError::NotATicket)
    }

    /// Undoes [`Database::close_ticket`] when the channel outlived the close.
    pub fn reopen_ticket(&self, channel_id: DiscordId) -> Result<(), BotError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE tickets SET status = 'open', closed_at = NULL, closed_by = NULL
             WHERE channel_id = ?1 AND status = 'closed'",
            params![channel_id],
        )?;
        Ok(())
    }

    pub fn open_tickets(&self, guild_id: DiscordId) -> Result<Vec<Ticket>, BotError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets
             WHERE guild_id = ?1 AND status = 'open' ORDER BY number ASC"
        ))?;

        let tickets = stmt
            .query_map(params![guild_id], ticket_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tickets)
    }
}
