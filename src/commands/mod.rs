use poise::serenity_prelude as serenity;

use crate::error::BotError;
use crate::{Context, Data, Error};

pub mod fun;
pub mod help;
pub mod moderation;
pub mod music;
pub mod pokemon;
pub mod reviews;
pub mod tickets;
pub mod utility;

pub const COLOUR_INFO: u32 = 0x5865f2;
pub const COLOUR_SUCCESS: u32 = 0x57f287;
pub const COLOUR_WARN: u32 = 0xfee75c;
pub const COLOUR_DANGER: u32 = 0xed4245;

/// Every command the framework registers.
pub fn list() -> Vec<poise::Command<Data, Error>> {
    vec![
        help::help(),
        help::ping(),
        help::about(),
        pokemon::pokedex(),
        pokemon::hint(),
        pokemon::collection(),
        moderation::kick(),
        moderation::ban(),
        moderation::unban(),
        moderation::timeout(),
        moderation::untimeout(),
        moderation::purge(),
        moderation::warn(),
        moderation::warnings(),
        moderation::clearwarnings(),
        moderation::modlog(),
        music::join(),
        music::leave(),
        music::play(),
        music::skip(),
        music::stop(),
        music::pause(),
        music::resume(),
        music::queue(),
        music::nowplaying(),
        tickets::ticket(),
        reviews::review(),
        utility::weather(),
        utility::define(),
        utility::translate(),
        utility::anime(),
        fun::puzzle(),
    ]
}

pub(crate) fn guild_id(ctx: Context<'_>) -> Result<serenity::GuildId, BotError> {
    ctx.guild_id().ok_or(BotError::NotInGuild)
}

/// Shortens `text` to at most `max` characters, marking the cut with an ellipsis.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("pokémon league", 8), "pokémon…");
        assert_eq!(truncate("pokémon league", 8).chars().count(), 8);
    }

    #[test]
    fn command_names_are_unique() {
        let commands = list();
        let mut names: Vec<_> = commands.iter().map(|c| c.name.clone()).collect();
        names.sort();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }
}
