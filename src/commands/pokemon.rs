use poise::CreateReply;
use poise::serenity_prelude as serenity;

use super::{COLOUR_INFO, COLOUR_SUCCESS, truncate};
use crate::{Context, Error};

const MAX_HINT_MATCHES: usize = 10;

fn display_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Names matching a companion-game hint such as `P_k_ch_`.
///
/// `_` stands for any single character; escaped underscores (`\_`) are
/// treated the same. Hyphenated species names match hints written with
/// spaces. Matching ignores case.
pub fn match_hint<'a>(pattern: &str, names: &'a [String]) -> Vec<&'a str> {
    let pattern: Vec<char> = pattern
        .trim()
        .replace('\\', "")
        .to_lowercase()
        .chars()
        .collect();

    if pattern.is_empty() {
        return Vec::new();
    }

    names
        .iter()
        .filter(|name| {
            let candidate: Vec<char> = name.to_lowercase().replace('-', " ").chars().collect();
            candidate.len() == pattern.len()
                && candidate
                    .iter()
                    .zip(&pattern)
                    .all(|(c, p)| *p == '_' || c == p)
        })
        .map(String::as_str)
        .collect()
}

/// Look up a Pokémon's types and base stats
#[poise::command(slash_command, prefix_command, category = "Pokémon")]
pub async fn pokedex(
    ctx: Context<'_>,
    #[description = "Pokémon name or national dex number"] name: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let pokemon = ctx.data().api.pokemon(&name).await?;

    let stats = pokemon
        .stats
        .iter()
        .map(|(stat, value)| format!("**{}**: {value}", display_name(stat)))
        .collect::<Vec<_>>()
        .join("\n");
    let total: u32 = pokemon.stats.iter().map(|(_, v)| v).sum();

    let mut embed = serenity::CreateEmbed::new()
        .title(format!("#{:04} {}", pokemon.id, display_name(&pokemon.name)))
        .colour(COLOUR_INFO)
        .field(
            "Types",
            pokemon
                .types
                .iter()
                .map(|t| display_name(t))
                .collect::<Vec<_>>()
                .join(" / "),
            true,
        )
        .field(
            "Height",
            format!("{:.1} m", f64::from(pokemon.height) / 10.0),
            true,
        )
        .field(
            "Weight",
            format!("{:.1} kg", f64::from(pokemon.weight) / 10.0),
            true,
        )
        .field(format!("Base stats ({total})"), stats, false);

    if let Some(sprite) = &pokemon.sprite {
        embed = embed.thumbnail(sprite);
    }

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Solve a Pokémon name hint like P_k_ch_
#[poise::command(slash_command, prefix_command, category = "Pokémon")]
pub async fn hint(
    ctx: Context<'_>,
    #[description = "Hint with _ for unknown letters"]
    #[rest]
    pattern: String,
) -> Result<(), Error> {
    let names = ctx.data().species_names().await?;
    let matches = match_hint(&pattern, names);

    let reply = match matches.as_slice() {
        [] => format!("No Pokémon matches `{pattern}`."),
        [only] => format!("That's **{}**!", display_name(only)),
        many => {
            let shown: Vec<String> = many
                .iter()
                .take(MAX_HINT_MATCHES)
                .map(|n| display_name(n))
                .collect();
            let more = many.len().saturating_sub(MAX_HINT_MATCHES);
            let mut text = format!("Possible matches: {}", shown.join(", "));
            if more > 0 {
                text.push_str(&format!(" (+{more} more)"));
            }
            text
        }
    };

    ctx.say(reply).await?;
    Ok(())
}

/// Track the Pokémon you've caught
#[poise::command(
    slash_command,
    prefix_command,
    category = "Pokémon",
    subcommands("add", "remove", "list"),
    subcommand_required
)]
pub async fn collection(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Add a Pokémon to your collection
#[poise::command(slash_command, prefix_command)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Pokémon name"] pokemon: String,
    #[description = "Is it shiny?"] shiny: Option<bool>,
) -> Result<(), Error> {
    let shiny = shiny.unwrap_or(false);
    let count = ctx
        .data()
        .db
        .add_to_collection(ctx.author().id.get(), &pokemon, shiny)?;

    ctx.say(format!(
        "Added {}{}. You now have {count}.",
        if shiny { "✨ " } else { "" },
        display_name(&pokemon.trim().to_lowercase())
    ))
    .await?;
    Ok(())
}

/// Remove a Pokémon from your collection
#[poise::command(slash_command, prefix_command)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Pokémon name"] pokemon: String,
    #[description = "Is it shiny?"] shiny: Option<bool>,
) -> Result<(), Error> {
    let shiny = shiny.unwrap_or(false);
    let name = display_name(&pokemon.trim().to_lowercase());

    let msg = match ctx
        .data()
        .db
        .remove_from_collection(ctx.author().id.get(), &pokemon, shiny)?
    {
        None => format!("You don't have any {name} to remove."),
        Some(0) => format!("Removed your last {name}."),
        Some(left) => format!("Removed one {name}. {left} left."),
    };

    ctx.say(msg).await?;
    Ok(())
}

/// Show a collection
#[poise::command(slash_command, prefix_command)]
pub async fn list(
    ctx: Context<'_>,
    #[description = "Whose collection (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let user = user.as_ref().unwrap_or_else(|| ctx.author());
    let entries = ctx.data().db.collection(user.id.get())?;

    if entries.is_empty() {
        ctx.say(format!("{} hasn't collected anything yet.", user.name))
            .await?;
        return Ok(());
    }

    let total: u32 = entries.iter().map(|e| e.count).sum();
    let shinies: u32 = entries.iter().filter(|e| e.shiny).map(|e| e.count).sum();
    let lines = entries
        .iter()
        .map(|e| {
            format!(
                "{}{} ×{}",
                if e.shiny { "✨ " } else { "" },
                display_name(&e.pokemon),
                e.count
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let embed = serenity::CreateEmbed::new()
        .title(format!("{}'s collection", user.name))
        .colour(COLOUR_SUCCESS)
        .description(truncate(&lines, 4000))
        .footer(serenity::CreateEmbedFooter::new(format!(
            "{total} caught · {shinies} shiny · {} unique",
            entries.len()
        )));

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn hint_matches_single_character_wildcards() {
        let pool = names(&["pikachu", "pichu", "raichu", "pidgey"]);
        assert_eq!(match_hint("P_k_ch_", &pool), vec!["pikachu"]);
        assert_eq!(match_hint("__chu", &pool), vec!["pichu"]);
        assert_eq!(match_hint("___chu", &pool), vec!["raichu"]);
    }

    #[test]
    fn hint_accepts_escaped_underscores_and_spaces() {
        let pool = names(&["mr-mime", "mime-jr", "meowth"]);
        assert_eq!(match_hint(r"M\_ M\_m\_", &pool), vec!["mr-mime"]);
        assert_eq!(match_hint("mime jr", &pool), vec!["mime-jr"]);
    }

    #[test]
    fn hint_requires_exact_length() {
        let pool = names(&["eevee", "eelektross"]);
        assert_eq!(match_hint("E____", &pool), vec!["eevee"]);
        assert!(match_hint("E___", &pool).is_empty());
        assert!(match_hint("   ", &pool).is_empty());
    }

    #[test]
    fn display_name_capitalises_parts() {
        assert_eq!(display_name("mr-mime"), "Mr Mime");
        assert_eq!(display_name("special-attack"), "Special Attack");
        assert_eq!(display_name("eevee"), "Eevee");
    }
}
