use poise::CreateReply;
use poise::serenity_prelude as serenity;

use super::{COLOUR_INFO, truncate};
use crate::{Context, Error};

/// Current weather for a city
#[poise::command(slash_command, prefix_command, category = "Utility")]
pub async fn weather(
    ctx: Context<'_>,
    #[description = "City name"]
    #[rest]
    city: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let weather = ctx.data().api.weather(&city).await?;

    let title = if weather.area.is_empty() {
        city
    } else {
        weather.area.clone()
    };
    let embed = serenity::CreateEmbed::new()
        .title(format!("Weather in {title}"))
        .colour(COLOUR_INFO)
        .description(&weather.description)
        .field("Temperature", format!("{} °C", weather.temp_c), true)
        .field("Feels like", format!("{} °C", weather.feels_like_c), true)
        .field("Humidity", format!("{}%", weather.humidity), true)
        .field("Wind", format!("{} km/h", weather.wind_kmph), true);

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Look up an English word
#[poise::command(slash_command, prefix_command, category = "Utility")]
pub async fn define(
    ctx: Context<'_>,
    #[description = "Word to define"] word: String,
) -> Result<(), Error> {
    let definitions = ctx.data().api.define(&word).await?;

    let mut embed = serenity::CreateEmbed::new()
        .title(word.to_lowercase())
        .colour(COLOUR_INFO);
    for (i, def) in definitions.iter().enumerate() {
        let mut value = truncate(&def.definition, 900);
        if let Some(example) = &def.example {
            value.push_str(&format!("\n*{}*", truncate(example, 100)));
        }
        embed = embed.field(format!("{}. {}", i + 1, def.part_of_speech), value, false);
    }

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Translate text between languages
#[poise::command(slash_command, prefix_command, category = "Utility")]
pub async fn translate(
    ctx: Context<'_>,
    #[description = "Target language code, e.g. fr"] to: String,
    #[description = "Text to translate"] text: String,
    #[description = "Source language code (default en)"] from: Option<String>,
) -> Result<(), Error> {
    let from = from.unwrap_or_else(|| "en".to_owned());
    let translated = ctx
        .data()
        .api
        .translate(&text, &from.to_lowercase(), &to.to_lowercase())
        .await?;

    let embed = serenity::CreateEmbed::new()
        .colour(COLOUR_INFO)
        .field(format!("From {from}"), truncate(&text, 1000), false)
        .field(format!("To {to}"), truncate(&translated, 1000), false);

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Search for an anime on MyAnimeList
#[poise::command(slash_command, prefix_command, category = "Utility")]
pub async fn anime(
    ctx: Context<'_>,
    #[description = "Title to search for"]
    #[rest]
    query: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let anime = ctx.data().api.anime(&query).await?;

    let mut embed = serenity::CreateEmbed::new()
        .title(&anime.title)
        .url(&anime.url)
        .colour(COLOUR_INFO)
        .description(truncate(
            anime.synopsis.as_deref().unwrap_or("No synopsis available."),
            1000,
        ))
        .field(
            "Score",
            anime
                .score
                .map(|s| format!("{s:.2}"))
                .unwrap_or_else(|| "N/A".to_owned()),
            true,
        )
        .field(
            "Episodes",
            anime
                .episodes
                .map(|e| e.to_string())
                .unwrap_or_else(|| "?".to_owned()),
            true,
        )
        .field("Status", anime.status.as_deref().unwrap_or("Unknown"), true);
    if let Some(image) = &anime.image {
        embed = embed.thumbnail(image);
    }

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}
