use poise::CreateReply;
use poise::serenity_prelude as serenity;

use super::COLOUR_INFO;
use crate::{Context, Error};

/// Show help for all commands or one command
#[poise::command(slash_command, prefix_command, track_edits, category = "General")]
pub async fn help(
    ctx: Context<'_>,
    #[description = "Command to get help for"]
    #[rest]
    command: Option<String>,
) -> Result<(), Error> {
    let footer = format!(
        "Prefix commands start with `{}`. Slash commands work everywhere.",
        ctx.data().config.prefix
    );

    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            extra_text_at_bottom: &footer,
            ephemeral: true,
            show_subcommands: true,
            ..Default::default()
        },
    )
    .await?;
    Ok(())
}

/// Check the bot's latency
#[poise::command(slash_command, prefix_command, category = "General")]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    let latency = ctx.ping().await;
    let shard = ctx.serenity_context().shard_id;

    ctx.say(format!(
        "Pong! `{} ms` on shard {} (cluster {})",
        latency.as_millis(),
        shard.0,
        ctx.data().cluster.id
    ))
    .await?;
    Ok(())
}

/// About this bot
#[poise::command(slash_command, prefix_command, category = "General")]
pub async fn about(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let shards = data.cluster.shards;
    let guilds = ctx.cache().guilds().len();

    let embed = serenity::CreateEmbed::new()
        .title(concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION")))
        .colour(COLOUR_INFO)
        .description("Pokémon companion, moderation, music, tickets and reviews.")
        .field("Cluster", data.cluster.id.to_string(), true)
        .field(
            "Shards",
            format!("{}-{} of {}", shards.first, shards.last, shards.total),
            true,
        )
        .field("Servers (this cluster)", guilds.to_string(), true);

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}
