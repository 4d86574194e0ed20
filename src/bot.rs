use poise::serenity_prelude as serenity;
use songbird::SerenityInit;
use tokio::io::AsyncReadExt;

use crate::cluster::shutdown_signal;
use crate::config::{ClusterAssignment, Config};
use crate::error::BotError;
use crate::{Data, Error, commands, events};

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            tracing::error!("failed to set up framework: {error}");
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            let command = ctx.command().qualified_name.clone();
            let message = match error.downcast_ref::<BotError>() {
                Some(e) if e.is_user_facing() => {
                    tracing::debug!(%command, "command rejected: {e}");
                    e.to_string()
                }
                _ => {
                    tracing::error!(%command, "command failed: {error}");
                    "Something went wrong running that command.".to_owned()
                }
            };

            let reply = poise::CreateReply::default()
                .content(message)
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                tracing::error!(%command, "failed to report error: {e}");
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                tracing::error!("error while handling error: {e}");
            }
        }
    }
}

fn framework(config: Config, cluster: ClusterAssignment) -> poise::Framework<Data, Error> {
    let prefix = config.prefix.clone();

    poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::list(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                mention_as_prefix: true,
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            pre_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        command = %ctx.command().qualified_name,
                        author = ctx.author().id.get(),
                        guild = ctx.guild_id().map(|g| g.get()),
                        "command invoked"
                    );
                })
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                let commands = &framework.options().commands;
                match config.dev_guild_id {
                    Some(guild) => {
                        poise::builtins::register_in_guild(ctx, commands, serenity::GuildId::new(guild))
                            .await?;
                        tracing::info!(guild, "registered commands in dev guild");
                    }
                    // every cluster shares the application, so one registration is enough
                    None if cluster.id == 0 => {
                        poise::builtins::register_globally(ctx, commands).await?;
                        tracing::info!("registered commands globally");
                    }
                    None => {}
                }

                Data::new(config, cluster)
            })
        })
        .build()
}

/// Resolves once the supervisor closes our stdin (or exits).
async fn supervisor_gone() {
    let mut stdin = tokio::io::stdin();
    let mut buf = [0u8; 64];
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => continue,
        }
    }
}

/// Runs the shards of one cluster until asked to stop.
pub async fn run_cluster(config: Config, cluster: ClusterAssignment) -> Result<(), Error> {
    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let token = config.token.clone();
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework(config, cluster))
        .register_songbird()
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = supervisor_gone() => tracing::info!("supervisor requested shutdown"),
            _ = shutdown_signal() => tracing::info!("signal received"),
        }
        shard_manager.shutdown_all().await;
    });

    tracing::info!(shards = ?cluster.shards, "starting shards");
    client
        .start_shard_range(cluster.shards.as_range(), cluster.shards.total)
        .await?;

    tracing::info!("cluster stopped");
    Ok(())
}
