use poise::serenity_prelude as serenity;

use crate::commands::tickets::{self, OPEN_TICKET_BUTTON};
use crate::{Data, Error};

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            tracing::info!(
                shard = ctx.shard_id.0,
                guilds = data_about_bot.guilds.len(),
                "{} is connected",
                data_about_bot.user.name
            );
        }
        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Component(component),
        } => {
            handle_component(ctx, component, data).await?;
        }
        _ => {}
    }
    Ok(())
}

async fn handle_component(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    data: &Data,
) -> Result<(), Error> {
    if component.data.custom_id != OPEN_TICKET_BUTTON {
        return Ok(());
    }

    let Some(guild_id) = component.guild_id else {
        return Ok(());
    };

    let content = match tickets::open_ticket(ctx, data, guild_id, &component.user, None).await {
        Ok(outcome) => outcome.message(),
        Err(e) => {
            tracing::error!(guild = guild_id.get(), "failed to open ticket from panel: {e}");
            "Something went wrong opening your ticket.".to_owned()
        }
    };

    component
        .create_response(
            &ctx.http,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}
