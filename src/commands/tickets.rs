use poise::CreateReply;
use poise::serenity_prelude as serenity;
use serenity::{Permissions, PermissionOverwrite, PermissionOverwriteType};

use super::{COLOUR_INFO, COLOUR_SUCCESS, guild_id};
use crate::error::BotError;
use crate::{Context, Data, Error};

pub const OPEN_TICKET_BUTTON: &str = "ticket:open";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketOutcome {
    Opened(serenity::ChannelId),
    AlreadyOpen(Option<serenity::ChannelId>),
    NotConfigured,
}

impl TicketOutcome {
    pub fn message(&self) -> String {
        match self {
            TicketOutcome::Opened(channel) => format!("Your ticket is open: <#{channel}>"),
            TicketOutcome::AlreadyOpen(Some(channel)) => {
                format!("You already have an open ticket: <#{channel}>")
            }
            TicketOutcome::AlreadyOpen(None) => "You already have an open ticket.".to_owned(),
            TicketOutcome::NotConfigured => {
                "Tickets are not set up here yet. Ask an admin to run `/ticket setup`.".to_owned()
            }
        }
    }
}

pub fn ticket_channel_name(number: u32) -> String {
    format!("ticket-{number:04}")
}

fn member_access() -> Permissions {
    Permissions::VIEW_CHANNEL
        | Permissions::SEND_MESSAGES
        | Permissions::READ_MESSAGE_HISTORY
        | Permissions::ATTACH_FILES
}

/// Hides the channel from everyone except the owner and the support role.
pub fn ticket_overwrites(
    guild_id: serenity::GuildId,
    owner: serenity::UserId,
    support_role: serenity::RoleId,
) -> Vec<PermissionOverwrite> {
    vec![
        PermissionOverwrite {
            allow: Permissions::empty(),
            deny: Permissions::VIEW_CHANNEL,
            // @everyone shares the guild's id
            kind: PermissionOverwriteType::Role(serenity::RoleId::new(guild_id.get())),
        },
        PermissionOverwrite {
            allow: member_access(),
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Member(owner),
        },
        PermissionOverwrite {
            allow: member_access() | Permissions::MANAGE_MESSAGES,
            deny: Permissions::empty(),
            kind: PermissionOverwriteType::Role(support_role),
        },
    ]
}

/// Opens a ticket channel for `user`. Shared by the command and the panel button.
pub async fn open_ticket(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    user: &serenity::User,
    reason: Option<&str>,
) -> Result<TicketOutcome, Error> {
    let settings = data.db.guild_settings(guild_id.get())?;
    let (Some(category), Some(support_role)) =
        (settings.ticket_category_id, settings.support_role_id)
    else {
        return Ok(TicketOutcome::NotConfigured);
    };

    let Some(number) = data.db.create_ticket(guild_id.get(), user.id.get(), reason)? else {
        let existing = data
            .db
            .open_ticket_of(guild_id.get(), user.id.get())?
            .and_then(|t| t.channel_id)
            .map(serenity::ChannelId::new);
        return Ok(TicketOutcome::AlreadyOpen(existing));
    };

    let builder = serenity::CreateChannel::new(ticket_channel_name(number))
        .kind(serenity::ChannelType::Text)
        .category(serenity::ChannelId::new(category))
        .topic(format!(
            "Ticket #{number} for {}{}",
            user.name,
            reason.map(|r| format!(": {r}")).unwrap_or_default()
        ))
        .permissions(ticket_overwrites(
            guild_id,
            user.id,
            serenity::RoleId::new(support_role),
        ));

    let channel = match guild_id.create_channel(&ctx.http, builder).await {
        Ok(channel) => channel,
        Err(e) => {
            data.db.discard_ticket(guild_id.get(), number)?;
            return Err(e.into());
        }
    };
    data.db
        .attach_ticket_channel(guild_id.get(), number, channel.id.get())?;

    tracing::info!(
        guild = guild_id.get(),
        ticket = number,
        owner = user.id.get(),
        "ticket opened"
    );

    let welcome = serenity::CreateEmbed::new()
        .title(format!("Ticket #{number}"))
        .colour(COLOUR_SUCCESS)
        .description(format!(
            "<@{}> opened this ticket. <@&{support_role}> will be with you shortly.\n\n**Reason:** {}",
            user.id,
            reason.unwrap_or("No reason given")
        ))
        .footer(serenity::CreateEmbedFooter::new("Use /ticket close when you're done."));
    if let Err(e) = channel
        .id
        .send_message(&ctx.http, serenity::CreateMessage::new().embed(welcome))
        .await
    {
        tracing::warn!(ticket = number, "failed to post ticket welcome: {e}");
    }

    Ok(TicketOutcome::Opened(channel.id))
}

/// Support tickets
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Tickets",
    subcommands("setup", "panel", "open", "close", "add", "list"),
    subcommand_required
)]
pub async fn ticket(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Choose where tickets go and who handles them
#[poise::command(slash_command, prefix_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn setup(
    ctx: Context<'_>,
    #[description = "Category new ticket channels are created in"]
    #[channel_types("Category")]
    category: serenity::GuildChannel,
    #[description = "Role that can see every ticket"] support_role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    if category.kind != serenity::ChannelType::Category {
        ctx.say("That channel is not a category.").await?;
        return Ok(());
    }

    ctx.data()
        .db
        .set_ticket_config(guild_id.get(), category.id.get(), support_role.id.get())?;

    ctx.say(format!(
        "Tickets will be created in **{}** and handled by <@&{}>.",
        category.name, support_role.id
    ))
    .await?;
    Ok(())
}

/// Post a message with an "Open ticket" button
#[poise::command(slash_command, prefix_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn panel(ctx: Context<'_>) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::new()
        .title("Need help?")
        .colour(COLOUR_INFO)
        .description("Press the button below to open a private ticket with the support team.");
    let button = serenity::CreateButton::new(OPEN_TICKET_BUTTON)
        .label("Open ticket")
        .emoji('🎫')
        .style(serenity::ButtonStyle::Primary);

    ctx.send(
        CreateReply::default()
            .embed(embed)
            .components(vec![serenity::CreateActionRow::Buttons(vec![button])]),
    )
    .await?;
    Ok(())
}

/// Open a support ticket
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn open(
    ctx: Context<'_>,
    #[description = "What do you need help with?"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let outcome = open_ticket(
        ctx.serenity_context(),
        ctx.data(),
        guild_id,
        ctx.author(),
        reason.as_deref(),
    )
    .await?;

    ctx.send(CreateReply::default().content(outcome.message()).ephemeral(true))
        .await?;
    Ok(())
}

/// Close the ticket in this channel
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn close(ctx: Context<'_>) -> Result<(), Error> {
    let channel = ctx.channel_id();
    let ticket = ctx
        .data()
        .db
        .close_ticket(channel.get(), ctx.author().id.get())?;

    tracing::info!(
        guild = ticket.guild_id,
        ticket = ticket.number,
        closed_by = ctx.author().id.get(),
        "ticket closed"
    );

    ctx.say(format!("Closing ticket #{}...", ticket.number))
        .await?;
    if let Err(e) = channel.delete(ctx.http()).await {
        ctx.data().db.reopen_ticket(channel.get())?;
        tracing::warn!(ticket = ticket.number, "ticket channel survived close, reopened: {e}");
        return Err(e.into());
    }
    Ok(())
}

/// Give another member access to this ticket
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Member to add"] user: serenity::User,
) -> Result<(), Error> {
    let channel = ctx.channel_id();
    match ctx.data().db.ticket_by_channel(channel.get())? {
        Some(ticket) if ticket.status == crate::db::TicketStatus::Open => {}
        _ => return Err(BotError::NotATicket.into()),
    }

    channel
        .create_permission(
            ctx.http(),
            PermissionOverwrite {
                allow: member_access(),
                deny: Permissions::empty(),
                kind: PermissionOverwriteType::Member(user.id),
            },
        )
        .await?;

    ctx.say(format!("Added <@{}> to this ticket.", user.id))
        .await?;
    Ok(())
}

/// List open tickets
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let tickets = ctx.data().db.open_tickets(guild_id.get())?;

    if tickets.is_empty() {
        ctx.say("There are no open tickets.").await?;
        return Ok(());
    }

    let lines = tickets
        .iter()
        .map(|t| {
            let channel = t
                .channel_id
                .map(|c| format!("<#{c}>"))
                .unwrap_or_else(|| "(pending)".to_owned());
            format!(
                "`#{}` {channel} by <@{}> <t:{}:R>",
                t.number, t.owner_id, t.created_at
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let embed = serenity::CreateEmbed::new()
        .title(format!("Open tickets ({})", tickets.len()))
        .colour(COLOUR_INFO)
        .description(super::truncate(&lines, 4000));
    ctx.send(CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_are_padded() {
        assert_eq!(ticket_channel_name(7), "ticket-0007");
        assert_eq!(ticket_channel_name(12345), "ticket-12345");
    }

    #[test]
    fn overwrites_hide_channel_from_everyone() {
        let guild = serenity::GuildId::new(100);
        let owner = serenity::UserId::new(200);
        let support = serenity::RoleId::new(300);
        let overwrites = ticket_overwrites(guild, owner, support);

        assert_eq!(overwrites.len(), 3);
        assert_eq!(
            overwrites[0].kind,
            PermissionOverwriteType::Role(serenity::RoleId::new(100))
        );
        assert!(overwrites[0].deny.contains(Permissions::VIEW_CHANNEL));
        assert_eq!(overwrites[1].kind, PermissionOverwriteType::Member(owner));
        assert!(overwrites[1].allow.contains(Permissions::SEND_MESSAGES));
        assert!(overwrites[2].allow.contains(Permissions::MANAGE_MESSAGES));
    }

    #[test]
    fn outcome_messages_mention_channels() {
        let channel = serenity::ChannelId::new(55);
        assert!(TicketOutcome::Opened(channel).message().contains("<#55>"));
        assert!(TicketOutcome::AlreadyOpen(Some(channel)).message().contains("<#55>"));
        assert!(TicketOutcome::NotConfigured.message().contains("/ticket setup"));
    }
}
