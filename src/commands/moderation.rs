use std::time::Duration;

use poise::CreateReply;
use poise::serenity_prelude as serenity;

use super::{COLOUR_DANGER, COLOUR_WARN, guild_id};
use crate::db::{ModAction, ModCase};
use crate::error::BotError;
use crate::{Context, Error};

const MAX_TIMEOUT: Duration = Duration::from_secs(28 * 24 * 60 * 60);
/// Discord refuses to bulk delete messages older than this.
const BULK_DELETE_WINDOW_SECS: i64 = 14 * 24 * 60 * 60;

pub fn parse_timeout(input: &str) -> Result<Duration, BotError> {
    let duration =
        duration_str::parse(input.trim()).map_err(|_| BotError::InvalidDuration(input.to_owned()))?;

    if duration.is_zero() || duration > MAX_TIMEOUT {
        return Err(BotError::InvalidDuration(input.to_owned()));
    }
    Ok(duration)
}

/// Purge cases target the channel that was cleaned, every other action a user.
fn target_label(action: ModAction) -> &'static str {
    match action {
        ModAction::Purge => "Channel",
        _ => "Target",
    }
}

fn target_mention(action: ModAction, target_id: u64) -> String {
    match action {
        ModAction::Purge => format!("<#{target_id}>"),
        _ => format!("<@{target_id}>"),
    }
}

pub fn case_embed(case: &ModCase) -> serenity::CreateEmbed {
    let colour = match case.action {
        ModAction::Warn | ModAction::Timeout | ModAction::Purge => COLOUR_WARN,
        _ => COLOUR_DANGER,
    };

    let mut embed = serenity::CreateEmbed::new()
        .title(format!("Case #{} · {}", case.number, case.action))
        .colour(colour)
        .field(target_label(case.action), target_mention(case.action, case.target_id), true)
        .field("Moderator", format!("<@{}>", case.moderator_id), true)
        .field(
            "Reason",
            case.reason.as_deref().unwrap_or("No reason given"),
            false,
        );

    if let Ok(ts) = serenity::Timestamp::from_unix_timestamp(case.created_at) {
        embed = embed.timestamp(ts);
    }
    embed
}

/// Stores the case and announces it in the mod log, if one is configured.
async fn log_case(
    ctx: Context<'_>,
    action: ModAction,
    target: u64,
    reason: Option<&str>,
) -> Result<ModCase, Error> {
    let guild_id = guild_id(ctx)?;
    let data = ctx.data();
    let case = data
        .db
        .record_case(guild_id.get(), action, target, ctx.author().id.get(), reason)?;

    tracing::info!(
        guild = guild_id.get(),
        case = case.number,
        action = %action,
        target_id = target,
        "moderation action"
    );

    if let Some(channel) = data.db.guild_settings(guild_id.get())?.mod_log_channel_id {
        let message = serenity::CreateMessage::new().embed(case_embed(&case));
        if let Err(e) = serenity::ChannelId::new(channel)
            .send_message(ctx.http(), message)
            .await
        {
            tracing::warn!(guild = guild_id.get(), "failed to post to mod log: {e}");
        }
    }

    Ok(case)
}

/// Logs the case and replies with it.
async fn record(
    ctx: Context<'_>,
    action: ModAction,
    target: serenity::UserId,
    reason: Option<&str>,
) -> Result<ModCase, Error> {
    let case = log_case(ctx, action, target.get(), reason).await?;
    ctx.send(CreateReply::default().embed(case_embed(&case)))
        .await?;
    Ok(case)
}

/// Kick a member
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Moderation",
    required_permissions = "KICK_MEMBERS",
    required_bot_permissions = "KICK_MEMBERS"
)]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "Member to kick"] user: serenity::User,
    #[description = "Reason"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    guild_id
        .kick_with_reason(ctx.http(), user.id, reason.as_deref().unwrap_or(""))
        .await?;

    record(ctx, ModAction::Kick, user.id, reason.as_deref()).await?;
    Ok(())
}

/// Ban a user
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Moderation",
    required_permissions = "BAN_MEMBERS",
    required_bot_permissions = "BAN_MEMBERS"
)]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "User to ban"] user: serenity::User,
    #[description = "Days of messages to delete (0-7)"]
    #[min = 0]
    #[max = 7]
    delete_days: Option<u8>,
    #[description = "Reason"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let delete_days = delete_days.unwrap_or(0).min(7);
    guild_id
        .ban_with_reason(
            ctx.http(),
            user.id,
            delete_days,
            reason.as_deref().unwrap_or(""),
        )
        .await?;

    record(ctx, ModAction::Ban, user.id, reason.as_deref()).await?;
    Ok(())
}

/// Lift a ban
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Moderation",
    required_permissions = "BAN_MEMBERS",
    required_bot_permissions = "BAN_MEMBERS"
)]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "ID of the banned user"] user_id: serenity::UserId,
    #[description = "Reason"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    guild_id.unban(ctx.http(), user_id).await?;

    record(ctx, ModAction::Unban, user_id, reason.as_deref()).await?;
    Ok(())
}

/// Time a member out, e.g. 10m, 2h, 1d
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Moderation",
    required_permissions = "MODERATE_MEMBERS",
    required_bot_permissions = "MODERATE_MEMBERS"
)]
pub async fn timeout(
    ctx: Context<'_>,
    #[description = "Member to time out"] user: serenity::User,
    #[description = "How long, up to 28d"] duration: String,
    #[description = "Reason"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let length = parse_timeout(&duration)?;

    let until = chrono::Utc::now().timestamp() + length.as_secs() as i64;
    let until = serenity::Timestamp::from_unix_timestamp(until)
        .map_err(|_| BotError::InvalidDuration(duration.clone()))?;

    let mut edit = serenity::EditMember::new().disable_communication_until(until.to_string());
    if let Some(reason) = reason.as_deref() {
        edit = edit.audit_log_reason(reason);
    }
    guild_id.edit_member(ctx.http(), user.id, edit).await?;

    let logged = match reason.as_deref() {
        Some(reason) => format!("{duration}: {reason}"),
        None => duration.clone(),
    };
    record(ctx, ModAction::Timeout, user.id, Some(&logged)).await?;
    Ok(())
}

/// Remove a member's timeout
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Moderation",
    required_permissions = "MODERATE_MEMBERS",
    required_bot_permissions = "MODERATE_MEMBERS"
)]
pub async fn untimeout(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    guild_id
        .edit_member(
            ctx.http(),
            user.id,
            serenity::EditMember::new().enable_communication(),
        )
        .await?;

    record(ctx, ModAction::Untimeout, user.id, None).await?;
    Ok(())
}

/// Bulk delete recent messages in this channel
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Moderation",
    required_permissions = "MANAGE_MESSAGES",
    required_bot_permissions = "MANAGE_MESSAGES"
)]
pub async fn purge(
    ctx: Context<'_>,
    #[description = "How many messages (1-100)"]
    #[min = 1]
    #[max = 100]
    count: u8,
) -> Result<(), Error> {
    guild_id(ctx)?;
    let channel = ctx.channel_id();
    let cutoff = chrono::Utc::now().timestamp() - BULK_DELETE_WINDOW_SECS;

    let messages = channel
        .messages(ctx.http(), serenity::GetMessages::new().limit(count.clamp(1, 100)))
        .await?;
    let ids: Vec<serenity::MessageId> = messages
        .iter()
        .filter(|m| m.timestamp.unix_timestamp() > cutoff)
        .map(|m| m.id)
        .collect();

    match ids.as_slice() {
        [] => {}
        [only] => channel.delete_message(ctx.http(), *only).await?,
        _ => channel.delete_messages(ctx.http(), &ids).await?,
    }

    let reason = format!("deleted {} messages", ids.len());
    let case = log_case(ctx, ModAction::Purge, channel.get(), Some(&reason)).await?;

    ctx.send(
        CreateReply::default()
            .content(format!("Deleted {} messages (case #{}).", ids.len(), case.number))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Warn a member
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Moderation",
    required_permissions = "MODERATE_MEMBERS"
)]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "Member to warn"] user: serenity::User,
    #[description = "Reason"]
    #[rest]
    reason: String,
) -> Result<(), Error> {
    record(ctx, ModAction::Warn, user.id, Some(&reason)).await?;

    let guild_id = guild_id(ctx)?;
    let total = ctx.data().db.warnings(guild_id.get(), user.id.get())?.len();
    let dm = serenity::CreateMessage::new().content(format!(
        "You were warned in {}: {reason} (warning {total})",
        guild_id
            .name(ctx.cache())
            .unwrap_or_else(|| "a server".to_owned())
    ));
    if let Err(e) = user.direct_message(ctx.http(), dm).await {
        tracing::debug!(user = user.id.get(), "could not dm warned user: {e}");
    }
    Ok(())
}

/// List a member's active warnings
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Moderation",
    required_permissions = "MODERATE_MEMBERS"
)]
pub async fn warnings(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let warns = ctx.data().db.warnings(guild_id.get(), user.id.get())?;

    if warns.is_empty() {
        ctx.say(format!("{} has no warnings.", user.name)).await?;
        return Ok(());
    }

    let lines = warns
        .iter()
        .map(|w| {
            format!(
                "`#{}` <t:{}:d> by <@{}>: {}",
                w.number,
                w.created_at,
                w.moderator_id,
                w.reason.as_deref().unwrap_or("No reason given")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let embed = serenity::CreateEmbed::new()
        .title(format!("Warnings for {} ({})", user.name, warns.len()))
        .colour(COLOUR_WARN)
        .description(super::truncate(&lines, 4000));

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Clear a member's warnings
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Moderation",
    required_permissions = "MODERATE_MEMBERS"
)]
pub async fn clearwarnings(
    ctx: Context<'_>,
    #[description = "Member"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let cleared = ctx
        .data()
        .db
        .clear_warnings(guild_id.get(), user.id.get())?;

    ctx.say(format!("Cleared {cleared} warnings for {}.", user.name))
        .await?;
    Ok(())
}

/// Configure the moderation log
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Moderation",
    subcommands("channel"),
    subcommand_required,
    required_permissions = "MANAGE_GUILD"
)]
pub async fn modlog(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Set the channel moderation cases are posted to
#[poise::command(slash_command, prefix_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn channel(
    ctx: Context<'_>,
    #[description = "Log channel"]
    #[channel_types("Text")]
    channel: serenity::GuildChannel,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    ctx.data()
        .db
        .set_mod_log_channel(guild_id.get(), channel.id.get())?;

    ctx.say(format!("Moderation cases will be posted in <#{}>.", channel.id))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_durations_parse() {
        assert_eq!(parse_timeout("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_timeout("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_timeout(" 2d ").unwrap(), Duration::from_secs(2 * 86400));
    }

    #[test]
    fn purge_cases_name_the_channel() {
        assert_eq!(target_label(ModAction::Purge), "Channel");
        assert_eq!(target_mention(ModAction::Purge, 55), "<#55>");
        assert_eq!(target_label(ModAction::Ban), "Target");
        assert_eq!(target_mention(ModAction::Ban, 7), "<@7>");
    }

    #[test]
    fn timeout_rejects_out_of_range() {
        assert!(matches!(parse_timeout("0s"), Err(BotError::InvalidDuration(_))));
        assert!(matches!(parse_timeout("29d"), Err(BotError::InvalidDuration(_))));
        assert!(matches!(parse_timeout("soon"), Err(BotError::InvalidDuration(_))));
        assert!(parse_timeout("28d").is_ok());
    }
}
