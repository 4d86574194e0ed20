use poise::CreateReply;
use poise::serenity_prelude as serenity;

use super::{COLOUR_INFO, COLOUR_SUCCESS, guild_id, truncate};
use crate::{Context, Error};

const RECENT_REVIEWS: u32 = 5;
const LEADERBOARD_SIZE: u32 = 10;

pub fn stars(rating: f64) -> String {
    let full = rating.round().clamp(0.0, 5.0) as usize;
    format!("{}{}", "★".repeat(full), "☆".repeat(5 - full))
}

/// Member reviews
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Reviews",
    subcommands("give", "show", "leaderboard"),
    subcommand_required
)]
pub async fn review(_: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Rate a member from 1 to 5
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn give(
    ctx: Context<'_>,
    #[description = "Who you're reviewing"] user: serenity::User,
    #[description = "Rating from 1 to 5"]
    #[min = 1]
    #[max = 5]
    rating: i64,
    #[description = "Optional comment"]
    #[rest]
    comment: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let replaced = ctx.data().db.upsert_review(
        guild_id.get(),
        ctx.author().id.get(),
        user.id.get(),
        rating,
        comment.as_deref(),
    )?;

    ctx.say(format!(
        "{} your review of {}: {}",
        if replaced { "Updated" } else { "Saved" },
        user.name,
        stars(rating as f64)
    ))
    .await?;
    Ok(())
}

/// Show a member's reviews
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn show(
    ctx: Context<'_>,
    #[description = "Member (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let user = user.as_ref().unwrap_or_else(|| ctx.author());
    let db = &ctx.data().db;

    let summary = db.review_summary(guild_id.get(), user.id.get())?;
    if summary.count == 0 {
        ctx.say(format!("{} has no reviews yet.", user.name)).await?;
        return Ok(());
    }

    let recent = db.recent_reviews(guild_id.get(), user.id.get(), RECENT_REVIEWS)?;
    let lines = recent
        .iter()
        .map(|r| {
            let mut line = format!("{} by <@{}>", stars(f64::from(r.rating)), r.reviewer_id);
            if let Some(comment) = &r.comment {
                line.push_str(&format!("\n> {}", truncate(comment, 200)));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n");

    let embed = serenity::CreateEmbed::new()
        .title(format!("Reviews for {}", user.name))
        .colour(COLOUR_SUCCESS)
        .thumbnail(user.face())
        .field(
            "Average",
            format!("{} ({:.2})", stars(summary.average), summary.average),
            true,
        )
        .field("Reviews", summary.count.to_string(), true)
        .field("Recent", lines, false);

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Best-rated members in this server
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn leaderboard(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let board = ctx
        .data()
        .db
        .review_leaderboard(guild_id.get(), LEADERBOARD_SIZE)?;

    if board.is_empty() {
        ctx.say("Nobody has been reviewed yet.").await?;
        return Ok(());
    }

    let lines = board
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "`{}.` <@{}> {} {:.2} ({} reviews)",
                i + 1,
                entry.user_id,
                stars(entry.average),
                entry.average,
                entry.count
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let embed = serenity::CreateEmbed::new()
        .title("Review leaderboard")
        .colour(COLOUR_INFO)
        .description(lines);
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stars_round_to_nearest() {
        assert_eq!(stars(5.0), "★★★★★");
        assert_eq!(stars(3.4), "★★★☆☆");
        assert_eq!(stars(3.5), "★★★★☆");
        assert_eq!(stars(0.0), "☆☆☆☆☆");
    }
}
