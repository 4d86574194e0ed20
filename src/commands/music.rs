use std::sync::Arc;
use std::time::Duration;

use poise::CreateReply;
use poise::serenity_prelude as serenity;
use ::serenity::prelude::TypeMapKey;
use songbird::input::{Compose, YoutubeDl};
use songbird::tracks::TrackHandle;
use songbird::{Call, Songbird};
use tokio::sync::Mutex;

use super::{COLOUR_INFO, guild_id, truncate};
use crate::error::BotError;
use crate::{Context, Error};

const QUEUE_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub title: String,
    pub url: Option<String>,
    pub duration: Option<Duration>,
    pub requested_by: u64,
}

struct TrackInfoKey;

impl TypeMapKey for TrackInfoKey {
    type Value = TrackInfo;
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

fn track_line(info: &TrackInfo) -> String {
    let title = truncate(&info.title, 60);
    let title = match &info.url {
        Some(url) => format!("[{title}]({url})"),
        None => title,
    };
    let length = info
        .duration
        .map(format_duration)
        .unwrap_or_else(|| "live".to_owned());
    format!("{title} `{length}` · <@{}>", info.requested_by)
}

/// Renders one page (1-based) of the queue; the first track is the one playing.
pub fn format_queue(tracks: &[TrackInfo], page: usize) -> String {
    if tracks.is_empty() {
        return "The queue is empty.".to_owned();
    }

    let pages = tracks.len().div_ceil(QUEUE_PAGE_SIZE);
    let page = page.clamp(1, pages);
    let start = (page - 1) * QUEUE_PAGE_SIZE;

    let mut lines: Vec<String> = tracks
        .iter()
        .enumerate()
        .skip(start)
        .take(QUEUE_PAGE_SIZE)
        .map(|(i, info)| {
            if i == 0 {
                format!("**Now playing:** {}", track_line(info))
            } else {
                format!("`{i}.` {}", track_line(info))
            }
        })
        .collect();

    let total: Duration = tracks.iter().filter_map(|t| t.duration).sum();
    lines.push(String::new());
    lines.push(format!(
        "Page {page}/{pages} · {} tracks · {} total",
        tracks.len(),
        format_duration(total)
    ));
    lines.join("\n")
}

fn is_url(query: &str) -> bool {
    query.starts_with("http://") || query.starts_with("https://")
}

async fn manager(ctx: Context<'_>) -> Result<Arc<Songbird>, Error> {
    Ok(songbird::get(ctx.serenity_context())
        .await
        .ok_or(BotError::VoiceUnavailable)?)
}

async fn call(ctx: Context<'_>) -> Result<Arc<Mutex<Call>>, Error> {
    let guild_id = guild_id(ctx)?;
    manager(ctx)
        .await?
        .get(guild_id)
        .ok_or_else(|| BotError::NotConnected.into())
}

fn author_voice_channel(ctx: Context<'_>) -> Result<serenity::ChannelId, BotError> {
    let guild = ctx.guild().ok_or(BotError::NotInGuild)?;
    guild
        .voice_states
        .get(&ctx.author().id)
        .and_then(|state| state.channel_id)
        .ok_or(BotError::NotInVoice)
}

async fn join_author(ctx: Context<'_>) -> Result<Arc<Mutex<Call>>, Error> {
    let guild_id = guild_id(ctx)?;
    let channel_id = author_voice_channel(ctx)?;
    let call = manager(ctx).await?.join(guild_id, channel_id).await?;
    tracing::info!(guild = guild_id.get(), channel = channel_id.get(), "joined voice");
    Ok(call)
}

async fn track_info(handle: &TrackHandle) -> Option<TrackInfo> {
    handle.typemap().read().await.get::<TrackInfoKey>().cloned()
}

/// Join your voice channel
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn join(ctx: Context<'_>) -> Result<(), Error> {
    join_author(ctx).await?;
    ctx.say("Joined your voice channel.").await?;
    Ok(())
}

/// Leave the voice channel and drop the queue
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn leave(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let manager = manager(ctx).await?;

    let Some(call) = manager.get(guild_id) else {
        ctx.say("I'm not in a voice channel.").await?;
        return Ok(());
    };
    call.lock().await.queue().stop();
    manager.remove(guild_id).await?;
    tracing::info!(guild = guild_id.get(), "left voice");

    ctx.say("Left the voice channel.").await?;
    Ok(())
}

/// Queue a song by URL or search terms
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or search terms"]
    #[rest]
    query: String,
) -> Result<(), Error> {
    ctx.defer().await?;

    let call = match call(ctx).await {
        Ok(call) => call,
        Err(_) => join_author(ctx).await?,
    };

    let http = ctx.data().api.http().clone();
    let mut source = if is_url(&query) {
        YoutubeDl::new(http, query.clone())
    } else {
        YoutubeDl::new_search(http, query.clone())
    };

    let metadata = source.aux_metadata().await?;
    let info = TrackInfo {
        title: metadata.title.clone().unwrap_or_else(|| query.clone()),
        url: metadata.source_url.clone(),
        duration: metadata.duration,
        requested_by: ctx.author().id.get(),
    };

    let position = {
        let mut handler = call.lock().await;
        let handle = handler.enqueue_input(source.into()).await;
        handle.typemap().write().await.insert::<TrackInfoKey>(info.clone());
        handler.queue().len()
    };

    tracing::info!(title = %info.title, position, "queued track");

    let mut embed = serenity::CreateEmbed::new()
        .colour(COLOUR_INFO)
        .title(if position <= 1 { "Now playing" } else { "Queued" })
        .description(track_line(&info));
    if position > 1 {
        embed = embed.footer(serenity::CreateEmbedFooter::new(format!(
            "Position {}",
            position - 1
        )));
    }
    if let Some(thumbnail) = metadata.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Skip the current song
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn skip(ctx: Context<'_>) -> Result<(), Error> {
    let call = call(ctx).await?;
    let handler = call.lock().await;
    let queue = handler.queue();

    if queue.is_empty() {
        drop(handler);
        ctx.say("Nothing is playing.").await?;
        return Ok(());
    }
    queue.skip()?;
    let remaining = queue.len().saturating_sub(1);
    drop(handler);

    ctx.say(format!("Skipped. {remaining} left in the queue."))
        .await?;
    Ok(())
}

/// Stop playback and clear the queue
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn stop(ctx: Context<'_>) -> Result<(), Error> {
    let call = call(ctx).await?;
    call.lock().await.queue().stop();
    ctx.say("Stopped and cleared the queue.").await?;
    Ok(())
}

/// Pause playback
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn pause(ctx: Context<'_>) -> Result<(), Error> {
    let call = call(ctx).await?;
    call.lock().await.queue().pause()?;
    ctx.say("Paused.").await?;
    Ok(())
}

/// Resume playback
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn resume(ctx: Context<'_>) -> Result<(), Error> {
    let call = call(ctx).await?;
    call.lock().await.queue().resume()?;
    ctx.say("Resumed.").await?;
    Ok(())
}

/// Show the queue
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn queue(
    ctx: Context<'_>,
    #[description = "Page number"]
    #[min = 1]
    page: Option<u32>,
) -> Result<(), Error> {
    let call = call(ctx).await?;
    let handles = call.lock().await.queue().current_queue();

    let mut tracks = Vec::with_capacity(handles.len());
    for handle in &handles {
        if let Some(info) = track_info(handle).await {
            tracks.push(info);
        }
    }

    let embed = serenity::CreateEmbed::new()
        .title("Queue")
        .colour(COLOUR_INFO)
        .description(format_queue(&tracks, page.unwrap_or(1) as usize));
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show the current song
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn nowplaying(ctx: Context<'_>) -> Result<(), Error> {
    let call = call(ctx).await?;
    let current = call.lock().await.queue().current();

    let Some(handle) = current else {
        ctx.say("Nothing is playing.").await?;
        return Ok(());
    };

    let info = track_info(&handle).await;
    let position = handle.get_info().await.map(|state| state.position).ok();

    let description = match (&info, position) {
        (Some(info), Some(position)) => format!(
            "{}\n`{}` / `{}`",
            track_line(info),
            format_duration(position),
            info.duration
                .map(format_duration)
                .unwrap_or_else(|| "live".to_owned())
        ),
        (Some(info), None) => track_line(info),
        (None, _) => "Unknown track".to_owned(),
    };

    let embed = serenity::CreateEmbed::new()
        .title("Now playing")
        .colour(COLOUR_INFO)
        .description(description);
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, secs: u64) -> TrackInfo {
        TrackInfo {
            title: title.to_owned(),
            url: Some(format!("https://youtu.be/{title}")),
            duration: Some(Duration::from_secs(secs)),
            requested_by: 42,
        }
    }

    #[test]
    fn durations_format_with_optional_hours() {
        assert_eq!(format_duration(Duration::from_secs(5)), "0:05");
        assert_eq!(format_duration(Duration::from_secs(245)), "4:05");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600 + 7)), "3:00:07");
    }

    #[test]
    fn empty_queue_message() {
        assert_eq!(format_queue(&[], 1), "The queue is empty.");
    }

    #[test]
    fn queue_marks_current_track_and_totals() {
        let tracks = vec![track("a", 60), track("b", 120)];
        let text = format_queue(&tracks, 1);

        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("**Now playing:** [a]"));
        assert!(lines.next().unwrap().starts_with("`1.` [b]"));
        assert!(text.ends_with("Page 1/1 · 2 tracks · 3:00 total"));
    }

    #[test]
    fn queue_pages_are_clamped() {
        let tracks: Vec<_> = (0..25).map(|i| track(&format!("t{i}"), 10)).collect();

        let last = format_queue(&tracks, 3);
        assert!(last.contains("`20.` [t20]"));
        assert!(!last.contains("[t19]"));
        assert!(last.contains("Page 3/3"));

        assert_eq!(format_queue(&tracks, 99), last);
        assert!(format_queue(&tracks, 0).contains("Page 1/3"));
    }

    #[test]
    fn live_tracks_have_no_length() {
        let mut live = track("radio", 0);
        live.duration = None;
        assert!(track_line(&live).contains("`live`"));
    }

    #[test]
    fn urls_are_detected() {
        assert!(is_url("https://www.youtube.com/watch?v=x"));
        assert!(!is_url("never gonna give you up"));
    }
}
