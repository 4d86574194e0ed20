use poise::CreateReply;
use poise::serenity_prelude as serenity;

use super::COLOUR_SUCCESS;
use crate::error::BotError;
use crate::puzzle::{self, DEFAULT_GRID};
use crate::{Context, Error};

const MAX_PUZZLE_BYTES: u32 = 8 * 1024 * 1024;

/// Describes where each slot's piece came from, e.g. `top-left ← piece 3`.
pub fn describe_order(order: &[usize], grid: u32) -> String {
    let grid = grid as usize;
    order
        .iter()
        .enumerate()
        .map(|(slot, piece)| {
            let (row, col) = (slot / grid, slot % grid);
            let name = if grid == 2 {
                let vertical = if row == 0 { "top" } else { "bottom" };
                let horizontal = if col == 0 { "left" } else { "right" };
                format!("{vertical}-{horizontal}")
            } else {
                format!("row {} col {}", row + 1, col + 1)
            };
            format!("{name} ← piece {}", piece + 1)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Unscramble a shuffled 2x2 picture puzzle
#[poise::command(slash_command, prefix_command, category = "Fun")]
pub async fn puzzle(
    ctx: Context<'_>,
    #[description = "Scrambled picture"] image: serenity::Attachment,
) -> Result<(), Error> {
    if image.size > MAX_PUZZLE_BYTES {
        return Err(BotError::Image("that picture is too large".to_owned()).into());
    }

    ctx.defer().await?;
    let bytes = image.download().await?;

    let (solution, png) =
        tokio::task::spawn_blocking(move || puzzle::solve_image(&bytes, DEFAULT_GRID)).await??;
    tracing::debug!(order = ?solution.order, cost = solution.cost, "puzzle solved");

    let embed = serenity::CreateEmbed::new()
        .title("Puzzle solved")
        .colour(COLOUR_SUCCESS)
        .description(describe_order(&solution.order, DEFAULT_GRID))
        .image("attachment://solved.png")
        .footer(serenity::CreateEmbedFooter::new(format!(
            "seam cost {:.2}",
            solution.cost
        )));

    ctx.send(
        CreateReply::default()
            .embed(embed)
            .attachment(serenity::CreateAttachment::bytes(png, "solved.png")),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_two_by_two_slots() {
        let text = describe_order(&[1, 3, 0, 2], 2);
        assert_eq!(
            text,
            "top-left ← piece 2\ntop-right ← piece 4\nbottom-left ← piece 1\nbottom-right ← piece 3"
        );
    }

    #[test]
    fn describes_larger_grids_by_position() {
        let order: Vec<usize> = (0..9).collect();
        let text = describe_order(&order, 3);
        assert!(text.starts_with("row 1 col 1 ← piece 1"));
        assert!(text.ends_with("row 3 col 3 ← piece 9"));
    }
}
