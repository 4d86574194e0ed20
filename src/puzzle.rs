//! Reassembles a picture whose grid pieces were shuffled.
//!
//! Every arrangement of the pieces is scored by how well neighbouring edges
//! agree and the cheapest one wins. Three measures are combined per seam:
//! raw pixel difference across the seam, gradient continuity (each side
//! extrapolated one pixel into the other) and the difference between the mean
//! colours of thin strips along the seam.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage, imageops};

use crate::error::BotError;

pub const DEFAULT_GRID: u32 = 2;
const MAX_GRID: u32 = 3;
const STRIP_WIDTH: u32 = 4;

const EDGE_WEIGHT: f64 = 1.0;
const FEATURE_WEIGHT: f64 = 0.5;
const COLOUR_WEIGHT: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// `order[slot]` is the index of the piece placed at `slot` (row-major).
    pub order: Vec<usize>,
    pub cost: f64,
}

type Line = Vec<[f64; 3]>;

/// One side of a piece as seen from the seam.
struct Edge {
    outer: Line,
    inner: Line,
    strip_mean: [f64; 3],
}

struct PieceEdges {
    top: Edge,
    bottom: Edge,
    left: Edge,
    right: Edge,
}

/// Cuts the image into `grid * grid` equally sized pieces in row-major order.
pub fn split(image: &DynamicImage, grid: u32) -> Result<Vec<RgbaImage>, BotError> {
    check_grid(grid)?;

    let rgba = image.to_rgba8();
    let piece_w = rgba.width() / grid;
    let piece_h = rgba.height() / grid;
    if piece_w < 2 || piece_h < 2 {
        return Err(BotError::Image(format!(
            "image {}x{} is too small for a {grid}x{grid} puzzle",
            rgba.width(),
            rgba.height()
        )));
    }

    let mut pieces = Vec::with_capacity((grid * grid) as usize);
    for row in 0..grid {
        for col in 0..grid {
            pieces.push(
                imageops::crop_imm(&rgba, col * piece_w, row * piece_h, piece_w, piece_h)
                    .to_image(),
            );
        }
    }

    Ok(pieces)
}

/// Finds the arrangement with the lowest seam cost by trying all of them.
///
/// Ties go to the lexicographically smallest arrangement.
pub fn solve(pieces: &[RgbaImage], grid: u32) -> Result<Solution, BotError> {
    check_pieces(pieces, grid)?;

    let n = pieces.len();
    let edges: Vec<PieceEdges> = pieces.iter().map(piece_edges).collect();

    // horizontal[a][b]: a sits left of b. vertical[a][b]: a sits above b.
    let mut horizontal = vec![vec![0.0; n]; n];
    let mut vertical = vec![vec![0.0; n]; n];
    for a in 0..n {
        for b in 0..n {
            if a != b {
                horizontal[a][b] = seam_cost(&edges[a].right, &edges[b].left);
                vertical[a][b] = seam_cost(&edges[a].bottom, &edges[b].top);
            }
        }
    }

    let grid = grid as usize;
    let mut order: Vec<usize> = (0..n).collect();
    let mut best = Solution {
        order: order.clone(),
        cost: f64::INFINITY,
    };

    loop {
        let mut cost = 0.0;
        for slot in 0..n {
            let (row, col) = (slot / grid, slot % grid);
            if col + 1 < grid {
                cost += horizontal[order[slot]][order[slot + 1]];
            }
            if row + 1 < grid {
                cost += vertical[order[slot]][order[slot + grid]];
            }
        }

        if cost < best.cost {
            best = Solution {
                order: order.clone(),
                cost,
            };
        }

        if !next_permutation(&mut order) {
            break;
        }
    }

    Ok(best)
}

/// Places `pieces[order[slot]]` at every slot of a fresh canvas.
pub fn assemble(pieces: &[RgbaImage], order: &[usize], grid: u32) -> Result<RgbaImage, BotError> {
    check_pieces(pieces, grid)?;
    if order.len() != pieces.len() || order.iter().any(|&i| i >= pieces.len()) {
        return Err(BotError::Image("arrangement does not match the pieces".to_owned()));
    }

    let (piece_w, piece_h) = pieces[0].dimensions();
    let mut canvas = RgbaImage::new(piece_w * grid, piece_h * grid);
    for (slot, &piece) in order.iter().enumerate() {
        let slot = slot as u32;
        let x = (slot % grid) * piece_w;
        let y = (slot / grid) * piece_h;
        imageops::replace(&mut canvas, &pieces[piece], i64::from(x), i64::from(y));
    }

    Ok(canvas)
}

/// Decodes a scrambled picture, solves it and returns the result as PNG bytes.
pub fn solve_image(bytes: &[u8], grid: u32) -> Result<(Solution, Vec<u8>), BotError> {
    let image = image::load_from_memory(bytes)?;
    let pieces = split(&image, grid)?;
    let solution = solve(&pieces, grid)?;
    let solved = assemble(&pieces, &solution.order, grid)?;

    let mut png = Vec::new();
    DynamicImage::ImageRgba8(solved).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

    Ok((solution, png))
}

fn check_grid(grid: u32) -> Result<(), BotError> {
    if !(2..=MAX_GRID).contains(&grid) {
        return Err(BotError::Image(format!(
            "grid must be between 2 and {MAX_GRID}, got {grid}"
        )));
    }
    Ok(())
}

fn check_pieces(pieces: &[RgbaImage], grid: u32) -> Result<(), BotError> {
    check_grid(grid)?;

    let expected = (grid * grid) as usize;
    if pieces.len() != expected {
        return Err(BotError::Image(format!(
            "expected {expected} pieces, got {}",
            pieces.len()
        )));
    }

    let dims = pieces[0].dimensions();
    if dims.0 < 2 || dims.1 < 2 {
        return Err(BotError::Image("pieces must be at least 2x2".to_owned()));
    }
    if pieces.iter().any(|p| p.dimensions() != dims) {
        return Err(BotError::Image("pieces differ in size".to_owned()));
    }

    Ok(())
}

fn pixel(image: &RgbaImage, x: u32, y: u32) -> [f64; 3] {
    let [r, g, b, _] = image.get_pixel(x, y).0;
    [f64::from(r), f64::from(g), f64::from(b)]
}

fn column(image: &RgbaImage, x: u32) -> Line {
    (0..image.height()).map(|y| pixel(image, x, y)).collect()
}

fn row(image: &RgbaImage, y: u32) -> Line {
    (0..image.width()).map(|x| pixel(image, x, y)).collect()
}

fn mean(lines: impl Iterator<Item = Line>) -> [f64; 3] {
    let mut sum = [0.0; 3];
    let mut count = 0.0;
    for line in lines {
        for px in line {
            for c in 0..3 {
                sum[c] += px[c];
            }
            count += 1.0;
        }
    }
    sum.map(|s| if count > 0.0 { s / count } else { 0.0 })
}

fn piece_edges(image: &RgbaImage) -> PieceEdges {
    let (w, h) = image.dimensions();
    let strip_w = STRIP_WIDTH.min(w);
    let strip_h = STRIP_WIDTH.min(h);

    PieceEdges {
        top: Edge {
            outer: row(image, 0),
            inner: row(image, 1),
            strip_mean: mean((0..strip_h).map(|y| row(image, y))),
        },
        bottom: Edge {
            outer: row(image, h - 1),
            inner: row(image, h - 2),
            strip_mean: mean((h - strip_h..h).map(|y| row(image, y))),
        },
        left: Edge {
            outer: column(image, 0),
            inner: column(image, 1),
            strip_mean: mean((0..strip_w).map(|x| column(image, x))),
        },
        right: Edge {
            outer: column(image, w - 1),
            inner: column(image, w - 2),
            strip_mean: mean((w - strip_w..w).map(|x| column(image, x))),
        },
    }
}

fn channel_diff(a: [f64; 3], b: [f64; 3]) -> f64 {
    ((a[0] - b[0]).abs() + (a[1] - b[1]).abs() + (a[2] - b[2]).abs()) / 3.0
}

/// Cost of placing edge `a` against edge `b`; lower means a better fit.
fn seam_cost(a: &Edge, b: &Edge) -> f64 {
    let len = a.outer.len().min(b.outer.len()).max(1) as f64;

    let mut edge = 0.0;
    let mut feature = 0.0;
    for i in 0..a.outer.len().min(b.outer.len()) {
        let (a0, a1) = (a.outer[i], a.inner[i]);
        let (b0, b1) = (b.outer[i], b.inner[i]);

        edge += channel_diff(a0, b0);

        let predicted_b = [0, 1, 2].map(|c| 2.0 * a0[c] - a1[c]);
        let predicted_a = [0, 1, 2].map(|c| 2.0 * b0[c] - b1[c]);
        feature += (channel_diff(predicted_b, b0) + channel_diff(predicted_a, a0)) / 2.0;
    }

    let colour = channel_diff(a.strip_mean, b.strip_mean);

    EDGE_WEIGHT * edge / len + FEATURE_WEIGHT * feature / len + COLOUR_WEIGHT * colour
}

fn next_permutation(items: &mut [usize]) -> bool {
    if items.len() < 2 {
        return false;
    }

    let mut i = items.len() - 1;
    while i > 0 && items[i - 1] >= items[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }

    let mut j = items.len() - 1;
    while items[j] <= items[i - 1] {
        j -= 1;
    }
    items.swap(i - 1, j);
    items[i..].reverse();
    true
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn gradient(size: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| {
            Rgba([(x * 255 / size) as u8, (y * 255 / size) as u8, 96, 255])
        })
    }

    #[test]
    fn permutations_are_exhaustive_and_ordered() {
        let mut items = vec![0, 1, 2, 3];
        let mut seen = vec![items.clone()];
        while next_permutation(&mut items) {
            seen.push(items.clone());
        }
        assert_eq!(seen.len(), 24);
        assert_eq!(seen.last(), Some(&vec![3, 2, 1, 0]));
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
    }

    #[test]
    fn split_yields_row_major_pieces() {
        let image = DynamicImage::ImageRgba8(gradient(64));
        let pieces = split(&image, 2).unwrap();
        assert_eq!(pieces.len(), 4);
        assert!(pieces.iter().all(|p| p.dimensions() == (32, 32)));
        // top-right piece starts at x = 32
        assert_eq!(pieces[1].get_pixel(0, 0).0[0], (32 * 255 / 64) as u8);
        // bottom-left piece starts at y = 32
        assert_eq!(pieces[2].get_pixel(0, 0).0[1], (32 * 255 / 64) as u8);
    }

    #[test]
    fn solves_scrambled_gradient() {
        let original = gradient(64);
        let pieces = split(&DynamicImage::ImageRgba8(original.clone()), 2).unwrap();

        let scrambled = vec![
            pieces[2].clone(),
            pieces[0].clone(),
            pieces[3].clone(),
            pieces[1].clone(),
        ];

        let solution = solve(&scrambled, 2).unwrap();
        assert_eq!(solution.order, vec![1, 3, 0, 2]);

        let rebuilt = assemble(&scrambled, &solution.order, 2).unwrap();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn already_solved_puzzle_keeps_identity() {
        let pieces = split(&DynamicImage::ImageRgba8(gradient(40)), 2).unwrap();
        let solution = solve(&pieces, 2).unwrap();
        assert_eq!(solution.order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn uniform_image_ties_break_to_identity() {
        let flat = RgbaImage::from_pixel(16, 16, Rgba([10, 20, 30, 255]));
        let pieces = split(&DynamicImage::ImageRgba8(flat), 2).unwrap();
        let solution = solve(&pieces, 2).unwrap();
        assert_eq!(solution.order, vec![0, 1, 2, 3]);
        assert_eq!(solution.cost, 0.0);
    }

    #[test]
    fn rejects_wrong_piece_count() {
        let pieces = vec![gradient(8), gradient(8), gradient(8)];
        assert!(matches!(solve(&pieces, 2), Err(BotError::Image(_))));
    }

    #[test]
    fn rejects_mismatched_sizes() {
        let pieces = vec![gradient(8), gradient(8), gradient(8), gradient(10)];
        assert!(matches!(solve(&pieces, 2), Err(BotError::Image(_))));
    }

    #[test]
    fn rejects_tiny_images() {
        let image = DynamicImage::ImageRgba8(gradient(3));
        assert!(split(&image, 2).is_err());
    }

    #[test]
    fn solve_image_round_trips_png() {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(gradient(32))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let (solution, png) = solve_image(&bytes, 2).unwrap();
        assert_eq!(solution.order, vec![0, 1, 2, 3]);
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded, gradient(32));
    }
}
