// SPDX-License-Identifier: GPL-3.0-only

//! Text and status overlay burned into preview frames
//!
//! Uses a built-in 5x7 bitmap font scaled with the frame height, so no font
//! files or rendering libraries are needed on the device.

use crate::config::DisplaySettings;
use image::{Rgb, RgbImage};
use std::time::Duration;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
const SHADOW: Rgb<u8> = Rgb([0, 0, 0]);

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
/// Horizontal advance per character in font pixels
const ADVANCE: i32 = GLYPH_WIDTH + 1;
/// Vertical advance per line in font pixels
const LINE_ADVANCE: i32 = GLYPH_HEIGHT + 4;
const PADDING: i32 = 10;

/// Key hints, top to bottom
pub const CONTROLS: [&str; 5] = [
    "SPACE: save image",
    "V: toggle video recording",
    "T: toggle overlay",
    "C: switch camera",
    "Q: quit application",
];

/// Values shown in the overlay for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayInfo {
    /// Frames per second over the last window
    pub fps: f64,
    /// Wall-clock time, already formatted
    pub timestamp: String,
    /// Duration of the running recording, `None` when idle
    pub recording: Option<Duration>,
}

/// Font scale for a frame height: 1 up to 240 lines, +1 per 240 lines
pub fn scale_for_height(height: u32) -> i32 {
    (height / 240).max(1) as i32
}

/// Draw the overlay onto `frame`
///
/// From the bottom-left upwards: control hints (white), FPS and timestamp
/// (green), recording duration (red). While recording a red dot is also drawn
/// in the top-right corner. Nothing is drawn when `show_status` is off.
pub fn render_overlay(frame: &mut RgbImage, info: &OverlayInfo, display: &DisplaySettings) {
    if !display.show_status {
        return;
    }

    let scale = scale_for_height(frame.height());
    let line = LINE_ADVANCE * scale;
    let x = PADDING;
    let mut y = frame.height() as i32 - PADDING - GLYPH_HEIGHT * scale;

    if display.show_controls {
        for hint in CONTROLS.iter().rev() {
            draw_text(frame, x, y, hint, WHITE, scale);
            y -= line;
        }
    }

    if display.show_fps {
        draw_text(frame, x, y, &format!("FPS: {:.1}", info.fps), GREEN, scale);
        y -= line;
    }

    if display.show_timestamp && !info.timestamp.is_empty() {
        draw_text(frame, x, y, &info.timestamp, GREEN, scale);
        y -= line;
    }

    if let Some(duration) = info.recording {
        let text = format!("Recording: {:.1}s", duration.as_secs_f64());
        draw_text(frame, x, y, &text, RED, scale);
        draw_recording_dot(frame, scale);
    }
}

/// Filled red circle in the top-right corner
pub fn draw_recording_dot(frame: &mut RgbImage, scale: i32) {
    let radius = 6 * scale;
    let cx = frame.width() as i32 - PADDING - radius;
    let cy = PADDING + radius;
    fill_circle(frame, cx, cy, radius, RED);
}

/// Width in pixels of `text` at `scale`
pub fn text_width(text: &str, scale: i32) -> i32 {
    text.chars().count() as i32 * ADVANCE * scale
}

/// Draw `text` with its top-left corner at (`x`, `y`) and a one-pixel shadow
///
/// Lowercase letters are drawn as uppercase; characters without a glyph
/// leave a blank cell.
pub fn draw_text(frame: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>, scale: i32) {
    let scale = scale.max(1);
    draw_glyphs(frame, x + scale, y + scale, text, SHADOW, scale);
    draw_glyphs(frame, x, y, text, color, scale);
}

fn draw_glyphs(frame: &mut RgbImage, mut x: i32, y: i32, text: &str, color: Rgb<u8>, scale: i32) {
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                        let px = x + col * scale;
                        let py = y + row as i32 * scale;
                        fill_rect(frame, px, py, px + scale - 1, py + scale - 1, color);
                    }
                }
            }
        }
        x += ADVANCE * scale;
    }
}

/// Fill the inclusive rectangle, clipped to the frame
pub fn fill_rect(frame: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    let width = frame.width() as i32;
    let height = frame.height() as i32;
    if right < 0 || bottom < 0 || left >= width || top >= height || left > right || top > bottom {
        return;
    }

    let left = left.max(0);
    let top = top.max(0);
    let right = right.min(width - 1);
    let bottom = bottom.min(height - 1);

    for y in top..=bottom {
        for x in left..=right {
            frame.put_pixel(x as u32, y as u32, color);
        }
    }
}

fn fill_circle(frame: &mut RgbImage, cx: i32, cy: i32, radius: i32, color: Rgb<u8>) {
    let r2 = radius * radius;
    for dy in -radius..=radius {
        // Widest span for this row
        let mut half = 0;
        while (half + 1) * (half + 1) + dy * dy <= r2 {
            half += 1;
        }
        fill_rect(frame, cx - half, cy + dy, cx + half, cy + dy, color);
    }
}

#[rustfmt::skip]
fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    let bits = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ':' => [0, 0b00110, 0b00110, 0, 0b00110, 0b00110, 0],
        '.' => [0, 0, 0, 0, 0, 0b00110, 0b00110],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '/' => [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        '%' => [0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0],
        ' ' => [0; 7],
        _ => return None,
    };
    Some(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(width: u32, height: u32) -> RgbImage {
        RgbImage::new(width, height)
    }

    fn count(frame: &RgbImage, color: Rgb<u8>) -> usize {
        frame.pixels().filter(|p| **p == color).count()
    }

    #[test]
    fn test_hidden_overlay_draws_nothing() {
        let mut frame = blank(320, 240);
        let display = DisplaySettings {
            show_status: false,
            ..DisplaySettings::default()
        };
        let info = OverlayInfo {
            fps: 30.0,
            timestamp: "2024-01-01 00:00:00".into(),
            recording: Some(Duration::from_secs(3)),
        };
        render_overlay(&mut frame, &info, &display);
        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_recording_draws_red() {
        let mut frame = blank(320, 240);
        let mut info = OverlayInfo {
            fps: 30.0,
            timestamp: String::new(),
            recording: None,
        };
        render_overlay(&mut frame, &info, &DisplaySettings::default());
        assert_eq!(count(&frame, RED), 0);
        assert!(count(&frame, WHITE) > 0);
        assert!(count(&frame, GREEN) > 0);

        info.recording = Some(Duration::from_millis(1500));
        render_overlay(&mut frame, &info, &DisplaySettings::default());
        assert!(count(&frame, RED) > 0);
        // Dot in the top-right corner
        assert_eq!(*frame.get_pixel(320 - 10 - 6, 10 + 6), RED);
    }

    #[test]
    fn test_text_clipped_at_edges() {
        let mut frame = blank(16, 8);
        draw_text(&mut frame, -3, -2, "Recording: 12.5s", WHITE, 1);
        draw_text(&mut frame, 10, 4, "FPS", GREEN, 2);
        assert!(count(&frame, WHITE) > 0);
    }

    #[test]
    fn test_scale_and_width() {
        assert_eq!(scale_for_height(120), 1);
        assert_eq!(scale_for_height(720), 3);
        assert_eq!(text_width("FPS", 2), 36);
    }
}
