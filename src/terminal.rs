// SPDX-License-Identifier: GPL-3.0-only

//! Terminal preview
//!
//! Renders the overlaid camera feed using Unicode half-block characters for
//! double vertical resolution, with a one-line status bar underneath. Keys
//! go through [`action_for`] to the [`CameraApp`].

use crate::app::{CameraApp, action_for};
use crate::constants::timing;
use crate::pipelines::video::VideoWriter;

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use image::RgbImage;
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Run the preview until the user quits or `stop` is set
///
/// The terminal is restored and the app shut down on every exit path,
/// including errors from drawing or reading input.
pub fn run<W: VideoWriter>(
    app: &mut CameraApp<W>,
    stop: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(e.into());
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = match Terminal::new(backend) {
        Ok(terminal) => terminal,
        Err(e) => {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            return Err(e.into());
        }
    };

    let result = run_app(&mut terminal, app, stop);

    app.shutdown();

    // Restore terminal
    let restored = restore(&mut terminal);
    result?;
    restored
}

fn restore(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<(), Box<dyn std::error::Error>> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_app<W: VideoWriter>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut CameraApp<W>,
    stop: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        if stop.load(Ordering::SeqCst) {
            info!("Interrupted, leaving preview");
            break;
        }

        app.tick();

        let status = status_line(app);
        terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };
            f.render_widget(FrameWidget { frame: app.frame() }, camera_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(StatusBar { message: &status }, status_area);
        })?;

        if event::poll(timing::INPUT_POLL)?
            && let Event::Key(key) = event::read()?
            && let Some(action) = action_for(&key)
            && !app.handle(action)
        {
            break;
        }
    }

    Ok(())
}

/// Camera, frame rate, recording state and the last message
pub fn status_line<W: VideoWriter>(app: &CameraApp<W>) -> String {
    let camera = app
        .camera_kind()
        .map(|k| k.short_name())
        .unwrap_or("no camera");
    let mut line = format!(" {} | {:.1} fps", camera, app.fps());
    if let Some(elapsed) = app.recording_elapsed() {
        line.push_str(&format!(" | REC {:.1}s", elapsed.as_secs_f64()));
    }
    if !app.status().is_empty() {
        line.push_str(" | ");
        line.push_str(app.status());
    }
    line
}

/// Widget that renders a frame using half-block characters
struct FrameWidget<'a> {
    frame: Option<&'a RgbImage>,
}

impl Widget for FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.filter(|f| f.width() > 0 && f.height() > 0) else {
            // No frame yet - show placeholder
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };
        if area.width == 0 || area.height == 0 {
            return;
        }

        // Each terminal cell displays 2 vertical pixels
        let frame_aspect = frame.width() as f64 / frame.height() as f64;
        let term_width = area.width as f64;
        let term_height = (area.height as f64) * 2.0;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let h = term_height;
            ((h * frame_aspect) as u16, (h / 2.0) as u16)
        } else {
            // Terminal is taller - fit to width
            let w = term_width;
            (w as u16, (w / frame_aspect / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width() as f64 / display_width as f64;
        let y_scale = frame.height() as f64 / (display_height as f64 * 2.0);

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;
                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    // Upper half is fg, lower half is bg
                    cell.set_char('▀');
                    cell.set_fg(sample_pixel(frame, src_x, src_y_top));
                    cell.set_bg(sample_pixel(frame, src_x, src_y_bottom));
                }
            }
        }
    }
}

fn sample_pixel(frame: &RgbImage, x: u32, y: u32) -> Color {
    let x = x.min(frame.width() - 1);
    let y = y.min(frame.height() - 1);
    let [r, g, b] = frame.get_pixel(x, y).0;
    Color::Rgb(r, g, b)
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        // Paths can be long; cut on characters, not bytes
        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_frame_fills_cells_with_half_blocks() {
        let mut frame = RgbImage::new(4, 4);
        for x in 0..4 {
            frame.put_pixel(x, 0, Rgb([255, 0, 0]));
            frame.put_pixel(x, 1, Rgb([0, 0, 255]));
        }
        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        FrameWidget { frame: Some(&frame) }.render(area, &mut buf);

        let cell = buf.cell((0, 0)).unwrap();
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
        assert_eq!(cell.bg, Color::Rgb(0, 0, 255));
    }

    #[test]
    fn test_placeholder_without_frame() {
        let area = Rect::new(0, 0, 30, 3);
        let mut buf = Buffer::empty(area);
        FrameWidget { frame: None }.render(area, &mut buf);
        let row: String = (0..30)
            .filter_map(|x| buf.cell((x, 1)).map(|c| c.symbol().to_string()))
            .collect();
        assert!(row.contains("Waiting for camera"));
    }

    #[test]
    fn test_status_bar_truncates_on_char_boundary() {
        let area = Rect::new(0, 0, 5, 1);
        let mut buf = Buffer::empty(area);
        StatusBar { message: "Bild gespeichert: ä" }.render(area, &mut buf);
        assert_eq!(buf.cell((4, 0)).unwrap().symbol(), " ");
        assert_eq!(buf.cell((0, 0)).unwrap().symbol(), "B");
    }
}
