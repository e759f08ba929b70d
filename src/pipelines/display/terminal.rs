// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based preview renderer
//!
//! Renders every source's preview side by side using Unicode half-block
//! characters for improved vertical resolution. Stands in for the window
//! system: one "window" per source label, plus non-blocking key polling in
//! raw mode.

use super::FrameRenderer;
use crate::constants::DISPLAY_RENDER_BUDGET;
use crate::errors::RenderError;
use crate::media::ConvertedFrame;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, Stdout, stdout};
use std::time::{Duration, Instant};

pub struct TerminalRenderer {
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
    /// Latest preview per source, in first-seen order
    frames: Vec<(String, ConvertedFrame)>,
    /// Duration of the previous draw; over budget means the next frame
    /// is dropped instead of queued behind a slow terminal
    last_draw: Duration,
}

impl TerminalRenderer {
    pub fn new() -> Result<Self, RenderError> {
        enable_raw_mode().map_err(|e| RenderError::Failed(e.to_string()))?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen).map_err(|e| RenderError::Failed(e.to_string()))?;
        let terminal = Terminal::new(CrosstermBackend::new(out))
            .map_err(|e| RenderError::Failed(e.to_string()))?;
        Ok(Self {
            terminal: Some(terminal),
            frames: Vec::new(),
            last_draw: Duration::ZERO,
        })
    }

    fn store_frame(&mut self, label: &str, frame: &ConvertedFrame) {
        if let Some(slot) = self.frames.iter_mut().find(|(l, _)| l == label) {
            slot.1 = frame.clone();
        } else {
            self.frames.push((label.to_string(), frame.clone()));
        }
    }

    fn draw(&mut self) -> io::Result<()> {
        let Some(terminal) = self.terminal.as_mut() else {
            return Ok(());
        };
        let frames = &self.frames;
        terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let preview_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };

            // One column per source, side by side
            let count = frames.len().max(1) as u16;
            let column_width = preview_area.width / count;
            for (i, (label, frame)) in frames.iter().enumerate() {
                let column = Rect {
                    x: preview_area.x + i as u16 * column_width,
                    y: preview_area.y,
                    width: column_width,
                    height: preview_area.height,
                };
                f.render_widget(FrameWidget { label, frame }, column);
            }

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: "'q' quit",
                },
                status_area,
            );
        })?;
        Ok(())
    }
}

impl FrameRenderer for TerminalRenderer {
    fn show(&mut self, label: &str, frame: &ConvertedFrame) -> Result<(), RenderError> {
        if self.last_draw > DISPLAY_RENDER_BUDGET {
            // Catch up by dropping this frame; budget resets so the next
            // cycle gets a fresh chance
            self.last_draw = Duration::ZERO;
            return Err(RenderError::Busy);
        }
        self.store_frame(label, frame);
        let started = Instant::now();
        self.draw().map_err(|e| RenderError::Failed(e.to_string()))?;
        self.last_draw = started.elapsed();
        Ok(())
    }

    fn poll_key(&mut self) -> Result<Option<char>, RenderError> {
        if event::poll(Duration::ZERO).map_err(|e| RenderError::Failed(e.to_string()))?
            && let Event::Key(key) = event::read().map_err(|e| RenderError::Failed(e.to_string()))?
            && key.kind == KeyEventKind::Press
        {
            // Raw mode swallows the signal, so Ctrl+C maps to the stop key
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                return Ok(Some(crate::constants::STOP_KEY));
            }
            if let KeyCode::Char(c) = key.code {
                return Ok(Some(c));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        if let Some(mut terminal) = self.terminal.take() {
            let _ = disable_raw_mode();
            let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
            let _ = terminal.show_cursor();
        }
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Widget that renders one BGR preview frame using half-block characters
struct FrameWidget<'a> {
    label: &'a str,
    frame: &'a ConvertedFrame,
}

impl Widget for FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let frame = self.frame;
        if area.width == 0 || area.height <= 1 || frame.width == 0 || frame.height == 0 {
            return;
        }

        // Top line carries the source label
        buf.set_string(
            area.x,
            area.y,
            self.label,
            ratatui::style::Style::default().fg(Color::White),
        );

        let image_area = Rect {
            x: area.x,
            y: area.y + 1,
            width: area.width,
            height: area.height - 1,
        };

        // Each terminal cell shows 2 vertical pixels via the upper half
        // block: fg paints the top pixel, bg the bottom
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = image_area.width as f64;
        let term_height = (image_area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = image_area.x + tx;
                let term_y = image_area.y + ty;
                if term_x >= image_area.x + image_area.width
                    || term_y >= image_area.y + image_area.height
                {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top = sample_bgr(frame, src_x, src_y_top);
                let bottom = sample_bgr(frame, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top);
                    cell.set_bg(bottom);
                }
            }
        }
    }
}

fn sample_bgr(frame: &ConvertedFrame, x: u32, y: u32) -> Color {
    let x = x.min(frame.width - 1);
    let y = y.min(frame.height - 1);
    let idx = ((y * frame.width + x) * 3) as usize;
    let data: &[u8] = &frame.data;
    if idx + 2 < data.len() {
        Color::Rgb(data[idx + 2], data[idx + 1], data[idx])
    } else {
        Color::Rgb(0, 0, 0)
    }
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

        let text = if self.message.len() > area.width as usize {
            &self.message[..area.width as usize]
        } else {
            self.message
        };
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
