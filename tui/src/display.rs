//! Display Sinks
//!
//! Everything the engine writes ends up in an [`LcdGrid`], a fixed-size
//! character buffer with the geometry of the reference 4x20 LCD. The sinks
//! differ only in what `flush` does with it:
//!
//! - [`TerminalDisplay`]: draws the grid as an LCD panel with ratatui
//! - [`LineDisplay`]: prints the grid as plain text whenever it changes

use std::io::Write;

use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::{Block, BorderType, Paragraph};
use ratatui::Terminal;
use unicode_width::UnicodeWidthChar;

use picalc_core::{DisplaySink, SurfaceError};

use crate::theme;
use crate::widgets::LcdPanel;

/// Rows of the reference LCD
pub const LCD_ROWS: u16 = 4;
/// Columns of the reference LCD
pub const LCD_COLS: u16 = 20;

/// Marks the second cell of a double-width character
const CONTINUATION: char = '\0';

/// Fixed-size character buffer
///
/// Writes past the last column are clipped. Double-width characters take
/// two cells and are dropped whole if they would straddle the edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LcdGrid {
    rows: u16,
    cols: u16,
    cells: Vec<char>,
}

impl LcdGrid {
    /// Blank grid of the given size
    #[must_use]
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows,
            cols,
            cells: vec![' '; usize::from(rows) * usize::from(cols)],
        }
    }

    /// Blank 4x20 grid
    #[must_use]
    pub fn lcd() -> Self {
        Self::new(LCD_ROWS, LCD_COLS)
    }

    /// Number of rows
    #[must_use]
    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// Number of columns
    #[must_use]
    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Blank every cell
    pub fn clear(&mut self) {
        self.cells.fill(' ');
    }

    /// Write `text` at `(row, col)`, clipping at the right edge
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::OutOfBounds`] for a row past the bottom.
    pub fn write_at(&mut self, row: u16, col: u16, text: &str) -> Result<(), SurfaceError> {
        if row >= self.rows {
            return Err(SurfaceError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }

        let start = usize::from(row) * usize::from(self.cols);
        let cols = usize::from(self.cols);
        let mut x = usize::from(col);
        for ch in text.chars() {
            let width = ch.width().unwrap_or(0);
            if width == 0 {
                continue;
            }
            if x + width > cols {
                break;
            }
            self.cells[start + x] = ch;
            if width == 2 {
                self.cells[start + x + 1] = CONTINUATION;
            }
            x += width;
        }
        Ok(())
    }

    /// Text of one row, trailing blanks included
    #[must_use]
    pub fn line(&self, row: u16) -> String {
        if row >= self.rows {
            return String::new();
        }
        let start = usize::from(row) * usize::from(self.cols);
        self.cells[start..start + usize::from(self.cols)]
            .iter()
            .filter(|ch| **ch != CONTINUATION)
            .collect()
    }

    /// All rows
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        (0..self.rows).map(|row| self.line(row)).collect()
    }
}

impl Default for LcdGrid {
    fn default() -> Self {
        Self::lcd()
    }
}

impl std::fmt::Display for LcdGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in 0..self.rows {
            if row > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", self.line(row).trim_end())?;
        }
        Ok(())
    }
}

// ============================================================================
// Terminal
// ============================================================================

/// Draws the grid as an LCD panel, centered in the terminal
pub struct TerminalDisplay<B: Backend> {
    terminal: Terminal<B>,
    grid: LcdGrid,
}

impl<B: Backend> TerminalDisplay<B> {
    /// Wrap an initialized terminal
    pub fn new(terminal: Terminal<B>) -> Self {
        Self {
            terminal,
            grid: LcdGrid::lcd(),
        }
    }

    /// The buffered grid
    pub fn grid(&self) -> &LcdGrid {
        &self.grid
    }

    /// The wrapped terminal
    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    fn panel_area(area: Rect, rows: u16, cols: u16) -> Rect {
        // Bezel plus one hint line below.
        let [panel, _hints] = Layout::vertical([Constraint::Length(rows + 2), Constraint::Length(1)])
            .flex(Flex::Center)
            .areas(area);
        let [panel] = Layout::horizontal([Constraint::Length(cols + 2)])
            .flex(Flex::Center)
            .areas(panel);
        panel
    }
}

impl<B: Backend + Send> DisplaySink for TerminalDisplay<B> {
    fn clear(&mut self) -> Result<(), SurfaceError> {
        self.grid.clear();
        Ok(())
    }

    fn write_at(&mut self, row: u16, col: u16, text: &str) -> Result<(), SurfaceError> {
        self.grid.write_at(row, col, text)
    }

    fn flush(&mut self) -> Result<(), SurfaceError> {
        let grid = &self.grid;
        self.terminal.draw(|frame| {
            let panel = Self::panel_area(frame.area(), grid.rows(), grid.cols());
            let bezel = Block::bordered()
                .border_type(BorderType::Thick)
                .border_style(Style::default().fg(theme::BEZEL))
                .title(" PI-Calc ");
            let inner = bezel.inner(panel);
            frame.render_widget(bezel, panel);
            frame.render_widget(LcdPanel::new(grid), inner);

            let hints = Rect::new(panel.x, panel.bottom(), panel.width, 1).intersection(frame.area());
            frame.render_widget(
                Paragraph::new(Line::from("←/1 →/2 spc r q"))
                    .style(Style::default().fg(theme::HINT_GRAY))
                    .centered(),
                hints,
            );
        })?;
        Ok(())
    }
}

// ============================================================================
// Headless
// ============================================================================

/// Prints the grid as text whenever a flushed frame differs from the last
pub struct LineDisplay<W: Write> {
    out: W,
    grid: LcdGrid,
    printed: Option<LcdGrid>,
    frames: u64,
}

impl<W: Write> LineDisplay<W> {
    /// Print frames to `out`
    pub fn new(out: W) -> Self {
        Self {
            out,
            grid: LcdGrid::lcd(),
            printed: None,
            frames: 0,
        }
    }

    /// Frames printed so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Give back the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> DisplaySink for LineDisplay<W> {
    fn clear(&mut self) -> Result<(), SurfaceError> {
        self.grid.clear();
        Ok(())
    }

    fn write_at(&mut self, row: u16, col: u16, text: &str) -> Result<(), SurfaceError> {
        self.grid.write_at(row, col, text)
    }

    fn flush(&mut self) -> Result<(), SurfaceError> {
        if self.printed.as_ref() == Some(&self.grid) {
            return Ok(());
        }
        writeln!(self.out, "+{}+", "-".repeat(usize::from(self.grid.cols())))?;
        for line in self.grid.lines() {
            writeln!(self.out, "|{line}|")?;
        }
        writeln!(self.out, "+{}+", "-".repeat(usize::from(self.grid.cols())))?;
        self.out.flush()?;

        self.printed = Some(self.grid.clone());
        self.frames += 1;
        Ok(())
    }
}
