//! LcdPanel Widget
//!
//! Paints an [`LcdGrid`] cell by cell onto a backlit area.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::Widget;

use crate::display::LcdGrid;
use crate::theme;

/// A character LCD showing the contents of a grid
pub struct LcdPanel<'a> {
    grid: &'a LcdGrid,
}

impl<'a> LcdPanel<'a> {
    pub fn new(grid: &'a LcdGrid) -> Self {
        Self { grid }
    }
}

impl Widget for LcdPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Backlight first so unwritten cells look unlit
        buf.set_style(area, theme::lcd_blank());

        let rows = self.grid.rows().min(area.height);
        for row in 0..rows {
            let line = self.grid.line(row);
            buf.set_stringn(
                area.x,
                area.y + row,
                line.trim_end(),
                usize::from(area.width),
                theme::lcd_text(),
            );
        }
    }
}
