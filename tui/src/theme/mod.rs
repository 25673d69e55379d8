//! Theme and Colors
//!
//! Palette of a classic character LCD: dark glyphs on a yellow-green
//! backlight, plus a few frame colors around the panel.

use ratatui::style::{Color, Modifier, Style};

// ============================================================================
// LCD Panel
// ============================================================================

/// Backlight - yellow-green
pub const LCD_BACKLIGHT: Color = Color::Rgb(155, 188, 15);

/// Lit segments - near black with a green tint
pub const LCD_GLYPH: Color = Color::Rgb(15, 56, 15);

/// Unlit cells - slightly darker than the backlight
pub const LCD_GHOST: Color = Color::Rgb(139, 172, 15);

// ============================================================================
// Frame and Status
// ============================================================================

/// Bezel around the panel
pub const BEZEL: Color = Color::Rgb(60, 60, 60);

/// Key hints under the panel
pub const HINT_GRAY: Color = Color::Rgb(120, 120, 120);

/// Style for text on the panel
#[must_use]
pub fn lcd_text() -> Style {
    Style::default()
        .fg(LCD_GLYPH)
        .bg(LCD_BACKLIGHT)
        .add_modifier(Modifier::BOLD)
}

/// Style for blank panel cells
#[must_use]
pub fn lcd_blank() -> Style {
    Style::default().fg(LCD_GHOST).bg(LCD_BACKLIGHT)
}
