//! Cell and attribute-state types (C3).
//!
//! Only the three style bits the SGR table actually dispatches are kept
//! (BOLD, UNDERLINE, REVERSE) — dim/italic/blink/hidden/strikethrough have
//! no corresponding SGR codes here. Wide-character spacer tracking is
//! dropped too: double-width cells are out of scope.

use bitflags::bitflags;

use super::color::Rgb;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct StyleFlags: u8 {
        const BOLD      = 1 << 0;
        const UNDERLINE = 1 << 1;
        const REVERSE   = 1 << 2;
    }
}

/// A single terminal cell: codepoint (0 = empty) plus resolved 24-bit colors
/// and style bits. Cells are value-typed and own their colors outright —
/// palette/default-color changes walk the grid and rewrite matching cells
/// rather than storing an indirection (see `Terminal::recolor_fg/bg`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub codepoint: u32,
    pub fg: Rgb,
    pub bg: Rgb,
    pub style: StyleFlags,
}

impl Cell {
    pub fn blank(fg: Rgb, bg: Rgb) -> Self {
        Self {
            codepoint: 0,
            fg,
            bg,
            style: StyleFlags::empty(),
        }
    }
}

/// Current drawing attributes (SGR state). `use_default_fg`/`use_default_bg`
/// track whether `fg`/`bg` currently mirror the terminal's default colors, so
/// that an OSC 10/11/12 default-color change can update this struct (and any
/// saved-cursor snapshot of it) in place rather than re-deriving on every
/// cell write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeState {
    pub fg: Rgb,
    pub bg: Rgb,
    pub use_default_fg: bool,
    pub use_default_bg: bool,
    pub style: StyleFlags,
}

impl AttributeState {
    pub fn new(default_fg: Rgb, default_bg: Rgb) -> Self {
        Self {
            fg: default_fg,
            bg: default_bg,
            use_default_fg: true,
            use_default_bg: true,
            style: StyleFlags::empty(),
        }
    }

    pub fn reset(&mut self, default_fg: Rgb, default_bg: Rgb) {
        *self = Self::new(default_fg, default_bg);
    }
}
