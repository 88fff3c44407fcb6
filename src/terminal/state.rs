//! The `Terminal`: composes the primary/alternate grids, scrollback,
//! palette, current attributes, and mode flags into the single object the
//! rest of the application drives. Scrollback is a flat ring, mode flags
//! live above the grid (so they survive an alt-screen swap), and cells
//! carry fully resolved RGB rather than a palette index.

use crate::terminal::cell::{AttributeState, Cell, StyleFlags};
use crate::terminal::color::Palette;
use crate::terminal::cursor::CursorShape;
use crate::terminal::grid::Grid;
use crate::terminal::modes::TerminalModes;
use crate::terminal::scrollback::ScrollbackRing;
use crate::terminal::selection::Selection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharsetId {
    Ascii,
    DecSpecialGraphics,
}

/// DEC Special Graphics: ASCII 0x60-0x7e maps to box-drawing / symbol glyphs
/// when G0/G1 is set to this charset (ESC ( 0 / ESC ) 0) and selected via
/// SI/SO.
pub fn dec_special_graphics(ascii: u8) -> Option<char> {
    let table: &[(u8, char)] = &[
        (0x60, '\u{25c6}'), (0x61, '\u{2592}'), (0x62, '\u{2409}'), (0x63, '\u{240c}'),
        (0x64, '\u{240d}'), (0x65, '\u{240a}'), (0x66, '\u{00b0}'), (0x67, '\u{00b1}'),
        (0x68, '\u{2424}'), (0x69, '\u{240b}'), (0x6a, '\u{2518}'), (0x6b, '\u{2510}'),
        (0x6c, '\u{250c}'), (0x6d, '\u{2514}'), (0x6e, '\u{253c}'), (0x6f, '\u{23ba}'),
        (0x70, '\u{23bb}'), (0x71, '\u{2500}'), (0x72, '\u{23bc}'), (0x73, '\u{23bd}'),
        (0x74, '\u{251c}'), (0x75, '\u{2524}'), (0x76, '\u{2534}'), (0x77, '\u{252c}'),
        (0x78, '\u{2502}'), (0x79, '\u{2264}'), (0x7a, '\u{2265}'), (0x7b, '\u{03c0}'),
        (0x7c, '\u{2260}'), (0x7d, '\u{00a3}'), (0x7e, '\u{00b7}'),
    ];
    table.iter().find(|(b, _)| *b == ascii).map(|(_, c)| *c)
}

pub struct Terminal {
    pub primary: Grid,
    pub alternate: Option<Grid>,
    pub using_alt: bool,
    pub history: ScrollbackRing,
    /// Scrollback viewport offset: 0 = following live output.
    pub scroll_offset: usize,
    pub palette: Palette,
    pub attrs: AttributeState,
    pub modes: TerminalModes,
    pub selection: Selection,
    pub cursor_shape: CursorShape,
    pub cursor_blink_enabled: bool,
    pub title: String,
    g0: CharsetId,
    g1: CharsetId,
    active_g: u8,
    /// DECSC (ESC 7) snapshot of (g0, g1, active_g); restored by DECRC (ESC 8).
    charset_save: Option<(CharsetId, CharsetId, u8)>,
    /// Bytes the host needs to write back to the PTY (DSR/DA replies, OSC
    /// color queries); drained by the caller once per feed.
    pending_replies: Vec<u8>,
    /// Raw OSC 777 argument groups, drained by the overlay subsystem.
    pending_overlay: Vec<Vec<Vec<u8>>>,
    pub bell_pending: bool,
}

impl Terminal {
    pub fn new(cols: u16, rows: u16, history_capacity: usize) -> Self {
        let palette = Palette::default();
        let attrs = AttributeState::new(palette.default_fg, palette.default_bg);
        Self {
            primary: Grid::new(cols, rows, palette.default_fg, palette.default_bg),
            alternate: None,
            using_alt: false,
            history: ScrollbackRing::new(cols, history_capacity),
            scroll_offset: 0,
            palette,
            attrs,
            modes: TerminalModes::default(),
            selection: Selection::default(),
            cursor_shape: CursorShape::default(),
            cursor_blink_enabled: true,
            title: String::new(),
            g0: CharsetId::Ascii,
            g1: CharsetId::Ascii,
            active_g: 0,
            charset_save: None,
            pending_replies: Vec::new(),
            pending_overlay: Vec::new(),
            bell_pending: false,
        }
    }

    pub fn active_grid(&self) -> &Grid {
        if self.using_alt {
            self.alternate.as_ref().unwrap_or(&self.primary)
        } else {
            &self.primary
        }
    }

    pub fn active_grid_mut(&mut self) -> &mut Grid {
        if self.using_alt {
            self.alternate.as_mut().unwrap()
        } else {
            &mut self.primary
        }
    }

    fn blank_cell(&self) -> Cell {
        Cell {
            codepoint: 0,
            fg: self.attrs.fg,
            bg: self.attrs.bg,
            style: StyleFlags::empty(),
        }
    }

    pub fn take_replies(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending_replies)
    }

    pub fn take_overlay_requests(&mut self) -> Vec<Vec<Vec<u8>>> {
        std::mem::take(&mut self.pending_overlay)
    }

    pub(crate) fn queue_reply(&mut self, s: &str) {
        self.pending_replies.extend_from_slice(s.as_bytes());
    }

    pub(crate) fn queue_overlay(&mut self, params: Vec<Vec<u8>>) {
        self.pending_overlay.push(params);
    }

    /// Write one printable character through the active charset translation.
    pub(crate) fn print_char(&mut self, c: char) {
        let codepoint = if self.active_g == 1 && self.g1 == CharsetId::DecSpecialGraphics
            || self.active_g == 0 && self.g0 == CharsetId::DecSpecialGraphics
        {
            if c.is_ascii() {
                dec_special_graphics(c as u8).unwrap_or(c) as u32
            } else {
                c as u32
            }
        } else {
            c as u32
        };
        let attrs = self.attrs;
        let blank_cols = self.active_grid().width();
        let using_alt = self.using_alt;
        let mut evicted = Vec::new();
        self.active_grid_mut().put(codepoint, &attrs, |row| {
            evicted.push(row.to_vec());
        });
        if !using_alt {
            for row in evicted {
                debug_assert_eq!(row.len(), blank_cols as usize);
                self.history.push(&row);
            }
        }
    }

    pub(crate) fn select_charset(&mut self, g: u8, designation: u8) {
        let id = match designation {
            b'0' => CharsetId::DecSpecialGraphics,
            _ => CharsetId::Ascii,
        };
        if g == 0 {
            self.g0 = id;
        } else {
            self.g1 = id;
        }
    }

    pub(crate) fn shift_in(&mut self) {
        self.active_g = 0;
    }
    pub(crate) fn shift_out(&mut self) {
        self.active_g = 1;
    }

    pub(crate) fn push_charset_state(&mut self) {
        self.charset_save = Some((self.g0, self.g1, self.active_g));
    }

    pub(crate) fn pop_charset_state(&mut self) {
        if let Some((g0, g1, active_g)) = self.charset_save.take() {
            self.g0 = g0;
            self.g1 = g1;
            self.active_g = active_g;
        }
    }

    pub(crate) fn linefeed(&mut self) {
        let blank = self.blank_cell();
        let using_alt = self.using_alt;
        let width = self.active_grid().width();
        let mut evicted = Vec::new();
        self.active_grid_mut().index(blank, |row| evicted.push(row.to_vec()));
        if !using_alt {
            for row in evicted {
                debug_assert_eq!(row.len(), width as usize);
                self.history.push(&row);
            }
        }
        if self.modes.linefeed_newline {
            self.active_grid_mut().cursor_col = 0;
        }
    }

    pub(crate) fn reverse_linefeed(&mut self) {
        let blank = self.blank_cell();
        self.active_grid_mut().reverse_index(blank);
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        let blank = self.blank_cell();
        self.primary.resize(cols, rows, blank);
        if let Some(alt) = self.alternate.as_mut() {
            alt.resize(cols, rows, blank);
        }
        self.history.resize(cols, self.history.capacity(), blank);
        self.scroll_offset = 0;
        // History is dropped above, so no selection endpoint can validly
        // reference a scrollback row anymore; clamp into the live grid.
        self.selection.validate(0, rows.saturating_sub(1) as i64, cols.saturating_sub(1));
    }

    /// Extract the currently selected text, reading live grid rows and
    /// scrollback rows as needed and joining them with the copy algorithm's
    /// trailing-space trim.
    pub fn selected_text(&self) -> Option<String> {
        let grid = self.active_grid();
        let columns = grid.width();
        let (start, end) = self.selection.ordered(columns)?;
        let history_len = self.history.len() as i64;
        let mut rows = Vec::new();
        let mut r = start.row;
        while r <= end.row {
            let cells: &[Cell] = if r < 0 {
                let idx = history_len + r;
                if idx < 0 || idx as usize >= self.history.len() {
                    r += 1;
                    continue;
                }
                self.history.row(idx as usize)
            } else if (r as u16) < grid.height() {
                grid.row(r as u16)
            } else {
                r += 1;
                continue;
            };
            let from_col = if r == start.row { start.col } else { 0 };
            let to_col = if r == end.row { end.col } else { columns.saturating_sub(1) };
            let to_col = (to_col as usize).min(cells.len().saturating_sub(1));
            let text: String = cells[from_col as usize..=to_col]
                .iter()
                .map(|c| char::from_u32(c.codepoint).filter(|&c| c != '\0').unwrap_or(' '))
                .collect();
            rows.push(text);
            r += 1;
        }
        Some(crate::terminal::selection::rows_to_text(&rows))
    }

    pub fn enter_alt_screen(&mut self) {
        if self.using_alt {
            return;
        }
        let (cols, rows) = (self.primary.width(), self.primary.height());
        self.alternate = Some(Grid::new(cols, rows, self.palette.default_fg, self.palette.default_bg));
        self.using_alt = true;
        self.modes.alt_screen = true;
    }

    pub fn leave_alt_screen(&mut self) {
        self.alternate = None;
        self.using_alt = false;
        self.modes.alt_screen = false;
    }

    /// Rewrite every cell/attribute snapshot referencing `old` on the
    /// foreground channel to `new` (OSC 10/4 recolor contract).
    pub fn recolor_fg(&mut self, old: (u8, u8, u8), new: (u8, u8, u8)) {
        self.primary.recolor_fg(old, new);
        if let Some(alt) = self.alternate.as_mut() {
            alt.recolor_fg(old, new);
        }
        self.history.recolor_fg(old, new);
        if self.attrs.use_default_fg || self.attrs.fg == old {
            self.attrs.fg = new;
        }
    }

    pub fn recolor_bg(&mut self, old: (u8, u8, u8), new: (u8, u8, u8)) {
        self.primary.recolor_bg(old, new);
        if let Some(alt) = self.alternate.as_mut() {
            alt.recolor_bg(old, new);
        }
        self.history.recolor_bg(old, new);
        if self.attrs.use_default_bg || self.attrs.bg == old {
            self.attrs.bg = new;
        }
    }

    pub fn scroll_view(&mut self, delta: i64) {
        let max = self.history.len();
        let new = self.scroll_offset as i64 + delta;
        self.scroll_offset = new.clamp(0, max as i64) as usize;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_char_advances_cursor_and_uses_current_attrs() {
        let mut t = Terminal::new(10, 4, 100);
        t.attrs.fg = (1, 2, 3);
        t.print_char('x');
        assert_eq!(t.primary.cursor_col, 1);
        assert_eq!(t.primary.cell(0, 0).fg, (1, 2, 3));
    }

    #[test]
    fn linefeed_at_bottom_pushes_into_history() {
        let mut t = Terminal::new(5, 2, 10);
        t.print_char('a');
        t.primary.cursor_row = 1;
        t.primary.cursor_col = 0;
        t.linefeed();
        assert_eq!(t.history.len(), 1);
        assert_eq!(t.history.row(0)[0].codepoint, 'a' as u32);
    }

    #[test]
    fn alt_screen_does_not_feed_history() {
        let mut t = Terminal::new(5, 2, 10);
        t.enter_alt_screen();
        t.print_char('a');
        t.primary.cursor_row = 1;
        t.active_grid_mut().cursor_row = 1;
        t.linefeed();
        assert_eq!(t.history.len(), 0);
    }

    #[test]
    fn recolor_fg_updates_cells_history_and_current_attrs() {
        let mut t = Terminal::new(5, 2, 10);
        let old_default = t.palette.default_fg;
        t.print_char('a');
        t.primary.cursor_row = 1;
        t.linefeed();
        t.recolor_fg(old_default, (9, 9, 9));
        assert_eq!(t.history.row(0)[0].fg, (9, 9, 9));
        assert_eq!(t.attrs.fg, (9, 9, 9));
    }

    #[test]
    fn dec_special_graphics_maps_q_to_horizontal_line() {
        assert_eq!(dec_special_graphics(b'q'), Some('\u{2500}'));
    }

    #[test]
    fn selected_text_spans_a_single_live_row() {
        let mut t = Terminal::new(10, 2, 10);
        for c in "hello".chars() {
            t.print_char(c);
        }
        t.selection.begin(0, 0);
        t.selection.extend_to(0, 4);
        assert_eq!(t.selected_text().as_deref(), Some("hello"));
    }

    #[test]
    fn selected_text_reads_scrollback_rows_by_negative_index() {
        let mut t = Terminal::new(5, 2, 10);
        let blank = Cell::blank((255, 255, 255), (0, 0, 0));
        let hist_row = vec![
            Cell { codepoint: 'a' as u32, ..blank },
            Cell { codepoint: 'b' as u32, ..blank },
            blank,
            blank,
            blank,
        ];
        t.history.push(&hist_row);
        for c in "cd".chars() {
            t.print_char(c);
        }
        // Row -1 addresses the single most recent scrollback row; row 0 is
        // the current screen's top row.
        t.selection.begin(-1, 0);
        t.selection.extend_to(0, 1);
        assert_eq!(t.selected_text().as_deref(), Some("ab\ncd"));
    }

    #[test]
    fn resize_clamps_selection_into_the_new_grid_bounds() {
        let mut t = Terminal::new(10, 5, 10);
        t.selection.begin(-2, 8);
        t.selection.extend_to(4, 9);
        t.resize(4, 3);
        let (start, end) = t.selection.ordered(4).unwrap();
        assert_eq!(start.row, 0);
        assert_eq!(start.col, 3);
        assert_eq!(end.row, 2);
        assert_eq!(end.col, 3);
    }
}
