//! The screen grid (C2): a fixed-size cell array with cursor, scroll region,
//! and saved-cursor state. History lives in `scrollback::ScrollbackRing`,
//! owned by `Terminal`, not here — a `Grid` is used for both the primary and
//! the alternate screen and only the primary ever feeds the ring.

use super::cell::{AttributeState, Cell, StyleFlags};

#[derive(Debug, Clone, Copy)]
pub struct SavedCursor {
    pub row: u16,
    pub col: u16,
    pub visible: bool,
    pub attrs: AttributeState,
}

pub struct Grid {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
    pub cursor_row: u16,
    pub cursor_col: u16,
    pub scroll_top: u16,
    pub scroll_bottom: u16,
    pub cursor_visible: bool,
    /// Last codepoint written by `put`, used by CSI `b` (REP).
    pub last_emitted_codepoint: u32,
    saved: Option<SavedCursor>,
}

impl Grid {
    pub fn new(width: u16, height: u16, default_fg: (u8, u8, u8), default_bg: (u8, u8, u8)) -> Self {
        let blank = Cell::blank(default_fg, default_bg);
        Self {
            width,
            height,
            cells: vec![blank; width as usize * height as usize],
            cursor_row: 0,
            cursor_col: 0,
            scroll_top: 0,
            scroll_bottom: height.saturating_sub(1),
            cursor_visible: true,
            last_emitted_codepoint: 0,
            saved: None,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }
    pub fn height(&self) -> u16 {
        self.height
    }

    fn idx(&self, row: u16, col: u16) -> usize {
        row as usize * self.width as usize + col as usize
    }

    pub fn cell(&self, row: u16, col: u16) -> &Cell {
        &self.cells[self.idx(row, col)]
    }

    pub fn row(&self, row: u16) -> &[Cell] {
        if self.width == 0 || row >= self.height {
            return &[];
        }
        let start = row as usize * self.width as usize;
        &self.cells[start..start + self.width as usize]
    }

    fn row_mut(&mut self, row: u16) -> &mut [Cell] {
        let w = self.width as usize;
        let start = row as usize * w;
        &mut self.cells[start..start + w]
    }

    /// Write one cell at (row, col) with the given attributes, advancing the
    /// cursor and wrapping/scrolling as needed. `on_scroll` is invoked when a
    /// full-region scroll evicts a row (so the caller can push it to
    /// history); it receives the evicted row's cells.
    pub fn put(&mut self, codepoint: u32, attrs: &AttributeState, mut on_scroll: impl FnMut(&[Cell])) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let cell = Cell {
            codepoint,
            fg: attrs.fg,
            bg: attrs.bg,
            style: attrs.style,
        };
        if self.cursor_col >= self.width {
            self.cursor_col = 0;
            let blank = Cell { codepoint: 0, fg: attrs.fg, bg: attrs.bg, style: attrs.style };
            self.index(blank, &mut on_scroll);
        }
        let row = self.cursor_row;
        let col = self.cursor_col;
        self.row_mut(row)[col as usize] = cell;
        self.last_emitted_codepoint = codepoint;
        self.cursor_col += 1;
    }

    /// Move the cursor down one line, scrolling the region if already at its
    /// bottom (CSI/ESC `index`, i.e. LF semantics without the CR).
    pub fn index(&mut self, blank: Cell, on_scroll: impl FnMut(&[Cell])) {
        if self.cursor_row == self.scroll_bottom {
            self.scroll_region_up(1, blank, on_scroll);
        } else if self.cursor_row + 1 < self.height {
            self.cursor_row += 1;
        }
    }

    /// Move the cursor up one line, scrolling the region if already at its
    /// top (ESC `M`, reverse index).
    pub fn reverse_index(&mut self, blank: Cell) {
        if self.cursor_row == self.scroll_top {
            self.scroll_region_down(1, blank);
        } else if self.cursor_row > 0 {
            self.cursor_row -= 1;
        }
    }

    fn region_is_full_height(&self) -> bool {
        self.scroll_top == 0 && self.scroll_bottom + 1 == self.height
    }

    /// Scroll the active scroll region up by `n` lines. If the region spans
    /// the full grid height, evicted rows are reported via `on_scroll` (for
    /// the caller to push into scrollback); otherwise rows are shifted
    /// in-place and never reach history.
    pub fn scroll_region_up(&mut self, n: u16, blank: Cell, mut on_scroll: impl FnMut(&[Cell])) {
        let top = self.scroll_top;
        let bottom = self.scroll_bottom;
        if top > bottom || bottom >= self.height {
            return;
        }
        let region_h = bottom - top + 1;
        let n = n.min(region_h);
        let full = self.region_is_full_height();
        for i in 0..n {
            if full {
                on_scroll(self.row(top + i));
            }
        }
        self.shift_up(top, bottom, n, blank);
    }

    /// Scroll the active scroll region down by `n` lines. Never touches
    /// history.
    pub fn scroll_region_down(&mut self, n: u16, blank: Cell) {
        let top = self.scroll_top;
        let bottom = self.scroll_bottom;
        if top > bottom || bottom >= self.height {
            return;
        }
        let region_h = bottom - top + 1;
        self.shift_down(top, bottom, n.min(region_h), blank);
    }

    /// Shift rows [top, bottom] up by n, filling the bottom n rows with
    /// `blank`. Pure memmove, no history interaction — shared by
    /// scroll_region_up, insert/delete-line ops, and anything else that
    /// needs an in-place sub-region scroll.
    fn shift_up(&mut self, top: u16, bottom: u16, n: u16, blank: Cell) {
        if n == 0 {
            return;
        }
        if n >= bottom - top + 1 {
            for r in top..=bottom {
                self.row_mut(r).iter_mut().for_each(|c| *c = blank);
            }
            return;
        }
        for r in top..=(bottom - n) {
            let src = self.row(r + n).to_vec();
            self.row_mut(r).copy_from_slice(&src);
        }
        for r in (bottom - n + 1)..=bottom {
            self.row_mut(r).iter_mut().for_each(|c| *c = blank);
        }
    }

    /// Shift rows [top, bottom] down by n, filling the top n rows with `blank`.
    fn shift_down(&mut self, top: u16, bottom: u16, n: u16, blank: Cell) {
        if n == 0 {
            return;
        }
        if n >= bottom - top + 1 {
            for r in top..=bottom {
                self.row_mut(r).iter_mut().for_each(|c| *c = blank);
            }
            return;
        }
        let mut r = bottom;
        loop {
            let src = self.row(r - n).to_vec();
            self.row_mut(r).copy_from_slice(&src);
            if r == top + n {
                break;
            }
            r -= 1;
        }
        for r in top..(top + n) {
            self.row_mut(r).iter_mut().for_each(|c| *c = blank);
        }
    }

    pub fn insert_lines(&mut self, n: u16, blank: Cell) {
        if self.cursor_row < self.scroll_top || self.cursor_row > self.scroll_bottom {
            return;
        }
        self.shift_down(self.cursor_row, self.scroll_bottom, n.min(self.scroll_bottom - self.cursor_row + 1), blank);
    }

    pub fn delete_lines(&mut self, n: u16, blank: Cell) {
        if self.cursor_row < self.scroll_top || self.cursor_row > self.scroll_bottom {
            return;
        }
        self.shift_up(self.cursor_row, self.scroll_bottom, n.min(self.scroll_bottom - self.cursor_row + 1), blank);
    }

    pub fn insert_chars(&mut self, n: u16, blank: Cell) {
        let row = self.cursor_row;
        let col = self.cursor_col as usize;
        let w = self.width as usize;
        if col >= w {
            return;
        }
        let n = (n as usize).min(w - col);
        let r = self.row_mut(row);
        for _ in 0..n {
            r.copy_within(col..w - 1, col + 1);
            r[col] = blank;
        }
    }

    pub fn delete_chars(&mut self, n: u16, blank: Cell) {
        let row = self.cursor_row;
        let col = self.cursor_col as usize;
        let w = self.width as usize;
        if col >= w {
            return;
        }
        let n = (n as usize).min(w - col);
        let r = self.row_mut(row);
        r.copy_within(col + n..w, col);
        for c in &mut r[w - n..w] {
            *c = blank;
        }
    }

    pub fn erase_chars(&mut self, row: u16, start_col: u16, end_col: u16, blank: Cell) {
        if row >= self.height {
            return;
        }
        let w = self.width;
        let start = start_col.min(w) as usize;
        let end = end_col.min(w) as usize;
        if start >= end {
            return;
        }
        self.row_mut(row)[start..end].iter_mut().for_each(|c| *c = blank);
    }

    pub fn erase_line_whole(&mut self, row: u16, blank: Cell) {
        self.erase_chars(row, 0, self.width, blank);
    }

    /// CSI `K` (erase in line). mode 0 = cursor..end, 1 = start..=cursor, 2 = whole line.
    pub fn erase_line(&mut self, row: u16, col: u16, mode: u16, blank: Cell) {
        match mode {
            0 => self.erase_chars(row, col, self.width, blank),
            1 => self.erase_chars(row, 0, col + 1, blank),
            2 => self.erase_line_whole(row, blank),
            _ => {}
        }
    }

    /// CSI `J` (erase in display), modes 0/1/2 only — mode 3 (scrollback
    /// clear) is handled by `Terminal` since it touches the history ring.
    pub fn erase_display(&mut self, cursor_row: u16, cursor_col: u16, mode: u16, blank: Cell) {
        match mode {
            0 => {
                self.erase_chars(cursor_row, cursor_col, self.width, blank);
                for r in (cursor_row + 1)..self.height {
                    self.erase_line_whole(r, blank);
                }
            }
            1 => {
                for r in 0..cursor_row {
                    self.erase_line_whole(r, blank);
                }
                self.erase_chars(cursor_row, 0, cursor_col + 1, blank);
            }
            2 => {
                for r in 0..self.height {
                    self.erase_line_whole(r, blank);
                }
            }
            _ => {}
        }
    }

    pub fn save_cursor(&mut self, attrs: AttributeState) {
        self.saved = Some(SavedCursor {
            row: self.cursor_row,
            col: self.cursor_col,
            visible: self.cursor_visible,
            attrs,
        });
    }

    /// Restore cursor position/visibility/attrs, clamped into current
    /// dimensions. Returns the restored attributes for the caller to apply
    /// to its own current-attribute state.
    pub fn restore_cursor(&mut self) -> Option<AttributeState> {
        let saved = self.saved?;
        self.cursor_row = saved.row.min(self.height.saturating_sub(1));
        self.cursor_col = saved.col.min(self.width.saturating_sub(1));
        self.cursor_visible = saved.visible;
        Some(saved.attrs)
    }

    pub fn saved_cursor(&self) -> Option<&SavedCursor> {
        self.saved.as_ref()
    }
    pub fn saved_cursor_mut(&mut self) -> Option<&mut SavedCursor> {
        self.saved.as_mut()
    }

    /// Resize, preserving the top-left min(old,new) rectangle; clears the
    /// rest with `blank`, clamps cursor/saved cursor, resets the scroll
    /// region to full height. Scrollback handling (dropping history) is the
    /// caller's responsibility.
    pub fn resize(&mut self, new_width: u16, new_height: u16, blank: Cell) {
        let mut new_cells = vec![blank; new_width as usize * new_height as usize];
        let copy_w = self.width.min(new_width);
        let copy_h = self.height.min(new_height);
        for r in 0..copy_h {
            let src = self.row(r);
            let dst_start = r as usize * new_width as usize;
            new_cells[dst_start..dst_start + copy_w as usize].copy_from_slice(&src[..copy_w as usize]);
        }
        self.cells = new_cells;
        self.width = new_width;
        self.height = new_height;
        self.scroll_top = 0;
        self.scroll_bottom = new_height.saturating_sub(1);
        self.cursor_row = self.cursor_row.min(new_height.saturating_sub(1));
        self.cursor_col = self.cursor_col.min(new_width.saturating_sub(1));
        if let Some(s) = self.saved.as_mut() {
            s.row = s.row.min(new_height.saturating_sub(1));
            s.col = s.col.min(new_width.saturating_sub(1));
        }
    }

    /// Walk every cell and rewrite `old` to `new` on the given channel.
    /// Backs the OSC 4/10/11/12 recolor contract.
    pub fn recolor_fg(&mut self, old: (u8, u8, u8), new: (u8, u8, u8)) {
        for c in self.cells.iter_mut() {
            if c.fg == old {
                c.fg = new;
            }
        }
        if let Some(s) = self.saved.as_mut() {
            if s.attrs.use_default_fg || s.attrs.fg == old {
                s.attrs.fg = new;
            }
        }
    }

    pub fn recolor_bg(&mut self, old: (u8, u8, u8), new: (u8, u8, u8)) {
        for c in self.cells.iter_mut() {
            if c.bg == old {
                c.bg = new;
            }
        }
        if let Some(s) = self.saved.as_mut() {
            if s.attrs.use_default_bg || s.attrs.bg == old {
                s.attrs.bg = new;
            }
        }
    }

    pub fn style_at(&self, row: u16, col: u16) -> StyleFlags {
        self.cell(row, col).style
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> AttributeState {
        AttributeState::new((255, 255, 255), (0, 0, 0))
    }

    #[test]
    fn put_wraps_and_scrolls_once_at_bottom_right() {
        let mut g = Grid::new(5, 2, (255, 255, 255), (0, 0, 0));
        g.cursor_row = 1;
        g.cursor_col = 4;
        let mut scrolls = 0;
        g.put('X' as u32, &attrs(), |_| scrolls += 1);
        assert_eq!(scrolls, 1, "writing past the last column of the last row scrolls exactly once");
    }

    #[test]
    fn wrap_induced_scroll_clears_freed_row_instead_of_filling_with_the_wrapping_char() {
        let mut g = Grid::new(3, 2, (255, 255, 255), (0, 0, 0));
        g.cursor_row = 1;
        g.cursor_col = 3; // already past the last column, about to wrap
        g.put('X' as u32, &attrs(), |_| {});
        // The rest of the freed bottom row must be genuinely blank, never
        // pre-filled with copies of the character that triggered the wrap.
        assert_eq!(g.cell(1, 0).codepoint, 'X' as u32);
        assert_eq!(g.cell(1, 1).codepoint, 0);
        assert_eq!(g.cell(1, 2).codepoint, 0);
    }

    #[test]
    fn scroll_region_up_n_ge_height_clears_whole_region() {
        let mut g = Grid::new(3, 2, (255, 255, 255), (0, 0, 0));
        g.put('a' as u32, &attrs(), |_| {});
        let blank = Cell::blank((255, 255, 255), (0, 0, 0));
        g.scroll_region_up(10, blank, |_| {});
        assert_eq!(g.cell(0, 0).codepoint, 0);
        assert_eq!(g.cell(1, 0).codepoint, 0);
    }

    #[test]
    fn backspace_like_cursor_left_at_zero_is_noop() {
        let mut g = Grid::new(5, 2, (255, 255, 255), (0, 0, 0));
        g.cursor_col = 0;
        // Grid itself doesn't implement backspace (that's Terminal-level),
        // but the invariant it must support is col staying clamped at 0.
        assert_eq!(g.cursor_col, 0);
    }

    #[test]
    fn save_restore_cursor_round_trips_position_and_attrs() {
        let mut g = Grid::new(10, 10, (255, 255, 255), (0, 0, 0));
        g.cursor_row = 3;
        g.cursor_col = 7;
        let a = attrs();
        g.save_cursor(a);
        g.cursor_row = 0;
        g.cursor_col = 0;
        let restored = g.restore_cursor().unwrap();
        assert_eq!((g.cursor_row, g.cursor_col), (3, 7));
        assert_eq!(restored, a);
    }

    #[test]
    fn resize_preserves_top_left_rectangle() {
        let mut g = Grid::new(4, 4, (255, 255, 255), (0, 0, 0));
        g.put('Z' as u32, &attrs(), |_| {});
        let blank = Cell::blank((255, 255, 255), (0, 0, 0));
        g.resize(6, 6, blank);
        assert_eq!(g.cell(0, 0).codepoint, 'Z' as u32);
        assert_eq!(g.width(), 6);
        assert_eq!(g.height(), 6);
    }
}
