//! Scrollback history (C2): a flat ring buffer of cells rather than a
//! `VecDeque` of per-row allocations. Only full-height scrolls of the
//! primary screen ever push into this; the alternate screen never touches
//! it.

use super::cell::Cell;

pub struct ScrollbackRing {
    cols: u16,
    capacity: usize,
    buf: Vec<Cell>,
    /// Index of the oldest logical row within `buf`, in row units.
    start: usize,
    /// Number of rows currently stored, <= capacity.
    len: usize,
}

impl ScrollbackRing {
    pub fn new(cols: u16, capacity: usize) -> Self {
        let blank = Cell::blank((0xe5, 0xe5, 0xe5), (0, 0, 0));
        Self {
            cols,
            capacity,
            buf: vec![blank; cols as usize * capacity],
            start: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn cols(&self) -> u16 {
        self.cols
    }

    fn slot(&self, logical_row: usize) -> usize {
        (self.start + logical_row) % self.capacity
    }

    /// Row `0` is the oldest entry, `len - 1` the most recently pushed.
    pub fn row(&self, logical_row: usize) -> &[Cell] {
        let w = self.cols as usize;
        let slot = self.slot(logical_row) * w;
        &self.buf[slot..slot + w]
    }

    fn row_mut(&mut self, slot: usize) -> &mut [Cell] {
        let w = self.cols as usize;
        let s = slot * w;
        &mut self.buf[s..s + w]
    }

    /// Push a row (width must equal `cols`) onto the newest end, evicting the
    /// oldest row if at capacity.
    pub fn push(&mut self, row: &[Cell]) {
        if self.capacity == 0 {
            return;
        }
        debug_assert_eq!(row.len(), self.cols as usize);
        let target = if self.len < self.capacity {
            let s = self.slot(self.len);
            self.len += 1;
            s
        } else {
            let s = self.start;
            self.start = (self.start + 1) % self.capacity;
            s
        };
        self.row_mut(target).copy_from_slice(row);
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.start = 0;
    }

    /// Rebuild for a new column count / capacity. A resize always drops
    /// scroll-back outright rather than re-wrapping it into the new width —
    /// there is no retained content to reflow.
    pub fn resize(&mut self, new_cols: u16, new_capacity: usize, blank: Cell) {
        self.cols = new_cols;
        self.capacity = new_capacity;
        self.buf = vec![blank; new_cols as usize * new_capacity];
        self.start = 0;
        self.len = 0;
    }

    /// Rewrite every cell's fg matching `old` to `new` (OSC 10 recolor
    /// contract extended to history).
    pub fn recolor_fg(&mut self, old: (u8, u8, u8), new: (u8, u8, u8)) {
        for c in self.buf.iter_mut() {
            if c.fg == old {
                c.fg = new;
            }
        }
    }

    pub fn recolor_bg(&mut self, old: (u8, u8, u8), new: (u8, u8, u8)) {
        for c in self.buf.iter_mut() {
            if c.bg == old {
                c.bg = new;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_of(cp: u32, cols: u16) -> Vec<Cell> {
        vec![Cell { codepoint: cp, ..Cell::blank((255, 255, 255), (0, 0, 0)) }; cols as usize]
    }

    #[test]
    fn push_past_capacity_evicts_oldest() {
        let mut r = ScrollbackRing::new(4, 3);
        r.push(&row_of(1, 4));
        r.push(&row_of(2, 4));
        r.push(&row_of(3, 4));
        r.push(&row_of(4, 4));
        assert_eq!(r.len(), 3);
        assert_eq!(r.row(0)[0].codepoint, 2);
        assert_eq!(r.row(2)[0].codepoint, 4);
    }

    #[test]
    fn resize_drops_all_existing_rows() {
        let mut r = ScrollbackRing::new(4, 5);
        for i in 1..=5u32 {
            r.push(&row_of(i, 4));
        }
        let blank = Cell::blank((255, 255, 255), (0, 0, 0));
        r.resize(4, 2, blank);
        assert_eq!(r.len(), 0);
        assert_eq!(r.capacity(), 2);
    }

    #[test]
    fn recolor_fg_rewrites_matching_cells_only() {
        let mut r = ScrollbackRing::new(2, 2);
        r.push(&vec![
            Cell { codepoint: 'a' as u32, fg: (1, 1, 1), bg: (0, 0, 0), style: Default::default() },
            Cell { codepoint: 'b' as u32, fg: (9, 9, 9), bg: (0, 0, 0), style: Default::default() },
        ]);
        r.recolor_fg((1, 1, 1), (2, 2, 2));
        assert_eq!(r.row(0)[0].fg, (2, 2, 2));
        assert_eq!(r.row(0)[1].fg, (9, 9, 9));
    }
}
