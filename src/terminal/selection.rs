//! Text selection and the system clipboard bridge (C8), via `arboard`.
//! Anchor and caret live in global row×col coordinates (history-aware);
//! the ordered range is linearized as `row * columns + col` so a
//! backward drag normalizes to the same range as a forward one.

use anyhow::{Context, Result};

/// Row coordinates are signed and counted from the top of scrollback
/// (negative = scrollback, 0.. = current screen), so a drag that scrolls
/// the view doesn't need remapping mid-gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub row: i64,
    pub col: u16,
}

#[derive(Debug, Default)]
pub struct Selection {
    anchor: Option<Point>,
    head: Option<Point>,
    pub dragging: bool,
}

impl Selection {
    pub fn begin(&mut self, row: i64, col: u16) {
        self.anchor = Some(Point { row, col });
        self.head = Some(Point { row, col });
        self.dragging = true;
    }

    pub fn extend_to(&mut self, row: i64, col: u16) {
        if self.anchor.is_some() {
            self.head = Some(Point { row, col });
        }
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
    }

    pub fn clear(&mut self) {
        self.anchor = None;
        self.head = None;
        self.dragging = false;
    }

    pub fn is_active(&self) -> bool {
        self.anchor.is_some() && self.head.is_some()
    }

    /// Clamp both endpoints into `[min_row, max_row] x [0, max_col]` after a
    /// resize or a history reset invalidates whatever they used to point at.
    pub fn validate(&mut self, min_row: i64, max_row: i64, max_col: u16) {
        let clamp = |p: Point| Point { row: p.row.clamp(min_row, max_row), col: p.col.min(max_col) };
        if let Some(a) = self.anchor {
            self.anchor = Some(clamp(a));
        }
        if let Some(h) = self.head {
            self.head = Some(clamp(h));
        }
    }

    /// Ordered (start, end) endpoints, linearized by `row * columns + col`
    /// so start <= end regardless of drag direction.
    pub fn ordered(&self, columns: u16) -> Option<(Point, Point)> {
        let a = self.anchor?;
        let h = self.head?;
        let linear = |p: Point| p.row * columns as i64 + p.col as i64;
        if linear(a) <= linear(h) {
            Some((a, h))
        } else {
            Some((h, a))
        }
    }

    /// True if (row, col) falls within the ordered selection range.
    pub fn contains(&self, row: i64, col: u16, columns: u16) -> bool {
        let Some((start, end)) = self.ordered(columns) else { return false };
        let linear = row * columns as i64 + col as i64;
        let s = start.row * columns as i64 + start.col as i64;
        let e = end.row * columns as i64 + end.col as i64;
        linear >= s && linear <= e
    }
}

/// Join extracted row text into a clipboard-ready string: each row is
/// trimmed of trailing spaces (cell padding, not real content) and rows are
/// newline-joined.
pub fn rows_to_text(rows: &[String]) -> String {
    rows.iter()
        .map(|r| r.trim_end_matches(' '))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new().context("opening system clipboard")?;
    clipboard.set_text(text.to_owned()).context("writing to system clipboard")?;
    Ok(())
}

pub fn paste_from_clipboard() -> Result<String> {
    let mut clipboard = arboard::Clipboard::new().context("opening system clipboard")?;
    clipboard.get_text().context("reading from system clipboard")
}

/// Wrap pasted text for bracketed-paste mode (ESC [ 200 ~ ... ESC [ 201 ~).
pub fn bracket_paste(text: &str) -> String {
    format!("\x1b[200~{text}\x1b[201~")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_normalizes_backward_drag() {
        let mut s = Selection::default();
        s.begin(2, 5);
        s.extend_to(0, 1);
        let (start, end) = s.ordered(80).unwrap();
        assert_eq!(start, Point { row: 0, col: 1 });
        assert_eq!(end, Point { row: 2, col: 5 });
    }

    #[test]
    fn contains_is_inclusive_of_both_endpoints() {
        let mut s = Selection::default();
        s.begin(0, 2);
        s.extend_to(0, 5);
        assert!(s.contains(0, 2, 80));
        assert!(s.contains(0, 5, 80));
        assert!(!s.contains(0, 6, 80));
        assert!(!s.contains(0, 1, 80));
    }

    #[test]
    fn rows_to_text_trims_trailing_padding_only() {
        let rows = vec!["hi   ".to_string(), " there  ".to_string()];
        assert_eq!(rows_to_text(&rows), "hi\n there");
    }

    #[test]
    fn bracket_paste_wraps_in_markers() {
        assert_eq!(bracket_paste("x"), "\x1b[200~x\x1b[201~");
    }
}
