//! The terminal model (C2/C3/C4/C8): screen grids, scrollback, palette,
//! mode flags, selection, and the VT parser that drives them all.

pub mod cell;
pub mod color;
pub mod cursor;
pub mod grid;
pub mod modes;
mod parser;
pub mod scrollback;
pub mod selection;
pub mod state;

pub use cell::{AttributeState, Cell, StyleFlags};
pub use color::{Palette, Rgb};
pub use cursor::{BlinkClock, CursorShape};
pub use grid::Grid;
pub use modes::{MouseEncoding, MouseTrackingMode, TerminalModes};
pub use scrollback::ScrollbackRing;
pub use selection::Selection;
pub use state::Terminal;
