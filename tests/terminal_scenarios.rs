//! End-to-end scenarios feeding raw byte streams through `vte::Parser` +
//! `Terminal` with no PTY or window involved, matching the "parser must be
//! unit-testable without a PTY" design split.

use squall_lib::input::{self, Modifiers, MouseButton, MouseEventKind};
use squall_lib::terminal::selection::rows_to_text;
use squall_lib::terminal::{MouseEncoding, MouseTrackingMode, Terminal};

fn feed(t: &mut Terminal, parser: &mut vte::Parser, bytes: &[u8]) {
    for b in bytes {
        parser.advance(t, *b);
    }
}

#[test]
fn plain_wrap_fills_second_row_and_parks_cursor() {
    let mut t = Terminal::new(5, 2, 10);
    let mut parser = vte::Parser::new();
    feed(&mut t, &mut parser, b"ABCDE FGH");

    let row0: Vec<u32> = t.primary.row(0).iter().map(|c| c.codepoint).collect();
    assert_eq!(row0, [b'A', b'B', b'C', b'D', b'E'].map(|b| b as u32));

    let row1: Vec<u32> = t.primary.row(1).iter().map(|c| c.codepoint).collect();
    assert_eq!(row1, [b' ', b'F', b'G', b'H', 0].map(|b| b as u32));

    assert_eq!((t.primary.cursor_row, t.primary.cursor_col), (1, 4));
}

#[test]
fn scroll_and_history_keeps_last_two_lines_live_and_two_in_scrollback() {
    let mut t = Terminal::new(3, 2, 4);
    let mut parser = vte::Parser::new();
    feed(&mut t, &mut parser, b"aaa\r\nbbb\r\nccc\r\nddd");

    let row0: String = t.primary.row(0).iter().map(|c| char::from_u32(c.codepoint).unwrap_or(' ')).collect();
    let row1: String = t.primary.row(1).iter().map(|c| char::from_u32(c.codepoint).unwrap_or(' ')).collect();
    assert_eq!(row0, "ccc");
    assert_eq!(row1, "ddd");

    assert_eq!(t.history.len(), 2);
    let hist0: String = t.history.row(0).iter().map(|c| char::from_u32(c.codepoint).unwrap_or(' ')).collect();
    let hist1: String = t.history.row(1).iter().map(|c| char::from_u32(c.codepoint).unwrap_or(' ')).collect();
    assert_eq!(hist0, "aaa");
    assert_eq!(hist1, "bbb");

    assert_eq!(t.scroll_offset, 0);
}

#[test]
fn cursor_and_color_survive_an_alt_screen_round_trip() {
    let mut t = Terminal::new(10, 10, 10);
    let mut parser = vte::Parser::new();
    // Position the cursor at (2,4) in 1-based CSI H coordinates and set red fg.
    feed(&mut t, &mut parser, b"\x1b[3;5H\x1b[31m");
    let red = t.attrs.fg;
    assert_eq!(t.primary.cell(2, 4).fg, (0, 0, 0)); // unwritten cell still default
    assert_eq!(red, t.palette.get(1));

    feed(&mut t, &mut parser, b"\x1b[?1049h\x1b[H\x1b[3J\x1b[?1049l");

    assert!(!t.using_alt);
    assert_eq!((t.primary.cursor_row, t.primary.cursor_col), (2, 4));
    assert_eq!(t.attrs.fg, red);
    // Primary content at the saved position was never touched by the alt-screen clear.
    assert_eq!(t.primary.cell(2, 4).codepoint, 0);
}

#[test]
fn sgr_palette_roundtrip_recolors_existing_cells_but_not_reset_ones() {
    let mut t = Terminal::new(10, 4, 10);
    let mut parser = vte::Parser::new();
    feed(&mut t, &mut parser, b"\x1b[38;5;196mX");
    assert_eq!(t.primary.cell(0, 0).fg, t.palette.get(196));

    feed(&mut t, &mut parser, b"\x1b]4;196;#00FF00\x07");
    assert_eq!(t.primary.cell(0, 0).fg, (0x00, 0xFF, 0x00));

    feed(&mut t, &mut parser, b"\x1b[39mY");
    assert_eq!(t.primary.cell(0, 1).fg, t.palette.default_fg);
    assert_ne!(t.primary.cell(0, 1).fg, (0x00, 0xFF, 0x00));
}

#[test]
fn mouse_report_encodes_sgr_press_and_release_with_shift() {
    let mods = Modifiers { shift: true, alt: false, ctrl: false, alt_gr: false };
    let press = input::encode_mouse(
        MouseEventKind::Press,
        MouseButton::Left,
        10,
        5,
        mods,
        MouseTrackingMode::Normal,
        MouseEncoding::Sgr,
    )
    .unwrap();
    assert_eq!(press, b"\x1b[<4;11;6M");

    let release = input::encode_mouse(
        MouseEventKind::Release,
        MouseButton::Left,
        10,
        5,
        mods,
        MouseTrackingMode::Normal,
        MouseEncoding::Sgr,
    )
    .unwrap();
    assert_eq!(release, b"\x1b[<4;11;6m");
}

#[test]
fn selection_copy_joins_rows_and_trims_trailing_padding() {
    let mut t = Terminal::new(6, 2, 10);
    let mut parser = vte::Parser::new();
    feed(&mut t, &mut parser, b"hello \r\nworld");

    t.selection.begin(0, 0);
    t.selection.extend_to(1, 5);
    assert!(t.selection.contains(0, 0, 6));
    assert!(t.selection.contains(1, 5, 6));

    let row0: String = t.primary.row(0).iter().map(|c| char::from_u32(c.codepoint).unwrap_or(' ')).collect();
    let row1: String = t.primary.row(1).iter().map(|c| char::from_u32(c.codepoint).unwrap_or(' ')).collect();
    assert_eq!(rows_to_text(&[row0, row1]), "hello\nworld");
}
