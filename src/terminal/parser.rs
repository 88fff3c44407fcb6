//! The `vte::Perform` implementation: translates the CSI/OSC/ESC dispatch
//! tables into `Terminal` operations, restricted to a closed set of
//! supported sequences — any other SGR/OSC/CSI code is silently ignored.
//! The parser never fails externally; malformed input is absorbed here.

use vte::{Params, Perform};

use super::cell::StyleFlags;
use super::color::Rgb;
use super::modes::{MouseEncoding, MouseTrackingMode};
use super::state::Terminal;

fn params_vec(params: &Params) -> Vec<u16> {
    params.iter().map(|group| *group.first().unwrap_or(&0)).collect()
}

fn p(params: &[u16], i: usize, default: u16) -> u16 {
    match params.get(i) {
        Some(&0) | None => default,
        Some(&v) => v,
    }
}

fn parse_color_spec(bytes: &[u8]) -> Option<Rgb> {
    let s = std::str::from_utf8(bytes).ok()?;
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex_rgb(hex);
    }
    if let Some(rest) = s.strip_prefix("rgb:") {
        let mut parts = rest.split('/');
        let r = parse_component(parts.next()?)?;
        let g = parse_component(parts.next()?)?;
        let b = parse_component(parts.next()?)?;
        return Some((r, g, b));
    }
    None
}

fn parse_component(hex: &str) -> Option<u8> {
    let v = u32::from_str_radix(hex, 16).ok()?;
    let max = (1u32 << (hex.len() * 4)) - 1;
    Some(((v * 255) / max.max(1)) as u8)
}

fn parse_hex_rgb(hex: &str) -> Option<Rgb> {
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

fn format_color_spec(rgb: Rgb) -> String {
    format!("rgb:{:02x}/{:02x}/{:02x}", rgb.0, rgb.1, rgb.2)
}

impl Perform for Terminal {
    fn print(&mut self, c: char) {
        self.print_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x07 => self.bell_pending = true,
            0x08 => {
                let g = self.active_grid_mut();
                if g.cursor_col > 0 {
                    g.cursor_col -= 1;
                }
            }
            0x09 => {
                let g = self.active_grid_mut();
                let next_stop = ((g.cursor_col / 8) + 1) * 8;
                g.cursor_col = next_stop.min(g.width().saturating_sub(1));
            }
            0x0a | 0x0b | 0x0c => self.linefeed(),
            0x0d => self.active_grid_mut().cursor_col = 0,
            0x0e => self.shift_out(),
            0x0f => self.shift_in(),
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}
    fn put(&mut self, _byte: u8) {}
    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        let Some(code) = params.first().and_then(|s| std::str::from_utf8(s).ok()) else { return };
        match code {
            "0" | "2" => {
                if let Some(title) = params.get(1).and_then(|s| std::str::from_utf8(s).ok()) {
                    self.title = title.to_owned();
                }
            }
            "4" => {
                let mut i = 1;
                while i + 1 < params.len() {
                    if let Ok(idx) = std::str::from_utf8(params[i]).unwrap_or("").parse::<u8>() {
                        if params[i + 1] == b"?" {
                            let rgb = self.palette.get(idx);
                            self.queue_reply(&format!("\x1b]4;{idx};{}\x07", format_color_spec(rgb)));
                        } else if let Some(rgb) = parse_color_spec(params[i + 1]) {
                            let old = self.palette.set(idx, rgb);
                            self.recolor_fg(old, rgb);
                            self.recolor_bg(old, rgb);
                        }
                    }
                    i += 2;
                }
            }
            "10" | "11" | "12" => {
                let query = params.get(1).map(|s| *s == b"?").unwrap_or(false);
                if query {
                    let rgb = match code {
                        "10" => self.palette.default_fg,
                        "11" => self.palette.default_bg,
                        _ => self.palette.cursor_color,
                    };
                    self.queue_reply(&format!("\x1b]{code};{}\x07", format_color_spec(rgb)));
                } else if let Some(rgb) = params.get(1).and_then(|s| parse_color_spec(s)) {
                    match code {
                        "10" => {
                            let old = self.palette.default_fg;
                            self.palette.default_fg = rgb;
                            self.recolor_fg(old, rgb);
                        }
                        "11" => {
                            let old = self.palette.default_bg;
                            self.palette.default_bg = rgb;
                            self.recolor_bg(old, rgb);
                        }
                        _ => self.palette.cursor_color = rgb,
                    }
                }
            }
            "104" => {
                for (old, new) in self.palette.reset_first_16() {
                    self.recolor_fg(old, new);
                    self.recolor_bg(old, new);
                }
            }
            "110" => {
                let old = self.palette.default_fg;
                let new = super::color::Palette::builtin_default_fg();
                self.palette.default_fg = new;
                self.recolor_fg(old, new);
            }
            "111" => {
                let old = self.palette.default_bg;
                let new = super::color::Palette::builtin_default_bg();
                self.palette.default_bg = new;
                self.recolor_bg(old, new);
            }
            "112" => {
                self.palette.cursor_color = super::color::Palette::builtin_cursor_color();
            }
            "777" => {
                self.queue_overlay(params[1..].iter().map(|s| s.to_vec()).collect());
            }
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        let private = intermediates.first() == Some(&b'?');
        let ps = params_vec(params);

        if intermediates.first() == Some(&b' ') && action == 'q' {
            let (shape, blink) = super::cursor::CursorShape::from_decscusr(p(&ps, 0, 1));
            self.cursor_shape = shape;
            self.cursor_blink_enabled = blink;
            return;
        }

        if private {
            let set = action == 'h';
            if action == 'h' || action == 'l' {
                for &mode in &ps {
                    apply_private_mode(self, mode, set);
                }
            }
            return;
        }

        match action {
            'A' => move_cursor_row(self, -(p(&ps, 0, 1) as i32)),
            'B' => move_cursor_row(self, p(&ps, 0, 1) as i32),
            'C' => move_cursor_col(self, p(&ps, 0, 1) as i32),
            'D' => move_cursor_col(self, -(p(&ps, 0, 1) as i32)),
            'G' | '`' => {
                let col = p(&ps, 0, 1).saturating_sub(1);
                self.active_grid_mut().cursor_col = col.min(self.active_grid().width().saturating_sub(1));
            }
            'd' => {
                let row = p(&ps, 0, 1).saturating_sub(1);
                self.active_grid_mut().cursor_row = row.min(self.active_grid().height().saturating_sub(1));
            }
            'H' | 'f' => {
                let row = p(&ps, 0, 1).saturating_sub(1);
                let col = p(&ps, 1, 1).saturating_sub(1);
                let g = self.active_grid_mut();
                g.cursor_row = row.min(g.height().saturating_sub(1));
                g.cursor_col = col.min(g.width().saturating_sub(1));
            }
            'J' => {
                let mode = p(&ps, 0, 0);
                if mode == 3 {
                    self.history.clear();
                }
                // Mode 3 aliases mode 2: clear the whole screen in addition
                // to (or instead of) the scrollback.
                let display_mode = if mode == 3 { 2 } else { mode };
                let (row, col) = (self.active_grid().cursor_row, self.active_grid().cursor_col);
                let blank = current_blank(self);
                self.active_grid_mut().erase_display(row, col, display_mode, blank);
                if display_mode == 2 {
                    self.active_grid_mut().cursor_row = 0;
                    self.active_grid_mut().cursor_col = 0;
                }
            }
            'K' => {
                let mode = p(&ps, 0, 0);
                let (row, col) = (self.active_grid().cursor_row, self.active_grid().cursor_col);
                let blank = current_blank(self);
                self.active_grid_mut().erase_line(row, col, mode, blank);
            }
            'L' => {
                let n = p(&ps, 0, 1);
                let blank = current_blank(self);
                self.active_grid_mut().insert_lines(n, blank);
            }
            'M' => {
                let n = p(&ps, 0, 1);
                let blank = current_blank(self);
                self.active_grid_mut().delete_lines(n, blank);
            }
            'P' => {
                let n = p(&ps, 0, 1);
                let blank = current_blank(self);
                self.active_grid_mut().delete_chars(n, blank);
            }
            '@' => {
                let n = p(&ps, 0, 1);
                let blank = current_blank(self);
                self.active_grid_mut().insert_chars(n, blank);
            }
            'X' => {
                let n = p(&ps, 0, 1);
                let row = self.active_grid().cursor_row;
                let col = self.active_grid().cursor_col;
                let blank = current_blank(self);
                self.active_grid_mut().erase_chars(row, col, col + n, blank);
            }
            'S' => {
                let n = p(&ps, 0, 1);
                let blank = current_blank(self);
                scroll_up_with_history(self, n, blank);
            }
            'T' => {
                let n = p(&ps, 0, 1);
                let blank = current_blank(self);
                self.active_grid_mut().scroll_region_down(n, blank);
            }
            'b' => {
                let n = p(&ps, 0, 1);
                let cp = self.active_grid().last_emitted_codepoint;
                if cp != 0 {
                    for _ in 0..n {
                        self.print_char(char::from_u32(cp).unwrap_or(' '));
                    }
                }
            }
            'r' => {
                let g = self.active_grid_mut();
                let top = p(&ps, 0, 1).saturating_sub(1);
                let bottom = p(&ps, 1, g.height()).saturating_sub(1).min(g.height().saturating_sub(1));
                if top < bottom {
                    g.scroll_top = top;
                    g.scroll_bottom = bottom;
                } else {
                    g.scroll_top = 0;
                    g.scroll_bottom = g.height().saturating_sub(1);
                }
                g.cursor_row = 0;
                g.cursor_col = 0;
            }
            's' => {
                let attrs = self.attrs;
                self.active_grid_mut().save_cursor(attrs);
            }
            'u' => {
                if let Some(attrs) = self.active_grid_mut().restore_cursor() {
                    self.attrs = attrs;
                }
            }
            'm' => apply_sgr(self, &ps),
            'n' => {
                let code = p(&ps, 0, 0);
                if code == 6 {
                    let g = self.active_grid();
                    self.queue_reply(&format!("\x1b[{};{}R", g.cursor_row + 1, g.cursor_col + 1));
                } else if code == 5 {
                    self.queue_reply("\x1b[0n");
                }
            }
            'c' => {
                if intermediates.first() == Some(&b'>') {
                    self.queue_reply("\x1b[>0;95;0c");
                } else {
                    self.queue_reply("\x1b[?1;0c");
                }
            }
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        match (intermediates.first(), byte) {
            (None, b'D') => self.linefeed(),
            (None, b'M') => self.reverse_linefeed(),
            (None, b'E') => {
                self.active_grid_mut().cursor_col = 0;
                self.linefeed();
            }
            (None, b'7') => {
                let attrs = self.attrs;
                self.active_grid_mut().save_cursor(attrs);
                self.push_charset_state();
            }
            (None, b'8') => {
                if let Some(attrs) = self.active_grid_mut().restore_cursor() {
                    self.attrs = attrs;
                }
                self.pop_charset_state();
            }
            (None, b'c') => *self = Terminal::new(
                self.active_grid().width(),
                self.active_grid().height(),
                self.history.capacity(),
            ),
            (Some(b'('), d) => self.select_charset(0, d),
            (Some(b')'), d) => self.select_charset(1, d),
            _ => {}
        }
    }
}

fn current_blank(t: &Terminal) -> super::cell::Cell {
    super::cell::Cell {
        codepoint: 0,
        fg: t.attrs.fg,
        bg: t.attrs.bg,
        style: StyleFlags::empty(),
    }
}

fn move_cursor_row(t: &mut Terminal, delta: i32) {
    let g = t.active_grid_mut();
    let new = g.cursor_row as i32 + delta;
    g.cursor_row = new.clamp(0, g.height() as i32 - 1) as u16;
}

fn move_cursor_col(t: &mut Terminal, delta: i32) {
    let g = t.active_grid_mut();
    let new = g.cursor_col as i32 + delta;
    g.cursor_col = new.clamp(0, g.width() as i32 - 1) as u16;
}

/// CSI `S` (scroll up) acts on the whole active scroll region and, unlike
/// line-feed-driven scrolling, always uses the region boundaries — so it
/// shares the same history-eviction path as an overflow linefeed.
fn scroll_up_with_history(t: &mut Terminal, n: u16, blank: super::cell::Cell) {
    let using_alt = t.using_alt;
    let width = t.active_grid().width();
    let mut evicted = Vec::new();
    t.active_grid_mut().scroll_region_up(n, blank, |row| evicted.push(row.to_vec()));
    if !using_alt {
        for row in evicted {
            debug_assert_eq!(row.len(), width as usize);
            t.history.push(&row);
        }
    }
}

fn apply_private_mode(t: &mut Terminal, mode: u16, set: bool) {
    match mode {
        1 => t.modes.app_cursor = set,
        6 => t.modes.origin = set,
        7 => t.modes.autowrap = set,
        25 => t.active_grid_mut().cursor_visible = set,
        1000 => t.modes.mouse_tracking = if set { MouseTrackingMode::Normal } else { MouseTrackingMode::Off },
        1002 => t.modes.mouse_tracking = if set { MouseTrackingMode::Drag } else { MouseTrackingMode::Off },
        1003 => t.modes.mouse_tracking = if set { MouseTrackingMode::AnyMotion } else { MouseTrackingMode::Off },
        1006 => t.modes.mouse_encoding = if set { MouseEncoding::Sgr } else { MouseEncoding::Default },
        1004 => t.modes.focus_events = set,
        2004 => t.modes.bracketed_paste = set,
        2026 => t.modes.synchronized_output = set,
        47 | 1047 => {
            if set {
                t.enter_alt_screen();
            } else {
                t.leave_alt_screen();
            }
        }
        1049 => {
            if set {
                let attrs = t.attrs;
                t.primary.save_cursor(attrs);
                t.enter_alt_screen();
            } else {
                t.leave_alt_screen();
                if let Some(attrs) = t.primary.restore_cursor() {
                    t.attrs = attrs;
                }
            }
        }
        _ => {}
    }
}

fn apply_sgr(t: &mut Terminal, ps: &[u16]) {
    if ps.is_empty() {
        t.attrs.reset(t.palette.default_fg, t.palette.default_bg);
        return;
    }
    let mut i = 0;
    while i < ps.len() {
        match ps[i] {
            0 => t.attrs.reset(t.palette.default_fg, t.palette.default_bg),
            1 => t.attrs.style.insert(StyleFlags::BOLD),
            4 => t.attrs.style.insert(StyleFlags::UNDERLINE),
            7 => t.attrs.style.insert(StyleFlags::REVERSE),
            22 => t.attrs.style.remove(StyleFlags::BOLD),
            24 => t.attrs.style.remove(StyleFlags::UNDERLINE),
            27 => t.attrs.style.remove(StyleFlags::REVERSE),
            30..=37 => {
                t.attrs.fg = t.palette.get((ps[i] - 30) as u8);
                t.attrs.use_default_fg = false;
            }
            39 => {
                t.attrs.fg = t.palette.default_fg;
                t.attrs.use_default_fg = true;
            }
            40..=47 => {
                t.attrs.bg = t.palette.get((ps[i] - 40) as u8);
                t.attrs.use_default_bg = false;
            }
            49 => {
                t.attrs.bg = t.palette.default_bg;
                t.attrs.use_default_bg = true;
            }
            90..=97 => {
                t.attrs.fg = t.palette.get((ps[i] - 90 + 8) as u8);
                t.attrs.use_default_fg = false;
            }
            100..=107 => {
                t.attrs.bg = t.palette.get((ps[i] - 100 + 8) as u8);
                t.attrs.use_default_bg = false;
            }
            38 | 48 => {
                let is_fg = ps[i] == 38;
                match ps.get(i + 1) {
                    Some(5) => {
                        if let Some(&idx) = ps.get(i + 2) {
                            let rgb = t.palette.get(idx as u8);
                            if is_fg {
                                t.attrs.fg = rgb;
                                t.attrs.use_default_fg = false;
                            } else {
                                t.attrs.bg = rgb;
                                t.attrs.use_default_bg = false;
                            }
                        }
                        i += 2;
                    }
                    Some(2) => {
                        if let (Some(&r), Some(&g), Some(&b)) = (ps.get(i + 2), ps.get(i + 3), ps.get(i + 4)) {
                            let rgb = (r as u8, g as u8, b as u8);
                            if is_fg {
                                t.attrs.fg = rgb;
                                t.attrs.use_default_fg = false;
                            } else {
                                t.attrs.bg = rgb;
                                t.attrs.use_default_bg = false;
                            }
                        }
                        i += 4;
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vte::Parser;

    fn feed(t: &mut Terminal, parser: &mut Parser, bytes: &[u8]) {
        for b in bytes {
            parser.advance(t, *b);
        }
    }

    #[test]
    fn sgr_bold_and_fg_color_apply_to_next_cell() {
        let mut t = Terminal::new(10, 4, 10);
        let mut parser = Parser::new();
        feed(&mut t, &mut parser, b"\x1b[1;31mX");
        let cell = t.primary.cell(0, 0);
        assert!(cell.style.contains(StyleFlags::BOLD));
        assert_eq!(cell.fg, t.palette.get(1));
    }

    #[test]
    fn cursor_position_csi_h_moves_cursor_one_based() {
        let mut t = Terminal::new(10, 10, 10);
        let mut parser = Parser::new();
        feed(&mut t, &mut parser, b"\x1b[5;3H");
        assert_eq!((t.primary.cursor_row, t.primary.cursor_col), (4, 2));
    }

    #[test]
    fn private_mode_1049_toggles_alt_screen_and_restores_cursor() {
        let mut t = Terminal::new(10, 10, 10);
        let mut parser = Parser::new();
        feed(&mut t, &mut parser, b"\x1b[3;3H\x1b[?1049h");
        assert!(t.using_alt);
        feed(&mut t, &mut parser, b"\x1b[?1049l");
        assert!(!t.using_alt);
        assert_eq!((t.primary.cursor_row, t.primary.cursor_col), (2, 2));
    }

    #[test]
    fn dsr_cursor_position_report_is_one_based() {
        let mut t = Terminal::new(10, 10, 10);
        let mut parser = Parser::new();
        feed(&mut t, &mut parser, b"\x1b[4;4H\x1b[6n");
        assert_eq!(t.take_replies(), b"\x1b[4;4R".to_vec());
    }

    #[test]
    fn osc11_sets_default_bg_and_recolors_existing_cells() {
        let mut t = Terminal::new(5, 2, 10);
        let mut parser = Parser::new();
        feed(&mut t, &mut parser, b"a");
        feed(&mut t, &mut parser, b"\x1b]11;#112233\x07");
        assert_eq!(t.palette.default_bg, (0x11, 0x22, 0x33));
        assert_eq!(t.primary.cell(0, 0).bg, (0x11, 0x22, 0x33));
    }

    #[test]
    fn scroll_region_is_respected_by_linefeed() {
        let mut t = Terminal::new(5, 5, 10);
        let mut parser = Parser::new();
        feed(&mut t, &mut parser, b"\x1b[2;4r");
        assert_eq!((t.primary.scroll_top, t.primary.scroll_bottom), (1, 3));
    }

    #[test]
    fn erase_display_mode_2_clears_screen_and_homes_cursor() {
        let mut t = Terminal::new(5, 2, 10);
        let mut parser = Parser::new();
        feed(&mut t, &mut parser, b"ab\x1b[3;3H\x1b[2J");
        assert_eq!(t.primary.cell(0, 0).codepoint, 0);
        assert_eq!((t.primary.cursor_row, t.primary.cursor_col), (0, 0));
    }

    #[test]
    fn erase_display_mode_3_also_clears_screen_homes_cursor_and_drops_history() {
        let mut t = Terminal::new(5, 2, 10);
        let mut parser = Parser::new();
        feed(&mut t, &mut parser, b"ab\r\ncd\r\nef\x1b[3;3H\x1b[3J");
        assert_eq!(t.history.len(), 0);
        assert_eq!(t.primary.cell(1, 0).codepoint, 0);
        assert_eq!((t.primary.cursor_row, t.primary.cursor_col), (0, 0));
    }

    #[test]
    fn device_attributes_distinguishes_primary_and_secondary_queries() {
        let mut t = Terminal::new(5, 2, 10);
        let mut parser = Parser::new();
        feed(&mut t, &mut parser, b"\x1b[c");
        assert_eq!(t.take_replies(), b"\x1b[?1;0c".to_vec());
        feed(&mut t, &mut parser, b"\x1b[>c");
        assert_eq!(t.take_replies(), b"\x1b[>0;95;0c".to_vec());
    }

    #[test]
    fn unknown_sgr_code_is_silently_ignored() {
        let mut t = Terminal::new(5, 5, 10);
        let mut parser = Parser::new();
        feed(&mut t, &mut parser, b"\x1b[123mX");
        assert_eq!(t.primary.cell(0, 0).codepoint, 'X' as u32);
    }
}
