//! Key and mouse input encoding (C6): converts abstract input events into
//! the VT byte sequences written back to the PTY. `Key`/`MouseButton` are
//! deliberately decoupled from `winit`'s event types so the encoder can be
//! unit-tested without a real window or event loop; `app.rs` maps winit
//! events into these before calling in.

use crate::terminal::{MouseEncoding, MouseTrackingMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    F(u8),
    KeypadDigit(u8),
    KeypadDot,
    KeypadPlus,
    KeypadMinus,
    KeypadMultiply,
    KeypadDivide,
    KeypadEnter,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub alt: bool,
    pub ctrl: bool,
    /// Right-Alt (or combined Ctrl+Alt on layouts that report AltGr that
    /// way): a composition signal, not a combining modifier.
    pub alt_gr: bool,
}

impl Modifiers {
    pub fn is_none(&self) -> bool {
        !self.shift && !self.alt && !self.ctrl
    }

    /// xterm modifier parameter: 1 + (shift?1) + (alt?2) + (ctrl?4).
    fn code(&self) -> u8 {
        1 + self.shift as u8 + 2 * self.alt as u8 + 4 * self.ctrl as u8
    }

    /// AltGr removes Ctrl+Alt from the set before encoding, since it signals
    /// text composition rather than a combining modifier.
    fn effective(&self) -> Modifiers {
        if self.alt_gr {
            Modifiers { shift: self.shift, alt: false, ctrl: false, alt_gr: false }
        } else {
            *self
        }
    }
}

/// CSI-style cursor key: `CSI <final>` normally, `CSI 1 ; mod <final>` with
/// modifiers, or `SS3 <final>` (`ESC O <final>`) when DECCKM is set and no
/// modifiers are held.
fn encode_csi_final(final_byte: u8, mods: Modifiers, app_mode: bool) -> Vec<u8> {
    if app_mode && mods.is_none() {
        vec![0x1b, b'O', final_byte]
    } else if mods.is_none() {
        vec![0x1b, b'[', final_byte]
    } else {
        let mut out = vec![0x1b, b'['];
        out.extend_from_slice(b"1;");
        out.extend_from_slice(mods.code().to_string().as_bytes());
        out.push(final_byte);
        out
    }
}

fn encode_tilde(code: u16, mods: Modifiers) -> Vec<u8> {
    let mut out = vec![0x1b, b'['];
    out.extend_from_slice(code.to_string().as_bytes());
    if !mods.is_none() {
        out.push(b';');
        out.extend_from_slice(mods.code().to_string().as_bytes());
    }
    out.push(b'~');
    out
}

/// Encode a control character for Ctrl+letter combinations (Ctrl-A..Ctrl-Z
/// map to 0x01..0x1a).
fn ctrl_byte(c: char) -> Option<u8> {
    let upper = c.to_ascii_uppercase();
    if upper.is_ascii_uppercase() {
        Some(upper as u8 - b'A' + 1)
    } else {
        None
    }
}

pub fn encode_key(key: Key, mods: Modifiers, app_cursor: bool, app_keypad: bool) -> Vec<u8> {
    let mods = mods.effective();
    match key {
        Key::Char(c) => {
            if mods.ctrl {
                if let Some(b) = ctrl_byte(c) {
                    return vec![b];
                }
            }
            let mut buf = [0u8; 4];
            let bytes = c.encode_utf8(&mut buf).as_bytes().to_vec();
            if mods.alt && !mods.ctrl {
                let mut out = vec![0x1b];
                out.extend_from_slice(&bytes);
                out
            } else {
                bytes
            }
        }
        Key::Enter => vec![b'\r'],
        Key::Tab => {
            if mods.shift {
                vec![0x1b, b'[', b'Z']
            } else {
                vec![b'\t']
            }
        }
        Key::Backspace => vec![0x7f],
        Key::Escape => vec![0x1b],
        Key::Up => encode_csi_final(b'A', mods, app_cursor),
        Key::Down => encode_csi_final(b'B', mods, app_cursor),
        Key::Right => encode_csi_final(b'C', mods, app_cursor),
        Key::Left => encode_csi_final(b'D', mods, app_cursor),
        Key::Home => encode_csi_final(b'H', mods, app_cursor),
        Key::End => encode_csi_final(b'F', mods, app_cursor),
        Key::PageUp => encode_tilde(5, mods),
        Key::PageDown => encode_tilde(6, mods),
        Key::Insert => encode_tilde(2, mods),
        Key::Delete => encode_tilde(3, mods),
        Key::F(n) => encode_function_key(n, mods, app_keypad),
        Key::KeypadDigit(d) => encode_keypad(b'p' + d, app_keypad, b'0' + d),
        Key::KeypadDot => encode_keypad(b'n', app_keypad, b'.'),
        Key::KeypadPlus => encode_keypad(b'k', app_keypad, b'+'),
        Key::KeypadMinus => encode_keypad(b'm', app_keypad, b'-'),
        Key::KeypadMultiply => encode_keypad(b'j', app_keypad, b'*'),
        Key::KeypadDivide => encode_keypad(b'o', app_keypad, b'/'),
        Key::KeypadEnter => encode_keypad(b'M', app_keypad, b'\r'),
    }
}

/// Numeric-keypad key in `app_keypad` mode: `ESC O <letter>`. Outside
/// `app_keypad` mode the keypad sends the same byte as the equivalent
/// top-row key.
fn encode_keypad(letter: u8, app_keypad: bool, ascii: u8) -> Vec<u8> {
    if app_keypad {
        vec![0x1b, b'O', letter]
    } else {
        vec![ascii]
    }
}

fn encode_function_key(n: u8, mods: Modifiers, _app_keypad: bool) -> Vec<u8> {
    match n {
        1..=4 if mods.is_none() => vec![0x1b, b'O', b'P' + (n - 1)],
        1..=4 => {
            let mut out = vec![0x1b, b'['];
            out.extend_from_slice(b"1;");
            out.extend_from_slice(mods.code().to_string().as_bytes());
            out.push(b'P' + (n - 1));
            out
        }
        5 => encode_tilde(15, mods),
        6 => encode_tilde(17, mods),
        7 => encode_tilde(18, mods),
        8 => encode_tilde(19, mods),
        9 => encode_tilde(20, mods),
        10 => encode_tilde(21, mods),
        11 => encode_tilde(23, mods),
        12 => encode_tilde(24, mods),
        13 => encode_tilde(25, mods),
        14 => encode_tilde(26, mods),
        15 => encode_tilde(28, mods),
        16 => encode_tilde(29, mods),
        17 => encode_tilde(31, mods),
        18 => encode_tilde(32, mods),
        19 => encode_tilde(33, mods),
        20 => encode_tilde(34, mods),
        21 => encode_tilde(42, mods),
        22 => encode_tilde(43, mods),
        23 => encode_tilde(44, mods),
        24 => encode_tilde(45, mods),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEventKind {
    Press,
    Release,
    Motion,
    WheelUp,
    WheelDown,
}

fn button_code(button: MouseButton, kind: MouseEventKind, mods: Modifiers) -> u8 {
    let base = match kind {
        MouseEventKind::WheelUp => 64,
        MouseEventKind::WheelDown => 65,
        _ => match button {
            MouseButton::Left => 0,
            MouseButton::Middle => 1,
            MouseButton::Right => 2,
            MouseButton::None => 3,
        },
    };
    let motion_bit = if kind == MouseEventKind::Motion { 32 } else { 0 };
    let mod_bits =
        (mods.shift as u8 * 4) + (mods.alt as u8 * 8) + (mods.ctrl as u8 * 16);
    base + motion_bit + mod_bits
}

/// Encode a mouse event per the active tracking mode/encoding, or `None` if
/// tracking is off or the event doesn't qualify for the active mode (e.g. a
/// bare motion event under `Normal` tracking, which only reports drags).
pub fn encode_mouse(
    kind: MouseEventKind,
    button: MouseButton,
    col: u16,
    row: u16,
    mods: Modifiers,
    mode: MouseTrackingMode,
    encoding: MouseEncoding,
) -> Option<Vec<u8>> {
    if mode == MouseTrackingMode::Off {
        return None;
    }
    if kind == MouseEventKind::Motion {
        let dragging = button != MouseButton::None;
        match mode {
            MouseTrackingMode::Normal => return None,
            MouseTrackingMode::Drag if !dragging => return None,
            _ => {}
        }
    }
    let code = button_code(button, kind, mods);
    let (col1, row1) = (col + 1, row + 1);
    match encoding {
        MouseEncoding::Sgr => {
            let final_byte = if kind == MouseEventKind::Release { 'm' } else { 'M' };
            Some(format!("\x1b[<{code};{col1};{row1}{final_byte}").into_bytes())
        }
        MouseEncoding::Default => {
            // X10/normal encoding: bytes are code+32, col+32, row+32, clamped
            // to the single-byte range it was designed for.
            let clamp = |v: u16| (v.min(223) + 32) as u8;
            let b = if kind == MouseEventKind::Release { 3 + 32 } else { code + 32 };
            Some(vec![0x1b, b'[', b'M', b, clamp(col1), clamp(row1)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_letter_maps_to_control_byte() {
        assert_eq!(encode_key(Key::Char('a'), Modifiers { ctrl: true, ..Default::default() }, false, false), vec![1]);
        assert_eq!(encode_key(Key::Char('c'), Modifiers { ctrl: true, ..Default::default() }, false, false), vec![3]);
    }

    #[test]
    fn arrow_key_uses_ss3_in_app_cursor_mode_without_modifiers() {
        assert_eq!(encode_key(Key::Up, Modifiers::default(), true, false), vec![0x1b, b'O', b'A']);
        assert_eq!(encode_key(Key::Up, Modifiers::default(), false, false), vec![0x1b, b'[', b'A']);
    }

    #[test]
    fn arrow_key_with_modifier_always_uses_csi_form() {
        let mods = Modifiers { shift: true, ..Default::default() };
        assert_eq!(encode_key(Key::Up, mods, true, false), b"\x1b[1;2A".to_vec());
    }

    #[test]
    fn delete_key_is_tilde_coded() {
        assert_eq!(encode_key(Key::Delete, Modifiers::default(), false, false), b"\x1b[3~".to_vec());
    }

    #[test]
    fn sgr_mouse_press_and_release_use_distinct_final_byte() {
        let mods = Modifiers::default();
        let press = encode_mouse(MouseEventKind::Press, MouseButton::Left, 4, 9, mods, MouseTrackingMode::Normal, MouseEncoding::Sgr).unwrap();
        let release = encode_mouse(MouseEventKind::Release, MouseButton::Left, 4, 9, mods, MouseTrackingMode::Normal, MouseEncoding::Sgr).unwrap();
        assert_eq!(press, b"\x1b[<0;5;10M".to_vec());
        assert_eq!(release, b"\x1b[<0;5;10m".to_vec());
    }

    #[test]
    fn motion_without_drag_is_suppressed_under_normal_tracking() {
        let mods = Modifiers::default();
        assert!(encode_mouse(MouseEventKind::Motion, MouseButton::None, 0, 0, mods, MouseTrackingMode::Normal, MouseEncoding::Sgr).is_none());
    }

    #[test]
    fn mouse_tracking_off_suppresses_everything() {
        let mods = Modifiers::default();
        assert!(encode_mouse(MouseEventKind::Press, MouseButton::Left, 0, 0, mods, MouseTrackingMode::Off, MouseEncoding::Sgr).is_none());
    }

    #[test]
    fn f13_through_f24_use_tilde_codes() {
        assert_eq!(encode_key(Key::F(13), Modifiers::default(), false, false), b"\x1b[25~".to_vec());
        assert_eq!(encode_key(Key::F(24), Modifiers::default(), false, false), b"\x1b[45~".to_vec());
    }

    #[test]
    fn keypad_digit_uses_ss3_letter_in_app_keypad_mode() {
        assert_eq!(encode_key(Key::KeypadDigit(0), Modifiers::default(), false, true), vec![0x1b, b'O', b'p']);
        assert_eq!(encode_key(Key::KeypadDigit(9), Modifiers::default(), false, true), vec![0x1b, b'O', b'y']);
        assert_eq!(encode_key(Key::KeypadDigit(5), Modifiers::default(), false, false), vec![b'5']);
    }

    #[test]
    fn keypad_operators_use_app_keypad_letters() {
        assert_eq!(encode_key(Key::KeypadPlus, Modifiers::default(), false, true), vec![0x1b, b'O', b'k']);
        assert_eq!(encode_key(Key::KeypadDot, Modifiers::default(), false, false), vec![b'.']);
    }

    #[test]
    fn alt_gr_strips_ctrl_and_alt_before_encoding() {
        let mods = Modifiers { ctrl: true, alt: true, alt_gr: true, shift: false };
        // Without AltGr this would be a Ctrl-combo; with it active the key
        // composes literal text instead.
        assert_eq!(encode_key(Key::Char('q'), mods, false, false), "q".as_bytes().to_vec());
    }

    #[test]
    fn alt_with_ctrl_is_forwarded_verbatim_not_escaped() {
        let mods = Modifiers { alt: true, ctrl: true, ..Default::default() };
        // 'q' has no ctrl_byte mapping path taken here since ctrl_byte would
        // apply first; use a char outside A-Z where ctrl has no effect.
        assert_eq!(encode_key(Key::Char('1'), mods, false, false), "1".as_bytes().to_vec());
    }
}
