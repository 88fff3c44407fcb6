//! Palette model (C3): the 256-entry color table plus the mutable default
//! fg/bg/cursor colors. The 6x6x6 color cube and grayscale-ramp formulas
//! are the standard xterm-256 layout; the first 16 entries use the classic
//! ANSI color values rather than any particular terminal theme.

pub type Rgb = (u8, u8, u8);

/// Canonical xterm 16-color table (indices 0..16).
const ANSI_16: [Rgb; 16] = [
    (0x00, 0x00, 0x00), // 0 black
    (0xcd, 0x00, 0x00), // 1 red
    (0x00, 0xcd, 0x00), // 2 green
    (0xcd, 0xcd, 0x00), // 3 yellow
    (0x00, 0x00, 0xee), // 4 blue
    (0xcd, 0x00, 0xcd), // 5 magenta
    (0x00, 0xcd, 0xcd), // 6 cyan
    (0xe5, 0xe5, 0xe5), // 7 white
    (0x7f, 0x7f, 0x7f), // 8 bright black
    (0xff, 0x00, 0x00), // 9 bright red
    (0x00, 0xff, 0x00), // 10 bright green
    (0xff, 0xff, 0x00), // 11 bright yellow
    (0x5c, 0x5c, 0xff), // 12 bright blue
    (0xff, 0x00, 0xff), // 13 bright magenta
    (0x00, 0xff, 0xff), // 14 bright cyan
    (0xff, 0xff, 0xff), // 15 bright white
];

/// Convert a 256-color index to RGB: indices 16..=231 are the 6x6x6 cube
/// with levels {0,95,135,175,215,255}, and 232..=255 are a 24-step
/// grayscale ramp of `8 + 10*i`.
pub fn indexed_to_rgb_default(index: u8) -> Rgb {
    match index {
        0..=15 => ANSI_16[index as usize],
        16..=231 => {
            let idx = index - 16;
            let r = idx / 36;
            let g = (idx % 36) / 6;
            let b = idx % 6;
            let level = |v: u8| if v == 0 { 0 } else { 55 + 40 * v };
            (level(r), level(g), level(b))
        }
        232..=255 => {
            let v = 8 + 10 * (index - 232);
            (v, v, v)
        }
    }
}

/// The mutable 256-entry palette plus default fg/bg/cursor colors.
///
/// Entries are mutable via OSC 4; default fg/bg/cursor are mutable via OSC
/// 10/11/12 independently of whatever palette[7]/palette[0] currently hold
/// (matching real xterm behavior: recoloring palette slot 7 does not change
/// what "default foreground" resolves to once it has diverged).
#[derive(Debug, Clone)]
pub struct Palette {
    entries: [Rgb; 256],
    pub default_fg: Rgb,
    pub default_bg: Rgb,
    pub cursor_color: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        let mut entries = [(0, 0, 0); 256];
        for (i, e) in entries.iter_mut().enumerate() {
            *e = indexed_to_rgb_default(i as u8);
        }
        Self {
            entries,
            default_fg: entries[7],
            default_bg: entries[0],
            cursor_color: entries[7],
        }
    }
}

impl Palette {
    pub fn get(&self, index: u8) -> Rgb {
        self.entries[index as usize]
    }

    /// Set palette entry `index`, returning the old value so the caller can
    /// recolor any cell/attribute still referencing it (OSC 4 contract).
    pub fn set(&mut self, index: u8, rgb: Rgb) -> Rgb {
        let old = self.entries[index as usize];
        self.entries[index as usize] = rgb;
        old
    }

    /// Reset the first 16 entries to the built-in ANSI colors (OSC 104 with
    /// no target index), returning the (old, new) pairs that changed.
    pub fn reset_first_16(&mut self) -> Vec<(Rgb, Rgb)> {
        let mut changes = Vec::new();
        for i in 0..16u8 {
            let new = ANSI_16[i as usize];
            let old = self.entries[i as usize];
            if old != new {
                changes.push((old, new));
                self.entries[i as usize] = new;
            }
        }
        changes
    }

    pub fn builtin_default_fg() -> Rgb {
        ANSI_16[7]
    }
    pub fn builtin_default_bg() -> Rgb {
        ANSI_16[0]
    }
    pub fn builtin_cursor_color() -> Rgb {
        ANSI_16[7]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_corners_match_xterm_levels() {
        assert_eq!(indexed_to_rgb_default(16), (0, 0, 0));
        assert_eq!(indexed_to_rgb_default(231), (255, 255, 255));
        assert_eq!(indexed_to_rgb_default(16 + 36), (95, 0, 0));
    }

    #[test]
    fn grayscale_ramp_matches_formula() {
        assert_eq!(indexed_to_rgb_default(232), (8, 8, 8));
        assert_eq!(
            indexed_to_rgb_default(255),
            (8 + 10 * 23, 8 + 10 * 23, 8 + 10 * 23)
        );
    }

    #[test]
    fn default_fg_is_palette_7_bg_is_palette_0() {
        let p = Palette::default();
        assert_eq!(p.default_fg, p.get(7));
        assert_eq!(p.default_bg, p.get(0));
        assert_eq!(p.cursor_color, p.get(7));
    }

    #[test]
    fn osc4_set_returns_old_value() {
        let mut p = Palette::default();
        let old = p.set(196, (1, 2, 3));
        assert_eq!(old, indexed_to_rgb_default(196));
        assert_eq!(p.get(196), (1, 2, 3));
    }
}
