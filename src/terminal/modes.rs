//! Terminal-wide mode flags (C2). Lives on `Terminal` rather than per-`Grid`
//! since mouse-tracking and similar modes must survive a `?1049` alt-screen
//! swap, which a per-grid home would not allow.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseTrackingMode {
    Off,
    Normal,   // ?1000
    Drag,     // ?1002
    AnyMotion, // ?1003
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseEncoding {
    Default,
    Sgr, // ?1006
}

#[derive(Debug, Clone, Copy)]
pub struct TerminalModes {
    pub app_keypad: bool,       // DECKPAM/DECKPNM
    pub app_cursor: bool,       // DECCKM ?1
    pub origin: bool,           // DECOM ?6
    pub autowrap: bool,         // DECAWM ?7, default on
    pub insert: bool,           // IRM (CSI 4 h/l)
    pub linefeed_newline: bool, // LNM
    pub bracketed_paste: bool,  // ?2004
    pub focus_events: bool,     // ?1004
    pub synchronized_output: bool, // ?2026
    pub alt_screen: bool,       // ?47 / ?1047 / ?1049
    pub mouse_tracking: MouseTrackingMode,
    pub mouse_encoding: MouseEncoding,
}

impl Default for TerminalModes {
    fn default() -> Self {
        Self {
            app_keypad: false,
            app_cursor: false,
            origin: false,
            autowrap: true,
            insert: false,
            linefeed_newline: false,
            bracketed_paste: false,
            focus_events: false,
            synchronized_output: false,
            alt_screen: false,
            mouse_tracking: MouseTrackingMode::Off,
            mouse_encoding: MouseEncoding::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dec_power_on_state() {
        let m = TerminalModes::default();
        assert!(m.autowrap);
        assert!(!m.app_cursor);
        assert!(!m.alt_screen);
        assert_eq!(m.mouse_tracking, MouseTrackingMode::Off);
    }
}
