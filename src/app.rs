//! Per-frame loop assembly: owns the window, GPU compositor, PTY session,
//! terminal model, font, overlay manager and audio system, and drives a
//! single-threaded cooperative loop — drain windowing events, drain the
//! PTY, feed bytes through the parser, advance clocks, rasterize, present,
//! sleep the frame remainder.
//!
//! Built on `winit`'s `ApplicationHandler` pattern; the surface/device
//! plumbing it drives lives in `compositor/`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key as WinitKey, KeyCode, ModifiersState, NamedKey, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::audio::AudioSystem;
use crate::config::Config;
use crate::error::FatalError;
use crate::font::Font;
use crate::input::{self, Key, Modifiers, MouseButton, MouseEventKind};
use crate::overlay::OverlayManager;
use crate::pty::{self, PtySession};
use crate::terminal::{BlinkClock, Terminal};

const TARGET_FPS: u32 = 30;
const MARGIN: u32 = 0;

pub fn run(config: Config, shader_paths: Vec<PathBuf>, shell_override: Option<String>) -> anyhow::Result<i32> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);

    let font = Font::load(&config.font.path).map_err(FatalError::FontLoad)?;
    let mut app = App::new(config, shader_paths, shell_override, font);
    event_loop.run_app(&mut app)?;
    Ok(app.exit_code.unwrap_or(0))
}

struct Gpu {
    window: Arc<Window>,
    compositor: crate::compositor::Compositor,
}

struct App {
    config: Config,
    shader_paths: Vec<PathBuf>,
    shell_override: Option<String>,
    font: Font,
    terminal: Terminal,
    parser: vte::Parser,
    pty: Option<PtySession>,
    overlay: OverlayManager,
    audio: Option<AudioSystem>,
    blink: BlinkClock,
    modifiers: Modifiers,
    mouse_pos: (f64, f64),
    gpu: Option<Gpu>,
    last_frame: Instant,
    exit_code: Option<i32>,
}

impl App {
    fn new(config: Config, shader_paths: Vec<PathBuf>, shell_override: Option<String>, font: Font) -> Self {
        let cols = config.terminal.columns;
        let rows = config.terminal.rows;
        Self {
            terminal: Terminal::new(cols, rows, config.terminal.scrollback_lines),
            config,
            shader_paths,
            shell_override,
            font,
            parser: vte::Parser::new(),
            pty: None,
            overlay: OverlayManager::new(),
            audio: None,
            blink: BlinkClock::new(500),
            modifiers: Modifiers::default(),
            mouse_pos: (0.0, 0.0),
            gpu: None,
            last_frame: Instant::now(),
            exit_code: None,
        }
    }

    fn cell_size(&self) -> (u32, u32) {
        (self.font.glyph_width, self.font.glyph_height)
    }

    fn pixel_size(&self) -> (u32, u32) {
        let (cw, ch) = self.cell_size();
        let grid = self.terminal.active_grid();
        (
            grid.width() as u32 * cw + 2 * MARGIN,
            grid.height() as u32 * ch + 2 * MARGIN,
        )
    }

    fn spawn_pty(&mut self) {
        let (cols, rows) = (self.terminal.primary.width(), self.terminal.primary.height());
        let env = std::collections::HashMap::new();
        match pty::spawn_shell(self.shell_override.as_deref(), None, rows, cols, &env) {
            Ok(session) => self.pty = Some(session),
            Err(err) => tracing::error!(%err, "failed to spawn shell"),
        }
    }

    fn drain_pty(&mut self) {
        let Some(pty) = self.pty.as_mut() else { return };
        match pty.drain() {
            Ok(Some(bytes)) => {
                for byte in &bytes {
                    self.parser.advance(&mut self.terminal, *byte);
                }
                let replies = self.terminal.take_replies();
                if !replies.is_empty() {
                    let _ = pty.write_input(&replies);
                }
                for group in self.terminal.take_overlay_requests() {
                    self.overlay.apply_request(&group, &self.font, &self.terminal.palette);
                    if let Some(audio) = self.audio.as_ref() {
                        audio.apply_request(&group);
                    }
                }
            }
            Ok(None) => {
                self.exit_code = Some(pty.exit_code().unwrap_or(0));
            }
            Err(FatalError::PtyRead(err)) => {
                tracing::error!(%err, "fatal PTY read error");
                self.exit_code = Some(1);
            }
            Err(err) => {
                tracing::error!(%err, "PTY session error");
                self.exit_code = Some(1);
            }
        }
    }

    fn write_to_pty(&mut self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        if let Some(pty) = self.pty.as_mut() {
            if pty.write_input(&bytes).is_err() {
                self.exit_code = Some(1);
            }
        }
    }

    fn rasterize_frame(&self) -> (Vec<u8>, u32, u32) {
        let (cw, ch) = self.cell_size();
        let (fb_w, fb_h) = self.pixel_size();
        let mut framebuffer = vec![0u8; (fb_w * fb_h) as usize * 4];
        let grid = self.terminal.active_grid();
        let bg = self.terminal.palette.default_bg;
        for px in framebuffer.chunks_mut(4) {
            px[0] = bg.0;
            px[1] = bg.1;
            px[2] = bg.2;
            px[3] = 0xff;
        }

        let cursor_on = grid.cursor_visible && self.blink.visible;
        for row in 0..grid.height() {
            for col in 0..grid.width() {
                let cell = grid.cell(row, col);
                let selected = self.terminal.selection.contains(row as i64, col, grid.width());
                let is_cursor = cursor_on && row == grid.cursor_row && col == grid.cursor_col;

                let (mut fg, mut bg) = (cell.fg, cell.bg);
                if selected {
                    std::mem::swap(&mut fg, &mut bg);
                }
                if is_cursor {
                    bg = self.terminal.palette.cursor_color;
                    fg = cell.bg;
                }

                let px = MARGIN + col as u32 * cw;
                let py = MARGIN + row as u32 * ch;
                self.font.render_cell(&mut framebuffer, fb_w, cell.codepoint, fg, bg, cell.style, px, py);
            }
        }

        self.overlay.composite(&mut framebuffer, fb_w, fb_h);
        (framebuffer, fb_w, fb_h)
    }

    fn present_frame(&mut self) {
        let (framebuffer, fb_w, fb_h) = self.rasterize_frame();
        if let Some(gpu) = self.gpu.as_mut() {
            if let Err(err) = gpu.compositor.present(&framebuffer, fb_w, fb_h) {
                tracing::error!(%err, "present failed");
            }
        }
    }

    fn resize_to(&mut self, size: PhysicalSize<u32>) {
        let (cw, ch) = self.cell_size();
        if cw == 0 || ch == 0 {
            return;
        }
        let cols = ((size.width.saturating_sub(2 * MARGIN)) / cw).max(1) as u16;
        let rows = ((size.height.saturating_sub(2 * MARGIN)) / ch).max(1) as u16;
        self.terminal.resize(cols, rows);
        if let Some(pty) = self.pty.as_mut() {
            let _ = pty.resize(rows, cols);
        }
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.compositor.resize_surface(size.width, size.height);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        let (fb_w, fb_h) = self.pixel_size();
        let attrs = Window::default_attributes()
            .with_title("squall")
            .with_inner_size(PhysicalSize::new(fb_w, fb_h));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(err) => {
                tracing::error!(%err, "failed to create window");
                event_loop.exit();
                return;
            }
        };

        let compositor = match pollster::block_on(crate::compositor::Compositor::new(window.clone(), &self.shader_paths)) {
            Ok(c) => c,
            Err(err) => {
                tracing::error!(%err, "GPU init failed");
                event_loop.exit();
                return;
            }
        };

        self.gpu = Some(Gpu { window, compositor });
        self.spawn_pty();

        match AudioSystem::init() {
            Ok(audio) if self.config.audio.enabled => self.audio = Some(audio),
            Ok(_) => {}
            Err(err) => tracing::warn!(%err, "audio device init failed, continuing without audio"),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(pty) = self.pty.as_mut() {
                    pty.kill();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => self.resize_to(size),
            WindowEvent::ModifiersChanged(mods) => {
                let state: ModifiersState = mods.state();
                let alt_gr = self.modifiers.alt_gr;
                self.modifiers = Modifiers {
                    shift: state.shift_key(),
                    alt: state.alt_key(),
                    ctrl: state.control_key(),
                    alt_gr,
                };
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::AltRight) {
                    self.modifiers.alt_gr = event.state == ElementState::Pressed;
                }
                if event.state != ElementState::Pressed {
                    return;
                }
                let key = winit_physical_key_to_keypad(&event.physical_key)
                    .or_else(|| winit_key_to_key(&event.logical_key));
                let Some(key) = key else { return };

                if self.modifiers.ctrl && !self.modifiers.shift && key == Key::Char('c') && self.terminal.selection.is_active() {
                    if let Some(text) = self.terminal.selected_text() {
                        if let Err(err) = crate::terminal::selection::copy_to_clipboard(&text) {
                            tracing::warn!(%err, "clipboard copy failed");
                        }
                    }
                    return;
                }
                let paste_shortcut = (self.modifiers.ctrl && self.modifiers.shift && key == Key::Char('v'))
                    || (self.modifiers.shift && key == Key::Insert);
                if paste_shortcut {
                    match crate::terminal::selection::paste_from_clipboard() {
                        Ok(text) => {
                            self.terminal.selection.clear();
                            let payload = if self.terminal.modes.bracketed_paste {
                                crate::terminal::selection::bracket_paste(&text)
                            } else {
                                text
                            };
                            self.write_to_pty(payload.into_bytes());
                        }
                        Err(err) => tracing::warn!(%err, "clipboard paste failed"),
                    }
                    return;
                }
                if matches!(key, Key::Char(_)) {
                    self.terminal.selection.clear();
                }

                let app_cursor = self.terminal.modes.app_cursor;
                let app_keypad = self.terminal.modes.app_keypad;
                let bytes = input::encode_key(key, self.modifiers, app_cursor, app_keypad);
                self.write_to_pty(bytes);
                self.blink.reset();
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_pos = (position.x, position.y);
                if self.terminal.selection.dragging {
                    if let Some((col, row)) = self.cell_at_mouse() {
                        let global_row = row as i64 - self.terminal.scroll_offset as i64;
                        self.terminal.selection.extend_to(global_row, col);
                    }
                }
                if self.terminal.modes.mouse_tracking == crate::terminal::MouseTrackingMode::AnyMotion {
                    self.report_mouse(MouseEventKind::Motion, MouseButton::None);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let mapped = match button {
                    WinitMouseButton::Left => MouseButton::Left,
                    WinitMouseButton::Right => MouseButton::Right,
                    WinitMouseButton::Middle => MouseButton::Middle,
                    _ => return,
                };
                if self.terminal.modes.mouse_tracking == crate::terminal::MouseTrackingMode::Off {
                    if mapped == MouseButton::Left {
                        if let Some((col, row)) = self.cell_at_mouse() {
                            let global_row = row as i64 - self.terminal.scroll_offset as i64;
                            match state {
                                ElementState::Pressed => self.terminal.selection.begin(global_row, col),
                                ElementState::Released => self.terminal.selection.end_drag(),
                            }
                        }
                    }
                    return;
                }
                let kind = if state == ElementState::Pressed { MouseEventKind::Press } else { MouseEventKind::Release };
                self.report_mouse(kind, mapped);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let up = matches!(delta, MouseScrollDelta::LineDelta(_, y) if y > 0.0)
                    || matches!(delta, MouseScrollDelta::PixelDelta(p) if p.y > 0.0);
                if self.terminal.modes.mouse_tracking != crate::terminal::MouseTrackingMode::Off {
                    let kind = if up { MouseEventKind::WheelUp } else { MouseEventKind::WheelDown };
                    self.report_mouse(kind, MouseButton::None);
                } else {
                    self.terminal.scroll_view(if up { 3 } else { -3 });
                }
            }
            WindowEvent::Focused(focused) => {
                if self.terminal.modes.focus_events {
                    let code: &[u8] = if focused { b"\x1b[I" } else { b"\x1b[O" };
                    self.write_to_pty(code.to_vec());
                }
            }
            WindowEvent::RedrawRequested => self.present_frame(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.drain_pty();
        if let Some(code) = self.exit_code {
            if let Some(pty) = self.pty.as_mut() {
                pty.kill();
            }
            let _ = code;
            event_loop.exit();
            return;
        }

        let now = Instant::now();
        let dt_ms = now.duration_since(self.last_frame).as_millis() as u64;
        self.last_frame = now;
        self.blink.advance(dt_ms);

        if let Some(title) = self.current_title() {
            if let Some(gpu) = self.gpu.as_ref() {
                gpu.window.set_title(&title);
            }
        }

        if let Some(gpu) = self.gpu.as_ref() {
            gpu.window.request_redraw();
        }

        let frame_budget = Duration::from_millis(1000 / TARGET_FPS as u64);
        let elapsed = Instant::now().duration_since(now);
        if elapsed < frame_budget {
            std::thread::sleep(frame_budget - elapsed);
        }
    }
}

impl App {
    fn current_title(&mut self) -> Option<String> {
        if self.terminal.title.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.terminal.title))
        }
    }

    fn report_mouse(&mut self, kind: MouseEventKind, button: MouseButton) {
        let Some((col, row)) = self.cell_at_mouse() else { return };
        if let Some(bytes) = input::encode_mouse(
            kind,
            button,
            col + 1,
            row + 1,
            self.modifiers,
            self.terminal.modes.mouse_tracking,
            self.terminal.modes.mouse_encoding,
        ) {
            self.write_to_pty(bytes);
        }
    }

    /// 0-based (col, row) of the current pointer position, in cells.
    fn cell_at_mouse(&self) -> Option<(u16, u16)> {
        let (cw, ch) = self.cell_size();
        if cw == 0 || ch == 0 {
            return None;
        }
        let col = ((self.mouse_pos.0 as u32).saturating_sub(MARGIN) / cw) as u16;
        let row = ((self.mouse_pos.1 as u32).saturating_sub(MARGIN) / ch) as u16;
        Some((col, row))
    }
}

fn winit_key_to_key(key: &WinitKey) -> Option<Key> {
    match key {
        WinitKey::Character(s) => s.chars().next().map(Key::Char),
        WinitKey::Named(NamedKey::Enter) => Some(Key::Enter),
        WinitKey::Named(NamedKey::Tab) => Some(Key::Tab),
        WinitKey::Named(NamedKey::Backspace) => Some(Key::Backspace),
        WinitKey::Named(NamedKey::Escape) => Some(Key::Escape),
        WinitKey::Named(NamedKey::ArrowUp) => Some(Key::Up),
        WinitKey::Named(NamedKey::ArrowDown) => Some(Key::Down),
        WinitKey::Named(NamedKey::ArrowLeft) => Some(Key::Left),
        WinitKey::Named(NamedKey::ArrowRight) => Some(Key::Right),
        WinitKey::Named(NamedKey::Home) => Some(Key::Home),
        WinitKey::Named(NamedKey::End) => Some(Key::End),
        WinitKey::Named(NamedKey::PageUp) => Some(Key::PageUp),
        WinitKey::Named(NamedKey::PageDown) => Some(Key::PageDown),
        WinitKey::Named(NamedKey::Insert) => Some(Key::Insert),
        WinitKey::Named(NamedKey::Delete) => Some(Key::Delete),
        WinitKey::Named(NamedKey::F1) => Some(Key::F(1)),
        WinitKey::Named(NamedKey::F2) => Some(Key::F(2)),
        WinitKey::Named(NamedKey::F3) => Some(Key::F(3)),
        WinitKey::Named(NamedKey::F4) => Some(Key::F(4)),
        WinitKey::Named(NamedKey::F5) => Some(Key::F(5)),
        WinitKey::Named(NamedKey::F6) => Some(Key::F(6)),
        WinitKey::Named(NamedKey::F7) => Some(Key::F(7)),
        WinitKey::Named(NamedKey::F8) => Some(Key::F(8)),
        WinitKey::Named(NamedKey::F9) => Some(Key::F(9)),
        WinitKey::Named(NamedKey::F10) => Some(Key::F(10)),
        WinitKey::Named(NamedKey::F11) => Some(Key::F(11)),
        WinitKey::Named(NamedKey::F12) => Some(Key::F(12)),
        WinitKey::Named(NamedKey::F13) => Some(Key::F(13)),
        WinitKey::Named(NamedKey::F14) => Some(Key::F(14)),
        WinitKey::Named(NamedKey::F15) => Some(Key::F(15)),
        WinitKey::Named(NamedKey::F16) => Some(Key::F(16)),
        WinitKey::Named(NamedKey::F17) => Some(Key::F(17)),
        WinitKey::Named(NamedKey::F18) => Some(Key::F(18)),
        WinitKey::Named(NamedKey::F19) => Some(Key::F(19)),
        WinitKey::Named(NamedKey::F20) => Some(Key::F(20)),
        WinitKey::Named(NamedKey::F21) => Some(Key::F(21)),
        WinitKey::Named(NamedKey::F22) => Some(Key::F(22)),
        WinitKey::Named(NamedKey::F23) => Some(Key::F(23)),
        WinitKey::Named(NamedKey::F24) => Some(Key::F(24)),
        WinitKey::Named(NamedKey::Space) => Some(Key::Char(' ')),
        _ => None,
    }
}

/// Numeric-keypad keys are identified by physical position, not logical
/// character, so NumLock state or layout can't turn them into regular digits
/// underneath us.
fn winit_physical_key_to_keypad(key: &PhysicalKey) -> Option<Key> {
    match key {
        PhysicalKey::Code(KeyCode::Numpad0) => Some(Key::KeypadDigit(0)),
        PhysicalKey::Code(KeyCode::Numpad1) => Some(Key::KeypadDigit(1)),
        PhysicalKey::Code(KeyCode::Numpad2) => Some(Key::KeypadDigit(2)),
        PhysicalKey::Code(KeyCode::Numpad3) => Some(Key::KeypadDigit(3)),
        PhysicalKey::Code(KeyCode::Numpad4) => Some(Key::KeypadDigit(4)),
        PhysicalKey::Code(KeyCode::Numpad5) => Some(Key::KeypadDigit(5)),
        PhysicalKey::Code(KeyCode::Numpad6) => Some(Key::KeypadDigit(6)),
        PhysicalKey::Code(KeyCode::Numpad7) => Some(Key::KeypadDigit(7)),
        PhysicalKey::Code(KeyCode::Numpad8) => Some(Key::KeypadDigit(8)),
        PhysicalKey::Code(KeyCode::Numpad9) => Some(Key::KeypadDigit(9)),
        PhysicalKey::Code(KeyCode::NumpadDecimal) => Some(Key::KeypadDot),
        PhysicalKey::Code(KeyCode::NumpadAdd) => Some(Key::KeypadPlus),
        PhysicalKey::Code(KeyCode::NumpadSubtract) => Some(Key::KeypadMinus),
        PhysicalKey::Code(KeyCode::NumpadMultiply) => Some(Key::KeypadMultiply),
        PhysicalKey::Code(KeyCode::NumpadDivide) => Some(Key::KeypadDivide),
        PhysicalKey::Code(KeyCode::NumpadEnter) => Some(Key::KeypadEnter),
        _ => None,
    }
}
