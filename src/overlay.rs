//! Overlay layers (C10): 16 additive bitmap layers an application drives via
//! OSC 777 `pixel=`/`sprite=`/`text=` commands, composited back-to-front
//! (layer 1 on bottom, 16 on top) before the GPU present. Queued as raw
//! `key=value` groups by `Terminal::queue_overlay` (one OSC 777 dispatch per
//! group of semicolon-separated pairs) and drained here once per frame.
//!
//! Grounded directly on the host-extension OSC 777 contract (no retrieved
//! example implements sprite overlays); `sprite=clear` records a rectangular
//! clear stamped with the layer's version at request time, so it only
//! removes pixels drawn before the request — pixels drawn afterward, even if
//! the clear is applied later via `pixel=render`, survive.

use std::collections::HashMap;

use crate::font::Font;
use crate::terminal::{Palette, Rgb, StyleFlags};

const LAYER_COUNT: usize = 16;

#[derive(Default)]
struct Layer {
    pixels: HashMap<(u32, u32), (Rgb, u64)>,
    version: u64,
    active: bool,
}

struct PendingClear {
    layer: usize,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    at_version: u64,
}

pub struct OverlayManager {
    layers: Vec<Layer>,
    pending_clears: Vec<PendingClear>,
}

impl Default for OverlayManager {
    fn default() -> Self {
        Self {
            layers: (0..LAYER_COUNT).map(|_| Layer::default()).collect(),
            pending_clears: Vec::new(),
        }
    }
}

impl OverlayManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one OSC 777 dispatch's semicolon-separated `key=value` groups
    /// into a lookup map. Malformed entries (no `=`, non-UTF8) are skipped.
    pub fn parse_kv(params: &[Vec<u8>]) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for raw in params {
            let Ok(s) = std::str::from_utf8(raw) else { continue };
            if let Some((k, v)) = s.split_once('=') {
                map.insert(k.to_string(), v.to_string());
            }
        }
        map
    }

    /// Apply one OSC 777 request's `pixel=`/`sprite=`/`text=` keys. Keys for
    /// other subsystems (audio, display config) are ignored here.
    pub fn apply_request(&mut self, params: &[Vec<u8>], font: &Font, palette: &Palette) {
        let kv = Self::parse_kv(params);
        match kv.get("pixel").map(String::as_str) {
            Some("draw") => self.pixel_draw(&kv),
            Some("clear") => self.pixel_clear_all(),
            Some("render") => self.pixel_render(&kv),
            _ => {}
        }
        match kv.get("sprite").map(String::as_str) {
            Some("draw") => self.sprite_draw(&kv),
            Some("clear") => self.sprite_clear(&kv),
            _ => {}
        }
        if kv.get("text").map(String::as_str) == Some("draw") {
            self.text_draw(&kv, font, palette);
        }
    }

    fn layer_index(kv: &HashMap<String, String>, key: &str) -> usize {
        let raw: u32 = kv.get(key).and_then(|s| s.parse().ok()).unwrap_or(1);
        raw.clamp(1, LAYER_COUNT as u32) as usize - 1
    }

    fn pixel_draw(&mut self, kv: &HashMap<String, String>) {
        let get = |k: &str| -> u8 { kv.get(k).and_then(|s| s.parse().ok()).unwrap_or(0) };
        let x: u32 = kv.get("pixel_x").and_then(|s| s.parse().ok()).unwrap_or(0);
        let y: u32 = kv.get("pixel_y").and_then(|s| s.parse().ok()).unwrap_or(0);
        let color = (get("pixel_r"), get("pixel_g"), get("pixel_b"));
        let idx = Self::layer_index(kv, "pixel_layer");
        let version = self.layers[idx].version;
        self.layers[idx].pixels.insert((x, y), (color, version));
    }

    fn pixel_clear_all(&mut self) {
        for layer in &mut self.layers {
            layer.pixels.clear();
            layer.version += 1;
        }
        self.pending_clears.clear();
    }

    fn pixel_render(&mut self, kv: &HashMap<String, String>) {
        let target: u32 = kv.get("pixel_layer").and_then(|s| s.parse().ok()).unwrap_or(0);
        let targets: Vec<usize> = if target == 0 { (0..LAYER_COUNT).collect() } else { vec![(target.clamp(1, LAYER_COUNT as u32) - 1) as usize] };
        for idx in targets {
            self.apply_pending_clears(idx);
            self.layers[idx].version += 1;
            self.layers[idx].active = true;
        }
    }

    fn apply_pending_clears(&mut self, idx: usize) {
        let clears: Vec<usize> = self
            .pending_clears
            .iter()
            .enumerate()
            .filter(|(_, c)| c.layer == idx)
            .map(|(i, _)| i)
            .collect();
        for &ci in clears.iter().rev() {
            let clear = self.pending_clears.remove(ci);
            self.layers[idx].pixels.retain(|&(px, py), &mut (_, drawn_at)| {
                let inside = px >= clear.x && px < clear.x + clear.w && py >= clear.y && py < clear.y + clear.h;
                !(inside && drawn_at <= clear.at_version)
            });
        }
    }

    fn sprite_draw(&mut self, kv: &HashMap<String, String>) {
        let x: u32 = kv.get("sprite_x").and_then(|s| s.parse().ok()).unwrap_or(0);
        let y: u32 = kv.get("sprite_y").and_then(|s| s.parse().ok()).unwrap_or(0);
        let w: u32 = kv.get("sprite_w").and_then(|s| s.parse().ok()).unwrap_or(0);
        let h: u32 = kv.get("sprite_h").and_then(|s| s.parse().ok()).unwrap_or(0);
        let idx = Self::layer_index(kv, "sprite_layer");
        let Some(data) = kv.get("sprite_data") else { return };
        let Ok(rgba) = base64_decode(data.as_bytes()) else { return };
        if rgba.len() != (w as usize) * (h as usize) * 4 {
            return;
        }
        let version = self.layers[idx].version;
        for row in 0..h {
            for col in 0..w {
                let off = (row as usize * w as usize + col as usize) * 4;
                let alpha = rgba[off + 3];
                if alpha == 0 {
                    continue;
                }
                let color = (rgba[off], rgba[off + 1], rgba[off + 2]);
                self.layers[idx].pixels.insert((x + col, y + row), (color, version));
            }
        }
    }

    fn sprite_clear(&mut self, kv: &HashMap<String, String>) {
        let x: u32 = kv.get("sprite_x").and_then(|s| s.parse().ok()).unwrap_or(0);
        let y: u32 = kv.get("sprite_y").and_then(|s| s.parse().ok()).unwrap_or(0);
        let w: u32 = kv.get("sprite_w").and_then(|s| s.parse().ok()).unwrap_or(0);
        let h: u32 = kv.get("sprite_h").and_then(|s| s.parse().ok()).unwrap_or(0);
        let idx = Self::layer_index(kv, "sprite_layer");
        self.pending_clears.push(PendingClear { layer: idx, x, y, w, h, at_version: self.layers[idx].version });
    }

    fn text_draw(&mut self, kv: &HashMap<String, String>, font: &Font, palette: &Palette) {
        let x: u32 = kv.get("text_x").and_then(|s| s.parse().ok()).unwrap_or(0);
        let y: u32 = kv.get("text_y").and_then(|s| s.parse().ok()).unwrap_or(0);
        let idx = Self::layer_index(kv, "text_layer");
        let color_code: u32 = kv.get("text_color").and_then(|s| s.parse().ok()).unwrap_or(1);
        let fg = match color_code {
            1..=16 => palette.get((color_code - 1) as u8),
            18 => palette.default_bg,
            _ => palette.default_fg,
        };
        let Some(data) = kv.get("text_data") else { return };
        let Ok(utf8) = base64_decode(data.as_bytes()) else { return };
        let Ok(text) = String::from_utf8(utf8) else { return };

        let version = self.layers[idx].version;
        let mut pen_x = x;
        for ch in text.chars() {
            let (glyph_rgba, gw, gh) = font.render_glyph_rgba(ch as u32, fg, StyleFlags::empty());
            for row in 0..gh {
                for col in 0..gw {
                    let off = (row as usize * gw as usize + col as usize) * 4;
                    if glyph_rgba[off + 3] == 0 {
                        continue;
                    }
                    let color = (glyph_rgba[off], glyph_rgba[off + 1], glyph_rgba[off + 2]);
                    self.layers[idx].pixels.insert((pen_x + col, y + row), (color, version));
                }
            }
            pen_x += gw;
        }
    }

    pub fn active_layer_count(&self) -> usize {
        self.layers.iter().filter(|l| l.active).count()
    }

    /// Composite all layers over `framebuffer`, back-to-front from layer 1
    /// to layer 16 so layer 16 ends up visually on top.
    pub fn composite(&self, framebuffer: &mut [u8], fb_width: u32, fb_height: u32) {
        for layer in &self.layers {
            for (&(x, y), &(color, _)) in &layer.pixels {
                if x >= fb_width || y >= fb_height {
                    continue;
                }
                let off = (y as usize * fb_width as usize + x as usize) * 4;
                framebuffer[off] = color.0;
                framebuffer[off + 1] = color.1;
                framebuffer[off + 2] = color.2;
                framebuffer[off + 3] = 0xff;
            }
        }
    }
}

fn base64_decode(input: &[u8]) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(pairs: &[(&str, &str)]) -> Vec<Vec<u8>> {
        pairs.iter().map(|(k, v)| format!("{k}={v}").into_bytes()).collect()
    }

    #[test]
    fn pixel_draw_then_composite_writes_color() {
        let font = test_font();
        let palette = Palette::default();
        let mut mgr = OverlayManager::new();
        mgr.apply_request(&kv(&[("pixel", "draw"), ("pixel_x", "2"), ("pixel_y", "3"), ("pixel_r", "10"), ("pixel_g", "20"), ("pixel_b", "30"), ("pixel_layer", "5")]), &font, &palette);
        let mut fb = vec![0u8; 10 * 10 * 4];
        mgr.composite(&mut fb, 10, 10);
        let off = (3 * 10 + 2) * 4;
        assert_eq!(&fb[off..off + 4], &[10, 20, 30, 255]);
    }

    #[test]
    fn sprite_clear_removes_only_pixels_drawn_before_the_request() {
        let font = test_font();
        let palette = Palette::default();
        let mut mgr = OverlayManager::new();
        mgr.apply_request(&kv(&[("pixel", "draw"), ("pixel_x", "0"), ("pixel_y", "0"), ("pixel_r", "1"), ("pixel_g", "1"), ("pixel_b", "1"), ("pixel_layer", "1")]), &font, &palette);
        mgr.apply_request(&kv(&[("sprite", "clear"), ("sprite_x", "0"), ("sprite_y", "0"), ("sprite_w", "5"), ("sprite_h", "5"), ("sprite_layer", "1")]), &font, &palette);
        // Pixel drawn after the clear request, before it is applied, must survive.
        mgr.apply_request(&kv(&[("pixel", "draw"), ("pixel_x", "1"), ("pixel_y", "1"), ("pixel_r", "9"), ("pixel_g", "9"), ("pixel_b", "9"), ("pixel_layer", "1")]), &font, &palette);
        mgr.apply_request(&kv(&[("pixel", "render"), ("pixel_layer", "1")]), &font, &palette);

        let mut fb = vec![0u8; 5 * 5 * 4];
        mgr.composite(&mut fb, 5, 5);
        assert_eq!(&fb[0..4], &[0, 0, 0, 0]); // the pre-clear-request pixel is gone
        let off = (1 * 5 + 1) * 4;
        assert_eq!(&fb[off..off + 4], &[9, 9, 9, 255]); // the post-clear-request pixel survives
    }

    #[test]
    fn pixel_clear_wipes_every_layer() {
        let font = test_font();
        let palette = Palette::default();
        let mut mgr = OverlayManager::new();
        mgr.apply_request(&kv(&[("pixel", "draw"), ("pixel_x", "0"), ("pixel_y", "0"), ("pixel_r", "5"), ("pixel_g", "5"), ("pixel_b", "5"), ("pixel_layer", "9")]), &font, &palette);
        mgr.apply_request(&kv(&[("pixel", "clear")]), &font, &palette);
        let mut fb = vec![0u8; 4];
        mgr.composite(&mut fb, 1, 1);
        assert_eq!(fb, vec![0, 0, 0, 0]);
    }

    fn test_font() -> Font {
        // Minimal 8x8 PSF2 font with one solid glyph for '?' so resolve_glyph
        // always succeeds without needing a real font file on disk.
        let bytes_per_glyph = 8usize;
        let mut out = Vec::new();
        out.extend_from_slice(&[0x72, 0xb5, 0x4a, 0x86]);
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&32u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&(bytes_per_glyph as u32).to_le_bytes());
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&[0xffu8; 8]);
        Font::parse_psf2(&out).unwrap()
    }
}
