//! On-disk configuration, loaded from `~/.config/squall/config.toml` via
//! the `toml` crate. Missing file or parse error falls back to defaults,
//! logged but never fatal.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub font: FontConfig,
    pub terminal: TerminalConfig,
    pub audio: AudioConfig,
    #[serde(default)]
    pub shaders: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    pub columns: u16,
    pub rows: u16,
    pub scrollback_lines: usize,
    pub cursor_blink: bool,
    pub cursor_shape: String,
    pub shell: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            font: FontConfig { path: PathBuf::from("fonts/system.psf") },
            terminal: TerminalConfig {
                columns: 118,
                rows: 66,
                scrollback_lines: 10_000,
                cursor_blink: true,
                cursor_shape: "block".to_string(),
                shell: None,
            },
            audio: AudioConfig { enabled: true },
            shaders: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from the standard path, falling back to defaults on any
    /// missing file or parse error (logged, never fatal).
    pub fn load() -> Self {
        let path = config_path();
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("failed to parse config: {e}"),
                },
                Err(e) => tracing::warn!("failed to read config: {e}"),
            }
        }
        Self::default()
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("~/.config")).join("squall")
    }
}

fn config_path() -> PathBuf {
    Config::config_dir().join("config.toml")
}

pub fn resolve_relative_to_root(path: &Path, root: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        let from_root = root.join(path);
        if from_root.exists() {
            from_root
        } else {
            path.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.terminal.columns, config.terminal.columns);
        assert_eq!(parsed.terminal.rows, config.terminal.rows);
    }

    #[test]
    fn resolve_relative_prefers_root_when_present() {
        let root = std::env::temp_dir().join(format!("squall-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        let target = root.join("shader.wgsl");
        std::fs::write(&target, "// test").unwrap();
        let resolved = resolve_relative_to_root(Path::new("shader.wgsl"), &root);
        assert_eq!(resolved, target);
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn resolve_relative_falls_back_to_as_is_when_absent() {
        let root = Path::new("/nonexistent-root-for-squall-test");
        let resolved = resolve_relative_to_root(Path::new("shader.wgsl"), root);
        assert_eq!(resolved, Path::new("shader.wgsl"));
    }
}
