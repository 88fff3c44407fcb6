//! PTY host (C7): spawns the user's shell behind a pseudo-terminal and
//! drains it non-blockingly from the main loop, feeding a single
//! cooperative event loop rather than a separate parser/render-pump
//! thread.

pub mod session;

pub use session::PtySession;

use std::collections::HashMap;

use portable_pty::{native_pty_system, CommandBuilder, PtySize};

/// Detect the user's login shell, falling back to a sane default.
fn detect_shell() -> String {
    if let Ok(shell) = std::env::var("SHELL") {
        if !shell.is_empty() {
            return shell;
        }
    }
    if cfg!(target_os = "macos") {
        "/bin/zsh".to_string()
    } else {
        "/bin/bash".to_string()
    }
}

fn shell_name(shell_path: &str) -> &str {
    shell_path.rsplit('/').next().unwrap_or(shell_path)
}

pub fn spawn_shell(
    shell_path: Option<&str>,
    cwd: Option<&str>,
    rows: u16,
    cols: u16,
    env: &HashMap<String, String>,
) -> anyhow::Result<PtySession> {
    let pty_system = native_pty_system();
    let shell = match shell_path {
        Some(p) if std::path::Path::new(p).exists() => p.to_string(),
        Some(p) => {
            tracing::warn!(shell = p, "configured shell not found, falling back to detected default");
            detect_shell()
        }
        None => detect_shell(),
    };

    let pair = pty_system.openpty(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })?;

    let mut cmd = CommandBuilder::new(&shell);
    if let Some(dir) = cwd {
        cmd.cwd(dir);
    } else if let Some(home) = dirs::home_dir() {
        cmd.cwd(home);
    }

    cmd.env("TERM", "xterm-256color");
    cmd.env("COLORTERM", "truecolor");
    cmd.env("TERM_PROGRAM", "squall");
    cmd.env("TERM_PROGRAM_VERSION", env!("CARGO_PKG_VERSION"));
    let lang = std::env::var("LANG").unwrap_or_else(|_| "en_US.UTF-8".to_string());
    cmd.env("LANG", lang);
    if let Ok(lc_all) = std::env::var("LC_ALL") {
        cmd.env("LC_ALL", lc_all);
    }
    for (k, v) in env {
        let k = k.trim();
        if !k.is_empty() {
            cmd.env(k, v);
        }
    }

    #[cfg(unix)]
    if shell_name(&shell) != "fish" {
        cmd.arg("--login");
    }

    let child = pair.slave.spawn_command(cmd)?;
    let reader = pair.master.try_clone_reader()?;
    let writer = pair.master.take_writer()?;

    PtySession::new(pair.master, child, reader, writer, rows, cols)
}
