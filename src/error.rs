use std::fmt;

/// Error kinds that can end a session outright. Everything else (malformed
/// escape sequences, unknown SGR/OSC codes, bounded-buffer overflow) is
/// handled locally by the parser and never surfaces as an error — the
/// parser never fails externally.
#[derive(Debug)]
pub enum FatalError {
    /// The PTY master returned an I/O error other than EAGAIN/EWOULDBLOCK.
    PtyRead(std::io::Error),
    /// A write back to the PTY (DSR/DA replies, keyboard input) failed for a
    /// reason other than being interrupted.
    PtyWrite(std::io::Error),
    /// The bitmap font failed to load at startup.
    FontLoad(anyhow::Error),
    /// GPU surface/device creation failed at startup.
    GpuInit(anyhow::Error),
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::PtyRead(e) => write!(f, "PTY read failed: {e}"),
            FatalError::PtyWrite(e) => write!(f, "PTY write failed: {e}"),
            FatalError::FontLoad(e) => write!(f, "font load failed: {e}"),
            FatalError::GpuInit(e) => write!(f, "GPU init failed: {e}"),
        }
    }
}

impl std::error::Error for FatalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FatalError::PtyRead(e) | FatalError::PtyWrite(e) => Some(e),
            FatalError::FontLoad(e) | FatalError::GpuInit(e) => Some(e.as_ref()),
        }
    }
}

/// True if an I/O error is the expected "no data right now" signal from a
/// non-blocking read.
pub fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
    )
}

/// True if a write should be retried rather than treated as fatal.
pub fn is_write_retryable(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::Interrupted
}
