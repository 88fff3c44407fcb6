use std::io::Write;
use std::sync::mpsc::{Receiver, TryRecvError};

use portable_pty::{Child, MasterPty, PtySize};

use crate::error::{is_write_retryable, FatalError};

/// A live PTY-backed shell. A single background thread performs the
/// (necessarily blocking, per `portable_pty`) reads and forwards chunks over
/// a channel; the main loop drains that channel non-blockingly once per
/// frame. This reader thread and the audio callback are the only true
/// concurrency in the application.
pub struct PtySession {
    master: Option<Box<dyn MasterPty + Send>>,
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    rx: Receiver<std::io::Result<Vec<u8>>>,
    reader_handle: Option<std::thread::JoinHandle<()>>,
    exit_code: Option<i32>,
    eof: bool,
}

impl PtySession {
    pub fn new(
        master: Box<dyn MasterPty + Send>,
        child: Box<dyn Child + Send + Sync>,
        mut reader: Box<dyn std::io::Read + Send>,
        writer: Box<dyn Write + Send>,
        _rows: u16,
        _cols: u16,
    ) -> anyhow::Result<Self> {
        let (tx, rx) = std::sync::mpsc::channel();
        let reader_handle = std::thread::Builder::new()
            .name("squall-pty-reader".into())
            .spawn(move || {
                let mut buf = [0u8; 65536];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => {
                            let _ = tx.send(Ok(Vec::new()));
                            break;
                        }
                        Ok(n) => {
                            if tx.send(Ok(buf[..n].to_vec())).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            break;
                        }
                    }
                }
            })?;

        Ok(Self {
            master: Some(master),
            child,
            writer,
            rx,
            reader_handle: Some(reader_handle),
            exit_code: None,
            eof: false,
        })
    }

    /// Drain whatever the shell has written since the last call without
    /// blocking. Returns `Ok(None)` once the child has exited (EOF).
    pub fn drain(&mut self) -> Result<Option<Vec<u8>>, FatalError> {
        if self.eof {
            return Ok(None);
        }
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(Ok(chunk)) if chunk.is_empty() => {
                    self.eof = true;
                    self.mark_exited();
                    break;
                }
                Ok(Ok(mut chunk)) => out.append(&mut chunk),
                Ok(Err(e)) => {
                    self.eof = true;
                    self.mark_exited();
                    return Err(FatalError::PtyRead(e));
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.eof = true;
                    self.mark_exited();
                    break;
                }
            }
        }
        if self.eof && out.is_empty() {
            Ok(None)
        } else {
            Ok(Some(out))
        }
    }

    pub fn write_input(&mut self, data: &[u8]) -> Result<(), FatalError> {
        loop {
            match self.writer.write_all(data) {
                Ok(()) => return self.writer.flush().map_err(FatalError::PtyWrite),
                Err(e) if is_write_retryable(&e) => continue,
                Err(e) => return Err(FatalError::PtyWrite(e)),
            }
        }
    }

    pub fn resize(&mut self, rows: u16, cols: u16) -> anyhow::Result<()> {
        if let Some(master) = self.master.as_ref() {
            master.resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })?;
        }
        Ok(())
    }

    fn mark_exited(&mut self) {
        if self.exit_code.is_none() {
            self.exit_code = self
                .child
                .try_wait()
                .ok()
                .flatten()
                .map(|s| if s.success() { 0 } else { 1 });
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Terminate the child: SIGHUP first, a short grace period, then
    /// SIGKILL (plus the process group) if it's still alive.
    pub fn kill(&mut self) {
        let pid = self.child.process_id();
        let _ = self.child.kill();

        let deadline = std::time::Instant::now() + std::time::Duration::from_millis(200);
        let mut exited = false;
        while std::time::Instant::now() < deadline {
            if matches!(self.child.try_wait(), Ok(Some(_))) {
                exited = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        if !exited {
            #[cfg(unix)]
            if let Some(raw_pid) = pid {
                unsafe {
                    libc::kill(-(raw_pid as i32), libc::SIGKILL);
                    libc::kill(raw_pid as i32, libc::SIGKILL);
                }
            }
            let _ = self.child.try_wait();
        }

        // Dropping the master closes its fd, which unblocks the reader
        // thread's read() with EOF/EIO so the join below doesn't hang.
        self.master = None;
        if let Some(handle) = self.reader_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        if self.master.is_some() {
            self.kill();
        }
    }
}
