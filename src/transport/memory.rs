//! In-memory transport
//!
//! A loopback dialer whose "remote" is a shared map of file contents. Used
//! for dry runs of a scenario and throughout the tests. Faults and dial
//! latency can be injected, and live connections and sub-sessions are
//! counted so leaks are observable.

use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::auth::TransportConfig;
use crate::transport::traits::{Connection, Dialer, RemoteFs};

type FileMap = Arc<Mutex<HashMap<String, Vec<u8>>>>;

#[derive(Default)]
struct Faults {
    /// 1-based dial to refuse; 0 refuses none
    fail_dial_number: AtomicUsize,
    fail_sftp_start: AtomicBool,
    fail_sftp_close: AtomicBool,
    fail_connection_close: AtomicBool,
    read_only: AtomicBool,
}

#[derive(Default)]
struct MemoryState {
    files: FileMap,
    faults: Faults,
    dial_latency_nanos: AtomicU64,
    dials: AtomicUsize,
    live_connections: AtomicUsize,
    live_sftp_sessions: AtomicUsize,
}

/// Loopback [`Dialer`] backed by process memory.
///
/// Clones share the remote files, counters and injected faults, so a fault
/// set through any clone applies to all of them.
#[derive(Clone, Default)]
pub struct MemoryDialer {
    state: Arc<MemoryState>,
}

impl MemoryDialer {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(self, flag: impl FnOnce(&Faults) -> &AtomicBool) -> Self {
        flag(&self.state.faults).store(true, Ordering::SeqCst);
        self
    }

    /// Sleep this long inside every dial.
    pub fn with_dial_latency(self, latency: Duration) -> Self {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.state.dial_latency_nanos.store(nanos, Ordering::SeqCst);
        self
    }

    /// Fail the `n`-th dial (1-based) with `ConnectionRefused`.
    pub fn fail_dial_number(self, n: usize) -> Self {
        self.state.faults.fail_dial_number.store(n, Ordering::SeqCst);
        self
    }

    pub fn fail_sftp_start(self) -> Self {
        self.set(|f| &f.fail_sftp_start)
    }

    pub fn fail_sftp_close(self) -> Self {
        self.set(|f| &f.fail_sftp_close)
    }

    pub fn fail_connection_close(self) -> Self {
        self.set(|f| &f.fail_connection_close)
    }

    /// Reject every remote create with `PermissionDenied`.
    pub fn read_only(self) -> Self {
        self.set(|f| &f.read_only)
    }

    pub fn dial_count(&self) -> usize {
        self.state.dials.load(Ordering::SeqCst)
    }

    pub fn live_connections(&self) -> usize {
        self.state.live_connections.load(Ordering::SeqCst)
    }

    pub fn live_sftp_sessions(&self) -> usize {
        self.state.live_sftp_sessions.load(Ordering::SeqCst)
    }

    /// Contents of a remote file, if present.
    pub fn remote_file(&self, path: &str) -> Option<Vec<u8>> {
        lock_files(&self.state.files).ok()?.get(path).cloned()
    }

    /// Seed a remote file.
    pub fn put_remote_file(&self, path: &str, contents: impl Into<Vec<u8>>) {
        if let Ok(mut files) = lock_files(&self.state.files) {
            files.insert(path.to_string(), contents.into());
        }
    }
}

impl Dialer for MemoryDialer {
    fn dial(
        &self,
        _config: &TransportConfig,
        host: &str,
        port: u16,
    ) -> io::Result<Box<dyn Connection>> {
        let n = self.state.dials.fetch_add(1, Ordering::SeqCst) + 1;

        let latency = self.state.dial_latency_nanos.load(Ordering::SeqCst);
        if latency > 0 {
            std::thread::sleep(Duration::from_nanos(latency));
        }

        if self.state.faults.fail_dial_number.load(Ordering::SeqCst) == n {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("dial {} to {}:{} refused", n, host, port),
            ));
        }

        self.state.live_connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
            open: true,
        }))
    }
}

struct MemoryConnection {
    state: Arc<MemoryState>,
    open: bool,
}

impl Connection for MemoryConnection {
    fn open_sftp(&mut self) -> io::Result<Box<dyn RemoteFs>> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"));
        }
        if self.state.faults.fail_sftp_start.load(Ordering::SeqCst) {
            return Err(io::Error::other("sftp subsystem request denied"));
        }
        self.state.live_sftp_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySftp {
            state: Arc::clone(&self.state),
            open: true,
        }))
    }

    fn close(&mut self) -> io::Result<()> {
        if !std::mem::replace(&mut self.open, false) {
            return Ok(());
        }
        self.state.live_connections.fetch_sub(1, Ordering::SeqCst);
        if self.state.faults.fail_connection_close.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "disconnect failed"));
        }
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

struct MemorySftp {
    state: Arc<MemoryState>,
    open: bool,
}

impl RemoteFs for MemorySftp {
    fn create(&self, path: &str) -> io::Result<Box<dyn Write + Send>> {
        if self.state.faults.read_only.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is read-only", path),
            ));
        }
        Ok(Box::new(MemoryWriter {
            files: Arc::clone(&self.state.files),
            path: path.to_string(),
            buffer: Vec::new(),
        }))
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        let files = lock_files(&self.state.files)?;
        let contents = files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no such file: {}", path)))?;
        Ok(Box::new(Cursor::new(contents)))
    }

    fn close(&mut self) -> io::Result<()> {
        if !std::mem::replace(&mut self.open, false) {
            return Ok(());
        }
        self.state.live_sftp_sessions.fetch_sub(1, Ordering::SeqCst);
        if self.state.faults.fail_sftp_close.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sftp shutdown failed"));
        }
        Ok(())
    }
}

impl Drop for MemorySftp {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Buffers writes and publishes the file on flush and on drop.
struct MemoryWriter {
    files: FileMap,
    path: String,
    buffer: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut files = lock_files(&self.files)?;
        files.insert(self.path.clone(), self.buffer.clone());
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

fn lock_files(
    files: &FileMap,
) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
    files
        .lock()
        .map_err(|_| io::Error::other("remote file map poisoned"))
}
