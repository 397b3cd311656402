//! Module `file_ops`
//!
//! Whole-file copies between the local filesystem and a unit's SFTP
//! sub-session. These run on a blocking thread while the caller holds the
//! unit's session lock. Every handle opened here is closed on return,
//! whatever the outcome.

use log::{debug, warn};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::TransferError;
use crate::storage::{SafePath, filesystem};
use crate::transport::TransportSession;

pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Join a remote directory and file name with `/`.
pub fn remote_join(dir: &str, file_name: &str) -> String {
    let name = file_name.trim_start_matches('/');
    if dir.is_empty() {
        return name.to_string();
    }
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

/// Stream `local` into a newly created remote file at `remote`.
pub fn upload_file(
    session: &TransportSession,
    local: &SafePath,
    remote: &str,
    buffer_size: usize,
) -> Result<u64, TransferError> {
    let local_file = filesystem::open_read(local).map_err(|source| TransferError::LocalOpen {
        path: local.as_path().to_path_buf(),
        source,
    })?;

    let remote_create = |source: io::Error| TransferError::RemoteCreate {
        path: remote.to_string(),
        source,
    };
    let mut remote_file = session
        .sftp()
        .and_then(|sftp| sftp.create(remote))
        .map_err(remote_create)?;

    let mut reader = BufReader::with_capacity(buffer_size, local_file);
    let bytes = io::copy(&mut reader, &mut remote_file)
        .and_then(|n| remote_file.flush().map(|_| n))
        .map_err(|source| TransferError::Copy {
            from: local.as_path().display().to_string(),
            to: remote.to_string(),
            source,
        })?;

    debug!("Uploaded {} bytes to {}", bytes, remote);
    Ok(bytes)
}

/// Stream the remote file at `remote` into `local`.
///
/// Bytes land in `staging` first and are renamed onto `local` once the copy
/// completes. The staging file is removed if the copy or the rename fails.
pub fn download_file(
    session: &TransportSession,
    remote: &str,
    local: &SafePath,
    staging: &SafePath,
    root: &Path,
    buffer_size: usize,
) -> Result<u64, TransferError> {
    let mut remote_file = session
        .sftp()
        .and_then(|sftp| sftp.open(remote))
        .map_err(|source| TransferError::RemoteOpen {
            path: remote.to_string(),
            source,
        })?;

    let local_create = |path: &SafePath, source: io::Error| TransferError::LocalCreate {
        path: path.as_path().to_path_buf(),
        source,
    };
    filesystem::ensure_parent_dir(local, root).map_err(|e| local_create(local, e))?;
    let staging_file = filesystem::create_write(staging).map_err(|e| local_create(staging, e))?;

    let mut writer = BufWriter::with_capacity(buffer_size, staging_file);
    let copied = io::copy(&mut remote_file, &mut writer).and_then(|n| writer.flush().map(|_| n));
    drop(writer);

    let bytes = match copied {
        Ok(bytes) => bytes,
        Err(source) => {
            discard_staging(staging);
            return Err(TransferError::Copy {
                from: remote.to_string(),
                to: local.as_path().display().to_string(),
                source,
            });
        }
    };

    if let Err(e) = filesystem::rename(staging, local) {
        discard_staging(staging);
        return Err(local_create(local, e));
    }
    debug!("Downloaded {} bytes from {}", bytes, remote);
    Ok(bytes)
}

fn discard_staging(staging: &SafePath) {
    if let Err(e) = filesystem::remove(staging) {
        warn!("Failed to remove partial download {:?}: {}", staging.as_path(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PathGuard;
    use crate::transport::MemoryDialer;
    use crate::transport::testing::test_config;

    #[test]
    fn test_remote_join() {
        assert_eq!(remote_join("incoming", "report.csv"), "incoming/report.csv");
        assert_eq!(remote_join("incoming/", "report.csv"), "incoming/report.csv");
        assert_eq!(remote_join("/", "report.csv"), "/report.csv");
        assert_eq!(remote_join("", "report.csv"), "report.csv");
    }

    #[test]
    fn test_upload_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PathGuard::new(dir.path());
        let dialer = MemoryDialer::new();
        let session = TransportSession::establish(&dialer, &test_config(), "host", 22).unwrap();

        let source = guard.guard_join("data", "report.csv").unwrap();
        filesystem::ensure_parent_dir(&source, guard.root()).unwrap();
        std::fs::write(source.as_path(), b"a,b\n1,2\n").unwrap();

        let sent = upload_file(&session, &source, "incoming/report.csv", 4).unwrap();
        assert_eq!(sent, 8);
        assert_eq!(dialer.remote_file("incoming/report.csv").unwrap(), b"a,b\n1,2\n");

        let target = guard.guard_join("out", "report.csv").unwrap();
        let staging = guard.guard_join("out", "report.csv.part").unwrap();
        let received = download_file(
            &session,
            "incoming/report.csv",
            &target,
            &staging,
            guard.root(),
            4,
        )
        .unwrap();
        assert_eq!(received, 8);
        assert_eq!(std::fs::read(target.as_path()).unwrap(), b"a,b\n1,2\n");
        assert!(!staging.as_path().exists());
    }

    #[test]
    fn test_upload_missing_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PathGuard::new(dir.path());
        let dialer = MemoryDialer::new();
        let session = TransportSession::establish(&dialer, &test_config(), "host", 22).unwrap();

        let missing = guard.guard("nope.bin").unwrap();
        let err = upload_file(&session, &missing, "x", DEFAULT_BUFFER_SIZE).unwrap_err();
        assert!(matches!(err, TransferError::LocalOpen { .. }));
    }

    #[test]
    fn test_upload_read_only_remote() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PathGuard::new(dir.path());
        let dialer = MemoryDialer::new().read_only();
        let session = TransportSession::establish(&dialer, &test_config(), "host", 22).unwrap();

        let source = guard.guard("a.txt").unwrap();
        std::fs::write(source.as_path(), b"x").unwrap();
        let err = upload_file(&session, &source, "a.txt", DEFAULT_BUFFER_SIZE).unwrap_err();
        assert!(matches!(err, TransferError::RemoteCreate { .. }));
    }

    #[test]
    fn test_download_missing_remote_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PathGuard::new(dir.path());
        let dialer = MemoryDialer::new();
        let session = TransportSession::establish(&dialer, &test_config(), "host", 22).unwrap();

        let target = guard.guard_join("out", "gone.txt").unwrap();
        let staging = guard.guard_join("out", "gone.txt.part").unwrap();
        let err = download_file(
            &session,
            "incoming/gone.txt",
            &target,
            &staging,
            guard.root(),
            DEFAULT_BUFFER_SIZE,
        )
        .unwrap_err();
        assert!(matches!(err, TransferError::RemoteOpen { .. }));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_failed_rename_removes_staging() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PathGuard::new(dir.path());
        let dialer = MemoryDialer::new();
        dialer.put_remote_file("incoming/report.csv", b"a,b\n".to_vec());
        let session = TransportSession::establish(&dialer, &test_config(), "host", 22).unwrap();

        // A non-empty directory where the file should land blocks the rename
        let target = guard.guard_join("out", "report.csv").unwrap();
        std::fs::create_dir_all(target.as_path().join("occupied")).unwrap();
        let staging = guard.guard_join("out", "report.csv.00001.part").unwrap();

        let err = download_file(
            &session,
            "incoming/report.csv",
            &target,
            &staging,
            guard.root(),
            DEFAULT_BUFFER_SIZE,
        )
        .unwrap_err();
        assert!(matches!(err, TransferError::LocalCreate { .. }));
        assert!(!staging.as_path().exists());
        assert!(target.as_path().join("occupied").is_dir());
    }
}
