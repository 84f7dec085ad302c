use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, error, trace};

use crate::error_handling::types::TtyLogError;
use crate::session_management::Session;

/// Upper bound on the bytes returned by [`TtyLogStore::read`] (10 MiB).
pub const TTYLOG_READ_LIMIT: u64 = 10_485_760;

/// Session to recording path association, keyed by durable id.
#[derive(Debug, Default)]
pub struct TtyLogStore {
    paths: HashMap<String, PathBuf>,
}

impl TtyLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session that re-opens its recording simply replaces the old path.
    pub fn record<P: AsRef<Path>>(&mut self, session: &Session, path: P) {
        let path = path.as_ref().to_path_buf();
        debug!("[{}] TTY log at {}", session.durable_id, path.display());
        if let Some(previous) = self.paths.insert(session.durable_id.clone(), path) {
            trace!(
                "[{}] Replaced previous TTY log {}",
                session.durable_id,
                previous.display()
            );
        }
    }

    pub fn path(&self, session: &Session) -> Option<&Path> {
        self.paths.get(&session.durable_id).map(PathBuf::as_path)
    }

    /// Read the session's recording, at most [`TTYLOG_READ_LIMIT`] bytes.
    ///
    /// The file handle lives only inside this call.
    pub fn read(&self, session: &Session) -> Result<Vec<u8>, TtyLogError> {
        let path = self
            .paths
            .get(&session.durable_id)
            .ok_or_else(|| TtyLogError::NotRecorded(session.durable_id.clone()))?;

        let mut buf = Vec::new();
        File::open(path)
            .and_then(|f| f.take(TTYLOG_READ_LIMIT).read_to_end(&mut buf))
            .map_err(|e| {
                error!(
                    "[{}] Failed to read TTY log {}: {}",
                    session.durable_id,
                    path.display(),
                    e
                );
                TtyLogError::Io(e)
            })?;
        debug!(
            "[{}] Read {} byte(s) from {}",
            session.durable_id,
            buf.len(),
            path.display()
        );
        Ok(buf)
    }

    pub fn forget(&mut self, session: &Session) {
        if self.paths.remove(&session.durable_id).is_some() {
            debug!("[{}] TTY log association removed", session.durable_id);
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_management::Correlator;
    use chrono::Utc;
    use std::io::Write;
    use tempfile::TempDir;

    fn session() -> Session {
        Session::new(
            Correlator(1),
            "10.0.0.5:4444".parse().unwrap(),
            "10.0.0.1:22".parse().unwrap(),
            "sensor".into(),
            Utc::now(),
        )
    }

    #[test]
    fn test_record_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tty.log");
        std::fs::write(&path, b"ls -la\r\n").unwrap();

        let session = session();
        let mut store = TtyLogStore::new();
        store.record(&session, &path);
        assert_eq!(store.read(&session).unwrap(), b"ls -la\r\n");
    }

    #[test]
    fn test_record_overwrites_previous_path() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.log");
        let second = dir.path().join("second.log");
        std::fs::write(&first, b"first").unwrap();
        std::fs::write(&second, b"second").unwrap();

        let session = session();
        let mut store = TtyLogStore::new();
        store.record(&session, &first);
        store.record(&session, &second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.path(&session), Some(second.as_path()));
        assert_eq!(store.read(&session).unwrap(), b"second");
    }

    #[test]
    fn test_read_is_capped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.log");
        let mut f = File::create(&path).unwrap();
        let chunk = vec![b'x'; 1024 * 1024];
        for _ in 0..11 {
            f.write_all(&chunk).unwrap();
        }
        f.write_all(b"tail").unwrap();
        drop(f);

        let session = session();
        let mut store = TtyLogStore::new();
        store.record(&session, &path);
        let data = store.read(&session).unwrap();
        assert_eq!(data.len() as u64, TTYLOG_READ_LIMIT);
    }

    #[test]
    fn test_read_without_association() {
        let store = TtyLogStore::new();
        match store.read(&session()) {
            Err(TtyLogError::NotRecorded(_)) => {}
            other => panic!("expected NotRecorded, got {:?}", other),
        }
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let session = session();
        let mut store = TtyLogStore::new();
        store.record(&session, dir.path().join("never-written.log"));
        match store.read(&session) {
            Err(TtyLogError::Io(_)) => {}
            other => panic!("expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_forget() {
        let session = session();
        let mut store = TtyLogStore::new();
        store.record(&session, "/tmp/whatever.log");
        store.forget(&session);
        store.forget(&session);
        assert!(store.is_empty());
        assert!(store.path(&session).is_none());
    }
}
