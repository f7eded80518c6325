//! Remote file stores: FTP for real deploys, in-memory for tests and previews.

use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::debug;

use themekit_shared::{Result, ThemekitError};

use crate::Credentials;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A remote directory tree files can be compared against and uploaded to.
///
/// Paths are absolute remote paths with `/` separators.
pub trait RemoteStore {
    /// Last modification time of `path`, or `None` if it does not exist.
    fn modified(&mut self, path: &str) -> Result<Option<DateTime<Utc>>>;

    /// Create `path` and any missing parents.
    fn ensure_dir(&mut self, path: &str) -> Result<()>;

    /// Write `contents` to `path`, replacing any existing file.
    fn upload(&mut self, path: &str, contents: &[u8]) -> Result<()>;

    /// Close the session.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens [`RemoteStore`] sessions for a configured target.
pub trait Connector: Send + Sync {
    /// Remote directory that mirrors the local build root.
    fn remote_folder(&self) -> &str;

    /// Open a new session.
    fn connect(&self) -> Result<Box<dyn RemoteStore + Send>>;
}

// ---------------------------------------------------------------------------
// FTP
// ---------------------------------------------------------------------------

/// Connects to the FTP server described by [`Credentials`].
pub struct FtpConnector {
    credentials: Credentials,
}

impl FtpConnector {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl Connector for FtpConnector {
    fn remote_folder(&self) -> &str {
        &self.credentials.remote_folder
    }

    fn connect(&self) -> Result<Box<dyn RemoteStore + Send>> {
        Ok(Box::new(FtpRemote::connect(&self.credentials)?))
    }
}

/// An authenticated FTP session in binary mode.
pub struct FtpRemote {
    stream: FtpStream,
    created: HashSet<String>,
    log: bool,
}

impl FtpRemote {
    pub fn connect(credentials: &Credentials) -> Result<Self> {
        let addr = format!("{}:{}", credentials.host, credentials.port);
        let mut stream = FtpStream::connect(&addr)
            .map_err(|e| ThemekitError::Deploy(format!("connect {addr}: {e}")))?;
        stream
            .login(credentials.user.as_str(), credentials.password.as_str())
            .map_err(|e| ThemekitError::Deploy(format!("login as {}: {e}", credentials.user)))?;
        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| ThemekitError::Deploy(format!("binary mode: {e}")))?;

        tracing::info!(host = %credentials.host, user = %credentials.user, "connected to FTP");
        Ok(Self {
            stream,
            created: HashSet::new(),
            log: credentials.log,
        })
    }
}

impl RemoteStore for FtpRemote {
    fn modified(&mut self, path: &str) -> Result<Option<DateTime<Utc>>> {
        if self.log {
            debug!(command = "MDTM", path);
        }
        match self.stream.mdtm(path) {
            Ok(naive) => Ok(Some(naive.and_utc())),
            // 550 and friends: the file is not there yet.
            Err(FtpError::UnexpectedResponse(_)) => Ok(None),
            Err(e) => Err(ThemekitError::Deploy(format!("MDTM {path}: {e}"))),
        }
    }

    fn ensure_dir(&mut self, path: &str) -> Result<()> {
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            if self.created.contains(&current) {
                continue;
            }
            if self.log {
                debug!(command = "MKD", path = %current);
            }
            match self.stream.mkdir(&current) {
                // Existing directories answer with an error reply; that is fine.
                Ok(()) | Err(FtpError::UnexpectedResponse(_)) => {}
                Err(e) => return Err(ThemekitError::Deploy(format!("MKD {current}: {e}"))),
            }
            self.created.insert(current.clone());
        }
        Ok(())
    }

    fn upload(&mut self, path: &str, contents: &[u8]) -> Result<()> {
        if self.log {
            debug!(command = "STOR", path, bytes = contents.len());
        }
        self.stream
            .put_file(path, &mut Cursor::new(contents))
            .map_err(|e| ThemekitError::Deploy(format!("STOR {path}: {e}")))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.stream
            .quit()
            .map_err(|e| ThemekitError::Deploy(format!("QUIT: {e}")))
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, (Vec<u8>, DateTime<Utc>)>,
    dirs: HashSet<String>,
}

/// A shared, in-memory remote. Clones see the same files.
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    folder: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRemote {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            state: Arc::default(),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| ThemekitError::Deploy("memory remote lock poisoned".into()))
    }

    /// Place a file with an explicit timestamp.
    pub fn insert(&self, path: &str, contents: &[u8], modified: DateTime<Utc>) -> Result<()> {
        self.lock()?
            .files
            .insert(path.to_string(), (contents.to_vec(), modified));
        Ok(())
    }

    /// Contents of `path`, if present.
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.lock()
            .ok()
            .and_then(|s| s.files.get(path).map(|(c, _)| c.clone()))
    }

    /// All file paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.lock()
            .map(|s| s.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.lock().map(|s| s.dirs.contains(path)).unwrap_or(false)
    }
}

impl RemoteStore for MemoryRemote {
    fn modified(&mut self, path: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.lock()?.files.get(path).map(|(_, m)| *m))
    }

    fn ensure_dir(&mut self, path: &str) -> Result<()> {
        let mut state = self.lock()?;
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            state.dirs.insert(current.clone());
        }
        Ok(())
    }

    fn upload(&mut self, path: &str, contents: &[u8]) -> Result<()> {
        self.lock()?
            .files
            .insert(path.to_string(), (contents.to_vec(), Utc::now()));
        Ok(())
    }
}

impl Connector for MemoryRemote {
    fn remote_folder(&self) -> &str {
        &self.folder
    }

    fn connect(&self) -> Result<Box<dyn RemoteStore + Send>> {
        Ok(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_remote_is_shared_between_sessions() {
        let remote = MemoryRemote::new("/www");
        let mut session = remote.connect().unwrap();
        session.ensure_dir("/www/assets/css").unwrap();
        session.upload("/www/assets/css/main.min.css", b"body{}").unwrap();

        assert!(remote.has_dir("/www/assets"));
        assert!(remote.has_dir("/www/assets/css"));
        assert_eq!(remote.get("/www/assets/css/main.min.css").unwrap(), b"body{}");
        assert!(session.modified("/www/missing.txt").unwrap().is_none());
    }
}
