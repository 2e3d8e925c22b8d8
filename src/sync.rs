//! Publish and download primitives.
//!
//! Pure actions: nothing here computes status or touches the listing caches.
//! Callers are expected to clear the engine's caches after every mutation,
//! successful or not, and re-query status rather than assume the outcome.

use std::{fs, io, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    model::{Coordinate, Level},
    remote::RemoteClient,
    scan::LocalScanner,
};

/// Errors from a publish, download or local mutation.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("the project root cannot be synced")]
    ProjectRoot,

    #[error("not connected to a server")]
    Disconnected,

    #[error("server did not acknowledge folder {0}")]
    NotAcknowledged(Coordinate),

    #[error("upload failed for {0}")]
    UploadFailed(Coordinate),

    #[error("download failed for {0}")]
    DownloadFailed(Coordinate),

    #[error("{0} is a file, not a folder")]
    NotADirectory(Coordinate),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, SyncError>;

/// A mutating operation on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Publish,
    Download,
    Sync,
    Create,
    Delete,
}

impl Action {
    /// The verb used in user-facing failure messages.
    pub fn verb(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Download => "download",
            Self::Sync => "sync",
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }
}

/// One-directional convergence between a project's local tree and the server.
#[derive(Clone)]
pub struct SyncOperations {
    scanner: LocalScanner,
    remote: Arc<RemoteClient>,
}

impl SyncOperations {
    pub fn new(scanner: LocalScanner, remote: Arc<RemoteClient>) -> Self {
        Self { scanner, remote }
    }

    pub fn apply(&self, action: Action, coordinate: &Coordinate) -> Result<()> {
        match action {
            Action::Publish => self.publish(coordinate),
            Action::Download => self.download(coordinate),
            Action::Sync => self.sync(coordinate),
            Action::Create => self.create_local(coordinate),
            Action::Delete => self.delete_local(coordinate),
        }
    }

    /// Push a node to the server.
    ///
    /// Folder levels ask the server to create the directory (idempotent);
    /// files upload the local bytes.
    pub fn publish(&self, coordinate: &Coordinate) -> Result<()> {
        let level = coordinate.level().ok_or(SyncError::ProjectRoot)?;
        if !self.remote.is_connected() {
            return Err(SyncError::Disconnected);
        }
        let path = coordinate.url_path();

        if level.is_directory() {
            let reply = self.remote.post(&format!("/create_folder/{path}"), None);
            if reply.as_ref().and_then(|r| r.get("message")).is_none() {
                warn!(%coordinate, "folder creation not acknowledged");
                return Err(SyncError::NotAcknowledged(coordinate.clone()));
            }
        } else {
            let local = self.scanner.path_of(coordinate);
            if !self.remote.upload_file(&format!("/upload/{path}"), &local) {
                return Err(SyncError::UploadFailed(coordinate.clone()));
            }
        }

        info!(%coordinate, "published");
        Ok(())
    }

    /// Pull a node from the server.
    ///
    /// Folder levels only create the local directory; their remote contents
    /// are not fetched. Files are fetched and written over the local copy.
    pub fn download(&self, coordinate: &Coordinate) -> Result<()> {
        let level = coordinate.level().ok_or(SyncError::ProjectRoot)?;
        let path = self.scanner.path_of(coordinate);

        if level.is_directory() {
            fs::create_dir_all(&path)?;
        } else {
            if !self.remote.is_connected() {
                return Err(SyncError::Disconnected);
            }
            let endpoint = format!("/download/{}", coordinate.url_path());
            if !self.remote.download_file(&endpoint, &path) {
                return Err(SyncError::DownloadFailed(coordinate.clone()));
            }
        }

        info!(%coordinate, "downloaded");
        Ok(())
    }

    /// Publish, then download. Not a merge: the server copy wins.
    ///
    /// Stops at the first failure; a successful publish is not rolled back.
    pub fn sync(&self, coordinate: &Coordinate) -> Result<()> {
        self.publish(coordinate)?;
        self.download(coordinate)
    }

    /// Create a folder-level node on local disk.
    pub fn create_local(&self, coordinate: &Coordinate) -> Result<()> {
        let level = coordinate.level().ok_or(SyncError::ProjectRoot)?;
        if level == Level::File {
            return Err(SyncError::NotADirectory(coordinate.clone()));
        }
        fs::create_dir_all(self.scanner.path_of(coordinate))?;
        info!(%coordinate, "created locally");
        Ok(())
    }

    /// Remove a node and everything below it from local disk.
    ///
    /// Removing something that is already gone succeeds.
    pub fn delete_local(&self, coordinate: &Coordinate) -> Result<()> {
        if coordinate.level().is_none() {
            return Err(SyncError::ProjectRoot);
        }
        let path = self.scanner.path_of(coordinate);

        let removed = match fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(%coordinate, "nothing to delete");
                return Ok(());
            }
            Err(e) => Err(e),
        };
        removed?;
        info!(%coordinate, "deleted locally");
        Ok(())
    }
}
