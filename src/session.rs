//! One loaded project: the remote client, engine and sync operations
//! composed from the configuration.
//!
//! A session is built per active project and dropped when the project
//! changes, taking its caches with it.

use std::{path::PathBuf, sync::Arc};

use tracing::info;

use crate::{
    config::Config,
    engine::ReconciliationEngine,
    model::{Coordinate, CoordinateError, PRODUCTION_FOLDER},
    remote::{HttpTransport, RemoteClient, ReprobePolicy, Transport, TransportError},
    scan::LocalScanner,
    sync::SyncOperations,
};

/// Errors that can occur opening a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no active project: run `sparkle project use <name>` first")]
    NoActiveProject,

    #[error("active project folder is missing: {}", .0.display())]
    MissingProject(PathBuf),

    #[error("invalid project name: {0}")]
    InvalidProject(#[from] CoordinateError),

    #[error("failed to set up HTTP client: {0}")]
    Transport(#[from] TransportError),
}

pub struct Session {
    remote: Arc<RemoteClient>,
    engine: ReconciliationEngine,
    sync: SyncOperations,
}

impl Session {
    /// Open the active project over HTTP.
    ///
    /// An empty `server_url` opens the session in local-only mode.
    pub fn open(config: &Config, server_url: &str) -> Result<Self, SessionError> {
        let transport = HttpTransport::new()?;
        Self::with_transport(config, server_url, transport, ReprobePolicy::default())
    }

    pub fn with_transport(
        config: &Config,
        server_url: &str,
        transport: impl Transport + 'static,
        policy: ReprobePolicy,
    ) -> Result<Self, SessionError> {
        let active = config
            .project_active_folder
            .as_deref()
            .ok_or(SessionError::NoActiveProject)?;
        if !active.is_dir() {
            return Err(SessionError::MissingProject(active.to_path_buf()));
        }
        let project = config
            .active_project_name()
            .ok_or(SessionError::NoActiveProject)?;
        Coordinate::project(project.as_str())?;

        let remote = Arc::new(RemoteClient::new(transport).with_policy(policy));
        if !server_url.is_empty() {
            remote.configure(server_url);
        }

        let scanner = LocalScanner::new(active.join(PRODUCTION_FOLDER));
        let sync = SyncOperations::new(scanner.clone(), Arc::clone(&remote));
        let engine = ReconciliationEngine::new(project, scanner, Arc::clone(&remote));
        info!(
            project = engine.project(),
            connected = remote.is_connected(),
            "session opened"
        );

        Ok(Self {
            remote,
            engine,
            sync,
        })
    }

    pub fn project(&self) -> &str {
        self.engine.project()
    }

    pub fn remote(&self) -> &Arc<RemoteClient> {
        &self.remote
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ReconciliationEngine {
        &mut self.engine
    }

    pub fn sync_ops(&self) -> &SyncOperations {
        &self.sync
    }

    /// Parse a `/`-separated path into a coordinate in this project.
    pub fn coordinate(&self, path: &str) -> Result<Coordinate, CoordinateError> {
        Coordinate::parse(self.project(), path)
    }
}
