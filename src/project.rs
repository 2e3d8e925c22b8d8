//! Project lifecycle: create, delete, list, select.
//!
//! A project is a folder under the configured projects folder laid out from
//! a [`ProjectTemplate`]. When a server is reachable it is asked to create
//! the project first, and a refusal aborts before anything is written locally.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde_json::json;
use tracing::{info, warn};

use crate::{
    model::{Coordinate, CoordinateError, ProjectTemplate},
    remote::RemoteClient,
};

/// Errors that can occur managing projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("invalid project name: {0}")]
    InvalidName(#[from] CoordinateError),

    #[error("project already exists locally: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("project not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("server refused: {0}")]
    ServerRejected(String),

    #[error("server did not answer")]
    NoResponse,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, ProjectError>;

/// Create a project on the server (if reachable) and then locally.
///
/// Returns the local project folder.
pub fn create_project(
    projects_folder: &Path,
    remote: &RemoteClient,
    name: &str,
    template: &ProjectTemplate,
) -> Result<PathBuf> {
    Coordinate::project(name)?;
    let project_path = projects_folder.join(name);
    if project_path.exists() {
        return Err(ProjectError::AlreadyExists(project_path));
    }

    if remote.base_url().is_some() && remote.health_probe() {
        let body = json!({ "name": name });
        let endpoint = format!("/projects/{}", urlencoding::encode(name));
        match remote.post(&endpoint, Some(&body)) {
            Some(reply) => {
                if let Some(reason) = reply.get("error") {
                    let reason = reason.as_str().map_or_else(|| reason.to_string(), str::to_string);
                    return Err(ProjectError::ServerRejected(reason));
                }
                info!(name, "project created on server");
            }
            None => warn!(name, "server did not answer project creation, creating locally only"),
        }
    }

    for (phase, sub) in template.directories() {
        fs::create_dir_all(project_path.join(phase).join(sub))?;
    }
    info!(path = %project_path.display(), "project created locally");
    Ok(project_path)
}

/// Delete a project from the server. Local files are left alone.
pub fn delete_project(remote: &RemoteClient, name: &str) -> Result<()> {
    Coordinate::project(name)?;
    let reply = remote
        .delete(&format!("/projects/{}", urlencoding::encode(name)))
        .ok_or(ProjectError::NoResponse)?;
    if let Some(reason) = reply.get("error") {
        let reason = reason.as_str().map_or_else(|| reason.to_string(), str::to_string);
        return Err(ProjectError::ServerRejected(reason));
    }
    info!(name, "project deleted on server");
    Ok(())
}

/// Project folder names under `projects_folder`, sorted.
pub fn list_projects(projects_folder: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(projects_folder) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// The folder of an existing project, for making it the active one.
pub fn locate_project(projects_folder: &Path, name: &str) -> Result<PathBuf> {
    Coordinate::project(name)?;
    let path = projects_folder.join(name);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(ProjectError::NotFound(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    use crate::remote::testing::{BASE_URL, DiskServer};

    fn setup(connected: bool) -> (TempDir, DiskServer, RemoteClient) {
        let dir = TempDir::new().unwrap();
        let server = DiskServer::new(dir.path());
        let remote = RemoteClient::new(server.clone());
        if connected {
            remote.configure(BASE_URL);
        }
        (dir, server, remote)
    }

    #[test]
    fn create_lays_out_template_locally_and_remotely() {
        let (dir, server, remote) = setup(true);
        let projects = dir.path().join("projects");

        let path = create_project(&projects, &remote, "Demo", &ProjectTemplate::default()).unwrap();

        assert_eq!(path, projects.join("Demo"));
        assert!(path.join("02_Production").join("Chara").is_dir());
        assert!(path.join("01_PreProduction").join("storyboard").is_dir());
        assert!(path.join("03_PostProduction").join("DCP").is_dir());
        assert!(server.project_exists("Demo"));
    }

    #[test]
    fn create_without_server_is_local_only() {
        let (dir, server, remote) = setup(false);
        let projects = dir.path().join("projects");

        create_project(&projects, &remote, "Demo", &ProjectTemplate::default()).unwrap();

        assert!(projects.join("Demo").join("02_Production").is_dir());
        assert!(!server.project_exists("Demo"));
    }

    #[test]
    fn server_refusal_aborts_local_creation() {
        let (dir, server, remote) = setup(true);
        let projects = dir.path().join("projects");
        server.mkdir("Demo", "Chara");

        let err = create_project(&projects, &remote, "Demo", &ProjectTemplate::default())
            .unwrap_err();

        assert!(matches!(err, ProjectError::ServerRejected(ref r) if r.contains("already exists")));
        assert!(!projects.join("Demo").exists());
    }

    #[test]
    fn create_existing_local_project_fails() {
        let (dir, server, remote) = setup(true);
        let projects = dir.path().join("projects");
        fs::create_dir_all(projects.join("Demo")).unwrap();

        let err = create_project(&projects, &remote, "Demo", &ProjectTemplate::default())
            .unwrap_err();

        assert!(matches!(err, ProjectError::AlreadyExists(_)));
        assert_eq!(server.request_count(), 0);
    }

    #[test]
    fn create_rejects_bad_names() {
        let (dir, _server, remote) = setup(false);
        let projects = dir.path().join("projects");

        for name in ["", "..", "a/b"] {
            let err = create_project(&projects, &remote, name, &ProjectTemplate::default())
                .unwrap_err();
            assert!(matches!(err, ProjectError::InvalidName(_)), "{name:?}");
        }
    }

    #[test]
    fn delete_removes_server_project() {
        let (_dir, server, remote) = setup(true);
        server.mkdir("Demo", "Chara");

        delete_project(&remote, "Demo").unwrap();
        assert!(!server.project_exists("Demo"));

        let err = delete_project(&remote, "Demo").unwrap_err();
        assert!(matches!(err, ProjectError::ServerRejected(_)));
    }

    #[test]
    fn delete_while_disconnected_has_no_response() {
        let (_dir, _server, remote) = setup(false);
        assert!(matches!(
            delete_project(&remote, "Demo"),
            Err(ProjectError::NoResponse)
        ));
    }

    #[test]
    fn list_only_directories_sorted() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("Zeta")).unwrap();
        fs::create_dir_all(dir.path().join("Alpha")).unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        assert_eq!(list_projects(dir.path()).unwrap(), vec!["Alpha", "Zeta"]);
        assert!(list_projects(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn locate_requires_existing_folder() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("Demo")).unwrap();

        assert_eq!(locate_project(dir.path(), "Demo").unwrap(), dir.path().join("Demo"));
        assert!(matches!(
            locate_project(dir.path(), "Other"),
            Err(ProjectError::NotFound(_))
        ));
    }
}
