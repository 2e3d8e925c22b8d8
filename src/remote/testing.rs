//! A disk-backed stand-in for the pipeline server.
//!
//! Implements the server's routes over a temporary directory so tests can
//! exercise real publish/download round trips and count requests.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use serde_json::{Value, json};

use super::{Response, Transport, TransportError};
use crate::model::{PRODUCTION_FOLDER, ProjectTemplate, SHOT_FOLDER};

pub const BASE_URL: &str = "http://sparkle.test";

#[derive(Clone)]
pub struct DiskServer {
    inner: Arc<Inner>,
}

struct Inner {
    root: PathBuf,
    up: AtomicBool,
    requests: AtomicUsize,
    hits: Mutex<BTreeMap<String, usize>>,
}

impl DiskServer {
    /// Serve projects stored under `<root>/server`.
    pub fn new(root: &Path) -> Self {
        let root = root.join("server");
        fs::create_dir_all(&root).unwrap();
        Self {
            inner: Arc::new(Inner {
                root,
                up: AtomicBool::new(true),
                requests: AtomicUsize::new(0),
                hits: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Simulate the server going down or coming back.
    pub fn set_up(&self, up: bool) {
        self.inner.up.store(up, Ordering::SeqCst);
    }

    /// Requests answered so far, excluding health probes.
    pub fn request_count(&self) -> usize {
        self.inner.requests.load(Ordering::SeqCst)
    }

    /// How many times a path (without base URL) was requested.
    pub fn hits(&self, path: &str) -> usize {
        self.inner
            .hits
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn production(&self, project: &str) -> PathBuf {
        self.inner.root.join(project).join(PRODUCTION_FOLDER)
    }

    pub fn mkdir(&self, project: &str, rel: &str) {
        fs::create_dir_all(self.production(project).join(rel)).unwrap();
    }

    pub fn put_file(&self, project: &str, rel: &str, bytes: &[u8]) {
        let path = self.production(project).join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    pub fn has(&self, project: &str, rel: &str) -> bool {
        self.production(project).join(rel).exists()
    }

    pub fn project_exists(&self, project: &str) -> bool {
        self.inner.root.join(project).exists()
    }

    fn enter(&self, url: &str) -> Result<String, TransportError> {
        if !self.inner.up.load(Ordering::SeqCst) {
            return Err(TransportError::Other("connection refused".into()));
        }
        let path = url
            .strip_prefix(BASE_URL)
            .ok_or_else(|| TransportError::Other(format!("unknown host in {url}")))?
            .to_string();
        if path != "/health" {
            self.inner.requests.fetch_add(1, Ordering::SeqCst);
            *self.inner.hits.lock().unwrap().entry(path.clone()).or_default() += 1;
        }
        Ok(path)
    }

    fn list(dir: &Path, dirs: bool) -> Vec<String> {
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter(|e| e.file_type().is_ok_and(|ft| ft.is_dir() == dirs))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn assets(&self, project: &str) -> Value {
        let production = self.production(project);
        if !production.exists() {
            return json!({ "assets": [] });
        }
        let listing: serde_json::Map<String, Value> = Self::list(&production, true)
            .into_iter()
            .filter(|folder| folder != SHOT_FOLDER)
            .map(|folder| {
                let assets = Self::list(&production.join(&folder), true);
                (folder, json!(assets))
            })
            .collect();
        Value::Object(listing)
    }
}

fn json_response(value: &Value) -> Response {
    Response {
        status: 200,
        content_type: Some("application/json".into()),
        body: serde_json::to_vec(value).unwrap(),
    }
}

fn not_found() -> Response {
    Response {
        status: 404,
        content_type: Some("application/json".into()),
        body: br#"{"detail":"Not Found"}"#.to_vec(),
    }
}

/// Path segments with percent-encoding removed, as a web framework would route them.
fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::decode(s).map_or_else(|_| s.to_string(), Cow::into_owned))
        .collect()
}

impl Transport for DiskServer {
    fn get(&self, url: &str, _timeout: Duration) -> Result<Response, TransportError> {
        let path = self.enter(url)?;
        let decoded = segments(&path);
        let parts: Vec<&str> = decoded.iter().map(String::as_str).collect();

        let response = match parts.as_slice() {
            ["health"] => json_response(&json!({ "status": "OK" })),
            ["projects", project, "assets"] => json_response(&self.assets(project)),
            ["projects", project, rest @ .., "department"] if rest.len() == 2 => {
                let dir = self.production(project).join(rest.join("/"));
                json_response(&json!({ "departments": Self::list(&dir, true) }))
            }
            ["projects", project, rest @ .., "task"] if rest.len() == 3 => {
                let dir = self.production(project).join(rest.join("/"));
                json_response(&json!({ "task": Self::list(&dir, true) }))
            }
            ["projects", project, rest @ .., "file"] if rest.len() == 4 => {
                let dir = self.production(project).join(rest.join("/"));
                json_response(&json!({ "file": Self::list(&dir, false) }))
            }
            ["download", project, rest @ ..] => {
                let file = self.production(project).join(rest.join("/"));
                let content_type = if file.extension().is_some_and(|e| e == "json") {
                    "application/json"
                } else {
                    "application/octet-stream"
                };
                match fs::read(&file) {
                    Ok(body) => Response {
                        status: 200,
                        content_type: Some(content_type.into()),
                        body,
                    },
                    Err(_) => {
                        let reason = format!("File not found: {}", rest.join("/"));
                        json_response(&json!({ "error": reason }))
                    }
                }
            }
            _ => not_found(),
        };
        Ok(response)
    }

    fn post(
        &self,
        url: &str,
        _body: Option<&Value>,
        _timeout: Duration,
    ) -> Result<Response, TransportError> {
        let path = self.enter(url)?;
        let decoded = segments(&path);
        let parts: Vec<&str> = decoded.iter().map(String::as_str).collect();

        let response = match parts.as_slice() {
            ["create_folder", project, rest @ ..] if !rest.is_empty() => {
                let target = self.production(project).join(rest.join("/"));
                fs::create_dir_all(&target)?;
                let message = format!("Folder created: {}", target.display());
                json_response(&json!({ "message": message }))
            }
            ["projects", name] => {
                let project = self.inner.root.join(name);
                if project.exists() {
                    json_response(&json!({ "error": format!("Project '{name}' already exists") }))
                } else {
                    for (phase, sub) in ProjectTemplate::default().directories() {
                        fs::create_dir_all(project.join(phase).join(sub))?;
                    }
                    let message = format!("Project '{name}' created successfully");
                    json_response(&json!({ "message": message }))
                }
            }
            _ => not_found(),
        };
        Ok(response)
    }

    fn upload(
        &self,
        url: &str,
        file: &Path,
        _timeout: Duration,
    ) -> Result<Response, TransportError> {
        let path = self.enter(url)?;
        let decoded = segments(&path);
        let parts: Vec<&str> = decoded.iter().map(String::as_str).collect();

        let response = match parts.as_slice() {
            ["upload", project, rest @ ..] if !rest.is_empty() => {
                let target = self.production(project).join(rest.join("/"));
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(file, &target)?;
                json_response(&json!({ "message": "uploaded" }))
            }
            _ => not_found(),
        };
        Ok(response)
    }

    fn delete(&self, url: &str, _timeout: Duration) -> Result<Response, TransportError> {
        let path = self.enter(url)?;
        let decoded = segments(&path);
        let parts: Vec<&str> = decoded.iter().map(String::as_str).collect();

        let response = match parts.as_slice() {
            ["projects", name] => {
                let project = self.inner.root.join(name);
                if project.exists() {
                    fs::remove_dir_all(&project)?;
                    let message = format!("Project '{name}' deleted successfully");
                    json_response(&json!({ "message": message }))
                } else {
                    json_response(&json!({ "error": format!("Project '{name}' not found") }))
                }
            }
            _ => not_found(),
        };
        Ok(response)
    }
}
