//! Connectivity to the pipeline server.
//!
//! `RemoteClient` keeps one logical connection to a configured base URL and
//! only issues requests while it believes the server is up. Every failure is
//! swallowed into `None` / `false` plus a log line; nothing propagates past
//! this boundary, so the rest of the app treats "no data" and "not
//! connected" the same way.

mod transport;

#[cfg(test)]
pub(crate) mod testing;

use std::{
    fs,
    path::Path,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use serde_json::Value;
use tracing::{debug, error, info, warn};

pub use transport::{HttpTransport, Response, Transport, TransportError};

pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Which failed requests trigger a fresh health probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReprobePolicy {
    /// Every failed request re-checks the connection.
    #[default]
    Always,
    /// Only failed GET/POST/DELETE requests re-check; transfers do not.
    ReadsOnly,
    Never,
}

/// The shape of a request, as far as the re-probe policy cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Request,
    Transfer,
}

impl ReprobePolicy {
    fn reprobes(self, kind: RequestKind) -> bool {
        match self {
            Self::Always => true,
            Self::ReadsOnly => kind == RequestKind::Request,
            Self::Never => false,
        }
    }
}

/// Called with the new state whenever the connection flips.
pub type ConnectionObserver = Arc<dyn Fn(bool) + Send + Sync>;

/// Connection-gated access to the pipeline server.
pub struct RemoteClient {
    transport: Box<dyn Transport>,
    base_url: RwLock<Option<String>>,
    connected: AtomicBool,
    observers: Mutex<Vec<ConnectionObserver>>,
    policy: ReprobePolicy,
}

impl RemoteClient {
    /// A client with no server configured: disconnected until `configure`.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            base_url: RwLock::new(None),
            connected: AtomicBool::new(false),
            observers: Mutex::new(Vec::new()),
            policy: ReprobePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ReprobePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Point the client at a server and probe it immediately.
    ///
    /// An empty URL means local-only mode.
    pub fn configure(&self, base_url: &str) -> bool {
        let trimmed = base_url.trim().trim_end_matches('/');
        let url = (!trimmed.is_empty()).then(|| trimmed.to_string());
        *self
            .base_url
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = url;
        self.health_probe()
    }

    pub fn base_url(&self) -> Option<String> {
        self.base_url
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Register an observer for connection transitions.
    ///
    /// Observers run without the registry locked, so they may subscribe or
    /// probe again.
    pub fn subscribe(&self, observer: impl Fn(bool) + Send + Sync + 'static) {
        self.observers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Arc::new(observer));
    }

    /// Check `/health`; the server is up iff it answers 200 within two seconds.
    pub fn health_probe(&self) -> bool {
        let Some(base) = self.base_url() else {
            debug!("no server URL configured");
            self.set_connected(false);
            return false;
        };

        let connected = match self.transport.get(&format!("{base}/health"), HEALTH_TIMEOUT) {
            Ok(response) => {
                debug!(status = response.status, "health probe answered");
                response.is_ok()
            }
            Err(e) => {
                warn!(%base, error = %e, "health probe failed");
                false
            }
        };
        self.set_connected(connected);
        connected
    }

    /// Update the connection state, notifying observers only on a change.
    fn set_connected(&self, connected: bool) {
        let previous = self.connected.swap(connected, Ordering::SeqCst);
        if previous == connected {
            return;
        }
        if connected {
            info!("server connected, collaborative mode");
        } else {
            info!("server disconnected, local mode");
        }
        let observers = self
            .observers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();
        for observer in &observers {
            observer(connected);
        }
    }

    fn url(&self, endpoint: &str) -> Option<String> {
        if !self.is_connected() {
            return None;
        }
        self.base_url().map(|base| format!("{base}{endpoint}"))
    }

    fn on_failure(&self, kind: RequestKind) {
        if self.policy.reprobes(kind) {
            self.health_probe();
        }
    }

    // ── Requests ──

    /// GET a JSON document with the default timeout.
    pub fn get(&self, endpoint: &str) -> Option<Value> {
        self.get_with_timeout(endpoint, REQUEST_TIMEOUT)
    }

    pub fn get_with_timeout(&self, endpoint: &str, timeout: Duration) -> Option<Value> {
        let url = self.url(endpoint)?;
        let result = self.transport.get(&url, timeout);
        self.json_or_reprobe("GET", endpoint, result)
    }

    /// POST an optional JSON body and return the JSON answer.
    pub fn post(&self, endpoint: &str, body: Option<&Value>) -> Option<Value> {
        let url = self.url(endpoint)?;
        let result = self.transport.post(&url, body, REQUEST_TIMEOUT);
        self.json_or_reprobe("POST", endpoint, result)
    }

    pub fn delete(&self, endpoint: &str) -> Option<Value> {
        let url = self.url(endpoint)?;
        let result = self.transport.delete(&url, REQUEST_TIMEOUT);
        self.json_or_reprobe("DELETE", endpoint, result)
    }

    fn json_or_reprobe(
        &self,
        method: &str,
        endpoint: &str,
        result: Result<Response, TransportError>,
    ) -> Option<Value> {
        match result {
            Ok(response) if response.is_ok() => {
                let json = response.json();
                if json.is_none() {
                    warn!(method, endpoint, "response is not JSON");
                }
                json
            }
            Ok(response) => {
                warn!(method, endpoint, status = response.status, "request rejected");
                self.on_failure(RequestKind::Request);
                None
            }
            Err(e) => {
                error!(method, endpoint, error = %e, "request failed");
                self.on_failure(RequestKind::Request);
                None
            }
        }
    }

    // ── Transfers ──

    /// Upload a local file as a multipart form.
    pub fn upload_file(&self, endpoint: &str, local_path: &Path) -> bool {
        let Some(url) = self.url(endpoint) else {
            return false;
        };
        if !local_path.is_file() {
            error!(path = %local_path.display(), "local file not found");
            return false;
        }

        match self.transport.upload(&url, local_path, UPLOAD_TIMEOUT) {
            Ok(response) if response.is_ok() => {
                info!(path = %local_path.display(), "uploaded file");
                true
            }
            Ok(response) => {
                error!(endpoint, status = response.status, "upload rejected");
                self.on_failure(RequestKind::Transfer);
                false
            }
            Err(e) => {
                error!(endpoint, error = %e, "upload failed");
                self.on_failure(RequestKind::Transfer);
                false
            }
        }
    }

    /// Download a remote file and write its bytes to `local_path`.
    ///
    /// Parent directories are created as needed. A JSON body whose only
    /// field is `error` is the server's way of saying the file is missing;
    /// nothing is written in that case.
    pub fn download_file(&self, endpoint: &str, local_path: &Path) -> bool {
        let Some(url) = self.url(endpoint) else {
            return false;
        };

        let response = match self.transport.get(&url, DOWNLOAD_TIMEOUT) {
            Ok(response) if response.is_ok() => response,
            Ok(response) => {
                error!(endpoint, status = response.status, "download rejected");
                self.on_failure(RequestKind::Transfer);
                return false;
            }
            Err(e) => {
                error!(endpoint, error = %e, "download failed");
                self.on_failure(RequestKind::Transfer);
                return false;
            }
        };

        if response.is_json()
            && let Some(reply) = response.json()
            && let Some(reason) = error_reply(&reply)
        {
            error!(endpoint, %reason, "server has no such file");
            return false;
        }

        if let Err(e) = write_file(local_path, &response.body) {
            error!(path = %local_path.display(), error = %e, "failed to write download");
            return false;
        }
        info!(path = %local_path.display(), "downloaded file");
        true
    }
}

/// The reason carried by a bare `{"error": ...}` reply, the server's only
/// shape for a missing download. JSON files with other keys are content.
fn error_reply(reply: &Value) -> Option<&Value> {
    reply.as_object().filter(|o| o.len() == 1)?.get("error")
}

fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use tempfile::TempDir;

    use testing::DiskServer;

    fn connected_client() -> (TempDir, DiskServer, RemoteClient) {
        let dir = TempDir::new().unwrap();
        let server = DiskServer::new(dir.path());
        let client = RemoteClient::new(server.clone());
        assert!(client.configure(testing::BASE_URL));
        (dir, server, client)
    }

    #[test]
    fn starts_disconnected_without_url() {
        let dir = TempDir::new().unwrap();
        let client = RemoteClient::new(DiskServer::new(dir.path()));

        assert!(!client.is_connected());
        assert!(!client.health_probe());
        assert!(!client.configure("   "));
        assert_eq!(client.base_url(), None);
    }

    #[test]
    fn configure_trims_trailing_slash() {
        let (_dir, _server, client) = connected_client();
        client.configure("http://sparkle.test/");
        assert_eq!(client.base_url().as_deref(), Some(testing::BASE_URL));
    }

    #[test]
    fn observers_fire_only_on_transitions() {
        let (_dir, server, client) = connected_client();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        client.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        client.health_probe();
        client.health_probe();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        server.set_up(false);
        client.health_probe();
        client.health_probe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        server.set_up(true);
        client.health_probe();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn observers_may_reenter_the_client() {
        let (_dir, server, client) = connected_client();
        let client = Arc::new(client);
        let weak = Arc::downgrade(&client);
        client.subscribe(move |_| {
            if let Some(client) = weak.upgrade() {
                client.subscribe(|_| {});
                client.health_probe();
            }
        });

        server.set_up(false);
        assert!(!client.health_probe());
        assert_eq!(client.observers.lock().unwrap().len(), 2);
    }

    #[test]
    fn requests_are_skipped_while_disconnected() {
        let (_dir, server, client) = connected_client();
        server.set_up(false);
        client.health_probe();
        let before = server.request_count();

        assert_eq!(client.get("/projects/Demo/assets"), None);
        assert_eq!(client.post("/create_folder/Demo/Chara", None), None);
        assert!(!client.download_file("/download/Demo/x", Path::new("/tmp/never")));

        assert_eq!(server.request_count(), before);
    }

    #[test]
    fn failed_get_reprobes_connection() {
        let (_dir, server, client) = connected_client();
        server.set_up(false);

        assert_eq!(client.get("/projects/Demo/assets"), None);
        assert!(!client.is_connected());
    }

    #[test]
    fn failed_transfer_reprobes_by_default() {
        let (dir, server, client) = connected_client();
        let file = dir.path().join("local.blend");
        fs::write(&file, "bytes").unwrap();
        server.set_up(false);

        assert!(!client.upload_file("/upload/Demo/Chara/Hero/M/L/local.blend", &file));
        assert!(!client.is_connected());
    }

    #[test]
    fn reads_only_policy_skips_reprobe_on_transfer() {
        let dir = TempDir::new().unwrap();
        let server = DiskServer::new(dir.path());
        let client = RemoteClient::new(server.clone()).with_policy(ReprobePolicy::ReadsOnly);
        client.configure(testing::BASE_URL);
        let file = dir.path().join("local.blend");
        fs::write(&file, "bytes").unwrap();
        server.set_up(false);

        assert!(!client.upload_file("/upload/Demo/Chara/Hero/M/L/local.blend", &file));
        // Still believes it is connected: no probe ran.
        assert!(client.is_connected());
    }

    #[test]
    fn upload_requires_existing_local_file() {
        let (_dir, server, client) = connected_client();
        let before = server.request_count();

        assert!(!client.upload_file("/upload/Demo/a", Path::new("/no/such/file")));
        assert_eq!(server.request_count(), before);
    }

    #[test]
    fn download_writes_bytes_and_creates_parents() {
        let (dir, server, client) = connected_client();
        server.put_file("Demo", "Chara/Hero/Modeling/Low/hero.blend", b"mesh");
        let target = dir.path().join("local/Chara/Hero/Modeling/Low/hero.blend");

        assert!(client.download_file(
            "/download/Demo/Chara/Hero/Modeling/Low/hero.blend",
            &target
        ));
        assert_eq!(fs::read(&target).unwrap(), b"mesh");
    }

    #[test]
    fn download_of_missing_file_writes_nothing() {
        let (dir, _server, client) = connected_client();
        let target = dir.path().join("local/ghost.blend");

        assert!(!client.download_file("/download/Demo/Chara/ghost.blend", &target));
        assert!(!target.exists());
        // A JSON error body is not a transport failure.
        assert!(client.is_connected());
    }

    #[test]
    fn json_files_with_an_error_field_still_download() {
        let (dir, server, client) = connected_client();
        let content = br#"{"error":"E042","line":3}"#;
        server.put_file("Demo", "Chara/Hero/Lookdev/Low/errors.json", content);
        let target = dir.path().join("local/errors.json");

        assert!(client.download_file(
            "/download/Demo/Chara/Hero/Lookdev/Low/errors.json",
            &target
        ));
        assert_eq!(fs::read(&target).unwrap(), content);
    }

    #[test]
    fn post_returns_server_json() {
        let (_dir, _server, client) = connected_client();
        let reply = client.post("/create_folder/Demo/Chara/Hero", None).unwrap();
        assert!(reply.get("message").is_some());
    }
}
