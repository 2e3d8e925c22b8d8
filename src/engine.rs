//! Reconciliation of local and remote hierarchy state.
//!
//! Local listings are always read fresh from disk. Remote listings go
//! through a per-coordinate TTL cache so repeated status queries don't
//! hammer the server. A missing or malformed remote answer reads as
//! "the server has nothing here" and is never surfaced as an error.

use std::{collections::BTreeSet, sync::Arc};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    cache::{Clock, LevelCache, SystemClock},
    model::{AssetListing, Coordinate, Level, LocalFacts, NodeStatus, Presence},
    remote::RemoteClient,
    scan::LocalScanner,
};

/// Called after hierarchy data may have changed; `None` means "everything".
pub type ChangeObserver = Box<dyn Fn(Option<&Coordinate>) + Send>;

/// A named child of some node, with its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildStatus {
    pub name: String,
    #[serde(flatten)]
    pub status: NodeStatus,
}

/// Computes per-node sync status for one loaded project.
pub struct ReconciliationEngine {
    project: String,
    scanner: LocalScanner,
    remote: Arc<RemoteClient>,
    clock: Arc<dyn Clock>,
    /// Folder → assets listings, keyed by the project root.
    asset_cache: LevelCache<AssetListing>,
    /// Department, task and file listings, keyed by their parent.
    name_cache: LevelCache<BTreeSet<String>>,
    observers: Vec<ChangeObserver>,
}

impl ReconciliationEngine {
    pub fn new(
        project: impl Into<String>,
        scanner: LocalScanner,
        remote: Arc<RemoteClient>,
    ) -> Self {
        Self {
            project: project.into(),
            scanner,
            remote,
            clock: Arc::new(SystemClock),
            asset_cache: LevelCache::default(),
            name_cache: LevelCache::default(),
            observers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn scanner(&self) -> &LocalScanner {
        &self.scanner
    }

    pub fn remote(&self) -> &RemoteClient {
        &self.remote
    }

    // ── Listings ──

    /// Asset type folders and their assets on local disk.
    pub fn local_assets(&self) -> AssetListing {
        self.scanner.assets()
    }

    /// Asset type folders and their assets on the server, cached for 60 seconds.
    ///
    /// Empty while disconnected, whatever the cache still holds.
    pub fn server_assets(&mut self) -> AssetListing {
        if !self.remote.is_connected() {
            return AssetListing::new();
        }
        let Ok(key) = Coordinate::project(self.project.as_str()) else {
            return AssetListing::new();
        };
        let now = self.clock.now();
        let remote = &self.remote;
        let endpoint = format!("/projects/{}/assets", key.url_path());
        self.asset_cache.get_or_fetch(&key, Level::Asset.ttl(), now, || {
            parse_asset_listing(remote.get(&endpoint))
        })
    }

    /// Names directly below `parent` on local disk.
    pub fn local_children(&self, parent: &Coordinate) -> BTreeSet<String> {
        self.scanner.children(parent)
    }

    /// Names directly below `parent` on the server.
    ///
    /// Folder and asset names come from the single asset listing; deeper
    /// levels are fetched and cached per parent coordinate.
    pub fn server_children(&mut self, parent: &Coordinate) -> BTreeSet<String> {
        let Some(level) = parent.child_level() else {
            return BTreeSet::new();
        };
        if !self.remote.is_connected() {
            return BTreeSet::new();
        }

        match level {
            Level::Folder => self.server_assets().into_keys().collect(),
            Level::Asset => {
                let folder = parent.folder().unwrap_or_default();
                self.server_assets().remove(folder).unwrap_or_default()
            }
            Level::Department | Level::Task | Level::File => {
                let (suffix, key) = listing_route(level);
                let endpoint = format!("/projects/{}/{suffix}", parent.url_path());
                let now = self.clock.now();
                let remote = &self.remote;
                self.name_cache.get_or_fetch(parent, level.ttl(), now, || {
                    parse_name_listing(remote.get(&endpoint), key)
                })
            }
        }
    }

    // ── Status ──

    /// Sync status of a single node.
    pub fn status(&mut self, coordinate: &Coordinate) -> NodeStatus {
        let (Some(level), Some(parent), Some(name)) =
            (coordinate.level(), coordinate.parent(), coordinate.name())
        else {
            return NodeStatus::unknown();
        };

        let presence = Presence {
            local: self.local_children(&parent).contains(name),
            remote: self.server_children(&parent).contains(name),
        };
        self.derive(coordinate, level, presence)
    }

    /// Every child of `parent` known locally or remotely, sorted, with status.
    pub fn children(&mut self, parent: &Coordinate) -> Vec<ChildStatus> {
        let Some(level) = parent.child_level() else {
            return Vec::new();
        };
        let local = self.local_children(parent);
        let remote = self.server_children(parent);

        local
            .union(&remote)
            .filter_map(|name| {
                let child = parent.child(name.as_str()).ok()?;
                let presence = Presence {
                    local: local.contains(name),
                    remote: remote.contains(name),
                };
                Some(ChildStatus {
                    name: name.clone(),
                    status: self.derive(&child, level, presence),
                })
            })
            .collect()
    }

    fn derive(&self, coordinate: &Coordinate, level: Level, presence: Presence) -> NodeStatus {
        let facts = if presence.local {
            let path = self.scanner.path_of(coordinate);
            LocalFacts {
                modified: self.scanner.modification_time(&path),
                size: Some(self.scanner.size(&path)),
            }
        } else {
            LocalFacts::default()
        };
        NodeStatus::derive(level, presence, facts, self.clock.now())
    }

    // ── Invalidation ──

    /// Force every cached remote listing to be refetched on next use.
    ///
    /// Must follow any mutating operation so the next query reflects
    /// ground truth rather than a stale TTL window.
    pub fn clear_all_caches(&mut self) {
        self.asset_cache.clear();
        self.name_cache.clear();
        debug!(project = %self.project, "cleared all remote listing caches");
    }

    /// Drop cache entries whose TTL has passed.
    pub fn prune_caches(&mut self) {
        let now = self.clock.now();
        self.asset_cache.prune(now);
        self.name_cache.prune(now);
    }

    pub fn subscribe(&mut self, observer: impl Fn(Option<&Coordinate>) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Tell observers that data at `coordinate` (or everywhere) may have changed.
    pub fn notify_changed(&self, coordinate: Option<&Coordinate>) {
        for observer in &self.observers {
            observer(coordinate);
        }
    }
}

/// Endpoint suffix and response key for levels listed one parent at a time.
fn listing_route(level: Level) -> (&'static str, &'static str) {
    match level {
        Level::Department => ("department", "departments"),
        Level::Task => ("task", "task"),
        _ => ("file", "file"),
    }
}

/// Parse `{ folder: [asset, ...], ... }`.
///
/// The server answers `{"assets": []}` when the project has no production
/// folder at all; that reads as an empty listing.
fn parse_asset_listing(response: Option<Value>) -> AssetListing {
    let Some(Value::Object(map)) = response else {
        return AssetListing::new();
    };
    if map.len() == 1
        && map
            .get("assets")
            .and_then(Value::as_array)
            .is_some_and(Vec::is_empty)
    {
        return AssetListing::new();
    }

    map.into_iter()
        .filter_map(|(folder, assets)| match assets {
            Value::Array(items) => Some((folder, string_set(items))),
            other => {
                warn!(%folder, value = %other, "ignoring malformed asset entry");
                None
            }
        })
        .collect()
}

/// Parse `{ key: [name, ...] }`; a missing key is an empty listing.
fn parse_name_listing(response: Option<Value>, key: &str) -> BTreeSet<String> {
    let Some(response) = response else {
        return BTreeSet::new();
    };
    match response.get(key) {
        Some(Value::Array(items)) => string_set(items.clone()),
        _ => {
            warn!(key, "listing response is missing its key");
            BTreeSet::new()
        }
    }
}

fn string_set(items: Vec<Value>) -> BTreeSet<String> {
    items
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}
