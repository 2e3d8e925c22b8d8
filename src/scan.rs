//! Local filesystem queries under a project's production root.
//!
//! Pure reads, computed fresh on every call. A missing directory is the
//! normal "nothing here yet" case and yields an empty listing.

use std::{
    collections::BTreeSet,
    fs, io,
    path::{Path, PathBuf},
};

use ignore::WalkBuilder;
use jiff::Timestamp;
use tracing::warn;

use crate::model::{AssetListing, Coordinate, Level, ProjectHierarchy, SHOT_FOLDER};

/// Lists hierarchy nodes that exist on local disk.
#[derive(Debug, Clone)]
pub struct LocalScanner {
    production_root: PathBuf,
}

impl LocalScanner {
    pub fn new(production_root: impl Into<PathBuf>) -> Self {
        Self {
            production_root: production_root.into(),
        }
    }

    pub fn production_root(&self) -> &Path {
        &self.production_root
    }

    /// Absolute local path of a node.
    pub fn path_of(&self, coordinate: &Coordinate) -> PathBuf {
        self.production_root.join(coordinate.relative_path_buf())
    }

    // ── Per-level listings ──

    /// Asset type folders, excluding the shot folder.
    pub fn asset_types(&self) -> BTreeSet<String> {
        let mut types = list_entries(&self.production_root, EntryKind::Directory);
        types.remove(SHOT_FOLDER);
        types
    }

    /// Every asset type folder mapped to the assets it contains.
    pub fn assets(&self) -> AssetListing {
        self.asset_types()
            .into_iter()
            .map(|folder| {
                let assets =
                    list_entries(&self.production_root.join(&folder), EntryKind::Directory);
                (folder, assets)
            })
            .collect()
    }

    pub fn departments(&self, folder: &str, asset: &str) -> BTreeSet<String> {
        list_entries(
            &self.production_root.join(folder).join(asset),
            EntryKind::Directory,
        )
    }

    pub fn tasks(&self, folder: &str, asset: &str, department: &str) -> BTreeSet<String> {
        list_entries(
            &self.production_root.join(folder).join(asset).join(department),
            EntryKind::Directory,
        )
    }

    pub fn files(
        &self,
        folder: &str,
        asset: &str,
        department: &str,
        task: &str,
    ) -> BTreeSet<String> {
        list_entries(
            &self
                .production_root
                .join(folder)
                .join(asset)
                .join(department)
                .join(task),
            EntryKind::File,
        )
    }

    /// Names one level below `parent`: directories above task level, files below it.
    pub fn children(&self, parent: &Coordinate) -> BTreeSet<String> {
        match parent.child_level() {
            None => BTreeSet::new(),
            Some(Level::Folder) => self.asset_types(),
            Some(level) => {
                let kind = if level.is_directory() {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };
                list_entries(&self.path_of(parent), kind)
            }
        }
    }

    // ── Node facts ──

    /// Last modification time, or `None` if the path is missing or unreadable.
    pub fn modification_time(&self, path: &Path) -> Option<Timestamp> {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        Timestamp::try_from(modified).ok()
    }

    /// Size in bytes; zero if the path is missing.
    pub fn size(&self, path: &Path) -> u64 {
        fs::metadata(path).map(|m| m.len()).unwrap_or(0)
    }

    // ── Full walk ──

    /// Walk the whole production tree down to file level.
    ///
    /// Nothing is filtered except the shot folder: hidden files and
    /// ignore files have no meaning in a production tree.
    pub fn walk(&self) -> ProjectHierarchy {
        let mut hierarchy = ProjectHierarchy::default();
        let root = self.production_root.as_path();

        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .max_depth(Some(Level::File.depth()))
            .filter_entry(|entry| entry.depth() != 1 || entry.file_name() != SHOT_FOLDER)
            .sort_by_file_name(Ord::cmp)
            .build();

        for entry in walker.flatten() {
            let depth = entry.depth();
            if depth == 0 {
                continue;
            }
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            // Directories up to task level, plain files only at file level.
            if is_dir == (depth == Level::File.depth()) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let segments: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            hierarchy.insert(&segments);
        }

        hierarchy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Directory,
    File,
}

/// Names of the immediate children of `dir` that match `kind`.
fn list_entries(dir: &Path, kind: EntryKind) -> BTreeSet<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeSet::new(),
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "failed to list directory");
            return BTreeSet::new();
        }
    };

    entries
        .flatten()
        .filter(|entry| {
            entry.file_type().is_ok_and(|ft| match kind {
                EntryKind::Directory => ft.is_dir(),
                EntryKind::File => ft.is_file(),
            })
        })
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect()
}
