//! Hierarchy coordinates: where a node sits in a project.
//!
//! A coordinate is a project name plus up to five nested segments:
//! folder (asset type), asset, department, task, file. Zero segments
//! addresses the project root itself.

use std::fmt;
use std::path::PathBuf;

use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

/// Errors raised when building a coordinate.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CoordinateError {
    #[error("invalid name segment: {0:?}")]
    InvalidSegment(String),

    #[error("cannot nest below the file level (at {0})")]
    TooDeep(String),

    #[error("project name must not be empty")]
    EmptyProject,
}

/// One level of the fixed five-level hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Asset type folder (`Chara`, `Props`, ...).
    Folder,
    Asset,
    Department,
    Task,
    File,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Folder,
        Level::Asset,
        Level::Department,
        Level::Task,
        Level::File,
    ];

    /// Number of segments a coordinate at this level carries.
    pub fn depth(self) -> usize {
        match self {
            Self::Folder => 1,
            Self::Asset => 2,
            Self::Department => 3,
            Self::Task => 4,
            Self::File => 5,
        }
    }

    fn from_depth(depth: usize) -> Option<Self> {
        Self::ALL.get(depth.checked_sub(1)?).copied()
    }

    /// The level nested directly below this one.
    pub fn child(self) -> Option<Self> {
        Self::from_depth(self.depth() + 1)
    }

    /// How long a remote listing of this level stays trusted.
    ///
    /// Files are checked more often since conflict detection is time-sensitive.
    pub fn ttl(self) -> SignedDuration {
        match self {
            Self::File => SignedDuration::from_secs(20),
            _ => SignedDuration::from_secs(60),
        }
    }

    /// Whether nodes at this level are directories on disk.
    pub fn is_directory(self) -> bool {
        self != Self::File
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Folder => "Folder",
            Self::Asset => "Asset",
            Self::Department => "Department",
            Self::Task => "Task",
            Self::File => "File",
        }
    }
}

/// A node in a project hierarchy.
///
/// Construction validates every segment, so a coordinate at level N always
/// carries all N ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Coordinate {
    project: String,
    segments: Vec<String>,
}

impl Coordinate {
    /// The project root: parent of every asset type folder.
    pub fn project(name: impl Into<String>) -> Result<Self, CoordinateError> {
        let project = name.into();
        if project.is_empty() {
            return Err(CoordinateError::EmptyProject);
        }
        validate_segment(&project)?;
        Ok(Self {
            project,
            segments: Vec::new(),
        })
    }

    /// Parse a `/`-separated path relative to the production root.
    ///
    /// Leading, trailing and doubled slashes are ignored; an empty path
    /// yields the project root.
    pub fn parse(project: impl Into<String>, path: &str) -> Result<Self, CoordinateError> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(Self::project(project)?, |coord, segment| coord.child(segment))
    }

    /// The coordinate of a named child one level down.
    pub fn child(&self, name: impl Into<String>) -> Result<Self, CoordinateError> {
        let name = name.into();
        if self.segments.len() >= Level::File.depth() {
            return Err(CoordinateError::TooDeep(self.to_string()));
        }
        validate_segment(&name)?;
        let mut segments = self.segments.clone();
        segments.push(name);
        Ok(Self {
            project: self.project.clone(),
            segments,
        })
    }

    /// The enclosing coordinate, or `None` at the project root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            project: self.project.clone(),
            segments: rest.to_vec(),
        })
    }

    /// The level of this node, or `None` for the project root.
    pub fn level(&self) -> Option<Level> {
        Level::from_depth(self.segments.len())
    }

    /// Level of this node's children, or `None` at file level.
    pub fn child_level(&self) -> Option<Level> {
        match self.level() {
            None => Some(Level::Folder),
            Some(level) => level.child(),
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project
    }

    /// The node's own name: its last segment.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn folder(&self) -> Option<&str> {
        self.segment(Level::Folder)
    }

    pub fn asset(&self) -> Option<&str> {
        self.segment(Level::Asset)
    }

    pub fn department(&self) -> Option<&str> {
        self.segment(Level::Department)
    }

    pub fn task(&self) -> Option<&str> {
        self.segment(Level::Task)
    }

    pub fn file(&self) -> Option<&str> {
        self.segment(Level::File)
    }

    fn segment(&self, level: Level) -> Option<&str> {
        self.segments.get(level.depth() - 1).map(String::as_str)
    }

    /// Path relative to the production root, `/`-joined as the server expects.
    pub fn relative_path(&self) -> String {
        self.segments.join("/")
    }

    /// Project plus segments, each percent-encoded, for use in a URL path.
    pub fn url_path(&self) -> String {
        std::iter::once(&self.project)
            .chain(&self.segments)
            .map(|s| urlencoding::encode(s))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Path relative to the production root, for the local filesystem.
    pub fn relative_path_buf(&self) -> PathBuf {
        self.segments.iter().collect()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            write!(f, "{}", self.project)
        } else {
            write!(f, "{}:{}", self.project, self.relative_path())
        }
    }
}

fn validate_segment(segment: &str) -> Result<(), CoordinateError> {
    let invalid = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0']);
    if invalid {
        Err(CoordinateError::InvalidSegment(segment.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_file_coordinate() {
        let coord = Coordinate::parse("Demo", "Chara/Hero/Modeling/Low/hero.blend").unwrap();

        assert_eq!(coord.level(), Some(Level::File));
        assert_eq!(coord.folder(), Some("Chara"));
        assert_eq!(coord.asset(), Some("Hero"));
        assert_eq!(coord.department(), Some("Modeling"));
        assert_eq!(coord.task(), Some("Low"));
        assert_eq!(coord.file(), Some("hero.blend"));
        assert_eq!(coord.relative_path(), "Chara/Hero/Modeling/Low/hero.blend");
        assert_eq!(coord.child_level(), None);
    }

    #[test]
    fn url_path_encodes_reserved_characters() {
        let coord = Coordinate::parse("Demo", "Chara/Hero#2/Look Dev/v1?/50%.blend").unwrap();
        assert_eq!(
            coord.url_path(),
            "Demo/Chara/Hero%232/Look%20Dev/v1%3F/50%25.blend"
        );
        assert_eq!(Coordinate::project("Demo").unwrap().url_path(), "Demo");
    }

    #[test]
    fn empty_path_is_project_root() {
        let coord = Coordinate::parse("Demo", "/").unwrap();

        assert_eq!(coord.level(), None);
        assert_eq!(coord.child_level(), Some(Level::Folder));
        assert_eq!(coord.name(), None);
        assert_eq!(coord.to_string(), "Demo");
    }

    #[test]
    fn stray_slashes_are_ignored() {
        let coord = Coordinate::parse("Demo", "/Chara//Hero/").unwrap();
        assert_eq!(coord.level(), Some(Level::Asset));
        assert_eq!(coord.to_string(), "Demo:Chara/Hero");
    }

    #[test]
    fn rejects_traversal_segments() {
        let err = Coordinate::parse("Demo", "Chara/../etc").unwrap_err();
        assert_eq!(err, CoordinateError::InvalidSegment("..".into()));

        let root = Coordinate::project("Demo").unwrap();
        assert!(root.child("a\\b").is_err());
        assert!(root.child("").is_err());
    }

    #[test]
    fn rejects_nesting_below_file() {
        let err = Coordinate::parse("Demo", "a/b/c/d/e/f").unwrap_err();
        assert!(matches!(err, CoordinateError::TooDeep(_)));
    }

    #[test]
    fn rejects_empty_project() {
        assert_eq!(
            Coordinate::project("").unwrap_err(),
            CoordinateError::EmptyProject
        );
    }

    #[test]
    fn parent_walks_back_up() {
        let coord = Coordinate::parse("Demo", "Chara/Hero/Modeling").unwrap();
        let parent = coord.parent().unwrap();

        assert_eq!(parent.level(), Some(Level::Asset));
        assert_eq!(parent.child("Modeling").unwrap(), coord);
        assert!(Coordinate::project("Demo").unwrap().parent().is_none());
    }

    #[test]
    fn file_level_has_shorter_ttl() {
        assert_eq!(Level::File.ttl(), SignedDuration::from_secs(20));
        for level in [Level::Folder, Level::Asset, Level::Department, Level::Task] {
            assert_eq!(level.ttl(), SignedDuration::from_secs(60));
        }
    }
}
