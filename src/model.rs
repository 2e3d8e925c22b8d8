//! Core data model for Sparkle.
//!
//! These types describe a production project as a fixed five-level
//! hierarchy and the sync state of each node in it.

mod coordinate;
mod hierarchy;
mod status;

pub use coordinate::{Coordinate, CoordinateError, Level};
pub use hierarchy::{
    AssetListing, PRODUCTION_FOLDER, ProjectHierarchy, ProjectTemplate, SHOT_FOLDER,
};
pub use status::{
    CONFLICT_WINDOW, LocalFacts, NEEDS_SYNC_WINDOW, NodeStatus, Presence, SyncStatus, classify_age,
};
