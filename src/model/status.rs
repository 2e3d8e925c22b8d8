//! Sync status of a single hierarchy node.
//!
//! Status is a pure function of what is known at query time: whether the
//! node exists locally, whether it exists remotely, and (for files) its
//! local modification time and size.

use jiff::{SignedDuration, Timestamp, tz::TimeZone};
use serde::Serialize;

use super::Level;

/// A file touched more recently than this may be mid-edit elsewhere.
pub const CONFLICT_WINDOW: SignedDuration = SignedDuration::from_secs(5 * 60);

/// A file touched more recently than this likely needs re-publishing.
pub const NEEDS_SYNC_WINDOW: SignedDuration = SignedDuration::from_secs(60 * 60);

/// Where a node exists, and whether the two copies are likely in step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    LocalOnly,
    ServerOnly,
    Synced,
    /// File exists on both sides and was modified locally within the hour.
    NeedsSync,
    /// File exists on both sides and was modified locally within minutes.
    Conflict,
    /// Absent from both listings.
    Unknown,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalOnly => "local_only",
            Self::ServerOnly => "server_only",
            Self::Synced => "synced",
            Self::NeedsSync => "needs_sync",
            Self::Conflict => "conflict",
            Self::Unknown => "unknown",
        }
    }
}

/// Presence of a node in the local and remote listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presence {
    pub local: bool,
    pub remote: bool,
}

/// Local filesystem facts about a node, read at query time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalFacts {
    pub modified: Option<Timestamp>,
    pub size: Option<u64>,
}

/// The computed status of a node plus a human-facing description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub status: SyncStatus,
    pub tooltip: String,
    pub modified: Option<Timestamp>,
    pub size: Option<u64>,
}

impl NodeStatus {
    /// Status for a node that is in neither listing.
    pub fn unknown() -> Self {
        Self {
            status: SyncStatus::Unknown,
            tooltip: String::new(),
            modified: None,
            size: None,
        }
    }

    /// Derive the status of a node.
    ///
    /// Directory levels only compare presence. Files present on both sides
    /// are further classified by how long ago they were modified locally.
    pub fn derive(level: Level, presence: Presence, facts: LocalFacts, now: Timestamp) -> Self {
        let status = match (presence.local, presence.remote) {
            (true, true) if level == Level::File => match facts.modified {
                Some(modified) => classify_age(now.duration_since(modified)),
                None => SyncStatus::Synced,
            },
            (true, true) => SyncStatus::Synced,
            (true, false) => SyncStatus::LocalOnly,
            (false, true) => SyncStatus::ServerOnly,
            (false, false) => return Self::unknown(),
        };

        let (modified, size) = if presence.local {
            (facts.modified, facts.size.filter(|_| level == Level::File))
        } else {
            (None, None)
        };

        Self {
            status,
            tooltip: tooltip(level, status, modified, size),
            modified,
            size,
        }
    }
}

/// Classify a file present on both sides by the age of its local copy.
///
/// Negative ages (clock skew, files stamped in the future) count as fresh.
pub fn classify_age(age: SignedDuration) -> SyncStatus {
    if age < CONFLICT_WINDOW {
        SyncStatus::Conflict
    } else if age < NEEDS_SYNC_WINDOW {
        SyncStatus::NeedsSync
    } else {
        SyncStatus::Synced
    }
}

fn tooltip(
    level: Level,
    status: SyncStatus,
    modified: Option<Timestamp>,
    size: Option<u64>,
) -> String {
    let label = level.label();
    let time = modified.map_or_else(|| "N/A".to_string(), clock_time);
    let bytes = size.unwrap_or(0);

    match (level, status) {
        (Level::File, SyncStatus::Conflict) => {
            format!("Conflict detected! Modified at {time}, check the server")
        }
        (Level::File, SyncStatus::NeedsSync) => {
            format!("File modified ({time}, {bytes} bytes), sync required")
        }
        (Level::File, SyncStatus::Synced) if modified.is_some() => {
            format!("File synced ({time}, {bytes} bytes)")
        }
        (Level::File, SyncStatus::Synced) => "File synced".to_string(),
        (Level::File, SyncStatus::LocalOnly) => {
            format!("File local only ({time}, {bytes} bytes)")
        }
        (_, SyncStatus::Synced) => format!("{label} synced (local: {time})"),
        (_, SyncStatus::LocalOnly) => format!("{label} local only (created: {time})"),
        (_, SyncStatus::ServerOnly) => format!("{label} on server only"),
        _ => String::new(),
    }
}

/// `HH:MM` in the system time zone.
fn clock_time(ts: Timestamp) -> String {
    ts.to_zoned(TimeZone::system()).strftime("%H:%M").to_string()
}
