//! Output formatting for CLI display.

use std::fmt::Write;

use jiff::{Timestamp, tz::TimeZone};

use sparkle::{
    engine::ChildStatus,
    model::{NodeStatus, ProjectHierarchy, SyncStatus},
};

fn status_label(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::LocalOnly => "local only",
        SyncStatus::ServerOnly => "server only",
        SyncStatus::Synced => "synced",
        SyncStatus::NeedsSync => "needs sync",
        SyncStatus::Conflict => "conflict",
        SyncStatus::Unknown => "unknown",
    }
}

/// One node: name, status, then the descriptive tooltip.
pub(super) fn format_node(name: &str, status: &NodeStatus) -> String {
    let line = format!(
        "{name:<24} {:<11} {}",
        status_label(status.status),
        status.tooltip
    );
    line.trim_end().to_string()
}

/// A child row, indented two spaces per level below the first.
pub(super) fn format_child(depth: usize, child: &ChildStatus) -> String {
    let indent = "  ".repeat(depth.saturating_sub(1));
    format!("{indent}{}", format_node(&child.name, &child.status))
}

/// An indented name tree, `max_depth` levels deep.
pub(super) fn format_hierarchy(tree: &ProjectHierarchy, max_depth: usize) -> String {
    fn walk(out: &mut String, node: &ProjectHierarchy, depth: usize, max_depth: usize) {
        if depth > max_depth {
            return;
        }
        for (name, child) in node.children() {
            let indent = "  ".repeat(depth - 1);
            let _ = writeln!(out, "{indent}{name}");
            walk(out, child, depth + 1, max_depth);
        }
    }

    let mut out = String::new();
    walk(&mut out, tree, 1, max_depth);
    out
}

/// A health-monitor tick: local wall time and connection state.
pub(super) fn format_tick(at: Timestamp, connected: bool) -> String {
    let time = at.to_zoned(TimeZone::system()).strftime("%H:%M:%S");
    let state = if connected {
        "connected"
    } else {
        "disconnected, local mode"
    };
    format!("[{time}] {state}")
}
