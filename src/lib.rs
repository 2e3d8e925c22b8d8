//! Sparkle: local/server reconciliation for 3D production project trees.
//!
//! A project is a fixed five-level hierarchy (asset type, asset,
//! department, task, file) under its production folder, optionally
//! mirrored by a pipeline server. The engine tells, for every node,
//! whether it exists locally, on the server, or both, and the sync
//! operations converge the two sides.

pub mod cache;
pub mod config;
pub mod engine;
pub mod logging;
pub mod model;
pub mod monitor;
pub mod project;
pub mod remote;
pub mod scan;
pub mod session;
pub mod sync;
pub mod worker;
