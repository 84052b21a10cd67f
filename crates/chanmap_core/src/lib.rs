//! chanmap core - channel layout detection and per-channel timing repair.
//!
//! This crate contains all detection and repair logic with no UI
//! dependencies. The `chanmap` CLI is a thin layer over it.
//!
//! - [`detect_layout`] works out which physical channel plays which role.
//! - [`build_repair_plan`] turns a role → offset map into a declarative graph.
//! - [`apply_repair_plan`] runs that graph through ffmpeg.

pub mod analysis;
pub mod config;
pub mod detect;
pub mod extraction;
pub mod logging;
pub mod models;
pub mod probe;
pub mod process;
pub mod repair;

pub use detect::{detect_layout, Detection, DetectorConfig, LayoutDetector};
pub use repair::{
    apply_repair_plan, build_repair_plan, RepairConfig, RepairError, RepairResult,
};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
