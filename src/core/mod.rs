//! Core of the storage protocol: version-control and build-system seams,
//! provenance clocks, the timing gate and the pipeline that ties them together.

pub mod build_targets;
pub mod clock;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod temporal;
pub mod time;
pub mod tui;
pub mod vcs;
