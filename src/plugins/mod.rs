//! Archive-facing subsystems: storage layout, reproducibility classification,
//! history correlation and the diff front-end.

pub mod archive;
pub mod classify;
pub mod diff;
pub mod history;
