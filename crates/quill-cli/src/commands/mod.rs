//! CLI command implementations for Quill.

pub mod check;
pub mod log;
