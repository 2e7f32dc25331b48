//! Utility modules for the site generator.

pub mod fs;
pub mod log;
