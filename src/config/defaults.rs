//! Default values for configuration fields and CLI arguments.
//!
//! These functions are used by serde and clap for default values.

use std::path::PathBuf;

/// Manifest file looked up in the working directory.
pub fn manifest() -> PathBuf {
    "sitebuild.json".into()
}

/// Build destination directory.
pub fn output() -> PathBuf {
    "dist".into()
}

/// Directory that page `dataSources` are resolved against.
pub fn data_dir() -> PathBuf {
    "data".into()
}

/// Sub directory of `sourceDir` holding static assets.
pub fn static_dir() -> &'static str {
    "static"
}

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        7000
    }
}
