//! Site manifest (`sitebuild.json`) loading.
//!
//! The manifest maps output files to the template fragments and data files
//! that produce them:
//!
//! ```json
//! {
//!   "sourceDir": "site",
//!   "dataDir": "data",
//!   "pages": {
//!     "index.html": {
//!       "url": "/",
//!       "sources": ["pages/index.html", "partials/header.html"],
//!       "dataSources": ["profile.json"]
//!     }
//!   }
//! }
//! ```
//!
//! Decoding is strict: unknown fields anywhere in the document are rejected.
//! Missing optional fields fall back to empty values (`dataDir` to `data`).

pub mod defaults;
mod error;

pub use error::ConfigError;

use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, btree_map::Entry},
    fs,
    path::{Path, PathBuf},
};

/// Root manifest structure, immutable once loaded.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SiteConfig {
    /// Base directory template sources and `static/` are resolved against.
    #[serde(default)]
    pub source_dir: PathBuf,

    /// Base directory data sources are resolved against.
    #[serde(default = "defaults::data_dir")]
    #[educe(Default = defaults::data_dir())]
    pub data_dir: PathBuf,

    /// Output key (file path under the destination) to page definition.
    ///
    /// Kept sorted so builds and route listings are reproducible.
    #[serde(default)]
    pub pages: BTreeMap<String, PageDef>,
}

/// One page of the site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PageDef {
    /// Route the page is served under.
    #[serde(default)]
    pub url: String,

    /// Template fragments relative to `sourceDir`; the first is the entry point.
    #[serde(default)]
    pub sources: Vec<String>,

    /// JSON files relative to `dataDir`, exposed as `Data.<name>`.
    #[serde(default)]
    pub data_sources: Vec<String>,
}

impl SiteConfig {
    /// Parse a manifest from a JSON string.
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    /// Load a manifest from disk.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_json(&content).map_err(|err| ConfigError::Json(path.to_path_buf(), err))
    }

    /// Directory whose contents are mirrored into the build output.
    pub fn static_dir(&self) -> PathBuf {
        self.source_dir.join(defaults::static_dir())
    }

    /// URLs claimed by more than one page, with every output key claiming them.
    ///
    /// Nothing rejects these at load time; the server keeps the last key.
    pub fn duplicate_urls(&self) -> Vec<(&str, Vec<&str>)> {
        let mut by_url: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (key, page) in &self.pages {
            match by_url.entry(page.url.as_str()) {
                Entry::Vacant(slot) => {
                    slot.insert(vec![key.as_str()]);
                }
                Entry::Occupied(mut slot) => slot.get_mut().push(key.as_str()),
            }
        }
        by_url.into_iter().filter(|(_, keys)| keys.len() > 1).collect()
    }
}
