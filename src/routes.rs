//! Firebase Hosting rewrite rules for the pages of a manifest.
//!
//! Each page URL is rewritten to the file the build writes it to, so a
//! static host can serve `/about` from `/about.html`.

use crate::config::SiteConfig;
use serde::Serialize;

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Rewrite<'a> {
    pub source: &'a str,
    pub destination: String,
}

/// One rewrite per page, in output-key order.
pub fn rewrites(config: &SiteConfig) -> Vec<Rewrite<'_>> {
    config
        .pages
        .iter()
        .map(|(key, page)| Rewrite {
            source: &page.url,
            destination: format!("/{}", key.trim_start_matches('/')),
        })
        .collect()
}

/// Render the `"rewrites": [...]` fragment for `firebase.json`.
pub fn firebase_rewrites(config: &SiteConfig) -> serde_json::Result<String> {
    let list = serde_json::to_string_pretty(&rewrites(config))?;
    Ok(format!("\"rewrites\": {list}"))
}
