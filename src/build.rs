//! Site building orchestration.
//!
//! ```text
//! build_site()
//!     │
//!     ├── purge destination, recreate it
//!     ├── render every page in parallel ──► dest/<output key>
//!     └── mirror <sourceDir>/static ──► dest/
//! ```
//!
//! Every step is fatal: the first failing page aborts the build and the
//! destination is left as it was at that point.

use crate::{
    config::{PageDef, SiteConfig},
    log,
    render::{RenderError, SourceDirs, render_page},
    utils::{
        fs::{copy_dir_all, safe_join},
        log::Logger,
    },
};
use rayon::prelude::*;
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to remove `{0}`")]
    Purge(PathBuf, #[source] io::Error),

    #[error("check permissions as failed to mkdir `{0}`")]
    Mkdir(PathBuf, #[source] io::Error),

    #[error("failed to write `{0}`")]
    Output(PathBuf, #[source] io::Error),

    #[error("output key `{0}` points outside the destination")]
    OutsideDest(String),

    #[error("failed to render page `{0}`")]
    Render(String, #[source] RenderError),

    #[error("failed to copy static files from `{0}`")]
    Copy(PathBuf, #[source] io::Error),
}

/// Summary of a finished build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub pages: usize,
    pub static_files: usize,
}

/// Render the whole site into `dest`.
pub fn build_site(
    config: &SiteConfig,
    dest: &Path,
    logger: Logger,
) -> Result<BuildReport, BuildError> {
    purge_dest(dest)?;
    fs::create_dir_all(dest).map_err(|err| BuildError::Mkdir(dest.to_path_buf(), err))?;

    let dirs = SourceDirs {
        templates: &config.source_dir,
        data: &config.data_dir,
    };

    config.pages.par_iter().try_for_each(|(key, page)| {
        log!(logger => "build"; "{} <- {}", key, page.url);
        build_page(key, page, dirs, dest)
    })?;

    let static_dir = config.static_dir();
    let static_files =
        copy_dir_all(&static_dir, dest).map_err(|err| BuildError::Copy(static_dir.clone(), err))?;
    if static_files > 0 {
        log!(logger => "build"; "copied {} static files", static_files);
    }

    let report = BuildReport {
        pages: config.pages.len(),
        static_files,
    };
    log!(logger => "build"; "done: {} pages -> {}", report.pages, dest.display());
    Ok(report)
}

fn purge_dest(dest: &Path) -> Result<(), BuildError> {
    match fs::remove_dir_all(dest) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(BuildError::Purge(dest.to_path_buf(), err)),
    }
}

fn build_page(
    key: &str,
    page: &PageDef,
    dirs: SourceDirs<'_>,
    dest: &Path,
) -> Result<(), BuildError> {
    // `/about.html` and `about.html` name the same file under `dest`
    let out_path = safe_join(dest, key).ok_or_else(|| BuildError::OutsideDest(key.to_owned()))?;
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).map_err(|err| BuildError::Mkdir(parent.to_path_buf(), err))?;
    }

    let file = File::create(&out_path).map_err(|err| BuildError::Output(out_path.clone(), err))?;
    let mut writer = BufWriter::new(file);
    render_page(page, dirs, &mut writer).map_err(|err| BuildError::Render(key.to_owned(), err))?;
    writer
        .flush()
        .map_err(|err| BuildError::Output(out_path, err))
}
