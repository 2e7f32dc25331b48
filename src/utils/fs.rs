//! Filesystem helpers shared by the build and serve paths.

use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};
use walkdir::WalkDir;

/// Mirror `src` into `dst`, keeping the relative layout and permission bits.
///
/// Every file is copied, dotfiles included. Returns the number of files
/// copied. A missing `src` copies nothing.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<usize> {
    if !src.is_dir() {
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            fs::set_permissions(&target, entry.metadata().map_err(io::Error::other)?.permissions())?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            // fs::copy carries the permission bits over
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Join an untrusted relative path (a URL path, an output key, a manifest
/// source) onto `base`.
///
/// Leading `/` are stripped, so `/about.html` lands under `base` too.
/// Returns `None` if the path tries to leave `base` through `..` or a
/// drive prefix.
pub fn safe_join(base: &Path, rel: &str) -> Option<PathBuf> {
    let mut joined = base.to_path_buf();
    for component in Path::new(rel.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(joined)
}
