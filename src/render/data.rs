//! JSON data sources bound into the template context.

use serde_json::Value;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("failed to open data file `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("error decoding data file `{0}`")]
    Decode(PathBuf, #[source] serde_json::Error),

    #[error("data file `{0}` points outside the data directory")]
    OutsideDataDir(String),
}

/// Read and decode a JSON document of any shape.
///
/// Not cached: the file is read again on every call.
pub fn load_data(path: &Path) -> Result<Value, DataLoadError> {
    let file = File::open(path).map_err(|err| DataLoadError::Io(path.to_path_buf(), err))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|err| DataLoadError::Decode(path.to_path_buf(), err))
}

/// Name a data source is exposed under: its file name minus the last extension.
///
/// `data/profile.json` → `profile`, `archive.tar.json` → `archive.tar`.
pub fn binding_name(source: &str) -> &str {
    let file_name = Path::new(source)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(source);
    match file_name.rfind('.') {
        Some(dot) => &file_name[..dot],
        None => file_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_binding_name_strips_last_extension() {
        assert_eq!(binding_name("data/profile.json"), "profile");
        assert_eq!(binding_name("profile.json"), "profile");
        assert_eq!(binding_name("archive.tar.json"), "archive.tar");
        assert_eq!(binding_name("nested/dir/menu.yaml.json"), "menu.yaml");
    }

    #[test]
    fn test_binding_name_without_extension() {
        assert_eq!(binding_name("data/links"), "links");
    }

    #[test]
    fn test_binding_name_dotfile() {
        assert_eq!(binding_name(".hidden"), "");
    }

    #[test]
    fn test_load_data_any_shape() {
        let dir = TempDir::new().unwrap();
        let object = dir.path().join("object.json");
        let array = dir.path().join("array.json");
        let scalar = dir.path().join("scalar.json");
        fs::write(&object, r#"{"name": "Ada", "tags": ["a", "b"]}"#).unwrap();
        fs::write(&array, "[1, 2, 3]").unwrap();
        fs::write(&scalar, "42.5").unwrap();

        assert_eq!(
            load_data(&object).unwrap(),
            json!({"name": "Ada", "tags": ["a", "b"]})
        );
        assert_eq!(load_data(&array).unwrap(), json!([1, 2, 3]));
        assert_eq!(load_data(&scalar).unwrap(), json!(42.5));
    }

    #[test]
    fn test_load_data_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");

        let err = load_data(&path).unwrap_err();
        assert!(matches!(err, DataLoadError::Io(..)));
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn test_load_data_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, r#"{"name": }"#).unwrap();

        let err = load_data(&path).unwrap_err();
        assert!(matches!(err, DataLoadError::Decode(..)));
        assert!(err.to_string().contains("broken.json"));
    }
}
