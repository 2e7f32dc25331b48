//! Page rendering: template fragments + JSON data → output sink.
//!
//! # Pipeline
//!
//! ```text
//! render_page()
//!     │
//!     ├── resolve sources against sourceDir
//!     ├── parse every fragment into one fresh Environment
//!     │       (named by base file name, helpers from `funcs` registered)
//!     ├── load each data source → RenderContext { Data: { name: value } }
//!     └── execute the entry template (first source) into the sink
//! ```
//!
//! Nothing is cached between calls. A failed execution may already have
//! written part of the document to the sink; callers that need all-or-nothing
//! output should render into a buffer.

pub mod data;
pub mod funcs;

use crate::{config::PageDef, utils::fs::safe_join};
use data::{DataLoadError, binding_name, load_data};
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no template files provided")]
    NoTemplateSources,

    #[error("template `{0}` points outside the source directory")]
    OutsideSourceDir(String),

    #[error("failed to read template `{0}`")]
    TemplateRead(PathBuf, #[source] std::io::Error),

    #[error("error parsing template `{0}`")]
    TemplateParse(PathBuf, #[source] minijinja::Error),

    #[error(transparent)]
    DataLoad(#[from] DataLoadError),

    #[error("error executing template `{0}`")]
    TemplateExec(String, #[source] minijinja::Error),
}

/// Variables visible to a page's templates.
#[derive(Debug, Default, Serialize)]
pub struct RenderContext {
    #[serde(rename = "Data")]
    pub data: BTreeMap<String, serde_json::Value>,
}

impl RenderContext {
    /// Load every data source of a page. A repeated binding name keeps the later file.
    pub fn load(data_dir: &Path, data_sources: &[String]) -> Result<Self, DataLoadError> {
        let mut data = BTreeMap::new();
        for source in data_sources {
            let path = safe_join(data_dir, source)
                .ok_or_else(|| DataLoadError::OutsideDataDir(source.clone()))?;
            let value = load_data(&path)?;
            data.insert(binding_name(source).to_owned(), value);
        }
        Ok(Self { data })
    }
}

/// Where a page's template sources and data files live.
#[derive(Debug, Clone, Copy)]
pub struct SourceDirs<'a> {
    pub templates: &'a Path,
    pub data: &'a Path,
}

/// Render one page into `sink`.
pub fn render_page<W: Write>(
    page: &PageDef,
    dirs: SourceDirs<'_>,
    sink: &mut W,
) -> Result<(), RenderError> {
    let Some(entry) = page.sources.first() else {
        return Err(RenderError::NoTemplateSources);
    };
    let entry_name = template_name(entry).to_owned();

    let env = compose(dirs.templates, &page.sources)?;
    let context = RenderContext::load(dirs.data, &page.data_sources)?;

    let template = env
        .get_template(&entry_name)
        .map_err(|err| RenderError::TemplateExec(entry_name.clone(), err))?;
    template
        .render_to_write(&context, sink)
        .map_err(|err| RenderError::TemplateExec(entry_name, err))?;
    Ok(())
}

/// Render one page into a fresh buffer.
pub fn render_to_vec(page: &PageDef, dirs: SourceDirs<'_>) -> Result<Vec<u8>, RenderError> {
    let mut buf = Vec::new();
    render_page(page, dirs, &mut buf)?;
    Ok(buf)
}

/// Parse all fragments into one environment, keyed by base file name.
fn compose(base: &Path, sources: &[String]) -> Result<Environment<'static>, RenderError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    funcs::register(&mut env);

    for source in sources {
        let path =
            safe_join(base, source).ok_or_else(|| RenderError::OutsideSourceDir(source.clone()))?;
        let text =
            fs::read_to_string(&path).map_err(|err| RenderError::TemplateRead(path.clone(), err))?;
        env.add_template_owned(template_name(source).to_owned(), text)
            .map_err(|err| RenderError::TemplateParse(path, err))?;
    }
    Ok(env)
}

/// Name a fragment is registered under: its base file name.
fn template_name(source: &str) -> &str {
    Path::new(source)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(source)
}
