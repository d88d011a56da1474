use std::{
    borrow::Cow,
    fs,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

/// A compilation unit: its text and where it was read from.
#[derive(Clone, Debug)]
pub struct Source {
    path: PathBuf,
    text: String,
}

impl Source {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Source {
        Source {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The path as shown in diagnostics.
    pub fn name(&self) -> Cow<'_, str> {
        self.path.to_string_lossy()
    }
}

/// Reads a whole file, which must be valid UTF-8.
pub fn read_source(path: &Path) -> Result<Source> {
    let bytes = fs::read(path).map_err(|source| Error::Read {
        path: path.to_owned(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|source| Error::Utf8 {
        path: path.to_owned(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "read source");
    Ok(Source::new(path, text))
}
