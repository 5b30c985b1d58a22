//! Recursive discovery of candidate documents under a root directory.

use log::debug;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::rules::{DOCX_EXTENSION, Disposition, RuleTable};

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("cannot read root directory {}: {source}", .path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A located file: its full path and base filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DocumentPath {
    path: PathBuf,
    file_name: String,
}

impl DocumentPath {
    pub fn new(path: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        DocumentPath {
            path: path.into(),
            file_name: file_name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

pub struct Locator {
    root: PathBuf,
    rules: RuleTable,
    extension: String,
}

impl Locator {
    pub fn new(root: impl Into<PathBuf>, rules: RuleTable) -> Self {
        Locator {
            root: root.into(),
            rules,
            extension: DOCX_EXTENSION.to_string(),
        }
    }

    /// Starts the walk. Fails up front when the root cannot be listed; errors
    /// further down the tree come out of the iterator.
    pub fn walk(self) -> Result<Documents, LocateError> {
        fs::read_dir(&self.root).map_err(|source| LocateError::Root {
            path: self.root.clone(),
            source,
        })?;
        let entries = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();
        Ok(Documents {
            entries,
            rules: self.rules,
            extension: self.extension,
        })
    }
}

/// Lazy, single-pass sequence of located documents.
pub struct Documents {
    entries: walkdir::IntoIter,
    rules: RuleTable,
    extension: String,
}

impl Iterator for Documents {
    type Item = Result<DocumentPath, LocateError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };

            let file_type = entry.file_type();
            if file_type.is_dir() || (file_type.is_symlink() && entry.path().is_dir()) {
                continue;
            }

            let Some(name) = entry.file_name().to_str() else {
                debug!("Skipping non UTF-8 file name: {}", entry.path().display());
                continue;
            };
            if !name.ends_with(&self.extension) {
                continue;
            }
            if self.rules.evaluate(name) == Disposition::Skip {
                debug!(
                    "Skipping {} (rule {})",
                    entry.path().display(),
                    self.rules.matching_rule(name).unwrap_or("?")
                );
                continue;
            }

            let name = name.to_string();
            return Some(Ok(DocumentPath::new(entry.into_path(), name)));
        }
    }
}

/// Convenience wrapper: every located document, or the first walk error.
pub fn collect_files(root: &Path, rules: &RuleTable) -> Result<Vec<DocumentPath>, LocateError> {
    Locator::new(root, rules.clone()).walk()?.collect()
}
