//! Class labels for the model's output vector.
//!
//! The label file is plain text with one label per line; line order is class
//! index order. Blank lines are skipped and trailing whitespace (including the
//! `\r` of CRLF files) is stripped.

use std::path::Path;

use tracing::info;

use crate::error::{ClassifyError, LoadError};

/// Ordered, immutable class label table. Index `i` names output class `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Build a table from labels already in class order.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse label file contents.
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Self::new(
            text.lines()
                .map(str::trim_end)
                .filter(|line| !line.trim_start().is_empty()),
        )
    }

    /// Load a label file. An empty table is an error.
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::LabelsNotFound(path.to_path_buf()));
        }

        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let table = Self::parse(&text);
        if table.is_empty() {
            return Err(LoadError::EmptyLabels(path.to_path_buf()));
        }

        info!(count = table.len(), path = %path.display(), "loaded labels");
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Look up the label for a predicted class index.
    ///
    /// An index past the end means the label file and the model disagree on
    /// the number of classes.
    pub fn resolve(&self, index: usize) -> Result<&str, ClassifyError> {
        self.get(index).ok_or(ClassifyError::IndexOutOfRange {
            index,
            len: self.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}
