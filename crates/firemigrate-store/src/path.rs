//! Hierarchical collection and document paths.
//!
//! Paths alternate collection and document segments:
//! `calendars` is a collection, `calendars/c1` a document,
//! `calendars/c1/events` a subcollection of that document.

use std::fmt;

use crate::StoreError;

/// Path to a (possibly nested) collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath {
    segments: Vec<String>,
}

/// Path to a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    segments: Vec<String>,
}

fn split_segments(path: &str) -> Result<Vec<String>, StoreError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(StoreError::InvalidPath(format!("empty path: {path:?}")));
    }
    let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
    if segments.iter().any(String::is_empty) {
        return Err(StoreError::InvalidPath(format!("empty segment in {path:?}")));
    }
    Ok(segments)
}

impl CollectionPath {
    /// A top-level collection.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    /// Parse a slash-separated collection path (odd number of segments).
    ///
    /// ```
    /// use firemigrate_store::CollectionPath;
    ///
    /// let events = CollectionPath::parse("calendars/c1/events").unwrap();
    /// assert_eq!(events.id(), "events");
    /// assert_eq!(events.parent().unwrap().id(), "c1");
    /// ```
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        let segments = split_segments(path)?;
        if segments.len() % 2 == 0 {
            return Err(StoreError::InvalidPath(format!(
                "collection path needs an odd number of segments: {path}"
            )));
        }
        Ok(Self { segments })
    }

    /// Reference a document in this collection.
    pub fn doc(&self, id: impl Into<String>) -> DocumentPath {
        let mut segments = self.segments.clone();
        segments.push(id.into());
        DocumentPath { segments }
    }

    /// Name of the collection (last segment).
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Path segments from the root, unescaped.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The document this collection is nested under, if any.
    pub fn parent(&self) -> Option<DocumentPath> {
        if self.segments.len() < 3 {
            return None;
        }
        Some(DocumentPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }
}

impl DocumentPath {
    /// Parse a slash-separated document path (even number of segments).
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        let segments = split_segments(path)?;
        if segments.len() % 2 != 0 {
            return Err(StoreError::InvalidPath(format!(
                "document path needs an even number of segments: {path}"
            )));
        }
        Ok(Self { segments })
    }

    /// Reference a subcollection of this document.
    pub fn collection(&self, name: impl Into<String>) -> CollectionPath {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        CollectionPath { segments }
    }

    /// Document ID (last segment).
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Path segments from the root, unescaped.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The collection containing this document.
    pub fn parent(&self) -> CollectionPath {
        CollectionPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
