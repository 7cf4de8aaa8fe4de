//! Core data models shared by the repository, the catalog synchronizer,
//! and the HTTP server.

use std::fmt;

use serde::Serialize;

/// Identifies a schema source by name and optional revision.
///
/// An absent revision is a first-class state, distinct from an empty
/// revision string. The two are only collapsed at the catalog/URL boundary
/// (see [`SourceIdentifier::revision_label`]), never in lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceIdentifier {
    pub name: String,
    pub revision: Option<String>,
}

impl SourceIdentifier {
    pub fn new(name: impl Into<String>, revision: Option<String>) -> Self {
        Self {
            name: name.into(),
            revision,
        }
    }

    /// The revision as written into catalog entries and schema URLs:
    /// the literal revision string, or `""` when no revision is present.
    pub fn revision_label(&self) -> &str {
        self.revision.as_deref().unwrap_or("")
    }
}

impl fmt::Display for SourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(revision) => write!(f, "{}@{}", self.name, revision),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Returns true if `s` is an acceptable revision path/file segment:
/// digits and `-` only. The empty string is *not* a revision; it denotes
/// the absence of one.
pub fn is_valid_revision(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit() || b == b'-')
}

/// Representation a source is available in.
///
/// Only [`Text`](SourceFormat::Text) sources are catalogued and served
/// over HTTP; other representations pass through the repository untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Raw `.yang` text.
    Text,
    /// Parsed abstract syntax tree.
    Ast,
}

/// A source the repository can provide, as advertised to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PotentialSource {
    pub identifier: SourceIdentifier,
    pub format: SourceFormat,
}

impl PotentialSource {
    pub fn new(identifier: SourceIdentifier, format: SourceFormat) -> Self {
        Self { identifier, format }
    }

    pub fn text(identifier: SourceIdentifier) -> Self {
        Self::new(identifier, SourceFormat::Text)
    }

    pub fn is_text(&self) -> bool {
        self.format == SourceFormat::Text
    }
}

/// One row of the persisted catalog.
///
/// `revision` is the empty string for unrevisioned sources. `schema_url`
/// is derived once, at registration time, from the binding address/port
/// and the identifier; equal identifiers always yield equal URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub revision: String,
    pub schema_url: String,
}

impl CatalogEntry {
    /// Builds the entry for `identifier`, with
    /// `http://{bind_address}:{bind_port}/schemas/{name}/{revision}` as the
    /// retrieval URL. The trailing separator stays when the revision is
    /// absent; clients depend on that exact shape.
    pub fn from_source(identifier: &SourceIdentifier, bind_address: &str, bind_port: u16) -> Self {
        let revision = identifier.revision_label().to_string();
        let schema_url = format!(
            "http://{}:{}/schemas/{}/{}",
            bind_address, bind_port, identifier.name, revision
        );
        Self {
            name: identifier.name.clone(),
            revision,
            schema_url,
        }
    }
}

/// The persisted catalog as read back from a store: the module set version
/// stamped by the most recent merge, plus every entry merged so far.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub module_set_id: String,
    pub modules: Vec<CatalogEntry>,
}

impl Catalog {
    /// The catalog before any merge has happened.
    pub fn empty() -> Self {
        Self {
            module_set_id: String::new(),
            modules: Vec::new(),
        }
    }
}
