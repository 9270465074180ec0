//! Immutable document snapshots.
//!
//! A snapshot is never mutated. Each accepted edit or regeneration produces a
//! new `HostDocumentSnapshot`, and older snapshots stay valid for as long as an
//! in-flight request holds an `Arc` to them.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use super::mapping::MappingMetadata;
use super::position::SourceText;
use super::virtual_uri::VirtualDocumentUri;

/// Embedded language carried by a virtual document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageKind {
    /// The generated procedural-code view.
    Code,
    /// The generated markup view.
    Markup,
}

impl LanguageKind {
    pub const ALL: [LanguageKind; 2] = [LanguageKind::Code, LanguageKind::Markup];

    /// File extension used in virtual document URIs.
    pub fn extension(self) -> &'static str {
        match self {
            LanguageKind::Code => "code",
            LanguageKind::Markup => "markup",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|language| language.extension() == extension)
    }
}

impl fmt::Display for LanguageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One generated view of a host document at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDocumentSnapshot {
    uri: VirtualDocumentUri,
    version: u64,
    host_document_sync_version: Option<u64>,
    text: Arc<SourceText>,
    mappings: Arc<MappingMetadata>,
}

impl VirtualDocumentSnapshot {
    /// An empty virtual document that has not been generated yet.
    pub fn empty(host_uri: &Url, language: LanguageKind) -> Self {
        Self {
            uri: VirtualDocumentUri::new(host_uri, language),
            version: 0,
            host_document_sync_version: None,
            text: Arc::new(SourceText::new(String::new())),
            mappings: Arc::new(MappingMetadata::default()),
        }
    }

    /// The next generation of this document, produced from host version
    /// `host_document_sync_version`.
    pub fn regenerated(
        &self,
        text: SourceText,
        mappings: MappingMetadata,
        host_document_sync_version: u64,
    ) -> Self {
        Self {
            uri: self.uri.clone(),
            version: self.version + 1,
            host_document_sync_version: Some(host_document_sync_version),
            text: Arc::new(text),
            mappings: Arc::new(mappings),
        }
    }

    pub fn uri(&self) -> &VirtualDocumentUri {
        &self.uri
    }

    pub fn language(&self) -> LanguageKind {
        self.uri.language()
    }

    /// This document's own version, bumped on every regeneration.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Host version this content was generated from; `None` before the first
    /// generation.
    pub fn host_document_sync_version(&self) -> Option<u64> {
        self.host_document_sync_version
    }

    pub fn text(&self) -> &SourceText {
        &self.text
    }

    pub fn mappings(&self) -> &MappingMetadata {
        &self.mappings
    }

    /// Whether this content is at least as new as `host_version`.
    ///
    /// Uses `>=` so a waiter tolerates the host racing further ahead.
    pub fn is_synchronized_with(&self, host_version: u64) -> bool {
        self.host_document_sync_version
            .is_some_and(|sync_version| sync_version >= host_version)
    }
}

/// A host document and its virtual documents at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDocumentSnapshot {
    uri: Url,
    version: u64,
    text: Arc<SourceText>,
    virtual_documents: Vec<Arc<VirtualDocumentSnapshot>>,
}

impl HostDocumentSnapshot {
    pub fn new(uri: Url, version: u64, text: SourceText, languages: &[LanguageKind]) -> Self {
        let virtual_documents = languages
            .iter()
            .map(|language| Arc::new(VirtualDocumentSnapshot::empty(&uri, *language)))
            .collect();
        Self {
            uri,
            version,
            text: Arc::new(text),
            virtual_documents,
        }
    }

    /// Successor snapshot for an edit of the host text.
    ///
    /// Virtual documents are carried over unchanged; they fall behind until
    /// the generator catches up.
    pub fn with_text(&self, text: SourceText) -> Self {
        Self {
            uri: self.uri.clone(),
            version: self.version + 1,
            text: Arc::new(text),
            virtual_documents: self.virtual_documents.clone(),
        }
    }

    /// Successor snapshot with one virtual document replaced.
    ///
    /// The host version does not change: regeneration is not a host edit.
    pub fn with_virtual_document(&self, document: Arc<VirtualDocumentSnapshot>) -> Self {
        let mut virtual_documents = self.virtual_documents.clone();
        match virtual_documents
            .iter_mut()
            .find(|existing| existing.language() == document.language())
        {
            Some(slot) => *slot = document,
            None => virtual_documents.push(document),
        }
        Self {
            uri: self.uri.clone(),
            version: self.version,
            text: Arc::clone(&self.text),
            virtual_documents,
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn text(&self) -> &SourceText {
        &self.text
    }

    pub fn virtual_documents(&self) -> &[Arc<VirtualDocumentSnapshot>] {
        &self.virtual_documents
    }

    pub fn virtual_document(&self, language: LanguageKind) -> Option<&Arc<VirtualDocumentSnapshot>> {
        self.virtual_documents
            .iter()
            .find(|document| document.language() == language)
    }
}
