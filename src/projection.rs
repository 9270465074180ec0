//! Host ↔ virtual coordinate translation.
//!
//! A host position projects into whichever virtual document's mapping
//! metadata covers it. Positions in host-only text (template markup with no
//! embedded counterpart) have no projection; that is a normal outcome, not an
//! error. The reverse direction answers `None` for generator scaffolding and
//! for virtual documents that have fallen behind their host.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_lsp_server::ls_types::{Position, Range};
use url::Url;

use crate::document::{
    DocumentManager, HostDocumentSnapshot, LanguageKind, VirtualDocumentUri, position_le,
};

const LOG_TARGET: &str = "utsushi::projection";

/// Where a host position lands inside a virtual document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub language: LanguageKind,
    pub uri: VirtualDocumentUri,
    pub position: Position,
    /// Host version the projection was computed against.
    pub host_document_version: u64,
}

/// A virtual range translated back into host coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRange {
    pub range: Range,
    pub host_document_version: u64,
}

pub struct ProjectionEngine {
    manager: Arc<DocumentManager>,
}

impl ProjectionEngine {
    pub fn new(manager: Arc<DocumentManager>) -> Self {
        Self { manager }
    }

    /// Project `position` in `host` into the embedded region containing it.
    ///
    /// Virtual documents are consulted in the host snapshot's order; the
    /// first whose mappings cover the position wins.
    pub fn get_projection(
        &self,
        host: &HostDocumentSnapshot,
        position: Position,
        token: &CancellationToken,
    ) -> Option<Projection> {
        if token.is_cancelled() {
            return None;
        }

        let Some(host_offset) = host.text().position_to_offset(position) else {
            log::trace!(
                target: LOG_TARGET,
                "{}:{}:{} is outside the host text",
                host.uri(),
                position.line,
                position.character
            );
            return None;
        };

        for document in host.virtual_documents() {
            let Some(generated_offset) = document.mappings().host_to_generated(host_offset)
            else {
                continue;
            };
            let Some(virtual_position) = document.text().offset_to_position(generated_offset)
            else {
                log::debug!(
                    target: LOG_TARGET,
                    "Mapping for {} points past the end of {}",
                    host.uri(),
                    document.uri()
                );
                continue;
            };

            return Some(Projection {
                language: document.language(),
                uri: document.uri().clone(),
                position: virtual_position,
                host_document_version: host.version(),
            });
        }

        log::trace!(
            target: LOG_TARGET,
            "{}:{}:{} is host-only text",
            host.uri(),
            position.line,
            position.character
        );
        None
    }

    /// Translate a range in the `language` virtual document of `host_uri`
    /// back to host coordinates.
    ///
    /// Uses the manager's current snapshot. Returns `None` when the range is
    /// scaffolding, when the document is untracked, or when the virtual
    /// document is behind its host.
    pub fn map_to_document_range(
        &self,
        language: LanguageKind,
        virtual_range: Range,
        host_uri: &Url,
    ) -> Option<MappedRange> {
        let host = self.manager.get_document(host_uri)?;
        map_range_in(&host, language, virtual_range)
    }
}

/// Reverse-map `virtual_range` within a specific host snapshot.
pub fn map_range_in(
    host: &HostDocumentSnapshot,
    language: LanguageKind,
    virtual_range: Range,
) -> Option<MappedRange> {
    if !position_le(virtual_range.start, virtual_range.end) {
        return None;
    }

    let document = host.virtual_document(language)?;
    if !document.is_synchronized_with(host.version()) {
        log::debug!(
            target: LOG_TARGET,
            "{} is behind host version {}; not mapping",
            document.uri(),
            host.version()
        );
        return None;
    }

    let generated_start = document.text().position_to_offset(virtual_range.start)?;
    let generated_end = document.text().position_to_offset(virtual_range.end)?;
    let (host_start, host_end) = document
        .mappings()
        .generated_range_to_host(generated_start, generated_end)?;

    Some(MappedRange {
        range: host.text().offsets_to_range(host_start, host_end)?,
        host_document_version: host.version(),
    })
}
