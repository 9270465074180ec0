//! Document change notifications.
//!
//! Every variant carries exactly the snapshots its kind allows, so consumers
//! match exhaustively instead of probing optional fields. Events the manager
//! builds itself are well formed by construction; raw events from an external
//! tracker enter through `DocumentManager::ingest`, which checks them with
//! [`DocumentChangeEvent::from_parts`] and drops pairings that do not fit
//! their kind.

use std::sync::Arc;

use url::Url;

use super::snapshot::{HostDocumentSnapshot, LanguageKind, VirtualDocumentSnapshot};
use crate::error::EventError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentChangeKind {
    Added,
    Removed,
    ContentChanged,
    VirtualDocumentChanged,
}

impl DocumentChangeKind {
    fn name(self) -> &'static str {
        match self {
            DocumentChangeKind::Added => "Added",
            DocumentChangeKind::Removed => "Removed",
            DocumentChangeKind::ContentChanged => "ContentChanged",
            DocumentChangeKind::VirtualDocumentChanged => "VirtualDocumentChanged",
        }
    }
}

#[derive(Debug, Clone)]
pub enum DocumentChangeEvent {
    Added {
        new: Arc<HostDocumentSnapshot>,
    },
    Removed {
        old: Arc<HostDocumentSnapshot>,
    },
    ContentChanged {
        old: Arc<HostDocumentSnapshot>,
        new: Arc<HostDocumentSnapshot>,
    },
    VirtualDocumentChanged {
        old: Arc<HostDocumentSnapshot>,
        new: Arc<HostDocumentSnapshot>,
        virtual_old: Arc<VirtualDocumentSnapshot>,
        virtual_new: Arc<VirtualDocumentSnapshot>,
    },
}

impl DocumentChangeEvent {
    /// Build an event from loosely-typed parts, validating the pairing.
    pub fn from_parts(
        kind: DocumentChangeKind,
        old: Option<Arc<HostDocumentSnapshot>>,
        new: Option<Arc<HostDocumentSnapshot>>,
        virtual_old: Option<Arc<VirtualDocumentSnapshot>>,
        virtual_new: Option<Arc<VirtualDocumentSnapshot>>,
    ) -> Result<Self, EventError> {
        let name = kind.name();

        if kind != DocumentChangeKind::VirtualDocumentChanged
            && (virtual_old.is_some() || virtual_new.is_some())
        {
            return Err(EventError::UnexpectedVirtual { kind: name });
        }

        match kind {
            DocumentChangeKind::Added => {
                if old.is_some() {
                    return Err(EventError::UnexpectedHost {
                        kind: name,
                        side: "old",
                    });
                }
                let new = new.ok_or(EventError::MissingHost {
                    kind: name,
                    side: "new",
                })?;
                Ok(DocumentChangeEvent::Added { new })
            }
            DocumentChangeKind::Removed => {
                if new.is_some() {
                    return Err(EventError::UnexpectedHost {
                        kind: name,
                        side: "new",
                    });
                }
                let old = old.ok_or(EventError::MissingHost {
                    kind: name,
                    side: "old",
                })?;
                Ok(DocumentChangeEvent::Removed { old })
            }
            DocumentChangeKind::ContentChanged => {
                let (old, new) = require_hosts(name, old, new)?;
                Ok(DocumentChangeEvent::ContentChanged { old, new })
            }
            DocumentChangeKind::VirtualDocumentChanged => {
                let (old, new) = require_hosts(name, old, new)?;
                let virtual_old = virtual_old.ok_or(EventError::MissingVirtual { side: "old" })?;
                let virtual_new = virtual_new.ok_or(EventError::MissingVirtual { side: "new" })?;
                if virtual_old.language() != virtual_new.language() {
                    return Err(EventError::LanguageMismatch);
                }
                Ok(DocumentChangeEvent::VirtualDocumentChanged {
                    old,
                    new,
                    virtual_old,
                    virtual_new,
                })
            }
        }
    }

    pub fn kind(&self) -> DocumentChangeKind {
        match self {
            DocumentChangeEvent::Added { .. } => DocumentChangeKind::Added,
            DocumentChangeEvent::Removed { .. } => DocumentChangeKind::Removed,
            DocumentChangeEvent::ContentChanged { .. } => DocumentChangeKind::ContentChanged,
            DocumentChangeEvent::VirtualDocumentChanged { .. } => {
                DocumentChangeKind::VirtualDocumentChanged
            }
        }
    }

    /// The host document this event is about.
    pub fn host_uri(&self) -> &Url {
        match self {
            DocumentChangeEvent::Added { new } => new.uri(),
            DocumentChangeEvent::Removed { old } => old.uri(),
            DocumentChangeEvent::ContentChanged { new, .. }
            | DocumentChangeEvent::VirtualDocumentChanged { new, .. } => new.uri(),
        }
    }

    /// Language of the regenerated document, for virtual document changes only.
    pub fn virtual_language(&self) -> Option<LanguageKind> {
        match self {
            DocumentChangeEvent::VirtualDocumentChanged { virtual_new, .. } => {
                Some(virtual_new.language())
            }
            DocumentChangeEvent::Added { .. }
            | DocumentChangeEvent::Removed { .. }
            | DocumentChangeEvent::ContentChanged { .. } => None,
        }
    }
}

fn require_hosts(
    kind: &'static str,
    old: Option<Arc<HostDocumentSnapshot>>,
    new: Option<Arc<HostDocumentSnapshot>>,
) -> Result<(Arc<HostDocumentSnapshot>, Arc<HostDocumentSnapshot>), EventError> {
    let old = old.ok_or(EventError::MissingHost { kind, side: "old" })?;
    let new = new.ok_or(EventError::MissingHost { kind, side: "new" })?;
    if old.uri() != new.uri() {
        return Err(EventError::UriMismatch {
            old: old.uri().clone(),
            new: new.uri().clone(),
        });
    }
    Ok((old, new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SourceText;

    fn host(path: &str) -> Arc<HostDocumentSnapshot> {
        Arc::new(HostDocumentSnapshot::new(
            Url::parse(&format!("file:///project/{path}")).unwrap(),
            1,
            SourceText::new(""),
            &LanguageKind::ALL,
        ))
    }

    fn code_of(host: &HostDocumentSnapshot) -> Arc<VirtualDocumentSnapshot> {
        Arc::clone(host.virtual_document(LanguageKind::Code).unwrap())
    }

    #[test]
    fn added_requires_only_new_host() {
        let event =
            DocumentChangeEvent::from_parts(DocumentChangeKind::Added, None, Some(host("A.host")), None, None)
                .unwrap();
        assert_eq!(event.kind(), DocumentChangeKind::Added);
        assert_eq!(event.host_uri().as_str(), "file:///project/A.host");
        assert_eq!(event.virtual_language(), None);
    }

    #[test]
    fn added_with_virtual_payload_is_rejected() {
        let new = host("A.host");
        let err = DocumentChangeEvent::from_parts(
            DocumentChangeKind::Added,
            None,
            Some(Arc::clone(&new)),
            None,
            Some(code_of(&new)),
        )
        .unwrap_err();
        assert_eq!(err, EventError::UnexpectedVirtual { kind: "Added" });
    }

    #[test]
    fn removed_with_new_host_is_rejected() {
        let err = DocumentChangeEvent::from_parts(
            DocumentChangeKind::Removed,
            Some(host("A.host")),
            Some(host("A.host")),
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            EventError::UnexpectedHost {
                kind: "Removed",
                side: "new"
            }
        );
    }

    #[test]
    fn virtual_change_requires_both_virtual_snapshots() {
        let old = host("A.host");
        let err = DocumentChangeEvent::from_parts(
            DocumentChangeKind::VirtualDocumentChanged,
            Some(Arc::clone(&old)),
            Some(Arc::clone(&old)),
            None,
            Some(code_of(&old)),
        )
        .unwrap_err();
        assert_eq!(err, EventError::MissingVirtual { side: "old" });
    }

    #[test]
    fn virtual_change_rejects_uri_mismatch() {
        let a = host("A.host");
        let b = host("B.host");
        let err = DocumentChangeEvent::from_parts(
            DocumentChangeKind::VirtualDocumentChanged,
            Some(Arc::clone(&a)),
            Some(Arc::clone(&b)),
            Some(code_of(&a)),
            Some(code_of(&b)),
        )
        .unwrap_err();
        assert!(matches!(err, EventError::UriMismatch { .. }));
    }

    #[test]
    fn virtual_change_rejects_language_mismatch() {
        let a = host("A.host");
        let err = DocumentChangeEvent::from_parts(
            DocumentChangeKind::VirtualDocumentChanged,
            Some(Arc::clone(&a)),
            Some(Arc::clone(&a)),
            Some(code_of(&a)),
            Some(Arc::clone(a.virtual_document(LanguageKind::Markup).unwrap())),
        )
        .unwrap_err();
        assert_eq!(err, EventError::LanguageMismatch);
    }

    #[test]
    fn well_formed_virtual_change_exposes_language() {
        let a = host("A.host");
        let event = DocumentChangeEvent::from_parts(
            DocumentChangeKind::VirtualDocumentChanged,
            Some(Arc::clone(&a)),
            Some(Arc::clone(&a)),
            Some(code_of(&a)),
            Some(code_of(&a)),
        )
        .unwrap();
        assert_eq!(event.virtual_language(), Some(LanguageKind::Code));
    }
}
