//! Synchronization and projection core for multi-language documents.
//!
//! A host document (markup with embedded code) is decomposed by an external
//! generator into virtual documents, one per embedded language. This crate
//! tracks both sides, waits for virtual documents to catch up with host
//! edits, translates positions between them, and runs language features
//! against virtual documents on behalf of the host.

pub mod config;
pub mod document;
pub mod error;
pub mod feature;
pub mod fixture;
pub mod projection;
pub mod publisher;
pub mod service;
pub mod synchronizer;

pub use config::Settings;
pub use document::{
    DocumentChangeEvent, DocumentChangeKind, DocumentManager, HostDocumentSnapshot, LanguageKind,
    MappingMetadata, SourceMapping, VirtualDocumentSnapshot, VirtualDocumentUri,
};
pub use error::{ProviderError, SyncError, UtsushiError, UtsushiResult};
pub use projection::{MappedRange, Projection, ProjectionEngine};
pub use service::{Collaborators, Utsushi};
pub use synchronizer::DocumentSynchronizer;
