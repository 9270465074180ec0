//! Document identity, snapshots and the registry that owns them.

mod events;
mod manager;
mod mapping;
mod position;
mod snapshot;
mod virtual_uri;

pub use events::{DocumentChangeEvent, DocumentChangeKind};
pub use manager::DocumentManager;
pub use mapping::{MappingMetadata, SourceMapping};
pub use position::{
    LineIndex, SourceText, compute_line_starts, convert_utf16_to_byte_in_line, position_le,
    range_contains,
};
pub use snapshot::{HostDocumentSnapshot, LanguageKind, VirtualDocumentSnapshot};
pub use virtual_uri::VirtualDocumentUri;
