//! The `A.host` scenario: an embedded code region on host lines 10–12,
//! copied to virtual offsets 100–140 of the generated document.

use std::sync::Arc;

use tower_lsp_server::ls_types::{Location, Position, Range};
use url::Url;
use utsushi::document::SourceText;
use utsushi::{DocumentManager, LanguageKind, MappingMetadata, SourceMapping};

pub const HOST_URI: &str = "file:///project/A.host";
pub const VIRTUAL_URI: &str = "file:///project/A.host.virt.code";

/// Embedded code as authored in the host; exactly 40 bytes.
pub const REGION: &str = "var x = 1;\nvar y = x;\nint total = x + y;";

pub const REGION_HOST_LINE: u32 = 10;
pub const VIRTUAL_REGION_START: usize = 100;
pub const HOST_VERSION: u64 = 5;

pub fn host_text() -> String {
    let mut text = "<div>markup</div>\n".repeat(REGION_HOST_LINE as usize);
    text.push_str(REGION);
    text.push_str("\n<p>end</p>\n");
    text
}

pub fn region_host_start() -> usize {
    "<div>markup</div>\n".len() * REGION_HOST_LINE as usize
}

pub fn virtual_text() -> String {
    let mut text = "// generated\n".repeat(7);
    text.push_str("void M() ");
    assert_eq!(text.len(), VIRTUAL_REGION_START);
    text.push_str(REGION);
    text.push_str("\n}\n");
    text.push_str(&"// trailing scaffolding\n".repeat(30));
    assert!(text.len() > 500);
    text
}

pub fn host_uri() -> Url {
    Url::parse(HOST_URI).unwrap()
}

/// Open `A.host`, edit it up to [`HOST_VERSION`], and install a virtual
/// document generated from that version.
pub fn open_scenario(manager: &DocumentManager) {
    let uri = host_uri();
    manager.open(uri.clone(), host_text()).unwrap();
    for _ in 1..HOST_VERSION {
        manager.update_host(&uri, host_text()).unwrap();
    }
    manager
        .update_virtual(
            &uri,
            LanguageKind::Code,
            virtual_text(),
            MappingMetadata::new(vec![SourceMapping::new(
                region_host_start(),
                VIRTUAL_REGION_START,
                REGION.len(),
            )]),
            HOST_VERSION,
        )
        .unwrap();
}

pub fn open_scenario_in_new_manager() -> Arc<DocumentManager> {
    let manager = Arc::new(DocumentManager::default());
    open_scenario(&manager);
    manager
}

/// A virtual-document location covering `len` bytes at `offset`.
pub fn virtual_location(offset: usize, len: usize) -> Location {
    let text = SourceText::new(virtual_text());
    Location {
        uri: VIRTUAL_URI.parse().unwrap(),
        range: text.offsets_to_range(offset, offset + len).unwrap(),
    }
}

/// Offsets of the three `x` identifiers inside the region.
pub fn x_offsets() -> [usize; 3] {
    let start = VIRTUAL_REGION_START;
    [start + 4, start + 11 + 8, start + 22 + 12]
}

pub fn pos(line: u32, character: u32) -> Position {
    Position { line, character }
}

pub fn point(line: u32, character: u32) -> Range {
    Range {
        start: pos(line, character),
        end: pos(line, character),
    }
}
