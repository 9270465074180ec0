//! Generator mapping metadata.
//!
//! The generator that produces a virtual document also reports which host text
//! spans were copied into it and where. Each `SourceMapping` pairs a host span
//! with an equally long span in the generated text. Generated text outside of
//! every mapping is scaffolding with no host counterpart.

use serde::{Deserialize, Serialize};

/// One host span copied verbatim into the generated document.
///
/// Offsets are UTF-8 byte offsets into the respective texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SourceMapping {
    pub host_start: usize,
    pub generated_start: usize,
    pub length: usize,
}

impl SourceMapping {
    pub fn new(host_start: usize, generated_start: usize, length: usize) -> Self {
        Self {
            host_start,
            generated_start,
            length,
        }
    }

    pub fn host_end(&self) -> usize {
        self.host_start + self.length
    }

    pub fn generated_end(&self) -> usize {
        self.generated_start + self.length
    }

    fn contains_host(&self, offset: usize) -> bool {
        (self.host_start..=self.host_end()).contains(&offset)
    }

    fn contains_generated(&self, offset: usize) -> bool {
        (self.generated_start..=self.generated_end()).contains(&offset)
    }
}

/// All mappings for one virtual document, ordered by host start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingMetadata {
    mappings: Vec<SourceMapping>,
}

impl MappingMetadata {
    pub fn new(mut mappings: Vec<SourceMapping>) -> Self {
        mappings.sort_by_key(|m| (m.host_start, m.generated_start));
        Self { mappings }
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceMapping> {
        self.mappings.iter()
    }

    /// Translate a host offset into the generated document.
    ///
    /// A span includes its end offset so that a cursor placed right after the
    /// last mapped character still projects. When spans touch, the earlier
    /// one wins.
    pub fn host_to_generated(&self, host_offset: usize) -> Option<usize> {
        // First mapping whose end is not before the offset
        let first = self
            .mappings
            .partition_point(|m| m.host_end() < host_offset);
        self.mappings[first..]
            .iter()
            .take_while(|m| m.host_start <= host_offset)
            .find(|m| m.contains_host(host_offset))
            .map(|m| m.generated_start + (host_offset - m.host_start))
    }

    /// Translate a generated `[start, end)` range back to the host.
    ///
    /// Both ends must land in the same mapping; a range straddling
    /// scaffolding has no faithful host counterpart.
    pub fn generated_range_to_host(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        if start > end {
            return None;
        }
        self.mappings
            .iter()
            .find(|m| m.contains_generated(start) && m.contains_generated(end))
            .map(|m| {
                (
                    m.host_start + (start - m.generated_start),
                    m.host_start + (end - m.generated_start),
                )
            })
    }
}

impl From<Vec<SourceMapping>> for MappingMetadata {
    fn from(mappings: Vec<SourceMapping>) -> Self {
        Self::new(mappings)
    }
}
