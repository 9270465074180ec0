use tower_lsp_server::ls_types::{Position, Range};

/// Line table for converting between byte offsets and LSP positions.
///
/// Lines are zero-based and columns count UTF-16 code units, matching the
/// LSP wire format. Offsets are UTF-8 byte offsets into the indexed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        Self {
            line_starts: compute_line_starts(text),
            len: text.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte range of `line`, excluding its terminating newline.
    fn line_bounds(&self, line: usize) -> Option<(usize, usize)> {
        let start = *self.line_starts.get(line)?;
        let end = match self.line_starts.get(line + 1) {
            Some(next) => next - 1,
            None => self.len,
        };
        Some((start, end))
    }

    /// Convert an LSP position to a byte offset in `text`.
    ///
    /// A column past the end of its line clamps to the line end. A line past
    /// the end of the text yields `None`.
    pub fn position_to_offset(&self, text: &str, position: Position) -> Option<usize> {
        let (line_start, line_end) = self.line_bounds(position.line as usize)?;
        let line_text = text.get(line_start..line_end)?;

        let byte_offset = convert_utf16_to_byte_in_line(line_text, position.character as usize)
            .unwrap_or(line_text.len());
        Some(line_start + byte_offset)
    }

    /// Convert a byte offset in `text` to an LSP position.
    ///
    /// An offset inside a multi-byte character resolves to that character's start.
    pub fn offset_to_position(&self, text: &str, offset: usize) -> Option<Position> {
        if offset > self.len {
            return None;
        }

        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let (line_start, line_end) = self.line_bounds(line)?;
        let line_text = text.get(line_start..line_end)?;

        let mut in_line = offset.saturating_sub(line_start).min(line_text.len());
        while !line_text.is_char_boundary(in_line) {
            in_line -= 1;
        }

        Some(Position {
            line: line as u32,
            character: line_text[..in_line].encode_utf16().count() as u32,
        })
    }
}

/// Immutable document text together with its line table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    text: String,
    line_index: LineIndex,
}

impl SourceText {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let line_index = LineIndex::new(&text);
        Self { text, line_index }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.line_index.line_count()
    }

    pub fn position_to_offset(&self, position: Position) -> Option<usize> {
        self.line_index.position_to_offset(&self.text, position)
    }

    pub fn offset_to_position(&self, offset: usize) -> Option<Position> {
        self.line_index.offset_to_position(&self.text, offset)
    }

    /// Convert a byte range to an LSP range.
    pub fn offsets_to_range(&self, start: usize, end: usize) -> Option<Range> {
        Some(Range {
            start: self.offset_to_position(start)?,
            end: self.offset_to_position(end)?,
        })
    }
}

/// Compute line start offsets for efficient position mapping
pub fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut line_starts = vec![0];
    line_starts.extend(
        text.match_indices('\n')
            .map(|(newline_offset, _)| newline_offset + 1),
    );
    line_starts
}

/// Convert UTF-16 position to byte position within a line
/// Returns None if the UTF-16 position is past the end of the line
#[inline]
pub fn convert_utf16_to_byte_in_line(line_text: &str, utf16_pos: usize) -> Option<usize> {
    let mut byte_offset = 0;
    let mut utf16_offset = 0;

    for ch in line_text.chars() {
        if utf16_offset >= utf16_pos {
            return Some(byte_offset);
        }
        utf16_offset += ch.len_utf16();
        byte_offset += ch.len_utf8();
    }

    (utf16_offset == utf16_pos).then_some(byte_offset)
}

/// Lexicographic `a <= b` on positions.
pub fn position_le(a: Position, b: Position) -> bool {
    (a.line, a.character) <= (b.line, b.character)
}

/// Whether `position` lies inside the half-open `range`, treating a
/// zero-length range as containing its single point.
pub fn range_contains(range: Range, position: Position) -> bool {
    if range.start == range.end {
        return range.start == position;
    }
    position_le(range.start, position) && !position_le(range.end, position)
}
