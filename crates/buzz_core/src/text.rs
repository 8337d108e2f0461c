//! Source text mapping for diagnostics.
//!
//! The scanner tracks line/column while tokenizing; the diagnostic renderer
//! goes the other way and needs the text of arbitrary lines to cut the
//! snippet that precedes every error message.

/// Byte offsets of line starts, built once per source file.
#[derive(Debug, Clone)]
pub struct LineMap {
    line_starts: Vec<usize>,
    text_len: usize,
}

impl LineMap {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0usize];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            line_starts,
            text_len: text.len(),
        }
    }

    /// Number of lines in the mapped text.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// The 0-based line containing the byte offset `pos`.
    pub fn line_of(&self, pos: usize) -> usize {
        match self.line_starts.binary_search(&pos) {
            Ok(line) => line,
            Err(line) => line - 1,
        }
    }

    /// The byte range of a 0-based line, newline excluded.
    /// Returns `None` when `line` is out of bounds.
    pub fn line_range(&self, line: usize) -> Option<(usize, usize)> {
        let start = *self.line_starts.get(line)?;
        let end = self
            .line_starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text_len);
        Some((start, end))
    }

    /// Slice the text of a 0-based line out of `source`.
    pub fn line_text<'s>(&self, source: &'s str, line: usize) -> Option<&'s str> {
        let (start, end) = self.line_range(line)?;
        source.get(start..end)
    }
}
