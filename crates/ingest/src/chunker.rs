use std::ops::Range;

/// Splits a run of rows into fixed-size, contiguous windows.
///
/// Rows are physical lines. A quoted CSV field that spans several lines is
/// counted as several rows and may straddle a boundary.
#[derive(Debug, Clone, Copy)]
pub struct RowChunker {
    rows_per_chunk: usize,
}

impl Default for RowChunker {
    fn default() -> Self {
        Self { rows_per_chunk: 15 }
    }
}

impl RowChunker {
    /// `rows_per_chunk` of zero is clamped to one.
    pub fn new(rows_per_chunk: usize) -> Self {
        Self {
            rows_per_chunk: rows_per_chunk.max(1),
        }
    }

    pub fn rows_per_chunk(&self) -> usize {
        self.rows_per_chunk
    }

    pub fn chunk_count(&self, total_rows: usize) -> usize {
        total_rows.div_ceil(self.rows_per_chunk)
    }

    /// Row range covered by chunk `index`, or `None` past the last chunk.
    pub fn range(&self, index: usize, total_rows: usize) -> Option<Range<usize>> {
        let start = index.checked_mul(self.rows_per_chunk)?;
        if start >= total_rows {
            return None;
        }
        let end = (start + self.rows_per_chunk).min(total_rows);
        Some(start..end)
    }

    pub fn ranges(&self, total_rows: usize) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.chunk_count(total_rows)).filter_map(move |i| self.range(i, total_rows))
    }
}
