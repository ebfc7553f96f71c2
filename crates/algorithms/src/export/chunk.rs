//! Contiguous index ranges over an ordered collection

use paddyscan_core::{Error, Result};
use serde::Serialize;
use std::ops::Range;

/// One batch `[start, end)` of the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkRange {
    /// Sequential chunk number, from 0
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl ChunkRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Iterator over the chunks covering `[0, total)`
#[derive(Debug, Clone)]
pub struct ChunkIterator {
    total: usize,
    chunk_size: usize,
    next_index: usize,
}

impl ChunkIterator {
    /// `chunk_size` must be positive; see [`plan_chunks`] for the checked form
    fn new(total: usize, chunk_size: usize) -> Self {
        Self {
            total,
            chunk_size,
            next_index: 0,
        }
    }
}

impl Iterator for ChunkIterator {
    type Item = ChunkRange;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_index * self.chunk_size;
        if start >= self.total {
            return None;
        }
        let chunk = ChunkRange {
            index: self.next_index,
            start,
            end: (start + self.chunk_size).min(self.total),
        };
        self.next_index += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total.div_ceil(self.chunk_size) - self.next_index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkIterator {}

/// Partition `[0, total)` into `⌈total / chunk_size⌉` consecutive ranges.
///
/// Every range but the last holds exactly `chunk_size` indices.
pub fn plan_chunks(total: usize, chunk_size: usize) -> Result<ChunkIterator> {
    if chunk_size == 0 {
        return Err(Error::config("chunk_size", "must be at least 1"));
    }
    Ok(ChunkIterator::new(total, chunk_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_1234_by_500() {
        let chunks: Vec<_> = plan_chunks(1234, 500).unwrap().collect();
        let lens: Vec<usize> = chunks.iter().map(ChunkRange::len).collect();
        assert_eq!(lens, vec![500, 500, 234]);
        assert_eq!(chunks[2].start, 1000);
        assert_eq!(chunks[2].end, 1234);
        assert_eq!(chunks[2].index, 2);
    }

    #[test]
    fn test_exact_multiple() {
        let chunks: Vec<_> = plan_chunks(1000, 500).unwrap().collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].len(), 500);
    }

    #[test]
    fn test_empty_collection() {
        assert_eq!(plan_chunks(0, 500).unwrap().count(), 0);
    }

    #[test]
    fn test_ranges_partition_exactly() {
        for total in [1usize, 7, 99, 500, 501] {
            for size in [1usize, 3, 50, 500, 1000] {
                let it = plan_chunks(total, size).unwrap();
                assert_eq!(it.len(), total.div_ceil(size));
                let mut next = 0;
                for chunk in it {
                    assert_eq!(chunk.start, next);
                    assert!(!chunk.is_empty());
                    next = chunk.end;
                }
                assert_eq!(next, total);
            }
        }
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(plan_chunks(10, 0), Err(Error::Configuration { .. })));
    }
}
