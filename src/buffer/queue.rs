//! Shared buffer history
//!
//! The queue is ordered newest-first: index 0 is the chunk pushed last and
//! increasing indices walk toward older data. Clients hold an index into
//! this queue; pushing a chunk shifts every client index by one, which the
//! engine does by bumping the stored positions rather than moving data.
//!
//! Header chunks are kept apart from the data history. Consecutive header
//! chunks form one header set; a header arriving after a data chunk starts
//! a new set and bumps the header generation.

use std::collections::VecDeque;
use std::time::Duration;

use super::chunk::Chunk;

/// Newest-first history of data chunks plus the current header set
#[derive(Debug, Default)]
pub struct BufferQueue {
    /// Data chunks, index 0 = newest
    chunks: VecDeque<Chunk>,
    /// Total payload bytes currently held
    current_size: u64,
    /// Current header set
    headers: Vec<Chunk>,
    /// Bumped every time a new header set starts
    header_generation: u64,
    /// Whether the last chunk seen was a header
    collecting_headers: bool,
}

impl BufferQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a data chunk at index 0
    pub fn push(&mut self, chunk: Chunk) {
        self.collecting_headers = false;
        self.current_size += chunk.size() as u64;
        self.chunks.push_front(chunk);
    }

    /// Add a chunk to the header set
    ///
    /// Returns true if this chunk started a new header set.
    pub fn push_header(&mut self, chunk: Chunk) -> bool {
        let new_set = !self.collecting_headers;
        if new_set {
            self.headers.clear();
            self.header_generation += 1;
            self.collecting_headers = true;
        }
        self.headers.push(chunk);
        new_set
    }

    /// Keep only the `keep` newest chunks, releasing the rest
    ///
    /// Returns the number of chunks dropped.
    pub fn trim(&mut self, keep: usize) -> usize {
        if keep >= self.chunks.len() {
            return 0;
        }
        let dropped = self.chunks.len() - keep;
        for chunk in self.chunks.drain(keep..) {
            self.current_size -= chunk.size() as u64;
        }
        dropped
    }

    /// Drop all data chunks and headers
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.current_size = 0;
        self.headers.clear();
        self.collecting_headers = false;
    }

    /// Chunk at `index` (0 = newest)
    pub fn get(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    /// Iterate from newest to oldest
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> + '_ {
        self.chunks.iter()
    }

    /// Number of data chunks held
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no data chunk is held
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total payload bytes held
    pub fn size(&self) -> u64 {
        self.current_size
    }

    /// Current header set
    pub fn headers(&self) -> &[Chunk] {
        &self.headers
    }

    /// Generation of the current header set (0 = none received yet)
    pub fn header_generation(&self) -> u64 {
        self.header_generation
    }

    /// Timestamp span covered by the held chunks (newest minus oldest)
    pub fn duration(&self) -> Option<Duration> {
        let newest = self.chunks.iter().find_map(|c| c.timestamp)?;
        let oldest = self.chunks.iter().rev().find_map(|c| c.timestamp)?;
        Some(newest.saturating_sub(oldest))
    }
}
