//! Chunk Queue (C5): splits a large directory ingest into ordered chunks
//! and owns the `pending`/`failed` FIFOs the agent loop drives through
//! `/nextchunk`, `/retry`, `/retryall`, `/skipchunk`.

use std::collections::VecDeque;

/// One unit of an ingest, already formatted into model-ready text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunk {
    pub index: usize,
    pub total: usize,
    pub content: String,
}

impl FileChunk {
    pub fn new(index: usize, total: usize, content: String) -> Self {
        Self { index, total, content }
    }

    /// Prepends the progress banner the loop sends alongside the chunk
    /// body.
    fn with_banner(&self, remaining: usize, failed: usize) -> String {
        format!(
            "This is chunk {}/{} (remaining: {}, failed: {}). Continue the analysis.\n\n{}",
            self.index + 1,
            self.total,
            remaining,
            failed,
            self.content
        )
    }
}

/// Snapshot of queue sizes for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkQueueStatus {
    pub pending: usize,
    pub failed: usize,
    pub has_last_failed: bool,
}

/// Owns the two FIFOs for one ingest. A chunk leaves `pending` only after
/// a successful turn; on failure it moves to `failed` and becomes
/// `last_failed`.
#[derive(Debug, Default)]
pub struct ChunkQueue {
    pending: VecDeque<FileChunk>,
    failed: VecDeque<FileChunk>,
    last_failed: Option<FileChunk>,
}

impl ChunkQueue {
    pub fn new(chunks: Vec<FileChunk>) -> Self {
        Self {
            pending: chunks.into_iter().collect(),
            failed: VecDeque::new(),
            last_failed: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn status(&self) -> ChunkQueueStatus {
        ChunkQueueStatus {
            pending: self.pending.len(),
            failed: self.failed.len(),
            has_last_failed: self.last_failed.is_some(),
        }
    }

    /// Peeks the banner-wrapped text for the next pending chunk without
    /// removing it; the caller pops it via [`Self::complete`] or
    /// [`Self::fail`] once the LLM turn resolves.
    pub fn next(&self) -> Option<String> {
        let chunk = self.pending.front()?;
        Some(chunk.with_banner(self.pending.len().saturating_sub(1), self.failed.len()))
    }

    /// Records the front-of-queue chunk's outcome, popping it from
    /// `pending` either way: on success the chunk is simply gone, on
    /// failure it is appended to `failed`.
    pub fn complete(&mut self, success: bool) {
        let Some(chunk) = self.pending.pop_front() else {
            return;
        };
        if !success {
            self.last_failed = Some(chunk.clone());
            self.failed.push_back(chunk);
        }
    }

    /// Re-attempts the most recent failure: removes it from `failed` and
    /// reinserts it at the head of `pending`.
    pub fn retry_last(&mut self) -> Option<String> {
        let chunk = self.last_failed.take()?;
        if let Some(pos) = self.failed.iter().position(|c| c.index == chunk.index) {
            self.failed.remove(pos);
        }
        self.pending.push_front(chunk.clone());
        Some(chunk.with_banner(self.pending.len().saturating_sub(1), self.failed.len()))
    }

    /// Splices all failed chunks into the head of `pending`, oldest first,
    /// and returns the next chunk to send.
    pub fn retry_all(&mut self) -> Option<String> {
        if self.failed.is_empty() {
            return self.next();
        }
        let mut retried: VecDeque<FileChunk> = self.failed.drain(..).collect();
        retried.append(&mut self.pending);
        self.pending = retried;
        self.last_failed = None;
        self.next()
    }

    /// Drops the next pending chunk without sending it.
    pub fn skip(&mut self) -> Option<FileChunk> {
        self.pending.pop_front()
    }
}
