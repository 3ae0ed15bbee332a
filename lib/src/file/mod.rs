// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Chunked file transfer
//!
//! Files are moved to and from the terminal using repeated bounded
//! reads ([DeviceHandle::download][crate::DeviceHandle::download]) or
//! writes ([DeviceHandle::upload][crate::DeviceHandle::upload]).
//! Progress is reported through a caller-provided closure at a
//! configurable granularity to bound callback frequency.

mod reader;

mod writer;
pub use writer::UploadSource;

/// Default read chunk, bounded by the response frame size
pub const DEFAULT_READ_CHUNK: usize = 252;

/// Default download progress granularity
pub const DEFAULT_READ_GRANULARITY: usize = 4 * DEFAULT_READ_CHUNK;

/// Default write chunk, write frames use extended lengths
pub const DEFAULT_WRITE_CHUNK: usize = 128 * 1024;

/// Default upload progress granularity
pub const DEFAULT_WRITE_GRANULARITY: usize = DEFAULT_WRITE_CHUNK;

/// Chunked transfer options
#[derive(Clone, Debug, PartialEq)]
pub struct TransferOptions {
    /// Maximum bytes per read / write command
    pub max_chunk: usize,

    /// Bytes to transfer between progress notifications
    /// (0 notifies on every chunk)
    pub granularity: usize,

    /// Pacing hint passed with each write, in milliseconds
    pub delay_ms: u16,
}

impl TransferOptions {
    /// Default options for downloads
    pub fn download() -> Self {
        Self {
            max_chunk: DEFAULT_READ_CHUNK,
            granularity: DEFAULT_READ_GRANULARITY,
            delay_ms: 0,
        }
    }

    /// Default options for uploads
    pub fn upload() -> Self {
        Self {
            max_chunk: DEFAULT_WRITE_CHUNK,
            granularity: DEFAULT_WRITE_GRANULARITY,
            delay_ms: 0,
        }
    }

    /// Override the chunk bound
    pub fn with_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk;
        self
    }

    /// Override the progress granularity
    pub fn with_granularity(mut self, granularity: usize) -> Self {
        self.granularity = granularity;
        self
    }

    /// Override the write pacing hint
    pub fn with_delay_ms(mut self, delay_ms: u16) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::download()
    }
}

/// Progress gate, limits notifications to one per `granularity` bytes moved
pub(crate) struct ProgressGate {
    granularity: usize,
    pending: usize,
    moved: u64,
    notified: u64,
}

impl ProgressGate {
    pub fn new(granularity: usize) -> Self {
        Self {
            granularity,
            pending: 0,
            moved: 0,
            notified: 0,
        }
    }

    /// Record `n` bytes moved, returning true when a notification is due
    pub fn advance(&mut self, n: usize) -> bool {
        self.pending += n;
        self.moved += n as u64;

        if self.pending < self.granularity {
            return false;
        }

        self.pending = 0;
        self.notified = self.moved;
        true
    }

    /// Returns true if a final notification is due on completion.
    ///
    /// Transfers smaller than one granularity unit never notify.
    pub fn finish(&mut self) -> bool {
        if self.moved < self.granularity as u64 || self.notified == self.moved {
            return false;
        }

        self.notified = self.moved;
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn progress_gate_granularity() {
        let mut g = ProgressGate::new(100);

        assert!(!g.advance(60));
        assert!(g.advance(60));
        assert!(!g.advance(30));

        // Remaining bytes flushed on completion
        assert!(g.finish());
        assert!(!g.finish());
    }

    #[test]
    fn progress_gate_small_transfer() {
        let mut g = ProgressGate::new(1000);

        assert!(!g.advance(252));
        assert!(!g.finish());
    }

    #[test]
    fn progress_gate_exact_boundary() {
        let mut g = ProgressGate::new(504);

        assert!(!g.advance(252));
        assert!(g.advance(252));
        assert!(!g.finish());
    }
}
