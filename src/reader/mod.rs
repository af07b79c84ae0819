//! Chunked streaming input layer.
//!
//! Turns an arbitrary byte source into a lazy, finite sequence of
//! record-boundary-aligned text chunks so the parsers never see a
//! record split in half. Memory stays bounded by the configured chunk
//! size except for the documented soft path where one logical record
//! is larger than a chunk.

mod detect;

pub use detect::{detect_format, FormatKind};

use crate::utils::config::{DEFAULT_CHUNK_SIZE, DEFAULT_MEMORY_CEILING};
use crate::utils::error::ReadError;
use log::{debug, warn};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read granularity for the underlying source
const READ_BUF_SIZE: usize = 64 * 1024;

/// Chunking parameters for one analysis pipeline
#[derive(Debug, Clone, Copy)]
pub struct ReaderConfig {
    /// Target upper bound for one chunk
    pub chunk_size: usize,
    /// Hard upper bound for a single relaxed (oversize) record
    pub memory_ceiling: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            memory_ceiling: DEFAULT_MEMORY_CEILING,
        }
    }
}

/// One boundary-aligned slice of the input stream
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk text, decoded lossily; GC logs are ASCII in practice
    pub data: String,
    /// True when this chunk had to grow past `chunk_size` because a
    /// single record carried no terminator within the limit
    pub relaxed: bool,
}

/// Streaming chunk producer over any byte source.
///
/// Each yielded chunk ends at the last newline found within the size
/// limit; the unconsumed remainder prefixes the next chunk. A record
/// longer than `chunk_size` relaxes the boundary rule for that record
/// only (reported via [`Chunk::relaxed`] and counted); a record longer
/// than `memory_ceiling` aborts with [`ReadError::SizeExceeded`].
pub struct ChunkReader<R: Read> {
    source: R,
    config: ReaderConfig,
    carry: Vec<u8>,
    eof: bool,
    finished: bool,
    size_warnings: u64,
}

impl ChunkReader<File> {
    /// Open a log file as a chunk source.
    ///
    /// # Errors
    /// `ReadError::SourceUnavailable` if the file cannot be opened
    pub fn open(path: impl AsRef<Path>, config: ReaderConfig) -> Result<Self, ReadError> {
        let file = File::open(path)?;
        Ok(Self::new(file, config))
    }
}

impl<R: Read> ChunkReader<R> {
    pub fn new(source: R, config: ReaderConfig) -> Self {
        Self {
            source,
            config,
            carry: Vec::new(),
            eof: false,
            finished: false,
            size_warnings: 0,
        }
    }

    /// Number of records that forced a boundary-rule relaxation so far
    pub fn size_warnings(&self) -> u64 {
        self.size_warnings
    }

    /// Read once from the source, appending at most `max` bytes to `buf`
    fn read_some(&mut self, buf: &mut Vec<u8>, max: usize) -> Result<usize, ReadError> {
        let mut tmp = vec![0u8; max.min(READ_BUF_SIZE)];
        let n = self.source.read(&mut tmp)?;
        if n == 0 {
            self.eof = true;
        } else {
            buf.extend_from_slice(&tmp[..n]);
        }
        Ok(n)
    }

    fn emit(&mut self, bytes: Vec<u8>, relaxed: bool) -> Chunk {
        Chunk {
            data: String::from_utf8_lossy(&bytes).into_owned(),
            relaxed,
        }
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk>, ReadError> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = std::mem::take(&mut self.carry);

        // Fill up to one chunk
        while !self.eof && buf.len() < self.config.chunk_size {
            let remaining = self.config.chunk_size - buf.len();
            self.read_some(&mut buf, remaining)?;
        }

        if self.eof {
            self.finished = true;
            if buf.is_empty() {
                return Ok(None);
            }
            debug!("emitting final chunk of {} bytes", buf.len());
            return Ok(Some(self.emit(buf, false)));
        }

        // Pull the boundary back to the last complete record terminator
        if let Some(pos) = buf.iter().rposition(|&b| b == b'\n') {
            self.carry = buf.split_off(pos + 1);
            return Ok(Some(self.emit(buf, false)));
        }

        // One record fills the whole chunk: relax the boundary for it
        self.size_warnings += 1;
        warn!(
            "record exceeds chunk size of {} bytes, relaxing boundary",
            self.config.chunk_size
        );
        loop {
            if buf.len() >= self.config.memory_ceiling {
                return Err(ReadError::SizeExceeded {
                    ceiling_bytes: self.config.memory_ceiling,
                });
            }
            let scan_from = buf.len();
            self.read_some(&mut buf, READ_BUF_SIZE)?;
            if self.eof {
                self.finished = true;
                return Ok(Some(self.emit(buf, true)));
            }
            if let Some(rel) = buf[scan_from..].iter().position(|&b| b == b'\n') {
                self.carry = buf.split_off(scan_from + rel + 1);
                return Ok(Some(self.emit(buf, true)));
            }
        }
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Chunk, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
