//! Chunked transfer of module content over the size-limited info channel.
//!
//! Content larger than one chunk is split into contiguous, ordered
//! [`TransferChunk`]s on upload and rebuilt by a [`Reassembler`] on
//! download. Chunks of one transfer always travel in order, so the
//! reassembler only ever appends.

use bytes::Bytes;

use crate::error::{Result, UdfError};

/// Default maximum payload of a single chunk (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Largest chunk size a client may be configured with (16 MiB).
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Upper bound on the buffer reserved up front from a declared total size.
const MAX_INITIAL_RESERVE: usize = 64 * 1024 * 1024;

/// One bounded slice of module content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferChunk {
    offset: u64,
    total_size: u64,
    payload: Bytes,
}

impl TransferChunk {
    /// Creates a chunk.
    pub fn new(offset: u64, total_size: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            offset,
            total_size,
            payload: payload.into(),
        }
    }

    /// Returns the byte offset of this chunk in the logical content.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the declared total content length.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Returns the chunk payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns the payload length.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns `true` if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Returns the offset just past this chunk.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.payload.len() as u64)
    }

    /// Returns `true` if this chunk ends the transfer.
    pub fn is_last(&self) -> bool {
        self.end() >= self.total_size
    }
}

fn check_chunk_size(max_chunk_size: usize) -> Result<()> {
    if max_chunk_size == 0 {
        return Err(UdfError::Argument("chunk size must be greater than zero".to_string()));
    }
    Ok(())
}

/// Splits content into ordered chunks of at most `max_chunk_size` bytes.
///
/// The chunks cover the content contiguously. Empty content yields no chunks.
/// Payloads share the input buffer.
///
/// # Errors
///
/// Returns `UdfError::Argument` if `max_chunk_size` is zero.
pub fn split(content: &Bytes, max_chunk_size: usize) -> Result<Vec<TransferChunk>> {
    check_chunk_size(max_chunk_size)?;

    let total = content.len() as u64;
    let chunks = (0..content.len())
        .step_by(max_chunk_size)
        .map(|start| {
            let end = usize::min(start + max_chunk_size, content.len());
            TransferChunk::new(start as u64, total, content.slice(start..end))
        })
        .collect();

    Ok(chunks)
}

/// Returns the chunks an upload sends for `content`.
///
/// Same as [`split`], except that empty content still produces one
/// zero-length chunk so the node registers an empty module.
pub fn upload_plan(content: &Bytes, max_chunk_size: usize) -> Result<Vec<TransferChunk>> {
    let mut chunks = split(content, max_chunk_size)?;
    if chunks.is_empty() {
        chunks.push(TransferChunk::new(0, 0, Bytes::new()));
    }
    Ok(chunks)
}

/// Incremental, in-order reassembly of downloaded chunks.
#[derive(Debug, Default)]
pub struct Reassembler {
    total_size: Option<u64>,
    buffer: Vec<u8>,
    chunks: usize,
    max_chunk: Option<usize>,
}

impl Reassembler {
    /// Creates an empty reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty reassembler that rejects chunks larger than
    /// `max_chunk` bytes.
    pub fn with_max_chunk(max_chunk: usize) -> Self {
        Self {
            max_chunk: Some(max_chunk),
            ..Self::default()
        }
    }

    /// Returns the offset the next chunk must start at.
    pub fn next_offset(&self) -> u64 {
        self.buffer.len() as u64
    }

    /// Returns the declared total size, once the first chunk arrived.
    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    /// Returns the number of chunks accepted so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Returns `true` once every declared byte has arrived.
    pub fn is_complete(&self) -> bool {
        match self.total_size {
            Some(total) => self.next_offset() == total,
            None => false,
        }
    }

    /// Appends the next chunk.
    ///
    /// # Errors
    ///
    /// Returns `UdfError::TransferIntegrity` if the chunk does not start
    /// exactly where the previous one ended, declares a different total,
    /// overruns the total, arrives after completion, exceeds the chunk
    /// limit, or is an empty chunk that does not finish the transfer.
    pub fn push(&mut self, chunk: &TransferChunk) -> Result<()> {
        if let Some(max) = self.max_chunk {
            if chunk.len() > max {
                return Err(UdfError::TransferIntegrity(format!(
                    "chunk at offset {} carries {} bytes, limit is {}",
                    chunk.offset(),
                    chunk.len(),
                    max
                )));
            }
        }

        let total = match self.total_size {
            Some(total) => {
                if chunk.total_size() != total {
                    return Err(UdfError::TransferIntegrity(format!(
                        "chunk at offset {} declares total size {}, expected {}",
                        chunk.offset(),
                        chunk.total_size(),
                        total
                    )));
                }
                if self.is_complete() {
                    return Err(UdfError::TransferIntegrity(format!(
                        "unexpected chunk at offset {} after transfer completed",
                        chunk.offset()
                    )));
                }
                total
            }
            None => chunk.total_size(),
        };

        let expected = self.next_offset();
        if chunk.offset() != expected {
            let kind = if chunk.offset() < expected {
                "overlapping or duplicate"
            } else {
                "missing data before"
            };
            return Err(UdfError::TransferIntegrity(format!(
                "{} chunk: got offset {}, expected {}",
                kind,
                chunk.offset(),
                expected
            )));
        }

        if chunk.end() > total {
            return Err(UdfError::TransferIntegrity(format!(
                "chunk [{}, {}) overruns declared total size {}",
                chunk.offset(),
                chunk.end(),
                total
            )));
        }

        if chunk.is_empty() && total != 0 {
            return Err(UdfError::TransferIntegrity(format!(
                "empty chunk at offset {} before reaching total size {}",
                chunk.offset(),
                total
            )));
        }

        if self.total_size.is_none() {
            let reserve = usize::try_from(total).unwrap_or(usize::MAX);
            self.buffer.reserve(reserve.min(MAX_INITIAL_RESERVE));
            self.total_size = Some(total);
        }

        self.buffer.extend_from_slice(chunk.payload());
        self.chunks += 1;
        tracing::trace!(
            offset = chunk.offset(),
            len = chunk.len(),
            total,
            "accepted transfer chunk"
        );
        Ok(())
    }

    /// Returns the reassembled content.
    ///
    /// # Errors
    ///
    /// Returns `UdfError::TransferIntegrity` if no chunk arrived or the
    /// content is shorter than the declared total.
    pub fn finish(self) -> Result<Vec<u8>> {
        match self.total_size {
            None => Err(UdfError::TransferIntegrity("no chunks received".to_string())),
            Some(total) if self.next_offset() != total => Err(UdfError::TransferIntegrity(
                format!(
                    "truncated transfer: received {} of {} bytes",
                    self.next_offset(),
                    total
                ),
            )),
            Some(_) => Ok(self.buffer),
        }
    }
}

/// Reassembles a complete, ordered chunk sequence.
///
/// # Errors
///
/// Returns `UdfError::TransferIntegrity` on any gap, overlap, duplicate,
/// reordering, total-size disagreement or truncation.
pub fn reassemble<'a, I>(chunks: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a TransferChunk>,
{
    let mut reassembler = Reassembler::new();
    for chunk in chunks {
        reassembler.push(chunk)?;
    }
    reassembler.finish()
}
