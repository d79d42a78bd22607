//! Wire encoding for clipboard payloads
//!
//! File contents travel as standard base64. Batches of files travel as two
//! newline-joined strings, one with the file names and one with the encoded
//! contents, matched by position.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

/// Separator between entries of a joined name or blob list
pub const BATCH_SEPARATOR: char = '\n';

/// Codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// Input is not valid base64
    #[error("Invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),

    /// A single batch entry failed to decode
    #[error("Entry {index} ({name:?}) is not valid base64: {source}")]
    Entry {
        index: usize,
        name: String,
        #[source]
        source: base64::DecodeError,
    },

    /// Name and blob lists have different lengths
    #[error("Malformed batch: {names} names for {blobs} files")]
    MalformedBatch { names: usize, blobs: usize },
}

/// A decoded file from a pushed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBlob {
    /// Name as supplied by the client (not yet sanitized)
    pub name: String,
    /// Decoded file content
    pub bytes: Vec<u8>,
}

/// Result of processing a batch item by item.
///
/// `items` holds the successes in input order, `failures` the per-item
/// errors that were skipped.
#[derive(Debug)]
pub struct BatchOutcome<T, E> {
    pub items: Vec<T>,
    pub failures: Vec<E>,
}

impl<T, E> BatchOutcome<T, E> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Record one item's result
    pub fn push(&mut self, result: Result<T, E>) {
        match result {
            Ok(item) => self.items.push(item),
            Err(e) => self.failures.push(e),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<T, E> Default for BatchOutcome<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> FromIterator<Result<T, E>> for BatchOutcome<T, E> {
    fn from_iter<I: IntoIterator<Item = Result<T, E>>>(iter: I) -> Self {
        let mut outcome = Self::new();
        for result in iter {
            outcome.push(result);
        }
        outcome
    }
}

/// Encode bytes for transport
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode transport text back to bytes
pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    // Clients that join with CRLF leave a trailing carriage return
    let text = text.strip_suffix('\r').unwrap_or(text);
    Ok(STANDARD.decode(text)?)
}

/// Split a joined name list and a joined blob list into named blobs.
///
/// Entries are paired by position. A blob that fails to decode is skipped and
/// reported in `failures`. Lists of different lengths are rejected as a whole.
/// A trailing separator on both lists does not produce an extra entry.
pub fn split_named_blobs(
    names_joined: &str,
    blobs_joined: &str,
) -> Result<BatchOutcome<NamedBlob, CodecError>, CodecError> {
    if names_joined.is_empty() && blobs_joined.is_empty() {
        return Ok(BatchOutcome::new());
    }

    let mut names: Vec<&str> = names_joined.split(BATCH_SEPARATOR).collect();
    let mut blobs: Vec<&str> = blobs_joined.split(BATCH_SEPARATOR).collect();

    if names.len() != blobs.len() {
        return Err(CodecError::MalformedBatch {
            names: names.len(),
            blobs: blobs.len(),
        });
    }

    if names.last().is_some_and(|n| n.trim().is_empty())
        && blobs.last().is_some_and(|b| b.trim().is_empty())
    {
        names.pop();
        blobs.pop();
    }

    let outcome = names
        .into_iter()
        .zip(blobs)
        .enumerate()
        .map(|(index, (name, blob))| {
            let name = name.strip_suffix('\r').unwrap_or(name).to_string();
            match decode(blob) {
                Ok(bytes) => Ok(NamedBlob { name, bytes }),
                Err(CodecError::Decode(source)) => Err(CodecError::Entry {
                    index,
                    name,
                    source,
                }),
                Err(e) => Err(e),
            }
        })
        .collect();

    Ok(outcome)
}
