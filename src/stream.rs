//! Narrow interface to the indexed stream.
//!
//! The engine does not parse any stream format. A reader implements
//! [`StreamSource`] and yields chunks of fully populated crystals; how
//! the bytes looked on disk is the reader's business.

use crate::crystal::Crystal;
use crate::error::Result;

/// One image's worth of indexing results.
#[derive(Debug)]
pub struct Chunk {
    /// Identity of the source image (filename, event id, ...).
    pub image: String,
    /// Zero or more crystals indexed on this image.
    pub crystals: Vec<Crystal>,
}

/// Abstract chunk iterator over an indexed stream.
pub trait StreamSource {
    /// The next chunk, or `None` at end of stream. A malformed record is
    /// a fatal error, not a skipped chunk.
    fn next_chunk(&mut self) -> Result<Option<Chunk>>;
}

/// Drain a stream into the flat crystal list the pipeline works on.
///
/// Every crystal is validated on the way in; the first defective record
/// aborts with the underlying error.
pub fn collect_crystals<S: StreamSource>(source: &mut S) -> Result<Vec<Crystal>> {
    let mut crystals = Vec::new();
    while let Some(chunk) = source.next_chunk()? {
        for crystal in chunk.crystals {
            crystal.validate()?;
            crystals.push(crystal);
        }
    }
    Ok(crystals)
}
