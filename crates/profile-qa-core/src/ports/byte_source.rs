//! Byte source port for fetching encoded photos.

use crate::domain::ImageBuffer;

/// Port for fetching raw photo bytes from storage.
///
/// Fetching is deferred so a batch only holds the buffers it is working on.
pub trait ByteSource: Send + Sync {
    /// Returns the identifiers of all photos in this source, in batch order.
    fn photo_ids(&self) -> Vec<String>;

    /// Fetches the encoded bytes of one photo.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be read. The batch records it as
    /// a failure of that photo only.
    fn fetch(&self, photo_id: &str) -> anyhow::Result<ImageBuffer>;
}
