use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

use crate::archive::ARCHIVE_CONTENT_TYPE;
use crate::backend::BlobReader;

/// Zip bytes of a record, read lazily from the blob store.
///
/// Owns the underlying read handle; dropping the stream at any point
/// releases it.
pub struct ArchiveStream {
    slug: String,
    reader: BlobReader,
}

impl ArchiveStream {
    pub(crate) fn new(slug: &str, reader: BlobReader) -> Self {
        Self {
            slug: slug.to_string(),
            reader,
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn file_name(&self) -> String {
        format!("{}.zip", self.slug)
    }

    pub fn content_type(&self) -> &'static str {
        ARCHIVE_CONTENT_TYPE
    }
}

impl AsyncRead for ArchiveStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

impl Drop for ArchiveStream {
    fn drop(&mut self) {
        debug!("Released archive stream for {}", self.slug);
    }
}
