//! DevTools message reader.
//!
//! This module provides [`CdpReader`], a typed wrapper around a framed
//! async reader that produces a stream of [`Frame`]s.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::{CdpCodec, Frame};
use crate::error::CodecError;

pin_project! {
    /// An async stream of incoming protocol units.
    ///
    /// `CdpReader` wraps an [`AsyncRead`] source and cuts it into complete
    /// JSON units however the bytes happen to be chunked. Decoding a unit into
    /// an [`InboundMessage`](crate::InboundMessage) is left to the consumer so
    /// that one bad unit never ends the stream.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::StreamExt;
    /// use transport::{CdpReader, Frame, InboundMessage};
    ///
    /// let mut reader = CdpReader::new(read_half);
    ///
    /// while let Some(frame) = reader.next().await {
    ///     if let Frame::Complete(unit) = frame? {
    ///         let message = InboundMessage::from_slice(&unit)?;
    ///     }
    /// }
    /// ```
    pub struct CdpReader<R> {
        #[pin]
        inner: FramedRead<R, CdpCodec>,
    }
}

impl<R> CdpReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Create a new reader from an async read source.
    pub fn new(reader: R) -> Self {
        Self {
            inner: FramedRead::new(reader, CdpCodec::new()),
        }
    }

    /// Create a new reader with a custom codec.
    ///
    /// This allows configuring options like maximum message size.
    pub fn with_codec(reader: R, codec: CdpCodec) -> Self {
        Self {
            inner: FramedRead::new(reader, codec),
        }
    }
}

impl<R> Stream for CdpReader<R>
where
    R: AsyncRead + Unpin,
{
    type Item = Result<Frame, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}
