//! DevTools message writer.
//!
//! This module provides [`CdpWriter`], a typed wrapper around a framed
//! async writer for sending call envelopes over a plain byte stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Sink;
use pin_project_lite::pin_project;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;

use crate::codec::CdpCodec;
use crate::error::CodecError;
use crate::message::OutgoingMessage;

pin_project! {
    /// An async sink for outgoing call envelopes.
    ///
    /// `CdpWriter` wraps an [`AsyncWrite`] destination and encodes each
    /// envelope as one JSON unit. Every `send` flushes, so one envelope is
    /// fully written before the next one starts.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::SinkExt;
    /// use transport::{CdpWriter, OutgoingMessage};
    ///
    /// let mut writer = CdpWriter::new(write_half);
    /// writer.send(OutgoingMessage::new(0, "Page.enable", None)).await?;
    /// ```
    pub struct CdpWriter<W> {
        #[pin]
        inner: FramedWrite<W, CdpCodec>,
    }
}

impl<W> CdpWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create a new writer from an async write destination.
    pub fn new(writer: W) -> Self {
        Self {
            inner: FramedWrite::new(writer, CdpCodec::new()),
        }
    }
}

impl<W> Sink<OutgoingMessage> for CdpWriter<W>
where
    W: AsyncWrite + Unpin,
{
    type Error = CodecError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: OutgoingMessage) -> Result<(), Self::Error> {
        self.project().inner.start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    async fn written(msgs: Vec<OutgoingMessage>) -> Vec<u8> {
        let (client, mut browser) = tokio::io::duplex(4096);
        let mut writer = CdpWriter::new(client);

        for msg in msgs {
            writer.send(msg).await.unwrap();
        }
        drop(writer);

        let mut output = Vec::new();
        browser.read_to_end(&mut output).await.unwrap();
        output
    }

    #[tokio::test]
    async fn write_single_message() {
        let output = written(vec![OutgoingMessage::new(0, "Page.enable", None)]).await;
        assert_eq!(output, br#"{"id":0,"method":"Page.enable","params":{}}"#);
    }

    #[tokio::test]
    async fn write_multiple_messages() {
        let msgs = (0..3)
            .map(|id| OutgoingMessage::new(id, format!("Domain.method{id}"), Some(json!({"n": id}))))
            .collect();
        let output = written(msgs).await;

        let values: Vec<OutgoingMessage> = serde_json::Deserializer::from_slice(&output)
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(values.len(), 3);
        for (id, msg) in values.iter().enumerate() {
            assert_eq!(msg.id, id as u64);
            assert_eq!(msg.method, format!("Domain.method{id}"));
        }
    }
}
