//! WebSocket transport.
//!
//! Browsers expose each debugging target as a WebSocket endpoint
//! (`ws://host:port/devtools/page/<id>`). Each inbound message is framed
//! by [`CdpCodec`] on its own, and every outgoing envelope becomes exactly
//! one text message.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::BytesMut;
use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, Stream, StreamExt};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::codec::Decoder;

use crate::codec::{CdpCodec, Frame};
use crate::error::CodecError;
use crate::message::OutgoingMessage;
use crate::transport::CdpTransport;

/// A WebSocket connection to a debugging target.
pub struct WebSocketTransport<S = MaybeTlsStream<TcpStream>> {
    inner: WebSocketStream<S>,
}

impl<S> WebSocketTransport<S> {
    /// Wrap an established WebSocket stream.
    pub fn new(inner: WebSocketStream<S>) -> Self {
        Self { inner }
    }
}

/// Open a WebSocket connection to a stream endpoint address.
pub async fn connect(url: &str) -> Result<WebSocketTransport, CodecError> {
    tracing::debug!(url, "opening WebSocket");
    let (stream, response) = tokio_tungstenite::connect_async(url).await?;
    tracing::debug!(url, status = %response.status(), "WebSocket handshake complete");
    Ok(WebSocketTransport::new(stream))
}

impl<S> CdpTransport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Read = MessageFrames<SplitStream<WebSocketStream<S>>>;
    type Write = MessageWriter<SplitSink<WebSocketStream<S>, Message>>;

    fn into_split(self, codec: CdpCodec) -> (Self::Read, Self::Write) {
        let (sink, stream) = self.inner.split();
        (MessageFrames::new(stream, codec), MessageWriter::new(sink))
    }
}

pin_project! {
    /// Inbound WebSocket messages cut into frames.
    ///
    /// Every text or binary message is framed on its own: the units it
    /// holds are yielded in order and whatever is left incomplete at the
    /// end of the message is reported as [`Frame::Malformed`]. Control
    /// frames are skipped and a close frame ends the stream.
    pub struct MessageFrames<S> {
        #[pin]
        inner: S,
        codec: CdpCodec,
        ready: VecDeque<Frame>,
        closed: bool,
    }
}

impl<S> MessageFrames<S> {
    fn new(inner: S, codec: CdpCodec) -> Self {
        Self {
            inner,
            codec,
            ready: VecDeque::new(),
            closed: false,
        }
    }
}

impl<S> Stream for MessageFrames<S>
where
    S: Stream<Item = Result<Message, tungstenite::Error>>,
{
    type Item = Result<Frame, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(frame) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }
            if *this.closed {
                return Poll::Ready(None);
            }

            let payload = match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(Message::Text(text))) => BytesMut::from(text.as_str().as_bytes()),
                Some(Ok(Message::Binary(data))) => BytesMut::from(&data[..]),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "WebSocket closed by remote");
                    *this.closed = true;
                    continue;
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Err(tungstenite::Error::ConnectionClosed)) | None => {
                    *this.closed = true;
                    continue;
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e.into()))),
            };

            let mut buf = payload;
            loop {
                match this.codec.decode_eof(&mut buf) {
                    Ok(Some(frame)) => this.ready.push_back(frame),
                    Ok(None) => break,
                    Err(e) => return Poll::Ready(Some(Err(e))),
                }
            }
        }
    }
}

pin_project! {
    /// Sink sending each envelope as one WebSocket text message.
    pub struct MessageWriter<S> {
        #[pin]
        inner: S,
    }
}

impl<S> MessageWriter<S> {
    fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S> Sink<OutgoingMessage> for MessageWriter<S>
where
    S: Sink<Message, Error = tungstenite::Error>,
{
    type Error = CodecError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx).map_err(CodecError::from)
    }

    fn start_send(self: Pin<&mut Self>, item: OutgoingMessage) -> Result<(), Self::Error> {
        let json = serde_json::to_string(&item).map_err(CodecError::JsonSerialize)?;
        self.project()
            .inner
            .start_send(Message::Text(json.into()))
            .map_err(CodecError::from)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx).map_err(CodecError::from)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx).map_err(CodecError::from)
    }
}
