//! In-memory transport for testing.

use tokio::io::{DuplexStream, duplex};

use crate::codec::CdpCodec;
use crate::reader::CdpReader;
use crate::transport::CdpTransport;
use crate::writer::CdpWriter;

/// An in-memory transport for testing DevTools communication.
///
/// `MemoryTransport` uses tokio's [`DuplexStream`] to provide a bidirectional
/// in-memory channel that can be split into read and write halves.
///
/// # Example
///
/// ```
/// use transport::testing::MemoryTransport;
/// use transport::split;
///
/// // Create a connected pair of transports
/// let (client_transport, browser_transport) = MemoryTransport::pair();
///
/// // The client side is split into a framed reader and an envelope writer,
/// // the browser side is used as raw bytes so tests control the chunking.
/// let (client_reader, client_writer) = split(client_transport);
/// let (browser_read, browser_write) = browser_transport.into_inner();
/// ```
pub struct MemoryTransport {
    read: DuplexStream,
    write: DuplexStream,
}

impl MemoryTransport {
    /// Create a connected pair of in-memory transports.
    ///
    /// Bytes written on one transport will be received on the other
    /// transport's reader, simulating a bidirectional connection.
    ///
    /// Uses a default buffer size of 64KB for each direction.
    pub fn pair() -> (Self, Self) {
        Self::pair_with_buffer_size(64 * 1024)
    }

    /// Create a connected pair with a custom buffer size.
    ///
    /// Smaller buffers can be useful for testing backpressure behavior.
    pub fn pair_with_buffer_size(buffer_size: usize) -> (Self, Self) {
        let (a_to_b_write, a_to_b_read) = duplex(buffer_size);
        let (b_to_a_write, b_to_a_read) = duplex(buffer_size);

        let transport_a = MemoryTransport {
            read: b_to_a_read,
            write: a_to_b_write,
        };

        let transport_b = MemoryTransport {
            read: a_to_b_read,
            write: b_to_a_write,
        };

        (transport_a, transport_b)
    }

    /// Return the raw `(read, write)` byte streams.
    pub fn into_inner(self) -> (DuplexStream, DuplexStream) {
        (self.read, self.write)
    }
}

impl CdpTransport for MemoryTransport {
    type Read = CdpReader<DuplexStream>;
    type Write = CdpWriter<DuplexStream>;

    fn into_split(self, codec: CdpCodec) -> (Self::Read, Self::Write) {
        (CdpReader::with_codec(self.read, codec), CdpWriter::new(self.write))
    }
}
