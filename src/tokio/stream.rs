//! Async stream abstraction for tokio.

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[cfg(feature = "tokio-tls")]
use tokio_native_tls::TlsStream;

use crate::buffer_set::BufferSet;
use crate::error::Result;
use crate::protocol::codec::{FRAME_HEADER_LEN, parse_frame_header};

pub enum Stream {
    Tcp(BufReader<TcpStream>),
    #[cfg(feature = "tokio-tls")]
    Tls(Box<BufReader<TlsStream<TcpStream>>>),
}

impl Stream {
    pub fn tcp(stream: TcpStream) -> Self {
        Self::Tcp(BufReader::new(stream))
    }

    pub async fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        match self {
            Stream::Tcp(r) => r.read_exact(buf).await.map(|_| ()),
            #[cfg(feature = "tokio-tls")]
            Stream::Tls(r) => r.read_exact(buf).await.map(|_| ()),
        }
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Stream::Tcp(r) => r.get_mut().write_all(buf).await,
            #[cfg(feature = "tokio-tls")]
            Stream::Tls(r) => r.get_mut().write_all(buf).await,
        }
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Stream::Tcp(r) => r.get_mut().flush().await,
            #[cfg(feature = "tokio-tls")]
            Stream::Tls(r) => r.get_mut().flush().await,
        }
    }

    /// Write and flush the buffered frame.
    pub async fn send(&mut self, buffer_set: &mut BufferSet) -> std::io::Result<()> {
        self.write_all(&buffer_set.write_buffer).await?;
        self.flush().await?;
        buffer_set.mark_sent();
        Ok(())
    }

    pub async fn read_u8(&mut self) -> std::io::Result<u8> {
        match self {
            Stream::Tcp(r) => r.read_u8().await,
            #[cfg(feature = "tokio-tls")]
            Stream::Tls(r) => r.read_u8().await,
        }
    }

    /// Read one frame into `buffer_set`.
    pub async fn read_message(&mut self, buffer_set: &mut BufferSet) -> Result<()> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        self.read_exact(&mut header).await?;
        let (type_byte, payload_len) = parse_frame_header(&header)?;

        buffer_set.type_byte = type_byte;
        buffer_set.read_buffer.clear();
        buffer_set.read_buffer.resize(payload_len, 0);
        self.read_exact(&mut buffer_set.read_buffer).await?;
        Ok(())
    }

    /// Write without waiting; used where awaiting is impossible.
    ///
    /// Only plain TCP is attempted. Returns whether every byte was accepted.
    pub fn try_write_all(&mut self, buf: &[u8]) -> bool {
        match self {
            Stream::Tcp(r) => matches!(r.get_ref().try_write(buf), Ok(n) if n == buf.len()),
            #[cfg(feature = "tokio-tls")]
            Stream::Tls(_) => false,
        }
    }

    /// Replace the plain socket with a TLS session over it.
    #[cfg(feature = "tokio-tls")]
    pub async fn upgrade_to_tls(self, host: &str, mode: crate::opts::TlsMode) -> Result<Self> {
        use crate::error::Error;

        let reader = match self {
            Stream::Tcp(reader) => reader,
            Stream::Tls(_) => return Err(Error::Protocol("stream is already TLS".into())),
        };
        if !reader.buffer().is_empty() {
            return Err(Error::Protocol(
                "server sent data before the TLS handshake".into(),
            ));
        }

        let connector = tokio_native_tls::TlsConnector::from(crate::tls::tls_connector(mode)?);
        let tls = connector.connect(host, reader.into_inner()).await?;
        Ok(Self::Tls(Box::new(BufReader::new(tls))))
    }
}
