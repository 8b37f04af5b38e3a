use std::io::{BufReader, Read, Write};
use std::net::TcpStream;

#[cfg(feature = "sync-tls")]
use native_tls::TlsStream;

use crate::buffer_set::BufferSet;
use crate::error::Result;
use crate::protocol::codec::{FRAME_HEADER_LEN, parse_frame_header};

pub enum Stream {
    Tcp(BufReader<TcpStream>),
    #[cfg(feature = "sync-tls")]
    Tls(Box<BufReader<TlsStream<TcpStream>>>),
}

impl Stream {
    pub fn tcp(stream: TcpStream) -> Self {
        Self::Tcp(BufReader::new(stream))
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        match self {
            Stream::Tcp(r) => r.read_exact(buf),
            #[cfg(feature = "sync-tls")]
            Stream::Tls(r) => r.read_exact(buf),
        }
    }

    pub fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Stream::Tcp(r) => r.get_mut().write_all(buf),
            #[cfg(feature = "sync-tls")]
            Stream::Tls(r) => r.get_mut().write_all(buf),
        }
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Stream::Tcp(r) => r.get_mut().flush(),
            #[cfg(feature = "sync-tls")]
            Stream::Tls(r) => r.get_mut().flush(),
        }
    }

    /// Write and flush the buffered frame.
    pub fn send(&mut self, buffer_set: &mut BufferSet) -> std::io::Result<()> {
        self.write_all(&buffer_set.write_buffer)?;
        self.flush()?;
        buffer_set.mark_sent();
        Ok(())
    }

    pub fn read_u8(&mut self) -> std::io::Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    /// Read one frame into `buffer_set`.
    pub fn read_message(&mut self, buffer_set: &mut BufferSet) -> Result<()> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        self.read_exact(&mut header)?;
        let (type_byte, payload_len) = parse_frame_header(&header)?;

        buffer_set.type_byte = type_byte;
        buffer_set.read_buffer.clear();
        buffer_set.read_buffer.resize(payload_len, 0);
        self.read_exact(&mut buffer_set.read_buffer)?;
        Ok(())
    }

    /// Replace the plain socket with a TLS session over it.
    #[cfg(feature = "sync-tls")]
    pub fn upgrade_to_tls(self, host: &str, mode: crate::opts::TlsMode) -> Result<Self> {
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

        let connector = crate::tls::tls_connector(mode)?;
        let tls = connector
            .connect(host, reader.into_inner())
            .map_err(|e| match e {
                native_tls::HandshakeError::Failure(e) => Error::Tls(e),
                native_tls::HandshakeError::WouldBlock(_) => Error::Io(std::io::Error::new(
                    std::io::ErrorKind::WouldBlock,
                    "TLS handshake interrupted",
                )),
            })?;
        Ok(Self::Tls(Box::new(BufReader::new(tls))))
    }
}
