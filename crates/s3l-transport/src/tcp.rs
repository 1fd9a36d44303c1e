// ============================================
// File: crates/s3l-transport/src/tcp.rs
// ============================================
//! # TCP Channel
//!
//! ## Creation Reason
//! Wraps a connected `std::net::TcpStream` in the `ByteChannel` trait.
//!
//! ## Design Choices
//! - `TCP_NODELAY` on: handshake frames are small and latency bound
//! - EOF and reset both surface as `TransportError::Closed`
//!
//! ## Last Modified
//! v0.1.0 - Initial TCP channel implementation

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::ByteChannel;

/// Blocking TCP byte channel.
///
/// # Example
/// ```ignore
/// use s3l_transport::{ByteChannel, TcpChannel};
///
/// let mut channel = TcpChannel::connect("127.0.0.1:9000")?;
/// channel.write(b"hello")?;
/// ```
#[derive(Debug)]
pub struct TcpChannel {
    stream: TcpStream,
    peer: Option<SocketAddr>,
    closed: bool,
}

impl TcpChannel {
    /// Connects to `addr`.
    ///
    /// # Errors
    /// Returns `InvalidAddress` if the address does not resolve, or `Io`
    /// if the connection cannot be established.
    pub fn connect<A: ToSocketAddrs + ToString>(addr: A) -> Result<Self> {
        let resolved: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(|_| TransportError::InvalidAddress {
                addr: addr.to_string(),
            })?
            .collect();
        if resolved.is_empty() {
            return Err(TransportError::InvalidAddress {
                addr: addr.to_string(),
            });
        }

        let stream = TcpStream::connect(&resolved[..])
            .map_err(|e| TransportError::io(format!("connecting to {}", addr.to_string()), e))?;
        info!(peer = %addr.to_string(), "TCP connection established");
        Self::from_stream(stream)
    }

    /// Wraps an already connected stream (for example one returned by
    /// `TcpListener::accept`).
    ///
    /// # Errors
    /// Returns `Io` if socket options cannot be applied.
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::io("setting TCP_NODELAY", e))?;
        let peer = stream.peer_addr().ok();
        Ok(Self {
            stream,
            peer,
            closed: false,
        })
    }

    /// Sets a read timeout. `None` blocks forever.
    ///
    /// # Errors
    /// Returns `Io` if the option cannot be applied.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream
            .set_read_timeout(timeout)
            .map_err(|e| TransportError::io("setting read timeout", e))
    }

    /// Remote address, if known.
    #[must_use]
    pub const fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn fail(&mut self, err: TransportError) -> TransportError {
        if err.is_closed() {
            self.closed = true;
        }
        err
    }
}

impl ByteChannel for TcpChannel {
    type Error = TransportError;

    fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let mut buf = vec![0u8; n];
        if let Err(e) = self.stream.read_exact(&mut buf) {
            return Err(self.fail(TransportError::from_io("reading from socket", e)));
        }
        Ok(buf)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let result = self
            .stream
            .write_all(bytes)
            .and_then(|()| self.stream.flush());
        if let Err(e) = result {
            return Err(self.fail(TransportError::from_io("writing to socket", e)));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!(error = %e, "socket shutdown failed");
        }
    }
}

impl Drop for TcpChannel {
    fn drop(&mut self) {
        self.close();
    }
}
