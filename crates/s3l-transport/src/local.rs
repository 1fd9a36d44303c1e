// ============================================
// File: crates/s3l-transport/src/local.rs
// ============================================
//! # In-Process Channel Pair
//!
//! ## Creation Reason
//! Lets both ends of a connection live in one process (tests, embedded
//! use) without sockets. Each call to [`pair`] builds a fresh, owned pair
//! of endpoints; there is no process-wide registry.
//!
//! ## Main Functionality
//! - `pair()`: two connected `LocalChannel` endpoints
//! - Blocking reads backed by `parking_lot::{Mutex, Condvar}`
//! - Closing either endpoint wakes readers on both sides
//!
//! ## Usage
//! ```
//! use std::thread;
//! use s3l_transport::{local_pair, ByteChannel};
//!
//! let (mut client, mut server) = local_pair();
//! let echo = thread::spawn(move || {
//!     let msg = server.read(5).unwrap();
//!     server.write(&msg).unwrap();
//! });
//! client.write(b"hello").unwrap();
//! assert_eq!(client.read(5).unwrap(), b"hello");
//! echo.join().unwrap();
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::ByteChannel;

// ============================================
// Pipe
// ============================================

/// One direction of a local pair.
#[derive(Default)]
struct Pipe {
    state: Mutex<PipeState>,
    readable: Condvar,
}

#[derive(Default)]
struct PipeState {
    buf: VecDeque<u8>,
    closed: bool,
}

impl Pipe {
    fn close(&self) {
        self.state.lock().closed = true;
        self.readable.notify_all();
    }

    fn is_drained_and_closed(&self) -> bool {
        let state = self.state.lock();
        state.closed && state.buf.is_empty()
    }
}

// ============================================
// LocalChannel
// ============================================

/// One endpoint of an in-process byte pipe.
pub struct LocalChannel {
    inbound: Arc<Pipe>,
    outbound: Arc<Pipe>,
    closed: bool,
}

/// Creates two connected endpoints. Bytes written to one are read from
/// the other, in order.
#[must_use]
pub fn pair() -> (LocalChannel, LocalChannel) {
    let a_to_b = Arc::new(Pipe::default());
    let b_to_a = Arc::new(Pipe::default());

    let a = LocalChannel {
        inbound: Arc::clone(&b_to_a),
        outbound: Arc::clone(&a_to_b),
        closed: false,
    };
    let b = LocalChannel {
        inbound: a_to_b,
        outbound: b_to_a,
        closed: false,
    };
    (a, b)
}

impl LocalChannel {
    /// Number of bytes written by the peer and not yet read.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inbound.state.lock().buf.len()
    }
}

impl ByteChannel for LocalChannel {
    type Error = TransportError;

    fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let mut state = self.inbound.state.lock();
        loop {
            if state.buf.len() >= n {
                let bytes: Vec<u8> = state.buf.drain(..n).collect();
                trace!(bytes = n, "local channel read");
                return Ok(bytes);
            }
            if state.closed {
                return Err(TransportError::Closed);
            }
            self.inbound.readable.wait(&mut state);
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        {
            let mut state = self.outbound.state.lock();
            if state.closed {
                return Err(TransportError::Closed);
            }
            state.buf.extend(bytes);
        }
        self.outbound.readable.notify_all();
        trace!(bytes = bytes.len(), "local channel write");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed || self.inbound.is_drained_and_closed()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.outbound.close();
        self.inbound.close();
    }
}

impl Drop for LocalChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for LocalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalChannel")
            .field("pending", &self.pending())
            .field("closed", &self.closed)
            .finish()
    }
}

// ============================================
// Tests
// ============================================
