// ============================================
// File: crates/s3l-core/src/protocol/framing.rs
// ============================================
//! # Frame I/O
//!
//! Moves whole frames over a raw [`ByteChannel`]: the header first, then
//! exactly the number of body bytes it announces.
//!
//! ## Last Modified
//! v0.1.0 - Initial framing helpers

use s3l_transport::{ByteChannel, TransportError};
use tracing::trace;

use super::header::FrameHeader;
use super::messages::WireMessage;
use super::HEADER_SIZE;
use crate::error::Result;

/// Reads one frame, returning its parsed header and raw body.
///
/// # Errors
/// - Transport errors from the raw channel
/// - `MalformedFrame` if the header does not parse
pub fn read_frame<C>(raw: &mut C) -> Result<(FrameHeader, Vec<u8>)>
where
    C: ByteChannel<Error = TransportError> + ?Sized,
{
    let header_bytes = raw.read(HEADER_SIZE)?;
    let header = FrameHeader::decode(&header_bytes)?;
    let body = if header.length == 0 {
        Vec::new()
    } else {
        raw.read(usize::from(header.length))?
    };
    trace!(
        content_type = %header.content_type,
        length = header.length,
        seq = header.sequence_number,
        "Frame received"
    );
    Ok((header, body))
}

/// Serializes `message` with `sequence_number` and writes the frame.
///
/// # Errors
/// Serialization or transport errors.
pub fn write_message<C, M>(raw: &mut C, message: &M, sequence_number: u32) -> Result<()>
where
    C: ByteChannel<Error = TransportError> + ?Sized,
    M: WireMessage,
{
    let frame = message.serialize(sequence_number)?;
    trace!(
        content_type = %M::CONTENT_TYPE,
        length = frame.len() - HEADER_SIZE,
        seq = sequence_number,
        "Frame sent"
    );
    raw.write(&frame)?;
    Ok(())
}
