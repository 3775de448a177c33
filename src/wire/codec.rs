//! Stateless encode/decode and delimited framing helpers.
//!
//! The codec is a pair of pure functions over prost messages plus the
//! varint-length-delimited framing used by the snapshot stream: each record
//! is a LEB128 length prefix followed by the message bytes. A service's
//! snapshot payload is framed at its own layer; the manager only frames the
//! `ServiceId` records between payloads.

use crate::core::error::{PlexusError, PlexusResult};
use bytes::BytesMut;
use prost::Message;
use std::io::{BufRead, Write};

/// Encode a message to its wire bytes.
pub fn encode<M: Message>(message: &M) -> Vec<u8> {
    message.encode_to_vec()
}

/// Decode a message from wire bytes.
pub fn decode<M: Message + Default>(bytes: &[u8]) -> PlexusResult<M> {
    M::decode(bytes).map_err(PlexusError::from)
}

/// Write one length-delimited record to the output stream.
pub fn write_delimited<M: Message>(message: &M, output: &mut dyn Write) -> PlexusResult<()> {
    let mut buf = BytesMut::with_capacity(message.encoded_len() + 5);
    message
        .encode_length_delimited(&mut buf)
        .map_err(|error| PlexusError::decode(error.to_string()))?;
    output.write_all(&buf)?;
    Ok(())
}

/// Read one length-delimited record from the input stream.
///
/// Consumes exactly the length prefix and the message body, leaving the
/// stream positioned at the next record (or EOF).
pub fn read_delimited<M: Message + Default>(input: &mut dyn BufRead) -> PlexusResult<M> {
    let len = read_varint(input)?;
    let len = usize::try_from(len)
        .map_err(|_| PlexusError::decode("record length prefix exceeds usize"))?;
    let mut body = vec![0u8; len];
    input.read_exact(&mut body)?;
    decode(&body)
}

/// Check whether the input stream has bytes remaining.
pub fn has_remaining(input: &mut dyn BufRead) -> PlexusResult<bool> {
    Ok(!input.fill_buf()?.is_empty())
}

/// Read a LEB128 varint from the input stream.
fn read_varint(input: &mut dyn BufRead) -> PlexusResult<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        input.read_exact(&mut byte)?;
        if shift >= 64 {
            return Err(PlexusError::decode("length prefix varint overflows u64"));
        }
        value |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}
