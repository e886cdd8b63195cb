//! Codec implementation for encoding/decoding info frames.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::constants::*;
use crate::error::{Result, UdfError};

/// Codec for info requests and responses.
///
/// Each frame is an 8-byte big-endian header (version, message type, 48-bit
/// body length) followed by the body text. Implements the
/// `tokio_util::codec::{Encoder, Decoder}` traits for use with tokio's
/// framed I/O.
#[derive(Debug, Clone)]
pub struct InfoCodec {
    max_body: usize,
}

impl InfoCodec {
    /// Creates a codec accepting bodies up to [`MAX_INFO_BODY`].
    pub fn new() -> Self {
        Self {
            max_body: MAX_INFO_BODY,
        }
    }

    /// Creates a codec with a custom body limit.
    pub fn with_max_body(max_body: usize) -> Self {
        Self { max_body }
    }

    fn header(body_len: usize) -> u64 {
        ((INFO_PROTO_VERSION as u64) << 56)
            | ((INFO_MESSAGE_TYPE as u64) << 48)
            | (body_len as u64 & INFO_SIZE_MASK)
    }
}

impl Default for InfoCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Encoder<&'a str> for InfoCodec {
    type Error = UdfError;

    fn encode(&mut self, command: &'a str, dst: &mut BytesMut) -> Result<()> {
        if command.is_empty() {
            return Err(UdfError::Argument("cannot encode empty info command".to_string()));
        }

        let needs_newline = !command.ends_with('\n');
        let body_len = command.len() + usize::from(needs_newline);
        if body_len > self.max_body {
            return Err(UdfError::Argument(format!(
                "info command of {} bytes exceeds limit of {}",
                body_len, self.max_body
            )));
        }

        dst.reserve(INFO_HEADER_SIZE + body_len);
        dst.put_u64(Self::header(body_len));
        dst.put_slice(command.as_bytes());
        if needs_newline {
            dst.put_u8(b'\n');
        }
        Ok(())
    }
}

impl Decoder for InfoCodec {
    type Item = String;
    type Error = UdfError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < INFO_HEADER_SIZE {
            return Ok(None);
        }

        let header = u64::from_be_bytes([
            src[0], src[1], src[2], src[3], src[4], src[5], src[6], src[7],
        ]);
        let version = (header >> 56) as u8;
        let message_type = (header >> 48) as u8;
        let body_len = (header & INFO_SIZE_MASK) as usize;

        if version != INFO_PROTO_VERSION {
            return Err(UdfError::Transport(format!(
                "unsupported info protocol version {}",
                version
            )));
        }

        if message_type != INFO_MESSAGE_TYPE {
            return Err(UdfError::Transport(format!(
                "unexpected message type {} on info channel",
                message_type
            )));
        }

        if body_len > self.max_body {
            return Err(UdfError::Transport(format!(
                "info response of {} bytes exceeds limit of {}",
                body_len, self.max_body
            )));
        }

        if src.len() < INFO_HEADER_SIZE + body_len {
            src.reserve(INFO_HEADER_SIZE + body_len - src.len());
            return Ok(None);
        }

        src.advance(INFO_HEADER_SIZE);
        let body = src.split_to(body_len);
        String::from_utf8(body.to_vec())
            .map(Some)
            .map_err(|e| UdfError::Transport(format!("info response is not valid UTF-8: {}", e)))
    }
}
