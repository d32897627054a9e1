//! Pluggable text codecs for packet bodies.
//!
//! The wire protocol does not name an encoding; most servers speak UTF-8 but
//! some community builds are configured for wide encodings or expect Base64
//! wrapped bodies. The [`Encoder`] chosen in the client configuration maps
//! body bytes to and from text. Authentication packets bypass it and always
//! travel UTF-8 so that credentials are never altered by a non-standard
//! body encoding.

use crate::error::RconError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::fmt;
use std::sync::Arc;

/// Byte ↔ text codec for packet bodies, swappable per client instance.
///
/// `encode_body` produces the wire bytes for a packet's content *including*
/// the protocol's single NUL terminator, expressed in the encoder's own
/// width (one zero byte for UTF-8, two for UTF-16, four for UTF-32).
/// `decode_body` receives the frame body with the trailing terminator and
/// pad already stripped and maps it back to content text.
pub trait Encoder: fmt::Debug + Send + Sync {
    fn encode_body(&self, content: &str) -> Result<Vec<u8>, RconError>;
    fn decode_body(&self, bytes: &[u8]) -> Result<String, RconError>;
}

/// The default body encoder: plain UTF-8.
pub fn default_encoder() -> Arc<dyn Encoder> {
    Arc::new(Utf8Encoder)
}

/// Bodies are UTF-8 text.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8Encoder;

impl Encoder for Utf8Encoder {
    fn encode_body(&self, content: &str) -> Result<Vec<u8>, RconError> {
        let mut bytes = content.as_bytes().to_vec();
        bytes.push(0);
        Ok(bytes)
    }

    fn decode_body(&self, bytes: &[u8]) -> Result<String, RconError> {
        // some servers pad responses with extra NULs; they carry no text
        let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        String::from_utf8(bytes[..end].to_vec())
            .map_err(|e| RconError::MalformedPacketBody(e.to_string()))
    }
}

/// Bodies are little-endian UTF-16 code units.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf16Encoder;

impl Encoder for Utf16Encoder {
    fn encode_body(&self, content: &str) -> Result<Vec<u8>, RconError> {
        Ok(content
            .encode_utf16()
            .chain(std::iter::once(0u16))
            .flat_map(u16::to_le_bytes)
            .collect())
    }

    fn decode_body(&self, bytes: &[u8]) -> Result<String, RconError> {
        let chunks = bytes.chunks_exact(2);
        // a lone trailing byte is the overlap between the wide terminator
        // and the frame pad; anything non-zero there is real data loss
        if chunks.remainder().iter().any(|b| *b != 0) {
            return Err(RconError::MalformedPacketBody(
                "stray non-zero byte after last UTF-16 code unit".into(),
            ));
        }
        let mut units: Vec<u16> = chunks
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        while units.last() == Some(&0) {
            units.pop();
        }
        String::from_utf16(&units).map_err(|e| RconError::MalformedPacketBody(e.to_string()))
    }
}

/// Bodies are little-endian UTF-32 scalars.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf32Encoder;

impl Encoder for Utf32Encoder {
    fn encode_body(&self, content: &str) -> Result<Vec<u8>, RconError> {
        Ok(content
            .chars()
            .chain(std::iter::once('\0'))
            .flat_map(|c| (c as u32).to_le_bytes())
            .collect())
    }

    fn decode_body(&self, bytes: &[u8]) -> Result<String, RconError> {
        let chunks = bytes.chunks_exact(4);
        if chunks.remainder().iter().any(|b| *b != 0) {
            return Err(RconError::MalformedPacketBody(
                "stray non-zero byte after last UTF-32 scalar".into(),
            ));
        }
        let mut scalars: Vec<u32> = chunks
            .map(|quad| u32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]))
            .collect();
        while scalars.last() == Some(&0) {
            scalars.pop();
        }
        scalars
            .into_iter()
            .map(|scalar| {
                char::from_u32(scalar).ok_or_else(|| {
                    RconError::MalformedPacketBody(format!("invalid scalar value {scalar:#x}"))
                })
            })
            .collect()
    }
}

/// Content strings are Base64 text; the wire carries the decoded raw bytes.
///
/// Useful against servers that tunnel arbitrary bytes through the text
/// protocol. Encoding unwraps the Base64 and appends a single NUL
/// terminator; decoding re-wraps the received bytes as Base64 text.
#[derive(Debug, Default, Clone, Copy)]
pub struct Base64Encoder;

impl Encoder for Base64Encoder {
    fn encode_body(&self, content: &str) -> Result<Vec<u8>, RconError> {
        let mut bytes = BASE64
            .decode(content)
            .map_err(|e| RconError::MalformedPacketBody(e.to_string()))?;
        bytes.push(0);
        Ok(bytes)
    }

    fn decode_body(&self, bytes: &[u8]) -> Result<String, RconError> {
        Ok(BASE64.encode(bytes))
    }
}
