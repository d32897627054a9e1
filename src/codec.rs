//! Stateful framer/deframer for the RCON wire format.
//!
//! Wire layout, all fields little-endian:
//!
//! ```text
//! [ length:i32 ][ id:i32 ][ type:i32 ][ body bytes ][ 0x00 ][ 0x00 ]
//! ```
//!
//! `length` counts every byte after the length field itself: id, type, body,
//! the body's NUL terminator and the final pad byte. TCP gives us a byte
//! stream with no respect for those boundaries, so [`PacketCodec::received`]
//! owns a private accumulator that survives across reads and hands back only
//! complete frames, however the stream was split or coalesced.

use crate::encoding::{Encoder, Utf8Encoder};
use crate::error::RconError;
use crate::packet::{Packet, PacketType};
use log::trace;
use std::sync::Arc;

/// Width of the length, id and type fields.
const INDICATOR_SIZE: usize = 4;

/// Maximum encoded id + type + body payload the protocol accepts.
pub const MAX_PACKET_SIZE: usize = 4096;

/// Smallest frame that can exist: id, type, body terminator, pad.
const MIN_FRAME_SIZE: usize = 2 * INDICATOR_SIZE + 2;

/// Bidirectional mapping between [`Packet`]s and wire bytes.
///
/// One codec belongs to exactly one connection. A reconnect must construct a
/// fresh codec so that no half-received bytes from the old socket leak into
/// the new session.
pub struct PacketCodec {
    encoder: Arc<dyn Encoder>,
    buffer: Vec<u8>,
}

impl PacketCodec {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        PacketCodec {
            encoder,
            buffer: Vec::new(),
        }
    }

    /// Serialize a packet into one wire frame.
    ///
    /// Authentication packets are always encoded with the default UTF-8
    /// encoder so that credential text is never altered by a non-standard
    /// body encoding such as Base64.
    pub fn serialize(&self, packet: &Packet) -> Result<Vec<u8>, RconError> {
        let body = if packet.kind() == PacketType::Authentication {
            Utf8Encoder.encode_body(packet.content())?
        } else {
            self.encoder.encode_body(packet.content())?
        };

        let payload_size = 2 * INDICATOR_SIZE + body.len();
        if payload_size > MAX_PACKET_SIZE {
            return Err(RconError::PacketTooLarge { size: payload_size });
        }

        // length counts everything after itself, including the final pad
        let length = (payload_size + 1) as i32;
        let mut frame = Vec::with_capacity(INDICATOR_SIZE + payload_size + 1);
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&packet.id().to_le_bytes());
        frame.extend_from_slice(&packet.kind().to_le_bytes());
        frame.extend_from_slice(&body);
        frame.push(0);
        Ok(frame)
    }

    /// Feed bytes off the socket into the accumulator and decode every
    /// complete frame they finish, in arrival order.
    ///
    /// Partial frames stay buffered until a later call completes them; a
    /// single call may likewise yield several packets when frames were
    /// coalesced into one read. Results are per frame, so one undecodable
    /// frame never suppresses its neighbors. The exception is an unusable
    /// length field, which poisons the accumulator and stops extraction.
    pub fn received(&mut self, bytes: &[u8]) -> Vec<Result<Packet, RconError>> {
        self.buffer.extend_from_slice(bytes);

        let mut results = Vec::new();
        loop {
            match self.next_frame() {
                Ok(Some(frame)) => {
                    let result = self.decode(&frame);
                    if let Ok(packet) = &result {
                        trace!("decoded packet: {packet}");
                    }
                    results.push(result);
                }
                Ok(None) => break,
                Err(e) => {
                    results.push(Err(e));
                    break;
                }
            }
        }
        results
    }

    /// Extract one complete frame (without its length field) from the front
    /// of the accumulator, or `None` if more bytes are needed.
    fn next_frame(&mut self) -> Result<Option<Vec<u8>>, RconError> {
        if self.buffer.len() < INDICATOR_SIZE {
            return Ok(None);
        }

        let length = i32::from_le_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]);
        if length < MIN_FRAME_SIZE as i32 {
            return Err(RconError::MalformedPacketHeader {
                needed: MIN_FRAME_SIZE,
                have: length.max(0) as usize,
            });
        }

        let frame_end = length as usize + INDICATOR_SIZE;
        if self.buffer.len() < frame_end {
            return Ok(None);
        }

        let frame = self.buffer[INDICATOR_SIZE..frame_end].to_vec();
        self.buffer.drain(..frame_end);
        Ok(Some(frame))
    }

    /// Decode a single frame's id, type and body.
    fn decode(&self, frame: &[u8]) -> Result<Packet, RconError> {
        if frame.len() < MIN_FRAME_SIZE {
            return Err(RconError::MalformedPacketHeader {
                needed: MIN_FRAME_SIZE,
                have: frame.len(),
            });
        }

        let id = i32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        let raw_type = i32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
        let kind = PacketType::try_from(raw_type)?;

        // everything between the indicators and the terminator + pad is body
        let body = &frame[2 * INDICATOR_SIZE..frame.len() - 2];
        let content = self.encoder.decode_body(body)?;

        Ok(Packet::new(id, kind, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{default_encoder, Utf16Encoder};

    fn codec() -> PacketCodec {
        PacketCodec::new(default_encoder())
    }

    fn drain(codec: &mut PacketCodec, bytes: &[u8]) -> Vec<Packet> {
        codec
            .received(bytes)
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn frame_layout_matches_the_wire_format() {
        let frame = codec()
            .serialize(&Packet::new(7, PacketType::ExecCommand, "info"))
            .unwrap();

        // length = id(4) + type(4) + "info\0"(5) + pad(1) = 14
        assert_eq!(&frame[0..4], &14i32.to_le_bytes());
        assert_eq!(&frame[4..8], &7i32.to_le_bytes());
        assert_eq!(&frame[8..12], &2i32.to_le_bytes());
        assert_eq!(&frame[12..16], b"info");
        assert_eq!(&frame[16..18], &[0, 0]);
        assert_eq!(frame.len(), 18);
    }

    #[test]
    fn serialize_received_round_trip() {
        let mut codec = codec();
        let sent = Packet::new(-3, PacketType::ServerResponse, "players: none");
        let frame = codec.serialize(&sent).unwrap();

        assert_eq!(drain(&mut codec, &frame), vec![sent]);
    }

    #[test]
    fn one_byte_chunks_reassemble_into_the_same_packets() {
        let mut whole = codec();
        let mut dribbled = codec();

        let frames: Vec<u8> = ["first", "second", "third"]
            .iter()
            .enumerate()
            .flat_map(|(i, content)| {
                whole
                    .serialize(&Packet::new(i as i32, PacketType::ServerResponse, *content))
                    .unwrap()
            })
            .collect();

        let at_once = drain(&mut whole, &frames);
        assert_eq!(at_once.len(), 3);

        let mut byte_by_byte = Vec::new();
        for byte in &frames {
            byte_by_byte.extend(drain(&mut dribbled, std::slice::from_ref(byte)));
        }
        assert_eq!(byte_by_byte, at_once);
    }

    #[test]
    fn coalesced_frames_decode_in_order_from_one_call() {
        let mut codec = codec();
        let a = Packet::new(1, PacketType::ServerResponse, "alpha");
        let b = Packet::new(2, PacketType::ServerResponse, "beta");

        let mut bytes = codec.serialize(&a).unwrap();
        bytes.extend(codec.serialize(&b).unwrap());

        assert_eq!(drain(&mut codec, &bytes), vec![a, b]);
    }

    #[test]
    fn split_frame_waits_for_the_rest() {
        let mut codec = codec();
        let packet = Packet::new(9, PacketType::ServerResponse, "partial delivery");
        let frame = codec.serialize(&packet).unwrap();

        let (head, tail) = frame.split_at(frame.len() / 2);
        assert!(codec.received(head).is_empty());
        assert_eq!(drain(&mut codec, tail), vec![packet]);
    }

    #[test]
    fn oversized_payload_is_rejected_with_no_output() {
        let codec = codec();
        let packet = Packet::command("x".repeat(MAX_PACKET_SIZE));

        let err = codec.serialize(&packet).unwrap_err();
        assert!(matches!(err, RconError::PacketTooLarge { .. }));
    }

    #[test]
    fn payload_at_the_limit_is_accepted() {
        // id(4) + type(4) + content + NUL(1) == 4096
        let content = "y".repeat(MAX_PACKET_SIZE - 2 * INDICATOR_SIZE - 1);
        let frame = codec().serialize(&Packet::command(content)).unwrap();
        assert_eq!(frame.len(), INDICATOR_SIZE + MAX_PACKET_SIZE + 1);
    }

    #[test]
    fn authentication_always_serializes_utf8() {
        let wide = PacketCodec::new(Arc::new(Utf16Encoder));
        let frame = wide
            .serialize(&Packet::authentication("hunter2"))
            .unwrap();

        // body is single-width UTF-8 despite the configured UTF-16 encoder
        assert_eq!(&frame[12..19], b"hunter2");
        assert_eq!(&frame[19..21], &[0, 0]);
    }

    #[test]
    fn exec_commands_honor_the_configured_encoder() {
        let wide = PacketCodec::new(Arc::new(Utf16Encoder));
        let frame = wide.serialize(&Packet::command("hi")).unwrap();

        assert_eq!(&frame[12..16], &[0x68, 0x00, 0x69, 0x00]);
    }

    #[test]
    fn undersized_length_field_is_malformed() {
        let mut codec = codec();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&3i32.to_le_bytes());
        bytes.extend_from_slice(&[0, 0, 0]);

        let results = codec.received(&bytes);
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(RconError::MalformedPacketHeader { .. })
        ));
    }

    #[test]
    fn unknown_packet_type_is_surfaced() {
        let mut codec = codec();
        let mut frame = codec.serialize(&Packet::command("ok")).unwrap();
        // overwrite the type field with a value the protocol never uses
        frame[8..12].copy_from_slice(&9i32.to_le_bytes());

        let results = codec.received(&frame);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(RconError::UnknownPacketType(9))));
    }

    #[test]
    fn a_bad_frame_does_not_suppress_its_neighbors() {
        let mut codec = codec();
        let good = Packet::new(4, PacketType::ServerResponse, "still here");

        let mut bytes = codec.serialize(&Packet::command("doomed")).unwrap();
        bytes[8..12].copy_from_slice(&9i32.to_le_bytes());
        bytes.extend(codec.serialize(&good).unwrap());

        let results = codec.received(&bytes);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert_eq!(results[1].as_ref().unwrap(), &good);
    }
}
