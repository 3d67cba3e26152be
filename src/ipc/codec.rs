//! Length-prefixed MessagePack codecs for tokio I/O.
//!
//! Framing: `[4 bytes: payload length, big-endian u32][N bytes: MessagePack payload]`

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::protocol::{MAX_PAYLOAD_SIZE, Message, RawEnvelope};

/// Codec error type.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload too large: {0} bytes (max {MAX_PAYLOAD_SIZE})")]
    PayloadTooLarge(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Length-prefix reader shared by both codecs.
#[derive(Debug, Default)]
struct FrameReader {
    /// Length of the frame being read, once its header is consumed.
    pending_len: Option<usize>,
}

impl FrameReader {
    fn next_frame(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, CodecError> {
        let len = match self.pending_len {
            Some(len) => len,
            None => {
                if src.len() < 4 {
                    return Ok(None);
                }
                let len = src.get_u32() as usize;
                if len > MAX_PAYLOAD_SIZE {
                    return Err(CodecError::PayloadTooLarge(len));
                }
                self.pending_len = Some(len);
                len
            }
        };

        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }
        self.pending_len = None;
        Ok(Some(src.split_to(len)))
    }
}

fn write_frame(item: &Message, dst: &mut BytesMut) -> Result<(), CodecError> {
    let payload = rmp_serde::to_vec_named(item)?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(CodecError::PayloadTooLarge(payload.len()));
    }
    dst.reserve(4 + payload.len());
    dst.put_u32(payload.len() as u32);
    dst.extend_from_slice(&payload);
    Ok(())
}

/// Client-side codec: frames decode straight into [`Message`].
#[derive(Debug, Default)]
pub struct MessageCodec {
    frames: FrameReader,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.frames.next_frame(src)? {
            Some(payload) => Ok(Some(rmp_serde::from_slice(&payload)?)),
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        write_frame(&item, dst)
    }
}

/// Broker-side codec: yields raw payloads for [`decode_frame`].
///
/// Keeping decode separate lets the connection answer an unknown message
/// type with an error that still echoes the request id.
#[derive(Debug, Default)]
pub struct FrameCodec {
    frames: FrameReader,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.frames.next_frame(src)
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        write_frame(&item, dst)
    }
}

/// Result of attempting to decode a raw frame into a protocol message.
#[derive(Debug)]
pub enum DecodeResult {
    Ok(Message),
    /// Unknown type; envelope kept so the error can echo the id.
    UnknownType(RawEnvelope),
    /// Could not even extract `{type, id}`.
    Malformed(rmp_serde::decode::Error),
}

/// Two-phase decode: [`Message`] first, then [`RawEnvelope`].
pub fn decode_frame(payload: &[u8]) -> DecodeResult {
    match rmp_serde::from_slice::<Message>(payload) {
        Ok(msg) => DecodeResult::Ok(msg),
        Err(_) => match rmp_serde::from_slice::<RawEnvelope>(payload) {
            Ok(envelope) => DecodeResult::UnknownType(envelope),
            Err(e) => DecodeResult::Malformed(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{Clip, PixelMapDescriptor, SemanticRecord};
    use crate::ipc::protocol::*;

    fn encode(msg: &Message) -> BytesMut {
        let mut buf = BytesMut::new();
        MessageCodec::new().encode(msg.clone(), &mut buf).unwrap();
        buf
    }

    #[test]
    fn round_trip_through_codec() {
        let msg = Message::Hello {
            id: 0,
            version: PROTOCOL_VERSION,
            app_id: "com.example.notes".into(),
            device_id: Some("dev-a".into()),
        };
        let mut buf = encode(&msg);
        let decoded = MessageCodec::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, msg);
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_header_returns_none() {
        let mut buf = BytesMut::from(&[0u8, 0][..]);
        assert!(MessageCodec::new().decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn partial_payload_resumes() {
        let msg = Message::SetClip {
            id: 1,
            clip: Clip::from_text("split across reads"),
        };
        let mut full = encode(&msg);
        let mut partial = full.split_to(full.len() / 2);

        let mut codec = MessageCodec::new();
        assert!(codec.decode(&mut partial).unwrap().is_none());
        partial.extend_from_slice(&full);
        assert_eq!(codec.decode(&mut partial).unwrap().unwrap(), msg);
    }

    #[test]
    fn multiple_messages_in_buffer() {
        let first = Message::GetChangeCount { id: 1 };
        let second = Message::Update {
            id: 0,
            change_count: 5,
        };
        let mut buf = BytesMut::new();
        let mut codec = MessageCodec::new();
        codec.encode(first.clone(), &mut buf).unwrap();
        codec.encode(second.clone(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), first);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), second);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn image_bytes_survive_framing() {
        let data: Vec<u8> = (0..=255).collect();
        let mut clip = Clip::new();
        clip.add_kind_record(&SemanticRecord::PixelMap(PixelMapDescriptor {
            width: 8,
            height: 8,
            pixel_format: "RGBA_8888".into(),
            data: data.clone(),
        }))
        .unwrap();
        let mut buf = encode(&Message::SetClip { id: 2, clip });

        match MessageCodec::new().decode(&mut buf).unwrap().unwrap() {
            Message::SetClip { clip, .. } => {
                assert_eq!(clip.primary_pixel_map().unwrap().data, data);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn payload_too_large_on_decode() {
        let mut buf = BytesMut::new();
        buf.put_u32((17 * 1024 * 1024) as u32);
        buf.extend_from_slice(&[0u8; 100]);
        let err = FrameCodec::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::PayloadTooLarge(_)));
    }

    #[test]
    fn frame_length_header_is_big_endian() {
        let buf = encode(&Message::Clear { id: 0 });
        let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(buf.len() - 4, len);
    }

    #[test]
    fn frame_codec_defers_decoding() {
        let mut buf = encode(&Message::Has {
            id: 8,
            mime_type: Some("text/html".into()),
        });
        let payload = FrameCodec::new().decode(&mut buf).unwrap().unwrap();
        match decode_frame(&payload) {
            DecodeResult::Ok(Message::Has { id, mime_type }) => {
                assert_eq!(id, 8);
                assert_eq!(mime_type.as_deref(), Some("text/html"));
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            decode_frame(&[0xc1, 0xff, 0x00]),
            DecodeResult::Malformed(_)
        ));
    }
}
