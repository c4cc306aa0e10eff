use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Delimiter byte for [`Framing::Delimited`]: U+0017, ASCII "End of
/// Transmission Block". Must not appear inside a delimited payload.
pub const DELIMITER: u8 = 0x17;

/// Length prefix size for [`Framing::LengthPrefixed`]: 4 bytes, big-endian.
pub const LENGTH_HEADER_SIZE: usize = 4;

/// Default maximum frame size: 16 MiB.
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

/// Wire framing scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// 4-byte big-endian payload length followed by the payload.
    #[default]
    LengthPrefixed,
    /// Payload terminated by [`DELIMITER`]. Delimiter bytes inside the
    /// payload are stripped before transmission (lossy; legacy format).
    Delimited,
}

/// Encode one payload into the wire format.
///
/// Length-prefixed wire format:
/// ```text
/// ┌────────────────┬─────────────────┐
/// │ Length (4B BE) │ Payload         │
/// └────────────────┴─────────────────┘
/// ```
///
/// Delimited wire format:
/// ```text
/// ┌─────────────────────────┬──────┐
/// │ Payload (0x17 stripped) │ 0x17 │
/// └─────────────────────────┴──────┘
/// ```
pub fn encode_frame(payload: &[u8], framing: Framing, dst: &mut BytesMut) -> Result<()> {
    match framing {
        Framing::LengthPrefixed => {
            if payload.len() > u32::MAX as usize {
                return Err(FrameError::FrameTooLarge {
                    size: payload.len(),
                    max: u32::MAX as usize,
                });
            }
            dst.reserve(LENGTH_HEADER_SIZE + payload.len());
            dst.put_u32(payload.len() as u32);
            dst.put_slice(payload);
        }
        Framing::Delimited => {
            dst.reserve(payload.len() + 1);
            if payload.contains(&DELIMITER) {
                tracing::debug!("stripping delimiter bytes from outbound payload");
                dst.extend(payload.iter().copied().filter(|b| *b != DELIMITER));
            } else {
                dst.put_slice(payload);
            }
            dst.put_u8(DELIMITER);
        }
    }
    Ok(())
}

/// Decode one frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer and returns the
/// payload without its framing.
pub fn decode_frame(src: &mut BytesMut, framing: Framing, max_frame: usize) -> Result<Option<Bytes>> {
    match framing {
        Framing::LengthPrefixed => {
            if src.len() < LENGTH_HEADER_SIZE {
                return Ok(None); // Need more data
            }
            let len = u32::from_be_bytes(src[..LENGTH_HEADER_SIZE].try_into().unwrap()) as usize;
            if len > max_frame {
                return Err(FrameError::FrameTooLarge {
                    size: len,
                    max: max_frame,
                });
            }
            if src.len() < LENGTH_HEADER_SIZE + len {
                return Ok(None); // Need more data
            }
            src.advance(LENGTH_HEADER_SIZE);
            Ok(Some(src.split_to(len).freeze()))
        }
        Framing::Delimited => match src.iter().position(|b| *b == DELIMITER) {
            Some(pos) => {
                if pos > max_frame {
                    return Err(FrameError::FrameTooLarge {
                        size: pos,
                        max: max_frame,
                    });
                }
                let payload = src.split_to(pos).freeze();
                src.advance(1);
                Ok(Some(payload))
            }
            None => {
                // Bound the accumulator so a peer that never sends a
                // delimiter cannot grow memory without limit.
                if src.len() > max_frame {
                    return Err(FrameError::FrameTooLarge {
                        size: src.len(),
                        max: max_frame,
                    });
                }
                Ok(None)
            }
        },
    }
}

/// Inbound reassembler: accumulates raw stream chunks and yields complete
/// frame payloads, retaining the trailing incomplete fragment.
///
/// The accumulator survives across arbitrarily fragmented arrivals: a frame
/// split over any number of chunks is yielded once complete, and multiple
/// frames arriving in one chunk are all yielded in order.
pub struct FrameDecoder {
    buf: BytesMut,
    framing: Framing,
    max_frame: usize,
}

impl FrameDecoder {
    pub fn new(framing: Framing, max_frame: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            framing,
            max_frame,
        }
    }

    /// Append a raw chunk from the stream.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete frame payload, if one is buffered.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        decode_frame(&mut self.buf, self.framing, self.max_frame)
    }

    /// Size of the buffered incomplete fragment.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

impl std::fmt::Debug for FrameDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDecoder")
            .field("framing", &self.framing)
            .field("pending", &self.buf.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_prefixed_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"hello, msgsock!";

        encode_frame(payload, Framing::LengthPrefixed, &mut buf).unwrap();
        assert_eq!(buf.len(), LENGTH_HEADER_SIZE + payload.len());

        let frame = decode_frame(&mut buf, Framing::LengthPrefixed, DEFAULT_MAX_FRAME)
            .unwrap()
            .unwrap();
        assert_eq!(frame.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn length_prefixed_incomplete_header() {
        let mut buf = BytesMut::from(&[0x00, 0x00][..]);
        let result = decode_frame(&mut buf, Framing::LengthPrefixed, DEFAULT_MAX_FRAME).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn length_prefixed_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello", Framing::LengthPrefixed, &mut buf).unwrap();
        buf.truncate(LENGTH_HEADER_SIZE + 2);

        let result = decode_frame(&mut buf, Framing::LengthPrefixed, DEFAULT_MAX_FRAME).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn length_prefixed_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32(1024 * 1024 * 32);

        let result = decode_frame(&mut buf, Framing::LengthPrefixed, DEFAULT_MAX_FRAME);
        assert!(matches!(result, Err(FrameError::FrameTooLarge { .. })));
    }

    #[test]
    fn delimited_roundtrip() {
        let mut buf = BytesMut::new();
        encode_frame(b"{\"kind\":\"ping\"}", Framing::Delimited, &mut buf).unwrap();

        let frame = decode_frame(&mut buf, Framing::Delimited, DEFAULT_MAX_FRAME)
            .unwrap()
            .unwrap();
        assert_eq!(frame.as_ref(), b"{\"kind\":\"ping\"}");
        assert!(buf.is_empty());
    }

    #[test]
    fn delimited_strips_delimiter_from_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"ab\x17cd", Framing::Delimited, &mut buf).unwrap();

        let frame = decode_frame(&mut buf, Framing::Delimited, DEFAULT_MAX_FRAME)
            .unwrap()
            .unwrap();
        // Known lossy behaviour of the legacy framing.
        assert_eq!(frame.as_ref(), b"abcd");
    }

    #[test]
    fn delimited_incomplete_frame_retained() {
        let mut buf = BytesMut::from(&b"partial"[..]);
        let result = decode_frame(&mut buf, Framing::Delimited, DEFAULT_MAX_FRAME).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.as_ref(), b"partial");
    }

    #[test]
    fn delimited_accumulator_bounded() {
        let mut buf = BytesMut::from(vec![b'x'; 64].as_slice());
        let result = decode_frame(&mut buf, Framing::Delimited, 16);
        assert!(matches!(result, Err(FrameError::FrameTooLarge { .. })));
    }

    #[test]
    fn multiple_frames_in_one_buffer() {
        for framing in [Framing::LengthPrefixed, Framing::Delimited] {
            let mut buf = BytesMut::new();
            encode_frame(b"first", framing, &mut buf).unwrap();
            encode_frame(b"second", framing, &mut buf).unwrap();

            let f1 = decode_frame(&mut buf, framing, DEFAULT_MAX_FRAME)
                .unwrap()
                .unwrap();
            let f2 = decode_frame(&mut buf, framing, DEFAULT_MAX_FRAME)
                .unwrap()
                .unwrap();

            assert_eq!(f1.as_ref(), b"first");
            assert_eq!(f2.as_ref(), b"second");
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn empty_payload() {
        for framing in [Framing::LengthPrefixed, Framing::Delimited] {
            let mut buf = BytesMut::new();
            encode_frame(b"", framing, &mut buf).unwrap();

            let frame = decode_frame(&mut buf, framing, DEFAULT_MAX_FRAME)
                .unwrap()
                .unwrap();
            assert!(frame.is_empty());
        }
    }

    #[test]
    fn decoder_reassembles_byte_by_byte() {
        for framing in [Framing::LengthPrefixed, Framing::Delimited] {
            let mut wire = BytesMut::new();
            encode_frame(b"one", framing, &mut wire).unwrap();
            encode_frame(b"two", framing, &mut wire).unwrap();

            let mut decoder = FrameDecoder::new(framing, DEFAULT_MAX_FRAME);
            let mut decoded = Vec::new();
            for byte in wire.as_ref() {
                decoder.extend(std::slice::from_ref(byte));
                while let Some(frame) = decoder.next_frame().unwrap() {
                    decoded.push(frame);
                }
            }

            assert_eq!(decoded.len(), 2);
            assert_eq!(decoded[0].as_ref(), b"one");
            assert_eq!(decoded[1].as_ref(), b"two");
            assert_eq!(decoder.pending_len(), 0);
        }
    }

    #[test]
    fn decoder_retains_trailing_fragment() {
        let mut wire = BytesMut::new();
        encode_frame(b"complete", Framing::Delimited, &mut wire).unwrap();
        wire.put_slice(b"in-progress");

        let mut decoder = FrameDecoder::new(Framing::Delimited, DEFAULT_MAX_FRAME);
        decoder.extend(&wire);

        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"complete");
        assert!(decoder.next_frame().unwrap().is_none());
        assert_eq!(decoder.pending_len(), b"in-progress".len());

        // The fragment completes on a later arrival.
        decoder.extend(&[DELIMITER]);
        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(frame.as_ref(), b"in-progress");
    }
}
