use bytes::{Buf, BufMut};
use heapless::Vec;

use crate::error::{FrameError, Result};

/// ADDR + META.
pub const HEADER_LEN: usize = 2;

/// Trailing CRC-16, big-endian.
pub const CRC_LEN: usize = 2;

/// Largest payload one frame can carry (128-byte receive buffer - 4).
pub const MAX_PAYLOAD: usize = 124;

/// Largest frame on the wire, excluding break and sync.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PAYLOAD + CRC_LEN;

/// Sent after the break so the receiver can lock on to the baud rate.
pub const SYNC_BYTE: u8 = 0x55;

pub const CRC_INIT: u16 = 0xFFFF;
pub const CRC_POLY: u16 = 0x1021;

/// The master's fixed address.
pub const MASTER_ADDR: u8 = 0x0F;

/// Address of a slave that has not joined yet.
pub const DEFAULT_ADDR: u8 = 0x00;

/// Destination of frames meant for every slave.
pub const BROADCAST_ADDR: u8 = 0x00;

const NIBBLE: u8 = 0x0F;
const MODE_BIT: u8 = 0x80;
const LEN_MASK: u8 = 0x7F;

/// Payload interpretation, carried in bit 7 of META.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Application data, surfaced to the caller.
    Data,
    /// Protocol command, routed internally.
    Cmd,
}

/// Fold one byte into a CRC-16/CCITT-FALSE accumulator (MSB first).
pub const fn crc16_update(crc: u16, byte: u8) -> u16 {
    let mut crc = crc ^ ((byte as u16) << 8);
    let mut bit = 0;
    while bit < 8 {
        crc = if crc & 0x8000 != 0 {
            (crc << 1) ^ CRC_POLY
        } else {
            crc << 1
        };
        bit += 1;
    }
    crc
}

/// CRC-16/CCITT-FALSE of a byte slice.
pub fn crc16(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(CRC_INIT, |crc, &byte| crc16_update(crc, byte))
}

pub const fn hton16(v: u16) -> u16 {
    v.to_be()
}

pub const fn ntoh16(v: u16) -> u16 {
    u16::from_be(v)
}

pub const fn hton32(v: u32) -> u32 {
    v.to_be()
}

pub const fn ntoh32(v: u32) -> u32 {
    u32::from_be(v)
}

/// The ADDR byte: source in the high nibble, destination in the low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrByte {
    pub src: u8,
    pub dst: u8,
}

impl AddrByte {
    pub fn new(src: u8, dst: u8) -> Result<Self> {
        for addr in [src, dst] {
            if addr > NIBBLE {
                return Err(FrameError::InvalidAddress(addr));
            }
        }
        Ok(Self { src, dst })
    }

    pub const fn pack(self) -> u8 {
        (self.src << 4) | (self.dst & NIBBLE)
    }

    pub const fn unpack(byte: u8) -> Self {
        Self {
            src: byte >> 4,
            dst: byte & NIBBLE,
        }
    }
}

/// The META byte: mode in bit 7, payload length in bits 6-0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaByte {
    pub mode: Mode,
    pub len: u8,
}

impl MetaByte {
    pub const fn pack(self) -> u8 {
        let mode = match self.mode {
            Mode::Data => 0,
            Mode::Cmd => MODE_BIT,
        };
        mode | (self.len & LEN_MASK)
    }

    pub const fn unpack(byte: u8) -> Self {
        Self {
            mode: if byte & MODE_BIT != 0 {
                Mode::Cmd
            } else {
                Mode::Data
            },
            len: byte & LEN_MASK,
        }
    }
}

/// A whole, validated frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub src: u8,
    pub dst: u8,
    pub mode: Mode,
    pub payload: Vec<u8, MAX_PAYLOAD>,
}

impl Frame {
    /// Bytes this frame occupies on the wire (header + payload + CRC).
    pub fn wire_size(&self) -> usize {
        HEADER_LEN + self.payload.len() + CRC_LEN
    }

    pub fn is_broadcast(&self) -> bool {
        self.dst == BROADCAST_ADDR
    }
}

/// Encode a frame into `dst`, returning the number of bytes written.
///
/// Wire format (break and sync are the transmitter's job):
/// ```text
/// ┌──────────┬──────────┬─────────────────┬──────────────┐
/// │ ADDR     │ META     │ Payload         │ CRC-16       │
/// │ src|dst  │ mode|len │ (0-124 bytes)   │ (2B BE)      │
/// └──────────┴──────────┴─────────────────┴──────────────┘
/// ```
///
/// Nothing is written if the frame is rejected.
pub fn encode_frame<B: BufMut>(
    src: u8,
    dst: u8,
    mode: Mode,
    payload: &[u8],
    out: &mut B,
) -> Result<usize> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    let addr = AddrByte::new(src, dst)?.pack();

    let total = HEADER_LEN + payload.len() + CRC_LEN;
    if out.remaining_mut() < total {
        return Err(FrameError::BufferTooSmall {
            needed: total,
            available: out.remaining_mut(),
        });
    }

    let meta = MetaByte {
        mode,
        len: payload.len() as u8,
    }
    .pack();

    let crc = payload
        .iter()
        .fold(crc16(&[addr, meta]), |crc, &byte| crc16_update(crc, byte));

    out.put_u8(addr);
    out.put_u8(meta);
    out.put_slice(payload);
    out.put_u16(crc);
    Ok(total)
}

/// Decode and CRC-check exactly one frame (no break, no sync).
pub fn decode_frame(bytes: &[u8]) -> Result<Frame> {
    if bytes.len() < HEADER_LEN + CRC_LEN {
        return Err(FrameError::Truncated {
            needed: HEADER_LEN + CRC_LEN,
            available: bytes.len(),
        });
    }

    let mut buf = bytes;
    let addr = AddrByte::unpack(buf.get_u8());
    let meta = MetaByte::unpack(buf.get_u8());
    let len = usize::from(meta.len);

    if len > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: MAX_PAYLOAD,
        });
    }

    let total = HEADER_LEN + len + CRC_LEN;
    if bytes.len() < total {
        return Err(FrameError::Truncated {
            needed: total,
            available: bytes.len(),
        });
    }
    if bytes.len() > total {
        return Err(FrameError::LengthMismatch {
            declared: total,
            actual: bytes.len(),
        });
    }

    let computed = crc16(&bytes[..HEADER_LEN + len]);
    let payload = &buf[..len];
    buf.advance(len);
    let received = buf.get_u16();
    if computed != received {
        return Err(FrameError::BadCrc { computed, received });
    }

    let payload = Vec::from_slice(payload).map_err(|()| FrameError::PayloadTooLarge {
        size: len,
        max: MAX_PAYLOAD,
    })?;

    Ok(Frame {
        src: addr.src,
        dst: addr.dst,
        mode: meta.mode,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(src: u8, dst: u8, mode: Mode, payload: &[u8]) -> std::vec::Vec<u8> {
        let mut out = std::vec::Vec::new();
        encode_frame(src, dst, mode, payload, &mut out).unwrap();
        out
    }

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16(b"123456789"), 0x29B1);
        assert_eq!(crc16(&[]), CRC_INIT);
    }

    #[test]
    fn test_crc_matches_reference_implementation() {
        let reference = crc::Crc::<u16>::new(&crc::CRC_16_IBM_3740);
        let cases: [&[u8]; 4] = [b"", b"\x00", b"OpenLink", &[0xFF; 124]];
        for data in cases {
            assert_eq!(crc16(data), reference.checksum(data));
        }
    }

    #[test]
    fn test_folding_trailing_crc_yields_zero() {
        let frame = encode(0x0F, 0x01, Mode::Data, b"hello");
        assert_eq!(crc16(&frame), 0);
    }

    #[test]
    fn test_byte_order_helpers() {
        assert_eq!(ntoh16(hton16(0x1234)), 0x1234);
        assert_eq!(hton32(0x0102_0304).to_ne_bytes(), [1, 2, 3, 4]);
        assert_eq!(ntoh32(u32::from_ne_bytes([0xAA, 0xBB, 0xCC, 0xDD])), 0xAABB_CCDD);
    }

    #[test]
    fn test_header_layout() {
        let frame = encode(0x0F, 0x02, Mode::Cmd, &[0x03]);
        assert_eq!(frame[0], 0xF2);
        assert_eq!(frame[1], 0x81);
        assert_eq!(frame.len(), 5);
    }

    #[test]
    fn test_crc_is_big_endian_on_the_wire() {
        let frame = encode(0x01, 0x0F, Mode::Data, b"");
        let crc = crc16(&frame[..2]);
        assert_eq!(frame[2..], crc.to_be_bytes());
    }

    #[test]
    fn test_encode_into_stack_slice() {
        let mut storage = [0u8; MAX_FRAME_LEN];
        let mut cursor = &mut storage[..];
        let written = encode_frame(0x0F, 0x03, Mode::Data, b"abc", &mut cursor).unwrap();
        assert_eq!(written, 7);
        assert_eq!(&storage[2..5], b"abc");
    }

    #[test]
    fn test_encode_rejects_small_buffer() {
        let mut storage = [0u8; 4];
        let mut cursor = &mut storage[..];
        let result = encode_frame(0x0F, 0x03, Mode::Data, b"abc", &mut cursor);
        assert_eq!(
            result,
            Err(FrameError::BufferTooSmall {
                needed: 7,
                available: 4
            })
        );
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let mut out = std::vec::Vec::new();
        let result = encode_frame(0x0F, 0x01, Mode::Data, &[0; 125], &mut out);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { size: 125, .. })));
        assert!(out.is_empty());
    }

    #[test]
    fn test_encode_rejects_wide_address() {
        let mut out = std::vec::Vec::new();
        let result = encode_frame(0x10, 0x01, Mode::Data, b"", &mut out);
        assert_eq!(result, Err(FrameError::InvalidAddress(0x10)));
    }

    #[test]
    fn test_decode_roundtrip() {
        let bytes = encode(0x03, 0x0F, Mode::Cmd, &[6, b'A', b'B']);
        let frame = decode_frame(&bytes).unwrap();
        assert_eq!(frame.src, 0x03);
        assert_eq!(frame.dst, 0x0F);
        assert_eq!(frame.mode, Mode::Cmd);
        assert_eq!(frame.payload.as_slice(), &[6, b'A', b'B']);
        assert_eq!(frame.wire_size(), bytes.len());
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = encode(0x0F, 0x01, Mode::Data, b"hello");
        let result = decode_frame(&bytes[..6]);
        assert_eq!(
            result,
            Err(FrameError::Truncated {
                needed: 9,
                available: 6
            })
        );
        assert!(matches!(
            decode_frame(&[0xF1]),
            Err(FrameError::Truncated { needed: 4, .. })
        ));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut bytes = encode(0x0F, 0x01, Mode::Data, b"hi");
        bytes.push(0);
        assert!(matches!(
            decode_frame(&bytes),
            Err(FrameError::LengthMismatch {
                declared: 6,
                actual: 7
            })
        ));
    }

    #[test]
    fn test_decode_oversized_length_field() {
        let bytes = [0xF1, 0x7F, 0, 0];
        assert!(matches!(
            decode_frame(&bytes),
            Err(FrameError::PayloadTooLarge { size: 127, .. })
        ));
    }

    #[test]
    fn test_decode_bad_crc() {
        let mut bytes = encode(0x0F, 0x01, Mode::Data, b"hi");
        bytes[2] ^= 0x20;
        assert!(matches!(decode_frame(&bytes), Err(FrameError::BadCrc { .. })));
    }

    #[test]
    fn test_meta_byte_masks_length() {
        let meta = MetaByte::unpack(0xFF);
        assert_eq!(meta.mode, Mode::Cmd);
        assert_eq!(meta.len, 0x7F);
        assert_eq!(MetaByte { mode: Mode::Data, len: 0 }.pack(), 0x00);
    }

    #[test]
    fn test_broadcast_detection() {
        let frame = decode_frame(&encode(0x0F, BROADCAST_ADDR, Mode::Data, b"x")).unwrap();
        assert!(frame.is_broadcast());
    }
}
