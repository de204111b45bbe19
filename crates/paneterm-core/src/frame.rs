//! Binary frame codec for pane transports.
//!
//! Every binary message on a pane transport uses the same fixed header:
//!
//! ```text
//! +----------+-----------------------+----------------------------+
//! | type (1) | session fingerprint(4)| payload (UTF-8 text)       |
//! +----------+-----------------------+----------------------------+
//! ```
//!
//! - **type**: 1-byte frame type discriminator ([`FrameType`]).
//! - **fingerprint**: big-endian FNV-1a 32-bit hash of the session id.
//! - **payload**: the rest of the message, decoded lossily as UTF-8.
//!
//! The fingerprint lets a receiver reject frames addressed to a different
//! session without carrying the session id string on the wire.
//!
//! ```
//! use paneterm_core::frame::{FrameType, decode, encode};
//!
//! let bytes = encode(FrameType::Output, "build-1", "hello");
//! let frame = decode(&bytes, "build-1").unwrap();
//! assert_eq!(frame.text, "hello");
//! assert!(decode(&bytes, "build-2").is_none());
//! ```

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Header size: 1 byte type + 4 bytes session fingerprint.
pub const HEADER_LEN: usize = 5;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

// ---------------------------------------------------------------------------
// FrameType
// ---------------------------------------------------------------------------

/// Wire type discriminator. Values are stable across reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Terminal output, server → client.
    Output = 0x01,
    /// Terminal input, client → server.
    Input = 0x02,
}

impl FrameType {
    /// Parse a raw byte into a known frame type, or `None` for reserved codes.
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Output),
            0x02 => Some(Self::Input),
            _ => None,
        }
    }

    /// Return the wire byte for this frame type.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

/// Reasons a binary frame is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input buffer is shorter than the 5-byte header.
    BufferTooShort { available: usize },
    /// Unknown or reserved frame type byte.
    UnknownFrameType { byte: u8 },
    /// Frame was addressed to a different session.
    FingerprintMismatch { expected: u32, actual: u32 },
}

impl core::fmt::Display for CodecError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BufferTooShort { available } => {
                write!(f, "buffer too short: {available} bytes, need {HEADER_LEN}")
            }
            Self::UnknownFrameType { byte } => {
                write!(f, "unknown frame type: 0x{byte:02X}")
            }
            Self::FingerprintMismatch { expected, actual } => {
                write!(
                    f,
                    "session fingerprint mismatch: expected 0x{expected:08X}, got 0x{actual:08X}"
                )
            }
        }
    }
}

impl std::error::Error for CodecError {}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// FNV-1a 32-bit fingerprint of a session id's UTF-8 bytes.
#[must_use]
pub fn session_fingerprint(session_id: &str) -> u32 {
    session_id.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub frame_type: FrameType,
    pub text: String,
    /// Payload size in bytes as received, before lossy UTF-8 repair.
    pub payload_len: usize,
}

/// Encode `text` as a frame addressed to `session_id`.
#[must_use]
pub fn encode(frame_type: FrameType, session_id: &str, text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + text.len());
    buf.push(frame_type.as_u8());
    buf.extend_from_slice(&session_fingerprint(session_id).to_be_bytes());
    buf.extend_from_slice(text.as_bytes());
    buf
}

/// Decode a frame, reporting why it was rejected.
pub fn try_decode(buf: &[u8], expected_session_id: &str) -> Result<DecodedFrame, CodecError> {
    if buf.len() < HEADER_LEN {
        return Err(CodecError::BufferTooShort {
            available: buf.len(),
        });
    }
    let frame_type =
        FrameType::from_u8(buf[0]).ok_or(CodecError::UnknownFrameType { byte: buf[0] })?;
    let actual = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
    let expected = session_fingerprint(expected_session_id);
    if actual != expected {
        return Err(CodecError::FingerprintMismatch { expected, actual });
    }
    let payload = &buf[HEADER_LEN..];
    Ok(DecodedFrame {
        frame_type,
        text: String::from_utf8_lossy(payload).into_owned(),
        payload_len: payload.len(),
    })
}

/// Decode a frame, returning `None` for anything that is not a valid frame
/// for `expected_session_id`.
#[must_use]
pub fn decode(buf: &[u8], expected_session_id: &str) -> Option<DecodedFrame> {
    try_decode(buf, expected_session_id).ok()
}

// ---------------------------------------------------------------------------
// Inbound transport messages
// ---------------------------------------------------------------------------

/// A message as delivered by the host transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Binary(Vec<u8>),
    Text(String),
}

impl InboundMessage {
    /// Size of the message payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Binary(bytes) => bytes.len(),
            Self::Text(text) => text.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_of_empty_is_offset_basis() {
        assert_eq!(session_fingerprint(""), 0x811c_9dc5);
    }

    #[test]
    fn fingerprint_known_vectors() {
        // Reference FNV-1a 32 values.
        assert_eq!(session_fingerprint("a"), 0xe40c_292c);
        assert_eq!(session_fingerprint("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn header_layout() {
        let encoded = encode(FrameType::Input, "a", "xy");
        assert_eq!(encoded.len(), HEADER_LEN + 2);
        assert_eq!(encoded[0], 0x02);
        assert_eq!(&encoded[1..5], &0xe40c_292cu32.to_be_bytes());
        assert_eq!(&encoded[5..], b"xy");
    }

    #[test]
    fn roundtrip_output() {
        let encoded = encode(FrameType::Output, "sess", "héllo");
        let frame = decode(&encoded, "sess").unwrap();
        assert_eq!(frame.frame_type, FrameType::Output);
        assert_eq!(frame.text, "héllo");
        assert_eq!(frame.payload_len, "héllo".len());
    }

    #[test]
    fn empty_payload_roundtrip() {
        let encoded = encode(FrameType::Output, "s", "");
        assert_eq!(encoded.len(), HEADER_LEN);
        let frame = decode(&encoded, "s").unwrap();
        assert!(frame.text.is_empty());
        assert_eq!(frame.payload_len, 0);
    }

    #[test]
    fn short_buffer_rejected() {
        assert_eq!(
            try_decode(&[0x01, 0x00, 0x00], "s"),
            Err(CodecError::BufferTooShort { available: 3 })
        );
    }

    #[test]
    fn foreign_session_rejected() {
        let encoded = encode(FrameType::Output, "one", "data");
        assert!(matches!(
            try_decode(&encoded, "two"),
            Err(CodecError::FingerprintMismatch { .. })
        ));
    }

    #[test]
    fn unknown_type_rejected() {
        let mut encoded = encode(FrameType::Output, "s", "x");
        encoded[0] = 0x7F;
        assert_eq!(
            try_decode(&encoded, "s"),
            Err(CodecError::UnknownFrameType { byte: 0x7F })
        );
    }

    #[test]
    fn malformed_utf8_is_replaced_not_rejected() {
        let mut encoded = encode(FrameType::Output, "s", "");
        encoded.extend_from_slice(&[b'o', 0xFF, b'k']);
        let frame = decode(&encoded, "s").unwrap();
        assert_eq!(frame.text, "o\u{FFFD}k");
        assert_eq!(frame.payload_len, 3);
    }

    #[test]
    fn error_display() {
        let err = CodecError::UnknownFrameType { byte: 0x0A };
        assert_eq!(err.to_string(), "unknown frame type: 0x0A");
    }
}
