//! Property-based invariant tests for the frame codec and attach filter.
//!
//! 1. Output frames round-trip text and payload length
//! 2. Frames never decode against a different session
//! 3. Decode never panics on arbitrary bytes
//! 4. Filtering only removes bytes, never adds them
//! 5. Clear detection is independent of chunk boundaries

use paneterm_core::frame::{FrameType, HEADER_LEN, decode, encode, session_fingerprint};
use paneterm_core::sanitize::{EscapeFilter, ScrollbackClearDetector};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

fn session_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9-]{0,24}"
}

fn frame_type_strategy() -> impl Strategy<Value = FrameType> {
    prop_oneof![Just(FrameType::Output), Just(FrameType::Input)]
}

/// Terminal-ish text with escapes sprinkled in.
fn terminal_text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            "[ -~]{0,8}",
            Just("\x1b[?1049h".to_string()),
            Just("\x1b[?25l".to_string()),
            Just("\x1b[c".to_string()),
            Just("\x1b[3J".to_string()),
            Just("é".to_string()),
        ],
        0..16,
    )
    .prop_map(|parts| parts.concat())
}

// ═══════════════════════════════════════════════════════════════════════
// 1–3. Codec
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn output_roundtrip(session in session_strategy(), text in ".*") {
        let encoded = encode(FrameType::Output, &session, &text);
        let frame = decode(&encoded, &session).expect("own session must decode");
        prop_assert_eq!(frame.frame_type, FrameType::Output);
        prop_assert_eq!(frame.payload_len, text.len());
        prop_assert_eq!(frame.text, text);
    }

    #[test]
    fn foreign_session_rejected(
        kind in frame_type_strategy(),
        a in session_strategy(),
        b in session_strategy(),
        text in ".{0,32}",
    ) {
        prop_assume!(session_fingerprint(&a) != session_fingerprint(&b));
        let encoded = encode(kind, &a, &text);
        prop_assert!(decode(&encoded, &b).is_none());
    }

    #[test]
    fn decode_arbitrary_bytes_never_panics(
        bytes in prop::collection::vec(any::<u8>(), 0..64),
        session in session_strategy(),
    ) {
        if let Some(frame) = decode(&bytes, &session) {
            prop_assert_eq!(frame.payload_len, bytes.len() - HEADER_LEN);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 4–5. Filtering
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn strip_never_grows(text in terminal_text_strategy()) {
        let out = EscapeFilter::default().strip(&text);
        prop_assert!(out.len() <= text.len());
        prop_assert!(!out.contains("\x1b[?1049h"));
    }

    #[test]
    fn clear_detection_chunking_invariant(
        text in terminal_text_strategy(),
        split in any::<prop::sample::Index>(),
    ) {
        let boundaries: Vec<usize> = (0..=text.len()).filter(|&i| text.is_char_boundary(i)).collect();
        let at = boundaries[split.index(boundaries.len())];

        let mut whole = ScrollbackClearDetector::new();
        let one = whole.feed(&text);
        let mut one_text = one.text;
        one_text.push_str(&whole.take_carry());

        let mut split_det = ScrollbackClearDetector::new();
        let first = split_det.feed(&text[..at]);
        let second = split_det.feed(&text[at..]);
        let mut two_text = first.text;
        two_text.push_str(&second.text);
        two_text.push_str(&split_det.take_carry());

        prop_assert_eq!(one.should_clear, first.should_clear || second.should_clear);
        prop_assert_eq!(one_text, two_text);
    }
}
