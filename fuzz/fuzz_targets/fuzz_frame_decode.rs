#![no_main]

use paneterm_core::frame::{FrameType, HEADER_LEN, encode, session_fingerprint, try_decode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the session id length; the rest is the wire message.
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(rest.len());
    let (session_bytes, frame) = rest.split_at(split);
    let session = String::from_utf8_lossy(session_bytes);

    match try_decode(frame, &session) {
        Ok(decoded) => {
            assert!(frame.len() >= HEADER_LEN);
            assert_eq!(decoded.payload_len, frame.len() - HEADER_LEN);
            // Re-encoding valid UTF-8 payloads reproduces the input exactly.
            if std::str::from_utf8(&frame[HEADER_LEN..]).is_ok() {
                assert_eq!(encode(decoded.frame_type, &session, &decoded.text), frame);
            }
        }
        Err(_) => {
            if frame.len() >= HEADER_LEN {
                let expected = session_fingerprint(&session).to_be_bytes();
                assert!(
                    FrameType::from_u8(frame[0]).is_none() || frame[1..HEADER_LEN] != expected
                );
            }
        }
    }
});
