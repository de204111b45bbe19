#![no_main]

use paneterm_core::sanitize::{
    CLEAR_SCROLLBACK, EscapeFilter, FilterCarry, ScrollbackClearDetector,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let filter = EscapeFilter::default();

    let stripped = filter.strip(&text);
    assert!(stripped.len() <= text.len(), "filter grew its input");

    // Feed in two arbitrary pieces; no complete clear sequence may survive.
    let mid = text
        .char_indices()
        .map(|(i, _)| i)
        .nth(data.first().map_or(0, |b| usize::from(*b)) % text.chars().count().max(1))
        .unwrap_or(0);
    let mut detector = ScrollbackClearDetector::new();
    let first = detector.feed(&text[..mid]);
    let second = detector.feed(&text[mid..]);
    assert!(!first.text.contains(CLEAR_SCROLLBACK));
    assert!(!second.text.contains(CLEAR_SCROLLBACK));
    assert!(detector.carry().len() < CLEAR_SCROLLBACK.len());

    // Streamed through the window in the same two pieces, filtering only drops bytes.
    let mut carry = FilterCarry::new();
    let a = filter.sanitize(&mut carry, &text[..mid], u64::MAX, 0).len();
    let b = filter.sanitize(&mut carry, &text[mid..], u64::MAX, 0).len();
    assert!(a + b + carry.pending().len() <= text.len(), "streamed filter grew its input");
});
