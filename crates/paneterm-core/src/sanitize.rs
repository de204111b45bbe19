//! Attach-time escape filtering for replayed terminal output.
//!
//! Scrollback replayed from a shared or stale session must not be able to
//! silently reconfigure the local terminal on attach. While the attach window
//! is open, [`EscapeFilter`] removes:
//!
//! - DEC private mode set/reset (`CSI ? <params> h/l`) naming a blocked mode;
//! - device attribute requests (`CSI c`, `CSI > c`, `CSI = c`, with an
//!   optional numeric parameter), which would make the local terminal answer
//!   on the user's behalf.
//!
//! Removed sequences are dropped from the text entirely. Callers account for
//! their bytes separately, from the unfiltered payload. A sequence split
//! across chunks is held in a [`FilterCarry`] until it either completes or
//! proves harmless.
//!
//! [`ScrollbackClearDetector`] is independent of the attach window: it strips
//! `CSI 3 J` (erase scrollback) and reports that the local scrollback should
//! be cleared, carrying a partial sequence across chunk boundaries.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

const ESC: u8 = 0x1b;
const MAX_PARAMS: usize = 16;
/// Longer unterminated tails are released rather than held.
const MAX_CARRY_BYTES: usize = 128;

/// DEC private modes blocked by default during the attach window.
pub const DEFAULT_BLOCKED_MODES: &[u16] = &[
    1, // application cursor keys
    9, 1000, 1002, 1003, // mouse tracking
    1005, 1006, 1015, // mouse encoding
    1004, // focus events
    47, 1047, 1049, // alternate screen
    2004, // bracketed paste
];

/// Filter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Private modes whose set/reset sequences are dropped.
    pub blocked_private_modes: Vec<u16>,
    /// Drop primary/secondary/tertiary device attribute requests.
    pub strip_device_attribute_requests: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            blocked_private_modes: DEFAULT_BLOCKED_MODES.to_vec(),
            strip_device_attribute_requests: true,
        }
    }
}

/// Unterminated sequence held back between chunks by
/// [`EscapeFilter::sanitize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCarry {
    pending: String,
}

impl FilterCarry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held back from the previous chunk.
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.pending
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Release the held-back bytes as plain text.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }
}

/// Escape filter for the attach window. Stream state lives in [`FilterCarry`].
#[derive(Debug, Clone, Default)]
pub struct EscapeFilter {
    config: FilterConfig,
}

impl EscapeFilter {
    #[must_use]
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Filter the next chunk of a stream if `now_ms` is still before
    /// `sanitize_until_ms`.
    ///
    /// While the window is open, a trailing sequence that could still turn
    /// into a blocked one is moved into `carry` and decided on with the next
    /// chunk. Once the window has closed the carry is released unfiltered in
    /// front of `text`. With nothing carried, a closed window returns the
    /// input borrowed and unchanged.
    pub fn sanitize<'a>(
        &self,
        carry: &mut FilterCarry,
        text: &'a str,
        sanitize_until_ms: u64,
        now_ms: u64,
    ) -> Cow<'a, str> {
        if carry.pending.is_empty() {
            if now_ms >= sanitize_until_ms {
                return Cow::Borrowed(text);
            }
            let keep = self.unterminated_tail_len(text.as_bytes());
            if keep == 0 {
                return self.strip(text);
            }
            let (head, tail) = text.split_at(text.len() - keep);
            carry.pending.push_str(tail);
            return self.strip(head);
        }

        let mut joined = carry.take();
        joined.push_str(text);
        if now_ms >= sanitize_until_ms {
            return Cow::Owned(joined);
        }
        let keep = self.unterminated_tail_len(joined.as_bytes());
        carry.pending = joined.split_off(joined.len() - keep);
        Cow::Owned(self.strip(&joined).into_owned())
    }

    /// Remove every blocked sequence from `text`, regardless of time.
    pub fn strip<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let bytes = text.as_bytes();
        let mut out: Option<String> = None;
        let mut copied_to = 0;
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] == ESC && bytes.get(i + 1) == Some(&b'[') {
                if let Some(body_len) = self.blocked_csi_len(&bytes[i + 2..]) {
                    let buf = out.get_or_insert_with(|| String::with_capacity(text.len()));
                    buf.push_str(&text[copied_to..i]);
                    i += 2 + body_len;
                    copied_to = i;
                    continue;
                }
            }
            i += 1;
        }

        match out {
            None => Cow::Borrowed(text),
            Some(mut buf) => {
                buf.push_str(&text[copied_to..]);
                Cow::Owned(buf)
            }
        }
    }

    /// Length of a trailing unterminated sequence that may still complete
    /// into a blocked one.
    fn unterminated_tail_len(&self, bytes: &[u8]) -> usize {
        let Some(start) = bytes.iter().rposition(|&byte| byte == ESC) else {
            return 0;
        };
        let tail = &bytes[start..];
        if tail.len() > MAX_CARRY_BYTES {
            return 0;
        }
        let held = match tail.get(1) {
            None => true,
            Some(b'[') => self.may_become_blocked(&tail[2..]),
            Some(_) => false,
        };
        if held { tail.len() } else { 0 }
    }

    /// Whether an unterminated CSI body is a prefix of something this filter
    /// would drop.
    fn may_become_blocked(&self, body: &[u8]) -> bool {
        match body.split_first() {
            None => true,
            Some((b'?', params)) => {
                !self.config.blocked_private_modes.is_empty()
                    && params.iter().all(|&b| b.is_ascii_digit() || b == b';')
            }
            Some((&first, rest)) => {
                self.config.strip_device_attribute_requests
                    && (matches!(first, b'>' | b'=') || first.is_ascii_digit())
                    && rest.iter().all(u8::is_ascii_digit)
            }
        }
    }

    /// Length of the CSI body (bytes after `ESC [`) if it must be dropped.
    fn blocked_csi_len(&self, body: &[u8]) -> Option<usize> {
        if let Some((modes, len)) = parse_private_mode(body) {
            let blocked = modes
                .iter()
                .any(|mode| self.config.blocked_private_modes.contains(mode));
            return blocked.then_some(len);
        }
        if self.config.strip_device_attribute_requests {
            return parse_device_attribute_request(body);
        }
        None
    }
}

/// Parse `? <params> h|l`; returns the modes and the body length.
fn parse_private_mode(body: &[u8]) -> Option<(Vec<u16>, usize)> {
    if body.first() != Some(&b'?') {
        return None;
    }
    let mut modes = Vec::new();
    let mut current: u16 = 0;
    for (idx, &byte) in body.iter().enumerate().skip(1) {
        match byte {
            b'0'..=b'9' => {
                current = current
                    .checked_mul(10)?
                    .checked_add(u16::from(byte - b'0'))?;
            }
            b';' => {
                if modes.len() >= MAX_PARAMS {
                    return None;
                }
                modes.push(current);
                current = 0;
            }
            b'h' | b'l' => {
                modes.push(current);
                return Some((modes, idx + 1));
            }
            _ => return None,
        }
    }
    None
}

/// Parse `[>=]? <digits>* c`; returns the body length.
fn parse_device_attribute_request(body: &[u8]) -> Option<usize> {
    let mut idx = 0;
    if matches!(body.first(), Some(b'>' | b'=')) {
        idx = 1;
    }
    while body.get(idx).is_some_and(u8::is_ascii_digit) {
        idx += 1;
    }
    (body.get(idx) == Some(&b'c')).then_some(idx + 1)
}

// ---------------------------------------------------------------------------
// Scrollback clear detection
// ---------------------------------------------------------------------------

/// `CSI 3 J`: erase saved lines.
pub const CLEAR_SCROLLBACK: &str = "\x1b[3J";

/// Result of scanning one chunk for the scrollback-clear sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClearScan {
    pub should_clear: bool,
    /// Chunk text with every complete clear sequence removed and any trailing
    /// partial sequence held back.
    pub text: String,
}

/// Detects `CSI 3 J` across chunk boundaries.
#[derive(Debug, Clone, Default)]
pub struct ScrollbackClearDetector {
    carry: String,
}

impl ScrollbackClearDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held back from the previous chunk.
    #[must_use]
    pub fn carry(&self) -> &str {
        &self.carry
    }

    /// Release the held-back partial sequence as plain text.
    pub fn take_carry(&mut self) -> String {
        std::mem::take(&mut self.carry)
    }

    /// Scan the next chunk.
    pub fn feed(&mut self, chunk: &str) -> ClearScan {
        let mut text = std::mem::take(&mut self.carry);
        text.push_str(chunk);

        let mut should_clear = false;
        while text.contains(CLEAR_SCROLLBACK) {
            should_clear = true;
            text = text.replace(CLEAR_SCROLLBACK, "");
        }

        let keep = partial_prefix_suffix_len(&text);
        if keep > 0 {
            self.carry = text.split_off(text.len() - keep);
        }
        ClearScan { should_clear, text }
    }
}

/// Length of the longest proper prefix of [`CLEAR_SCROLLBACK`] that ends `text`.
fn partial_prefix_suffix_len(text: &str) -> usize {
    (1..CLEAR_SCROLLBACK.len())
        .rev()
        .find(|&len| text.ends_with(&CLEAR_SCROLLBACK[..len]))
        .unwrap_or(0)
}
