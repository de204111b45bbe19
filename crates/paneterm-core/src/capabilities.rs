//! Capability handshake between client and server.
//!
//! The client advertises a fixed list when it fetches the session list; the
//! server answers with its own. A feature is used only when both sides list it.

/// Binary framing via [`crate::frame`].
pub const BINARY_FRAMES: &str = "binary-frames";
/// Resumed replay from a byte offset.
pub const REPLAY_OFFSET: &str = "replay-offset";

/// Capabilities this client advertises.
pub const CLIENT_CAPABILITIES: &[&str] = &[BINARY_FRAMES, REPLAY_OFFSET];

/// Value of the `codec` transport parameter when binary framing is negotiated.
pub const BINARY_CODEC_PARAM: &str = "binary";

/// Whether `capability` is advertised by both the client and the server.
#[must_use]
pub fn negotiated<S: AsRef<str>>(capability: &str, server: &[S]) -> bool {
    CLIENT_CAPABILITIES.contains(&capability) && server.iter().any(|c| c.as_ref() == capability)
}

/// Whether binary framing should be used with a server advertising `server`.
#[must_use]
pub fn binary_frames_negotiated<S: AsRef<str>>(server: &[S]) -> bool {
    negotiated(BINARY_FRAMES, server)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_requires_server_support() {
        assert!(!binary_frames_negotiated::<&str>(&[]));
        assert!(!binary_frames_negotiated(&["replay-offset"]));
        assert!(binary_frames_negotiated(&["replay-offset", "binary-frames"]));
    }

    #[test]
    fn unknown_client_capability_never_negotiated() {
        assert!(!negotiated("compression", &["compression"]));
    }
}
