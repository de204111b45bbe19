//! JSON control messages exchanged as text frames.
//!
//! The first client message after the transport opens is [`AuthRequest`].
//! The server must answer with `{"type":"auth.ok"}` before any output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message type the server sends to accept authentication.
pub const AUTH_OK: &str = "auth.ok";

/// Minimal client identity carried with the auth token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub name: String,
    pub version: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            name: "paneterm".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client → server messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Auth(AuthRequest),
    Resize { cols: u16, rows: u16 },
}

/// Authentication payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    pub token: String,
    pub client: ClientIdentity,
}

impl ClientMessage {
    /// Serialize to the text-frame representation.
    #[must_use]
    pub fn to_json(&self) -> String {
        // Serializing plain structs with string/integer fields cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Whether `text` is the server's authentication acceptance: a JSON object
/// whose `type` is `auth.ok`.
///
/// Any other content, including unparsable JSON and non-object values, is a
/// rejection.
#[must_use]
pub fn is_auth_ok(text: &str) -> bool {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(obj)) => obj.get("type").and_then(Value::as_str) == Some(AUTH_OK),
        Ok(_) => {
            tracing::debug!(target: "paneterm::codec", "auth reply is not an object");
            false
        }
        Err(err) => {
            tracing::debug!(target: "paneterm::codec", error = %err, "unparsable auth reply");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn auth_request_shape() {
        let msg = ClientMessage::Auth(AuthRequest {
            token: "t0k".into(),
            client: ClientIdentity {
                name: "paneterm".into(),
                version: "1.2.3".into(),
            },
        });
        let value: serde_json::Value = serde_json::from_str(&msg.to_json()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "auth",
                "token": "t0k",
                "client": { "name": "paneterm", "version": "1.2.3" }
            })
        );
    }

    #[test]
    fn resize_shape() {
        let json = ClientMessage::Resize { cols: 80, rows: 24 }.to_json();
        assert_eq!(json, r#"{"type":"resize","cols":80,"rows":24}"#);
    }

    #[test]
    fn auth_ok_detection() {
        assert!(is_auth_ok(r#"{"type":"auth.ok"}"#));
        assert!(is_auth_ok(r#"{"type":"auth.ok","user":"x"}"#));
        assert!(!is_auth_ok(r#"{"type":"auth.err"}"#));
        assert!(!is_auth_ok(r#"{"kind":"auth.ok"}"#));
        assert!(!is_auth_ok("auth.ok"));
        assert!(!is_auth_ok(r#"["auth.ok"]"#));
        assert!(!is_auth_ok(r#"[{"type":"auth.ok"}]"#));
        assert!(!is_auth_ok(r#""auth.ok""#));
        assert!(!is_auth_ok("42"));
        assert!(!is_auth_ok(r#"{"type":null}"#));
        assert!(!is_auth_ok(""));
    }
}
