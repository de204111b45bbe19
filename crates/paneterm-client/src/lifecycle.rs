//! Connection lifecycle states.
//!
//! ```text
//!   Idle ──connect──▶ Connecting ──open──▶ Authenticating ──auth.ok──▶ Online
//!                         ▲                      │                       │
//!                         │                 bad reply                close/error
//!                         │                      ▼                       ▼
//!                  ReconnectWait ◀──schedule── Offline ◀─────────────────┘
//! ```
//!
//! `Idle` is re-entered whenever the session is cleared from the pane.
//! `Offline` is terminal while the credential is revoked.

use serde::{Deserialize, Serialize};

/// Per-pane connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    /// No session bound.
    #[default]
    Idle,
    /// Transport opening.
    Connecting,
    /// Transport open, auth reply outstanding.
    Authenticating,
    /// Attached and streaming.
    Online,
    /// Transport gone, session still bound.
    Offline,
    /// Reconnect timer running.
    ReconnectWait,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Online => "online",
            Self::Offline => "offline",
            Self::ReconnectWait => "reconnect-wait",
        }
    }

    /// Coarse level reported to the status sink.
    #[must_use]
    pub const fn status_level(self) -> StatusLevel {
        match self {
            Self::Online => StatusLevel::Online,
            Self::Connecting | Self::Authenticating | Self::ReconnectWait => StatusLevel::Warn,
            Self::Idle | Self::Offline => StatusLevel::Offline,
        }
    }

    /// A transport exists for this state (opening or open).
    #[must_use]
    pub const fn has_transport(self) -> bool {
        matches!(self, Self::Connecting | Self::Authenticating | Self::Online)
    }
}

impl core::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse connection indicator for status widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Online,
    Warn,
    Offline,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_levels() {
        assert_eq!(ConnectionState::Online.status_level(), StatusLevel::Online);
        assert_eq!(ConnectionState::ReconnectWait.status_level(), StatusLevel::Warn);
        assert_eq!(ConnectionState::Authenticating.status_level(), StatusLevel::Warn);
        assert_eq!(ConnectionState::Offline.status_level(), StatusLevel::Offline);
        assert_eq!(ConnectionState::Idle.status_level(), StatusLevel::Offline);
    }

    #[test]
    fn transport_states() {
        assert!(ConnectionState::Connecting.has_transport());
        assert!(ConnectionState::Authenticating.has_transport());
        assert!(ConnectionState::Online.has_transport());
        assert!(!ConnectionState::Idle.has_transport());
        assert!(!ConnectionState::Offline.has_transport());
        assert!(!ConnectionState::ReconnectWait.has_transport());
    }

    #[test]
    fn serde_names_match_display() {
        for state in [
            ConnectionState::Idle,
            ConnectionState::Connecting,
            ConnectionState::Authenticating,
            ConnectionState::Online,
            ConnectionState::Offline,
            ConnectionState::ReconnectWait,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }
}
