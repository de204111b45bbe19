//! Commands the controller asks its host to perform.
//!
//! The controller never touches sockets, timers, or the display directly.
//! It queues [`HostCommand`]s; the host drains them, performs the work, and
//! reports completions back with the ids carried in each command.

use paneterm_core::capabilities::BINARY_CODEC_PARAM;

use crate::lifecycle::StatusLevel;
use crate::pane::{FrameId, PaneId, SocketId, TimerId, WriteId};
use crate::progress::ReconnectProgress;

/// Parameters for opening a pane transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportParams {
    pub session: String,
    pub replay_from: u64,
    pub cols: u16,
    pub rows: u16,
    /// Set when binary framing was negotiated.
    pub codec: Option<&'static str>,
}

impl TransportParams {
    pub(crate) fn new(session: &str, replay_from: u64, cols: u16, rows: u16, binary: bool) -> Self {
        Self {
            session: session.to_string(),
            replay_from,
            cols,
            rows,
            codec: binary.then_some(BINARY_CODEC_PARAM),
        }
    }

    /// URL query string (without the leading `?`).
    #[must_use]
    pub fn query_string(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("session", &self.session)
            .append_pair("replayFrom", &self.replay_from.to_string())
            .append_pair("cols", &self.cols.to_string())
            .append_pair("rows", &self.rows.to_string());
        if let Some(codec) = self.codec {
            query.append_pair("codec", codec);
        }
        query.finish()
    }
}

/// Work for the host, in the order it must be performed.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    // -- transport --
    OpenTransport {
        pane: PaneId,
        socket: SocketId,
        params: TransportParams,
    },
    SendText {
        socket: SocketId,
        text: String,
    },
    SendBinary {
        socket: SocketId,
        bytes: Vec<u8>,
    },
    CloseTransport {
        socket: SocketId,
    },

    // -- display surface --
    /// Write text; report with `on_write_complete(write)`.
    Write {
        pane: PaneId,
        write: WriteId,
        text: String,
    },
    ClearDisplay {
        pane: PaneId,
    },
    ClearScrollback {
        pane: PaneId,
    },
    Refresh {
        pane: PaneId,
        from_row: u16,
        to_row: u16,
    },

    // -- scheduling --
    SetTimer {
        timer: TimerId,
        delay_ms: u64,
    },
    CancelTimer {
        timer: TimerId,
    },
    RequestFrame {
        frame: FrameId,
    },
    CancelFrame {
        frame: FrameId,
    },

    // -- notifications --
    Status {
        pane: PaneId,
        level: StatusLevel,
        text: String,
    },
    /// User-facing notice (e.g. pane limit reached).
    Notice {
        text: String,
    },
    ReconnectProgress {
        pane: PaneId,
        progress: ReconnectProgress,
    },
    /// Persist this offset for the session.
    OffsetAdvanced {
        session: String,
        offset: u64,
    },
    /// The credential was revoked; a fresh one is needed before reconnecting.
    AuthRevoked {
        pane: PaneId,
        session: String,
    },
    PaneCreated {
        pane: PaneId,
    },
    PaneRemoved {
        pane: PaneId,
    },
    ActivePaneChanged {
        pane: Option<PaneId>,
    },
}
