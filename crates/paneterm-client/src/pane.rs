//! Pane state and host-facing identifiers.

use paneterm_core::sanitize::{FilterCarry, ScrollbackClearDetector};

use crate::backoff::ReconnectBackoff;
use crate::config::ClientConfig;
use crate::input_coalescer::InputCoalescer;
use crate::lifecycle::ConnectionState;
use crate::output_queue::OutputQueue;

macro_rules! host_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Raw value, for hosts that key their own tables by it.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

host_id!(
    /// Pane identity; never reused within a controller.
    PaneId,
    "pane"
);
host_id!(
    /// One transport connection attempt.
    SocketId,
    "socket"
);
host_id!(
    /// A host timer armed by the controller.
    TimerId,
    "timer"
);
host_id!(
    /// An animation-frame request.
    FrameId,
    "frame"
);
host_id!(
    /// A display write awaiting completion.
    WriteId,
    "write"
);

/// Monotonic id source shared by every id kind.
#[derive(Debug, Clone, Default)]
pub(crate) struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    fn bump(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    pub(crate) fn pane(&mut self) -> PaneId {
        PaneId(self.bump())
    }

    pub(crate) fn socket(&mut self) -> SocketId {
        SocketId(self.bump())
    }

    pub(crate) fn timer(&mut self) -> TimerId {
        TimerId(self.bump())
    }

    pub(crate) fn frame(&mut self) -> FrameId {
        FrameId(self.bump())
    }

    pub(crate) fn write(&mut self) -> WriteId {
        WriteId(self.bump())
    }
}

/// One terminal surface and its transport state.
#[derive(Debug, Clone)]
pub struct Pane {
    pub(crate) id: PaneId,
    pub(crate) ordinal: usize,
    pub(crate) session: String,
    pub(crate) cwd: Option<String>,
    pub(crate) state: ConnectionState,
    pub(crate) binary_codec: bool,
    pub(crate) cols: u16,
    pub(crate) rows: u16,

    /// Bumped on every (re)connect; async work captured with an older value is stale.
    pub(crate) connect_seq: u64,
    pub(crate) socket: Option<SocketId>,
    /// Offset requested from the server for the current connection.
    pub(crate) replay_baseline: u64,
    /// Log bytes delivered to the display on the current connection, plus baseline.
    pub(crate) log_offset: u64,
    pub(crate) sanitize_until_ms: u64,

    pub(crate) backoff: ReconnectBackoff,
    pub(crate) input: InputCoalescer,
    pub(crate) output: OutputQueue,
    pub(crate) clear_detector: ScrollbackClearDetector,
    /// Unterminated escape sequence held by the attach filter.
    pub(crate) filter_carry: FilterCarry,

    pub(crate) reconnect_timer: Option<TimerId>,
    pub(crate) progress_timer: Option<TimerId>,
    pub(crate) input_frame: Option<FrameId>,
    pub(crate) output_frame: Option<FrameId>,
    pub(crate) pending_write: Option<WriteId>,
}

impl Pane {
    pub(crate) fn new(id: PaneId, config: &ClientConfig) -> Self {
        Self {
            id,
            ordinal: 0,
            session: String::new(),
            cwd: None,
            state: ConnectionState::Idle,
            binary_codec: false,
            cols: config.panes.default_cols,
            rows: config.panes.default_rows,
            connect_seq: 0,
            socket: None,
            replay_baseline: 0,
            log_offset: 0,
            sanitize_until_ms: 0,
            backoff: ReconnectBackoff::new(&config.backoff),
            input: InputCoalescer::new(config.input.clone()),
            output: OutputQueue::new(config.output.clone()),
            clear_detector: ScrollbackClearDetector::new(),
            filter_carry: FilterCarry::new(),
            reconnect_timer: None,
            progress_timer: None,
            input_frame: None,
            output_frame: None,
            pending_write: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> PaneId {
        self.id
    }

    /// 1-based display position.
    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Bound session id; empty when unattached.
    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        !self.session.is_empty()
    }

    /// Advisory working-directory label.
    #[must_use]
    pub fn cwd(&self) -> Option<&str> {
        self.cwd.as_deref()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn binary_codec(&self) -> bool {
        self.binary_codec
    }

    #[must_use]
    pub fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    #[must_use]
    pub fn connect_seq(&self) -> u64 {
        self.connect_seq
    }

    #[must_use]
    pub fn socket(&self) -> Option<SocketId> {
        self.socket
    }

    #[must_use]
    pub fn replay_baseline(&self) -> u64 {
        self.replay_baseline
    }

    #[must_use]
    pub fn log_offset(&self) -> u64 {
        self.log_offset
    }

    #[must_use]
    pub fn sanitize_until_ms(&self) -> u64 {
        self.sanitize_until_ms
    }

    #[must_use]
    pub fn backoff(&self) -> &ReconnectBackoff {
        &self.backoff
    }

    #[must_use]
    pub fn output(&self) -> &OutputQueue {
        &self.output
    }

    #[must_use]
    pub fn input(&self) -> &InputCoalescer {
        &self.input
    }

    /// Whether any timer or animation frame is still armed for this pane.
    #[must_use]
    pub fn has_pending_callbacks(&self) -> bool {
        self.reconnect_timer.is_some()
            || self.progress_timer.is_some()
            || self.input_frame.is_some()
            || self.output_frame.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_across_kinds() {
        let mut ids = IdAllocator::default();
        let pane = ids.pane();
        let socket = ids.socket();
        assert_ne!(pane.get(), socket.get());
        assert_eq!(pane.to_string(), "pane-1");
        assert_eq!(socket.to_string(), "socket-2");
    }

    #[test]
    fn new_pane_is_idle_and_unbound() {
        let mut ids = IdAllocator::default();
        let config = ClientConfig::default();
        let pane = Pane::new(ids.pane(), &config);
        assert_eq!(pane.state(), ConnectionState::Idle);
        assert!(!pane.has_session());
        assert_eq!(pane.size(), (80, 24));
        assert!(!pane.has_pending_callbacks());
    }
}
