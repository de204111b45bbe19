#![forbid(unsafe_code)]

//! Host-driven controller for multi-pane terminal sessions.
//!
//! Each pane attaches to one server-side session over a transport the host
//! opens on the controller's behalf. The controller owns the protocol side:
//!
//! - authentication and the connect/reconnect lifecycle,
//! - attach-time escape filtering and scrollback-clear detection,
//! - batched display writes with watermark backpressure,
//! - input coalescing per animation frame,
//! - per-session replay offsets.
//!
//! Nothing here performs I/O. See [`controller`] for the host contract.

pub mod backoff;
pub mod clock;
pub mod config;
pub mod controller;
pub mod host;
pub mod input_coalescer;
pub mod lifecycle;
pub mod logging;
pub mod offsets;
pub mod output_queue;
pub mod pane;
pub mod progress;
pub mod registry;

pub use backoff::{BackoffWindow, ReconnectBackoff};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, ConfigError};
pub use controller::{ConnectOptions, PaneController};
pub use host::{HostCommand, TransportParams};
pub use lifecycle::{ConnectionState, StatusLevel};
pub use logging::init_logging;
pub use offsets::SessionOffsetTable;
pub use pane::{FrameId, Pane, PaneId, SocketId, TimerId, WriteId};
pub use progress::ReconnectProgress;
pub use registry::{PaneRegistry, RemoveOutcome};

pub use paneterm_core::InboundMessage;
