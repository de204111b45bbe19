#![forbid(unsafe_code)]

//! Protocol building blocks shared by PaneTerm hosts.
//!
//! Everything here is pure: no clocks, no I/O. The stateful controller lives
//! in `paneterm-client`.

pub mod capabilities;
pub mod control;
pub mod frame;
pub mod sanitize;

pub use frame::{CodecError, DecodedFrame, FrameType, InboundMessage};
pub use sanitize::{ClearScan, EscapeFilter, FilterCarry, FilterConfig, ScrollbackClearDetector};
