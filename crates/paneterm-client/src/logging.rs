//! Logging setup for hosts that do not install their own subscriber.
//!
//! The controller only emits `tracing` events; this module wires them to
//! stderr. Targets used by the crate:
//!
//! | Target | Events |
//! |---|---|
//! | `paneterm::lifecycle` | connect, auth, close, reconnect scheduling |
//! | `paneterm::output` | batches, backpressure transitions |
//! | `paneterm::input` | refused sends |
//! | `paneterm::registry` | pane creation/removal, focus |
//! | `paneterm::codec` | dropped frames, unparsable control messages |

use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "PANETERM_LOG";

/// Install a global fmt subscriber.
///
/// The filter comes from `PANETERM_LOG`, falling back to `default_directive`.
/// With the `tracing-json` feature, events are written as JSON lines.
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    #[cfg(feature = "tracing-json")]
    let result = builder.json().try_init();
    #[cfg(not(feature = "tracing-json"))]
    let result = builder.try_init();

    result.is_ok()
}
