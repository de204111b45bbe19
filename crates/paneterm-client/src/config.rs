#![forbid(unsafe_code)]

//! Client configuration.
//!
//! Every tunable of the pane controller lives in [`ClientConfig`], loadable
//! from TOML or JSON. Missing sections and fields fall back to defaults.
//!
//! ```toml
//! # paneterm.toml
//! [panes]
//! max_panes = 6
//!
//! [backoff]
//! floor_ms = 1000
//! ceiling_ms = 20000
//!
//! [attach.filter]
//! blocked_private_modes = [1049, 2004]
//! ```
//!
//! ```rust,ignore
//! let config = ClientConfig::load_toml_file("paneterm.toml")?;
//! ```

use std::path::Path;

use paneterm_core::control::ClientIdentity;
use paneterm_core::sanitize::FilterConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level ClientConfig
// ---------------------------------------------------------------------------

/// Top-level configuration for a [`crate::PaneController`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub panes: PaneConfig,
    pub backoff: BackoffConfig,
    pub output: OutputConfig,
    pub input: InputConfig,
    pub attach: AttachConfig,
    pub auth: AuthConfig,
    pub progress: ProgressConfig,
}

impl ClientConfig {
    /// Parse from a TOML string without validating.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Parse from a JSON string without validating.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load and validate a TOML file.
    pub fn load_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)?.validated()
    }

    /// Load and validate a JSON file.
    pub fn load_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)?.validated()
    }

    /// Return `self` if [`validate`](Self::validate) finds nothing.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Check parameter ranges. An empty list means the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.panes.max_panes == 0 {
            errors.push("panes.max_panes must be > 0".into());
        }

        if self.backoff.floor_ms == 0 {
            errors.push("backoff.floor_ms must be > 0".into());
        }
        if self.backoff.ceiling_ms < self.backoff.floor_ms {
            errors.push(format!(
                "backoff.ceiling_ms ({}) must be >= backoff.floor_ms ({})",
                self.backoff.ceiling_ms, self.backoff.floor_ms
            ));
        }
        if !(0.0..1.0).contains(&self.backoff.jitter_ratio) {
            errors.push(format!(
                "backoff.jitter_ratio must be in [0, 1), got {}",
                self.backoff.jitter_ratio
            ));
        }

        if self.output.low_water_bytes >= self.output.high_water_bytes {
            errors.push(format!(
                "output.low_water_bytes ({}) must be < output.high_water_bytes ({})",
                self.output.low_water_bytes, self.output.high_water_bytes
            ));
        }
        if self.output.batch_target_bytes == 0 {
            errors.push("output.batch_target_bytes must be > 0".into());
        }

        if self.input.batch_threshold_chars <= self.input.immediate_max_chars {
            errors.push(format!(
                "input.batch_threshold_chars ({}) must be > input.immediate_max_chars ({})",
                self.input.batch_threshold_chars, self.input.immediate_max_chars
            ));
        }

        if self.progress.poll_interval_ms == 0 {
            errors.push("progress.poll_interval_ms must be > 0".into());
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Pane registry limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaneConfig {
    pub max_panes: usize,
    /// Initial viewport used until the host reports a real size.
    pub default_cols: u16,
    pub default_rows: u16,
}

impl Default for PaneConfig {
    fn default() -> Self {
        Self {
            max_panes: 4,
            default_cols: 80,
            default_rows: 24,
        }
    }
}

/// Reconnect backoff policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub floor_ms: u64,
    pub ceiling_ms: u64,
    /// Maximum relative jitter applied to each wait (0.2 = ±20%).
    pub jitter_ratio: f64,
    /// Fixed RNG seed for reproducible jitter. Entropy-seeded when absent.
    pub jitter_seed: Option<u64>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            floor_ms: 1_000,
            ceiling_ms: 30_000,
            jitter_ratio: 0.2,
            jitter_seed: None,
        }
    }
}

/// Output queue watermarks and batching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub high_water_bytes: usize,
    pub low_water_bytes: usize,
    pub batch_target_bytes: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            high_water_bytes: 256 * 1024,
            low_water_bytes: 64 * 1024,
            batch_target_bytes: 32 * 1024,
        }
    }
}

/// Input batching thresholds, in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Inputs this short are sent immediately (keystrokes).
    pub immediate_max_chars: usize,
    /// Inputs or buffers this long are sent immediately (pastes).
    pub batch_threshold_chars: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            immediate_max_chars: 3,
            batch_threshold_chars: 4096,
        }
    }
}

/// Attach-window escape filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachConfig {
    /// How long after a (re)connect the filter stays active.
    pub sanitize_window_ms: u64,
    pub filter: FilterConfig,
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self {
            sanitize_window_ms: 2_000,
            filter: FilterConfig::default(),
        }
    }
}

/// Authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Close code meaning the credential was revoked; suppresses reconnect.
    pub revoked_close_code: u16,
    pub client: ClientIdentity,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            revoked_close_code: 4401,
            client: ClientIdentity::default(),
        }
    }
}

/// Reconnect progress polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub poll_interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur when loading a configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    Toml(toml::de::Error),
    /// JSON parse error.
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Toml(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}
