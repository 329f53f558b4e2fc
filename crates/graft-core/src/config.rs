use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GraftError, GraftResult};

/// Serializable store options.
///
/// Collaborators that cannot be written down (storage adapter, peer objects,
/// transport factory, clock) are supplied through [`crate::GraftBuilder`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraftConfig {
    /// How long `once` waits for an answer.
    pub once_timeout_ms: u64,
    /// Path separator for joined keys and serialized paths.
    pub separator: String,
    /// Number of recent inbound envelopes remembered for de-duplication.
    pub dedup_capacity: usize,
    /// Maximum references followed while resolving one request.
    pub max_ref_hops: usize,
    /// Peer URLs connected through the transport factory at startup.
    pub peers: Vec<String>,
    /// Bind target handed to the transport factory at startup.
    pub listen: Option<String>,
}

impl Default for GraftConfig {
    fn default() -> Self {
        Self {
            once_timeout_ms: 2_000,
            separator: "/".into(),
            dedup_capacity: 8_192,
            max_ref_hops: 32,
            peers: Vec::new(),
            listen: None,
        }
    }
}

impl GraftConfig {
    /// Parse and validate TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> GraftResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GraftResult<()> {
        if self.separator.is_empty() {
            return Err(GraftError::Config("separator must not be empty".into()));
        }
        if self.dedup_capacity == 0 {
            return Err(GraftError::Config("dedup_capacity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn once_timeout(&self) -> Duration {
        Duration::from_millis(self.once_timeout_ms)
    }
}
