//! Reconciliation session configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a session coordinator and its workflow machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconConfig {
    /// How long the workflow stays in the error state before recovering
    /// to idle, in milliseconds.
    #[serde(default = "default_recovery_delay_ms")]
    pub recovery_delay_ms: u64,
}

fn default_recovery_delay_ms() -> u64 {
    3000
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            recovery_delay_ms: default_recovery_delay_ms(),
        }
    }
}

impl ReconConfig {
    /// The recovery delay as a [`Duration`].
    #[must_use]
    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ReconConfig::default();
        assert_eq!(config.recovery_delay_ms, 3000);
        assert_eq!(config.recovery_delay(), Duration::from_millis(3000));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ReconConfig = serde_json::from_str("{}").expect("parse");
        assert_eq!(config.recovery_delay_ms, 3000);
    }
}
