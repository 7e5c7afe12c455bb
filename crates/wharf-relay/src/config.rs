//! Relay server configuration

use serde::{Deserialize, Serialize};

/// Relay server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// HTTP/WebSocket bind address
    pub bind_addr: String,
    /// Token-bucket burst size for `POST /api/rooms`, per source address
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,
    /// Token-bucket refill rate (tokens/second) for `POST /api/rooms`
    #[serde(default = "default_rate_limit_per_sec")]
    pub rate_limit_per_sec: f64,
}

fn default_rate_limit_burst() -> u32 {
    10
}

fn default_rate_limit_per_sec() -> f64 {
    2.0
}

impl RelayConfig {
    /// Minimum token-bucket burst (prevents a zero-capacity bucket that
    /// admits nothing, ever).
    const MIN_RATE_LIMIT_BURST: u32 = 1;
    /// Minimum refill rate (prevents a zero or negative rate from
    /// permanently locking the bucket out once its burst is spent).
    const MIN_RATE_LIMIT_PER_SEC: f64 = 0.1;

    /// Validate and clamp configuration values
    pub fn validate(&mut self) {
        if self.rate_limit_burst < Self::MIN_RATE_LIMIT_BURST {
            tracing::warn!(
                "rate_limit_burst {} too low, clamping to {}",
                self.rate_limit_burst,
                Self::MIN_RATE_LIMIT_BURST
            );
            self.rate_limit_burst = Self::MIN_RATE_LIMIT_BURST;
        }
        if !(self.rate_limit_per_sec >= Self::MIN_RATE_LIMIT_PER_SEC) {
            tracing::warn!(
                "rate_limit_per_sec {} too low, clamping to {}",
                self.rate_limit_per_sec,
                Self::MIN_RATE_LIMIT_PER_SEC
            );
            self.rate_limit_per_sec = Self::MIN_RATE_LIMIT_PER_SEC;
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4433".to_string(),
            rate_limit_burst: default_rate_limit_burst(),
            rate_limit_per_sec: default_rate_limit_per_sec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_clamps_zero_burst_and_rate() {
        let mut config = RelayConfig {
            rate_limit_burst: 0,
            rate_limit_per_sec: 0.0,
            ..RelayConfig::default()
        };
        config.validate();
        assert!(config.rate_limit_burst >= RelayConfig::MIN_RATE_LIMIT_BURST);
        assert!(config.rate_limit_per_sec >= RelayConfig::MIN_RATE_LIMIT_PER_SEC);
    }

    #[test]
    fn validate_clamps_negative_rate() {
        let mut config = RelayConfig {
            rate_limit_per_sec: -5.0,
            ..RelayConfig::default()
        };
        config.validate();
        assert!(config.rate_limit_per_sec >= RelayConfig::MIN_RATE_LIMIT_PER_SEC);
    }

    #[test]
    fn validate_leaves_sane_defaults_untouched() {
        let mut config = RelayConfig::default();
        let before = config.clone();
        config.validate();
        assert_eq!(before.rate_limit_burst, config.rate_limit_burst);
        assert_eq!(before.rate_limit_per_sec, config.rate_limit_per_sec);
    }
}
