//! Peer configuration.
//!
//! Defaults suit a LAN game; every value can be overridden from the
//! environment:
//!
//! | variable | default |
//! |---|---|
//! | `KETTU_BIND_ADDR` | `0.0.0.0:9080` |
//! | `KETTU_CONNECT_WINDOW_SECS` | `900` |
//! | `KETTU_STEP_TIMEOUT_SECS` | `60` |

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Address the host listens on.
pub const ENV_BIND_ADDR: &str = "KETTU_BIND_ADDR";
/// How long the host waits for a guest, in seconds.
pub const ENV_CONNECT_WINDOW: &str = "KETTU_CONNECT_WINDOW_SECS";
/// Per-step handshake timeout, in seconds.
pub const ENV_STEP_TIMEOUT: &str = "KETTU_STEP_TIMEOUT_SECS";

/// Default host port.
pub const DEFAULT_PORT: u16 = 9080;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Settings for one peer process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// Host listen address.
    pub bind_addr: SocketAddr,
    /// How long the host waits for its single guest.
    pub connect_window: Duration,
    /// Longest wait for any one handshake message.
    pub step_timeout: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            connect_window: Duration::from_secs(15 * 60),
            step_timeout: Duration::from_secs(60),
        }
    }
}

impl PeerConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_BIND_ADDR) {
            config.bind_addr = raw.trim().parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    key: ENV_BIND_ADDR,
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(secs) = read_secs(&lookup, ENV_CONNECT_WINDOW)? {
            config.connect_window = secs;
        }
        if let Some(secs) = read_secs(&lookup, ENV_STEP_TIMEOUT)? {
            config.step_timeout = secs;
        }

        Ok(config)
    }
}

fn read_secs<F>(lookup: &F, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let invalid = |reason: String| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason,
    };

    let secs: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
    if secs == 0 {
        return Err(invalid("must be at least 1 second".into()));
    }
    Ok(Some(Duration::from_secs(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PeerConfig::default();
        assert_eq!(config.bind_addr.port(), 9080);
        assert_eq!(config.connect_window, Duration::from_secs(900));
        assert_eq!(config.step_timeout, Duration::from_secs(60));

        assert_eq!(PeerConfig::from_lookup(lookup(&[])).unwrap(), config);
    }

    #[test]
    fn test_overrides() {
        let config = PeerConfig::from_lookup(lookup(&[
            (ENV_BIND_ADDR, "127.0.0.1:7000"),
            (ENV_CONNECT_WINDOW, "30"),
            (ENV_STEP_TIMEOUT, " 5 "),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:7000".parse().unwrap());
        assert_eq!(config.connect_window, Duration::from_secs(30));
        assert_eq!(config.step_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values() {
        let err = PeerConfig::from_lookup(lookup(&[(ENV_BIND_ADDR, "nowhere")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_BIND_ADDR, .. }));

        let err = PeerConfig::from_lookup(lookup(&[(ENV_STEP_TIMEOUT, "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_STEP_TIMEOUT, .. }));

        let err = PeerConfig::from_lookup(lookup(&[(ENV_CONNECT_WINDOW, "0")])).unwrap_err();
        assert!(err.to_string().contains(ENV_CONNECT_WINDOW));
    }
}
