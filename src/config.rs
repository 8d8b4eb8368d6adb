//! Runtime configuration from the environment (after an optional `.env`).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use crate::room::code;

pub const MIN_CODE_LEN: usize = 4;
pub const MAX_CODE_LEN: usize = 6;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{var}: cannot parse {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub upload_disk_cap: u64,
    pub upload_sweep: Duration,
    pub room_code_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            static_dir: "static".into(),
            upload_dir: "uploads".into(),
            max_upload_bytes: 2 * 1024 * 1024,
            upload_disk_cap: 1024 * 1024 * 1024,
            upload_sweep: Duration::from_secs(30),
            room_code_len: code::DEFAULT_LEN,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// `lookup` returns the raw value of a variable, if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();

        if let Some(addr) = parse(&lookup, "BIND_ADDR")? {
            cfg.bind_addr = addr;
        } else if let Some(port) = parse::<u16, _>(&lookup, "PORT")? {
            cfg.bind_addr.set_port(port);
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            cfg.static_dir = dir.into();
        }
        if let Some(dir) = lookup("UPLOAD_DIR") {
            cfg.upload_dir = dir.into();
        }
        if let Some(n) = parse(&lookup, "MAX_UPLOAD_BYTES")? {
            cfg.max_upload_bytes = n;
        }
        if let Some(n) = parse(&lookup, "UPLOAD_DISK_CAP")? {
            cfg.upload_disk_cap = n;
        }
        if let Some(secs) = parse::<u64, _>(&lookup, "UPLOAD_SWEEP_SECS")? {
            if secs == 0 {
                return Err(ConfigError::Invalid { var: "UPLOAD_SWEEP_SECS", value: secs.to_string() });
            }
            cfg.upload_sweep = Duration::from_secs(secs);
        }
        if let Some(n) = parse::<usize, _>(&lookup, "ROOM_CODE_LEN")? {
            cfg.room_code_len = n.clamp(MIN_CODE_LEN, MAX_CODE_LEN);
        }
        Ok(cfg)
    }
}

fn parse<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = from(&[]).unwrap();
        assert_eq!(cfg.bind_addr.port(), 5000);
        assert_eq!(cfg.room_code_len, 6);
        assert_eq!(cfg.max_upload_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn port_overrides_default_address() {
        let cfg = from(&[("PORT", "8080")]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn bind_addr_wins_over_port() {
        let cfg = from(&[("BIND_ADDR", "127.0.0.1:9000"), ("PORT", "8080")]).unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn code_length_is_clamped() {
        assert_eq!(from(&[("ROOM_CODE_LEN", "2")]).unwrap().room_code_len, MIN_CODE_LEN);
        assert_eq!(from(&[("ROOM_CODE_LEN", "7")]).unwrap().room_code_len, 6);
        assert_eq!(from(&[("ROOM_CODE_LEN", "40")]).unwrap().room_code_len, MAX_CODE_LEN);
        assert_eq!(from(&[("ROOM_CODE_LEN", "5")]).unwrap().room_code_len, 5);
    }

    #[test]
    fn zero_sweep_interval_is_an_error() {
        let err = from(&[("UPLOAD_SWEEP_SECS", "0")]).unwrap_err();
        assert!(err.to_string().starts_with("UPLOAD_SWEEP_SECS"));
        assert_eq!(from(&[("UPLOAD_SWEEP_SECS", "5")]).unwrap().upload_sweep, Duration::from_secs(5));
    }

    #[test]
    fn garbage_is_an_error() {
        let err = from(&[("MAX_UPLOAD_BYTES", "lots")]).unwrap_err();
        assert!(err.to_string().starts_with("MAX_UPLOAD_BYTES"));
    }
}
