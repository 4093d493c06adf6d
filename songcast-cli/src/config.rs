//! Run configuration (`.env` style)
//!
//! ```text
//! DEVICE_1=192.168.1.20 4c494e4e-0026-0f21-cc9b-01303901013f
//! DEVICE_2=192.168.1.21 4c494e4e-0026-0f21-d6c7-01373158013f   # kitchen
//! SONGCAST_SENDER=DEVICE_1
//! SONGCAST_RECEIVERS=DEVICE_2
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use songcast_group::Device;
use thiserror::Error;

/// Configuration errors are the only fatal class
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },

    #[error("No sender configured (set SONGCAST_SENDER=<DEVICE token>)")]
    MissingSender,

    #[error("{key} refers to unknown device '{token}'")]
    UnknownToken { key: &'static str, token: String },

    #[error("No receivers configured (set SONGCAST_RECEIVERS=<DEVICE token>,...)")]
    NoReceivers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Every `DEVICE*` entry by token
    pub devices: BTreeMap<String, Device>,
    pub sender: Device,
    pub receivers: Vec<Device>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut devices = BTreeMap::new();
        let mut sender = None;
        let mut receivers = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = strip_comment(raw);
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::InvalidLine {
                    line: index + 1,
                    reason: format!("expected KEY=VALUE, got '{line}'"),
                });
            };
            let key = key.trim();
            let value = value.trim();

            if key.starts_with("DEVICE") {
                let mut fields = value.split_whitespace();
                match (fields.next(), fields.next()) {
                    (Some(host), Some(udn)) => {
                        devices.insert(key.to_string(), Device::new(key, host, udn));
                    }
                    _ => {
                        return Err(ConfigError::InvalidLine {
                            line: index + 1,
                            reason: format!("{key} must be '<address> <identifier>'"),
                        })
                    }
                }
            } else if key == "SONGCAST_SENDER" || key == "SONGCAST_MASTER" {
                sender = Some(value.to_string());
            } else if key == "SONGCAST_RECEIVERS" || key == "SONGCAST_MEMBERS" {
                receivers = value
                    .split(',')
                    .map(str::trim)
                    .filter(|token| !token.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }

        let sender_token = sender.filter(|s| !s.is_empty()).ok_or(ConfigError::MissingSender)?;
        let sender = lookup(&devices, "SONGCAST_SENDER", &sender_token)?;
        if receivers.is_empty() {
            return Err(ConfigError::NoReceivers);
        }
        let receivers = receivers
            .iter()
            .map(|token| lookup(&devices, "SONGCAST_RECEIVERS", token))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            devices,
            sender,
            receivers,
        })
    }

    /// Sender first, then receivers
    pub fn all_devices(&self) -> impl Iterator<Item = &Device> {
        std::iter::once(&self.sender).chain(self.receivers.iter())
    }
}

fn strip_comment(raw: &str) -> &str {
    match raw.find('#') {
        Some(at) => raw[..at].trim(),
        None => raw.trim(),
    }
}

fn lookup(devices: &BTreeMap<String, Device>, key: &'static str, token: &str) -> Result<Device, ConfigError> {
    devices.get(token).cloned().ok_or_else(|| ConfigError::UnknownToken {
        key,
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SAMPLE: &str = "\
# living room is the sender
DEVICE_1=192.168.1.20 udn-1
DEVICE_2=192.168.1.21   udn-2   # kitchen
DEVICE_3=192.168.1.22 udn-3

OTHER_SETTING=ignored
SONGCAST_SENDER=DEVICE_1
SONGCAST_RECEIVERS=DEVICE_2, DEVICE_3,
";

    #[test]
    fn test_parse_sample() {
        let config = RunConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.devices.len(), 3);
        assert_eq!(config.sender.token, "DEVICE_1");
        assert_eq!(config.sender.host(), "192.168.1.20");
        assert_eq!(config.sender.identifier(), "udn-1");

        let receivers: Vec<_> = config.receivers.iter().map(|d| d.token.as_str()).collect();
        assert_eq!(receivers, vec!["DEVICE_2", "DEVICE_3"]);
        assert_eq!(config.receivers[0].identifier(), "udn-2");

        let all: Vec<_> = config.all_devices().map(|d| d.token.as_str()).collect();
        assert_eq!(all, vec!["DEVICE_1", "DEVICE_2", "DEVICE_3"]);
    }

    #[test]
    fn test_legacy_key_names() {
        let config = RunConfig::parse(
            "DEVICE_1=10.0.0.1 a\nDEVICE_2=10.0.0.2 b\nSONGCAST_MASTER=DEVICE_1\nSONGCAST_MEMBERS=DEVICE_2\n",
        )
        .unwrap();
        assert_eq!(config.sender.token, "DEVICE_1");
        assert_eq!(config.receivers.len(), 1);
    }

    #[rstest]
    #[case("DEVICE_1=10.0.0.1 a\nSONGCAST_RECEIVERS=DEVICE_1\n", "MissingSender")]
    #[case("DEVICE_1=10.0.0.1 a\nSONGCAST_SENDER=DEVICE_9\nSONGCAST_RECEIVERS=DEVICE_1\n", "UnknownToken")]
    #[case("DEVICE_1=10.0.0.1 a\nSONGCAST_SENDER=DEVICE_1\nSONGCAST_RECEIVERS=DEVICE_7\n", "UnknownToken")]
    #[case("DEVICE_1=10.0.0.1 a\nSONGCAST_SENDER=DEVICE_1\nSONGCAST_RECEIVERS= , \n", "NoReceivers")]
    #[case("DEVICE_1=10.0.0.1\nSONGCAST_SENDER=DEVICE_1\n", "InvalidLine")]
    #[case("DEVICE_1 10.0.0.1 a\n", "InvalidLine")]
    fn test_fatal_errors(#[case] text: &str, #[case] expected: &str) {
        let err = RunConfig::parse(text).unwrap_err();
        let kind = match err {
            ConfigError::Io { .. } => "Io",
            ConfigError::InvalidLine { .. } => "InvalidLine",
            ConfigError::MissingSender => "MissingSender",
            ConfigError::UnknownToken { .. } => "UnknownToken",
            ConfigError::NoReceivers => "NoReceivers",
        };
        assert_eq!(kind, expected);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap().receivers.len(), 2);

        let missing = RunConfig::load(&dir.path().join("nope.env")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
