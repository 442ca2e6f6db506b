//! Service configuration: TOML file with environment overrides
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 5000
//! debug = false
//!
//! [artifacts]
//! model_path = "artifacts/model.json"
//! preprocessor_path = "artifacts/preprocessor.json"
//! labels_path = "artifacts/labels.json"
//! ```
//!
//! Environment variables (prefix `SEGMENT_`) override file values:
//!
//! | Variable | Config Path |
//! |----------|-------------|
//! | `SEGMENT_HOST` | `server.host` |
//! | `SEGMENT_PORT` | `server.port` |
//! | `SEGMENT_DEBUG` | `server.debug` |
//! | `SEGMENT_MODEL_PATH` | `artifacts.model_path` |
//! | `SEGMENT_PREPROCESSOR_PATH` | `artifacts.preprocessor_path` |
//! | `SEGMENT_LABELS_PATH` | `artifacts.labels_path` |

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::artifacts::{ArtifactPaths, LABELS_FILE, MODEL_FILE, PREPROCESSOR_FILE};

pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";

/// Network bind settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Verbose request logging
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            debug: false,
        }
    }
}

impl ServerConfig {
    /// Host and port in a form `TcpListener::bind` resolves directly
    pub fn socket_address(&self) -> (&str, u16) {
        (self.host.trim_start_matches('[').trim_end_matches(']'), self.port)
    }

    /// Display form of the bind address; IPv6 hosts are bracketed
    pub fn bind_address(&self) -> String {
        let (host, port) = self.socket_address();
        if host.contains(':') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        }
    }
}

/// Where the trained artifacts live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub model_path: PathBuf,
    pub preprocessor_path: PathBuf,
    pub labels_path: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        let dir = Path::new(DEFAULT_ARTIFACT_DIR);
        Self {
            model_path: dir.join(MODEL_FILE),
            preprocessor_path: dir.join(PREPROCESSOR_FILE),
            labels_path: dir.join(LABELS_FILE),
        }
    }
}

impl ArtifactConfig {
    pub fn paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            preprocessor: self.preprocessor_path.clone(),
            model: self.model_path.clone(),
            labels: self.labels_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub artifacts: ArtifactConfig,
}

impl ServiceConfig {
    /// Read a TOML config file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))
    }

    pub fn from_toml_str(toml: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml)?)
    }

    /// File (if present) then environment overrides, then validation
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_env_overrides(self) -> crate::Result<Self> {
        self.with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from any key lookup; an unparsable value is an error
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> crate::Result<Self> {
        if let Some(val) = lookup("SEGMENT_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("SEGMENT_PORT") {
            self.server.port = val
                .trim()
                .parse::<u16>()
                .with_context(|| format!("invalid SEGMENT_PORT '{}'", val))?;
        }
        if let Some(val) = lookup("SEGMENT_DEBUG") {
            self.server.debug = parse_bool(&val).with_context(|| {
                format!("invalid SEGMENT_DEBUG '{}': expected true or false", val)
            })?;
        }
        if let Some(val) = lookup("SEGMENT_MODEL_PATH") {
            self.artifacts.model_path = val.into();
        }
        if let Some(val) = lookup("SEGMENT_PREPROCESSOR_PATH") {
            self.artifacts.preprocessor_path = val.into();
        }
        if let Some(val) = lookup("SEGMENT_LABELS_PATH") {
            self.artifacts.labels_path = val.into();
        }
        Ok(self)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.server.host.trim().is_empty() {
            anyhow::bail!("[server] host must not be empty");
        }
        for (name, path) in [
            ("model_path", &self.artifacts.model_path),
            ("preprocessor_path", &self.artifacts.preprocessor_path),
            ("labels_path", &self.artifacts.labels_path),
        ] {
            if path.as_os_str().is_empty() {
                anyhow::bail!("[artifacts] {} must not be empty", name);
            }
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.bind_address(), "0.0.0.0:5000");
        assert!(!config.server.debug);
        assert_eq!(config.artifacts.model_path, Path::new("artifacts/model.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServiceConfig::from_toml_str(
            r#"
            [server]
            port = 8080
            debug = true

            [artifacts]
            labels_path = "/srv/labels.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.server.debug);
        assert_eq!(config.artifacts.labels_path, Path::new("/srv/labels.json"));
        assert_eq!(config.artifacts.model_path, Path::new("artifacts/model.json"));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nhost = \"127.0.0.1\"").unwrap();

        let config = ServiceConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");

        assert!(ServiceConfig::from_file("/nonexistent/config.toml").is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("SEGMENT_HOST", "localhost"),
            ("SEGMENT_PORT", "9000"),
            ("SEGMENT_DEBUG", "yes"),
            ("SEGMENT_MODEL_PATH", "/models/m.json"),
        ]
        .into_iter()
        .collect();

        let config = ServiceConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.bind_address(), "localhost:9000");
        assert!(config.server.debug);
        assert_eq!(config.artifacts.model_path, Path::new("/models/m.json"));
        assert_eq!(
            config.artifacts.preprocessor_path,
            Path::new("artifacts/preprocessor.json")
        );
    }

    #[test]
    fn test_invalid_overrides_are_rejected() {
        let err = ServiceConfig::default()
            .with_overrides(|key| match key {
                "SEGMENT_PORT" => Some("not-a-port".to_string()),
                _ => None,
            })
            .unwrap_err();
        assert!(format!("{:#}", err).contains("SEGMENT_PORT"));

        let err = ServiceConfig::default()
            .with_overrides(|key| match key {
                "SEGMENT_PORT" => Some("70000".to_string()),
                _ => None,
            })
            .unwrap_err();
        assert!(format!("{:#}", err).contains("70000"));

        let err = ServiceConfig::default()
            .with_overrides(|key| match key {
                "SEGMENT_DEBUG" => Some("maybe".to_string()),
                _ => None,
            })
            .unwrap_err();
        assert!(format!("{:#}", err).contains("SEGMENT_DEBUG"));
    }

    #[test]
    fn test_ipv6_host_binds() {
        use std::net::ToSocketAddrs;

        let config = ServiceConfig::default()
            .with_overrides(|key| match key {
                "SEGMENT_HOST" => Some("::1".to_string()),
                "SEGMENT_PORT" => Some("5001".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.server.socket_address(), ("::1", 5001));
        assert_eq!(config.server.bind_address(), "[::1]:5001");

        let resolved: Vec<_> = config
            .server
            .socket_address()
            .to_socket_addrs()
            .unwrap()
            .collect();
        assert!(resolved.iter().all(|addr| addr.is_ipv6() && addr.port() == 5001));
        assert!(!resolved.is_empty());

        // Bracketed form from a TOML file resolves the same way
        let mut bracketed = config.server.clone();
        bracketed.host = "[::1]".to_string();
        assert_eq!(bracketed.socket_address(), ("::1", 5001));
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let mut config = ServiceConfig::default();
        config.server.host = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
