//! Client configuration file

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Where the client should connect, as read from its JSON config file
///
/// ```json
/// { "servidor": "127.0.0.1", "puerto": 8888 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(rename = "servidor")]
    pub server: String,
    #[serde(rename = "puerto")]
    pub port: u16,
}

impl ClientConfig {
    pub fn from_json(path: &str, text: &str) -> Result<Self, LoadError> {
        serde_json::from_str(text).map_err(|source| LoadError::Json {
            path: path.to_string(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_json(&display, &text)
    }

    /// `host:port` string suitable for `TcpStream::connect`
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_config() {
        let config =
            ClientConfig::from_json("inline", r#"{ "servidor": "localhost", "puerto": 9000 }"#)
                .unwrap();

        assert_eq!(config.server, "localhost");
        assert_eq!(config.port, 9000);
        assert_eq!(config.address(), "localhost:9000");
    }

    #[test]
    fn test_missing_port_is_rejected() {
        let result = ClientConfig::from_json("inline", r#"{ "servidor": "localhost" }"#);
        assert!(matches!(result, Err(LoadError::Json { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = ClientConfig::load("/definitely/not/here/config.json");
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }
}
