// Copyright 2024 Touch Proxy Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Server configuration file

use crate::{ServerConfig, ServerResult, DEFAULT_POLL_BUFFER_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use touch_proxy_core::*;
use touch_proxy_protocol::DEFAULT_MAX_REASSEMBLY;

/// Server configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfigFile {
    pub proxy: ProxyConfigData,
}

/// Proxy configuration data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfigData {
    /// Capability wire names, e.g. `keyboard_show`
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub fragment_threshold: Option<usize>,
    #[serde(default = "default_max_reassembly")]
    pub max_reassembly: usize,
    #[serde(default = "default_poll_buffer_size")]
    pub poll_buffer_size: usize,
    #[serde(default)]
    pub log_filter: Option<String>,
}

fn default_max_reassembly() -> usize {
    DEFAULT_MAX_REASSEMBLY
}

fn default_poll_buffer_size() -> usize {
    DEFAULT_POLL_BUFFER_SIZE
}

impl Default for ServerConfigFile {
    fn default() -> Self {
        ServerConfig::default().into()
    }
}

impl ServerConfigFile {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> ServerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfigFile = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ServerResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Convert to ServerConfig
    pub fn to_server_config(&self) -> ServerResult<ServerConfig> {
        let capabilities = self
            .proxy
            .capabilities
            .iter()
            .map(|name| name.parse::<PlatformCapability>())
            .collect::<ProxyResult<Vec<_>>>()?;

        let config = ServerConfig {
            capabilities,
            fragment_threshold: self.proxy.fragment_threshold,
            max_reassembly: self.proxy.max_reassembly,
            poll_buffer_size: self.proxy.poll_buffer_size,
            log_filter: self.proxy.log_filter.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<ServerConfig> for ServerConfigFile {
    fn from(config: ServerConfig) -> Self {
        ServerConfigFile {
            proxy: ProxyConfigData {
                capabilities: config
                    .capabilities
                    .iter()
                    .map(|capability| capability.id().to_string())
                    .collect(),
                fragment_threshold: config.fragment_threshold,
                max_reassembly: config.max_reassembly,
                poll_buffer_size: config.poll_buffer_size,
                log_filter: config.log_filter,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServerError;

    #[test]
    fn test_default_file_matches_default_config() {
        let file = ServerConfigFile::default();
        assert_eq!(file.proxy.capabilities, vec!["keyboard_show", "text_status"]);
        assert_eq!(file.to_server_config().unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let file: ServerConfigFile =
            serde_json::from_str(r#"{"proxy": {"capabilities": ["text_status"]}}"#).unwrap();
        let config = file.to_server_config().unwrap();
        assert_eq!(config.capabilities, vec![PlatformCapability::TextStatus]);
        assert_eq!(config.max_reassembly, DEFAULT_MAX_REASSEMBLY);
        assert_eq!(config.poll_buffer_size, DEFAULT_POLL_BUFFER_SIZE);
        assert_eq!(config.log_filter, None);
    }

    #[test]
    fn test_unknown_capability_rejected() {
        let mut file = ServerConfigFile::default();
        file.proxy.capabilities.push("telepathy".to_string());
        assert!(matches!(
            file.to_server_config(),
            Err(ServerError::Core(ProxyError::UnknownCapability(name))) if name == "telepathy"
        ));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut file = ServerConfigFile::default();
        file.proxy.fragment_threshold = Some(0);
        assert!(matches!(file.to_server_config(), Err(ServerError::Config(_))));

        let mut file = ServerConfigFile::default();
        file.proxy.poll_buffer_size = 0;
        assert!(matches!(file.to_server_config(), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_fragment_threshold_must_fit_poll_buffer() {
        let mut file = ServerConfigFile::default();
        file.proxy.fragment_threshold = Some(6);
        assert!(matches!(file.to_server_config(), Err(ServerError::Config(_))));

        file.proxy.fragment_threshold = Some(512);
        file.proxy.poll_buffer_size = 256;
        assert!(matches!(file.to_server_config(), Err(ServerError::Config(_))));

        file.proxy.poll_buffer_size = 512;
        assert_eq!(file.to_server_config().unwrap().fragment_threshold, Some(512));
    }
}
