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

//! Configuration file loading and saving

use touch_proxy_core::PlatformCapability;
use touch_proxy_server::*;

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("touch-proxy.json");

    let config = ServerConfig {
        capabilities: vec![PlatformCapability::TextStatus],
        fragment_threshold: Some(512),
        max_reassembly: 8192,
        poll_buffer_size: 1024,
        log_filter: Some("touch_proxy=debug".to_string()),
    };
    ServerConfigFile::from(config.clone()).save(&path).unwrap();

    let loaded = ServerConfigFile::load(&path).unwrap();
    assert_eq!(loaded.to_server_config().unwrap(), config);
}

#[test]
fn test_saved_file_is_readable_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    ServerConfigFile::default().save(&path).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(
        value["proxy"]["capabilities"],
        serde_json::json!(["keyboard_show", "text_status"])
    );
    assert_eq!(value["proxy"]["fragment_threshold"], serde_json::Value::Null);
}

#[test]
fn test_load_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = ServerConfigFile::load(dir.path().join("absent.json"));
    assert!(matches!(result, Err(ServerError::Io(_))));
}

#[test]
fn test_load_invalid_json_fails() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut file, b"{ not json").unwrap();
    let result = ServerConfigFile::load(file.path());
    assert!(matches!(result, Err(ServerError::Serialization(_))));
}
