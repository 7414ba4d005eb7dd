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

//! # Touch Proxy Server
//!
//! Wires the event channel, pointer mapper, composition engine and inbound
//! handler together behind the `push`/`poll` surface the host calls.

pub mod config;
pub mod handler;

pub use config::{ProxyConfigData, ServerConfigFile};
pub use handler::InboundHandler;

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use touch_proxy_core::*;
use touch_proxy_platform::*;
use touch_proxy_protocol::*;
use tracing::{debug, info, warn};

/// Server result type
pub type ServerResult<T> = Result<T, ServerError>;

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Core error: {0}")]
    Core(#[from] ProxyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub const DEFAULT_POLL_BUFFER_SIZE: usize = 4096;

/// Proxy server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Capabilities announced in answer to `Initialize`
    pub capabilities: Vec<PlatformCapability>,
    /// Encoded messages longer than this are sent as `Large` fragments
    pub fragment_threshold: Option<usize>,
    pub max_reassembly: usize,
    /// Buffer size used by hosts that poll into a fixed buffer
    pub poll_buffer_size: usize,
    pub log_filter: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            capabilities: PlatformCapability::ALL.to_vec(),
            fragment_threshold: None,
            max_reassembly: DEFAULT_MAX_REASSEMBLY,
            poll_buffer_size: DEFAULT_POLL_BUFFER_SIZE,
            log_filter: None,
        }
    }
}

impl ServerConfig {
    /// Check that the limits are usable together
    pub fn validate(&self) -> ServerResult<()> {
        if self.max_reassembly == 0 {
            return Err(ServerError::Config(
                "max_reassembly must be greater than zero".to_string(),
            ));
        }
        if self.poll_buffer_size == 0 {
            return Err(ServerError::Config(
                "poll_buffer_size must be greater than zero".to_string(),
            ));
        }
        if let Some(threshold) = self.fragment_threshold {
            if threshold < MIN_FRAGMENT_THRESHOLD {
                return Err(ServerError::Config(format!(
                    "fragment_threshold must be at least {}",
                    MIN_FRAGMENT_THRESHOLD
                )));
            }
            if threshold > self.poll_buffer_size {
                return Err(ServerError::Config(format!(
                    "fragment_threshold {} exceeds poll_buffer_size {}",
                    threshold, self.poll_buffer_size
                )));
            }
        }
        Ok(())
    }
}

/// Platform collaborators injected by the embedding adapter
#[derive(Clone)]
pub struct Collaborators {
    pub normalizer: Arc<dyn PositionNormalizer>,
    pub keyboard: Arc<dyn KeyboardVisibility>,
    pub sync: Arc<dyn SurroundingTextSync>,
    pub haptics: Arc<dyn Haptics>,
}

impl Collaborators {
    /// Collaborators that only log, with positions passed through unchanged
    pub fn logging() -> Self {
        let logger = Arc::new(LoggingCollaborator);
        Collaborators {
            normalizer: Arc::new(IdentityNormalizer),
            keyboard: logger.clone(),
            sync: logger.clone(),
            haptics: logger,
        }
    }
}

/// Native input bridge for one host
pub struct ProxyServer {
    config: ServerConfig,
    channel: EventChannel,
    pointers: PointerMapper,
    engine: Arc<Mutex<CompositionEngine>>,
    handler: Mutex<InboundHandler>,
}

impl ProxyServer {
    pub fn new(config: ServerConfig, collaborators: Collaborators) -> Self {
        Self::with_ids(config, collaborators, PointerIdAllocator::new())
    }

    /// Create a server sharing an existing pointer id allocator
    pub fn with_ids(
        config: ServerConfig,
        collaborators: Collaborators,
        ids: PointerIdAllocator,
    ) -> Self {
        info!(
            "Initializing touch proxy with capabilities {:?}",
            config.capabilities
        );

        let channel = match config.fragment_threshold {
            Some(threshold) => EventChannel::new().with_fragment_threshold(threshold),
            None => EventChannel::new(),
        };
        let pointers = PointerMapper::new(channel.clone(), ids, collaborators.normalizer);
        let engine = Arc::new(Mutex::new(CompositionEngine::new(
            channel.clone(),
            collaborators.sync,
        )));
        let handler = InboundHandler::new(
            channel.clone(),
            collaborators.keyboard,
            collaborators.haptics,
            engine.clone(),
            Reassembler::new(config.max_reassembly),
            config.capabilities.clone(),
        );

        ProxyServer {
            config,
            channel,
            pointers,
            engine,
            handler: Mutex::new(handler),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle of the outbound channel, for producers outside the server
    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    pub fn pointers(&self) -> &PointerMapper {
        &self.pointers
    }

    /// Lock the composition engine of the input context
    pub fn engine(&self) -> MutexGuard<'_, CompositionEngine> {
        self.engine.lock()
    }

    /// Decode and dispatch one message sent by the host.
    ///
    /// Malformed input is logged and reported but leaves the server usable.
    pub fn push_event(&self, bytes: &[u8]) -> ServerResult<()> {
        let result = self.handler.lock().handle_bytes(bytes);
        if let Err(e) = &result {
            warn!("Dropping inbound message ({} bytes): {}", bytes.len(), e);
        }
        result
    }

    /// Next encoded outbound message
    pub fn poll_event(&self) -> Option<Vec<u8>> {
        self.channel.poll()
    }

    /// Encode the next outbound message into `buffer`, returning its length
    pub fn poll_event_into(&self, buffer: &mut [u8]) -> ServerResult<usize> {
        Ok(self.channel.poll_into(buffer)?)
    }

    pub fn handle_touch(&self, event: &TouchEvent) {
        self.pointers.handle(event);
    }

    pub fn handle_text_input(&self, event: TextInputEvent) {
        self.engine.lock().handle(event);
    }

    /// Feed every pending touch event of `source` through the pointer mapper.
    ///
    /// Frame events trigger the liveness sweep, so sources that do not report
    /// every contact per batch must not emit them.
    pub fn pump_touch(&self, source: &mut dyn TouchSource) -> usize {
        let events = source.drain_touch_events();
        for event in &events {
            self.handle_touch(event);
        }
        events.len()
    }

    pub fn pump_text_input(&self, source: &mut dyn TextInputSource) -> usize {
        let events = source.drain_text_input_events();
        let count = events.len();
        let mut engine = self.engine.lock();
        for event in events {
            engine.handle(event);
        }
        count
    }

    pub fn capabilities(&self) -> Vec<PlatformCapability> {
        self.handler.lock().capabilities().to_vec()
    }

    /// Replace the announced capabilities, pushing only what changed
    pub fn set_capabilities(&self, capabilities: &[PlatformCapability]) {
        debug!("Updating capabilities to {:?}", capabilities);
        self.handler.lock().set_capabilities(capabilities);
    }
}
