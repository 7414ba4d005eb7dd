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

//! # Touch Proxy Replay
//!
//! Plays a recorded scenario through a proxy server and prints every message
//! the host would poll, one scenario step per tick.

mod scenario;

use anyhow::Context;
use clap::{Arg, Command};
use scenario::{Scenario, Step};
use std::sync::Arc;
use std::time::Duration;
use touch_proxy_core::utils::hex_string;
use touch_proxy_platform::*;
use touch_proxy_protocol::*;
use touch_proxy_server::*;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Proxy server plus the adapters a scenario feeds
struct Replay {
    server: ProxyServer,
    surface: Arc<SurfaceNormalizer>,
    source: ScriptedSource,
    poll_buffer: Vec<u8>,
}

impl Replay {
    fn new(config: ServerConfig, scenario: &Scenario, keyboard: Arc<dyn KeyboardVisibility>) -> Self {
        let surface = Arc::new(SurfaceNormalizer::new(
            scenario.surface.width,
            scenario.surface.height,
        ));
        let logger = Arc::new(LoggingCollaborator);
        let collaborators = Collaborators {
            normalizer: surface.clone(),
            keyboard,
            sync: logger.clone(),
            haptics: logger,
        };
        let poll_buffer = vec![0; config.poll_buffer_size];

        Replay {
            server: ProxyServer::new(config, collaborators),
            surface,
            source: ScriptedSource::new(),
            poll_buffer,
        }
    }

    fn apply(&mut self, step: Step) {
        debug!("Applying step {:?}", step);
        match step {
            Step::Touch { events } => {
                for event in events {
                    self.source.push_touch(event);
                }
                self.server.pump_touch(&mut self.source);
            }
            Step::TextInput { events } => {
                for event in events {
                    self.source.push_text_input(event);
                }
                self.server.pump_text_input(&mut self.source);
            }
            Step::Host { message } => {
                let bytes = encode(&Message::from(message));
                // Decode failures are already logged by the server.
                let _ = self.server.push_event(&bytes);
            }
            Step::Resize { width, height } => self.surface.resize(width, height),
            Step::Capabilities { capabilities } => self.server.set_capabilities(&capabilities),
        }
    }

    /// Print everything waiting in the channel, returning how many frames
    fn drain(&mut self) -> usize {
        let mut frames = 0;
        loop {
            let frame = match self.server.poll_event_into(&mut self.poll_buffer) {
                Ok(0) => break,
                Ok(length) => self.poll_buffer[..length].to_vec(),
                Err(e) => {
                    warn!("{}, polling without a buffer", e);
                    match self.server.poll_event() {
                        Some(frame) => frame,
                        None => break,
                    }
                }
            };
            frames += 1;
            match decode(&frame) {
                Ok(message) => println!("{} {:?}", hex_string(&frame), message),
                Err(e) => println!("{} <{}>", hex_string(&frame), e),
            }
        }
        frames
    }
}

fn load_config(matches: &clap::ArgMatches) -> anyhow::Result<ServerConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ServerConfigFile::load(path)
            .with_context(|| format!("loading config {}", path))?
            .to_server_config()?,
        None => ServerConfig::default(),
    };
    if let Some(&threshold) = matches.get_one::<usize>("fragment-threshold") {
        config.fragment_threshold = Some(threshold);
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("touch-proxy-replay")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Touch Proxy Team")
        .about("Replay touch and input method scenarios through the touch proxy")
        .arg(
            Arg::new("scenario")
                .value_name("SCENARIO")
                .help("Scenario JSON file")
                .required(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Proxy configuration file"),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval-ms")
                .value_name("MILLIS")
                .help("Delay between scenario steps")
                .value_parser(clap::value_parser!(u64))
                .default_value("16"),
        )
        .arg(
            Arg::new("fragment-threshold")
                .short('f')
                .long("fragment-threshold")
                .value_name("BYTES")
                .help("Send messages longer than this as large fragments")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("no-keyboard")
                .long("no-keyboard")
                .help("Simulate a platform without an on-screen keyboard")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let config = load_config(&matches)?;

    let filter = match &config.log_filter {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid log filter {}", directives))?,
        None => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let scenario_path = matches
        .get_one::<String>("scenario")
        .context("missing scenario argument")?;
    let scenario = Scenario::load(scenario_path)?;
    let interval_ms = matches.get_one::<u64>("interval").copied().unwrap_or(16);

    info!(
        "Replaying {} steps from {} every {}ms",
        scenario.steps.len(),
        scenario_path,
        interval_ms
    );
    info!("Configuration: {:?}", config);

    let keyboard: Arc<dyn KeyboardVisibility> = if matches.get_flag("no-keyboard") {
        Arc::new(UnsupportedKeyboard)
    } else {
        Arc::new(LoggingCollaborator)
    };
    let mut replay = Replay::new(config, &scenario, keyboard);
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    let mut frames = 0;
    for step in scenario.steps {
        interval.tick().await;
        replay.apply(step);
        frames += replay.drain();
    }

    info!(
        "Replay finished: {} frames polled, {} contacts still down, peak queue depth {}",
        frames,
        replay.server.pointers().active_contacts(),
        replay.server.channel().high_water_mark()
    );
    Ok(())
}
