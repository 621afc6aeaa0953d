//! Command line and server configuration

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use geofence_core::{EngineConfig, GeofenceError, DEFAULT_SHARD_COUNT};

pub const DEFAULT_PORT: u16 = 6503;
pub const DEFAULT_EVENT_BUFFER: usize = 256;

#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Port for the webserver
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Number of state shards (subjects are spread over these by hash)
    #[arg(long, default_value_t = DEFAULT_SHARD_COUNT)]
    pub shards: usize,

    /// Meters beyond a geofence radius a subject may drift before exiting
    #[arg(long, default_value_t = 0.0)]
    pub hysteresis: f64,

    /// Events buffered per WebSocket client before it starts skipping
    #[arg(long, default_value_t = DEFAULT_EVENT_BUFFER)]
    pub event_buffer: usize,

    /// Evaluate input without rejecting empty subjects or non-finite coordinates
    #[arg(long)]
    pub no_validate: bool,
}

/// Settings the server runs with
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub shards: usize,
    pub event_buffer: usize,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: DEFAULT_PORT,
            shards: DEFAULT_SHARD_COUNT,
            event_buffer: DEFAULT_EVENT_BUFFER,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), GeofenceError> {
        self.engine.validate()?;
        if self.shards == 0 {
            return Err(GeofenceError::InvalidConfig(
                "--shards must be at least 1".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(GeofenceError::InvalidConfig(
                "--event-buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl TryFrom<&Cli> for ServerConfig {
    type Error = GeofenceError;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        let config = ServerConfig {
            port: cli.port,
            shards: cli.shards,
            event_buffer: cli.event_buffer,
            engine: EngineConfig {
                hysteresis_meters: cli.hysteresis,
                validate_input: !cli.no_validate,
            },
        };
        config.validate()?;
        Ok(config)
    }
}
