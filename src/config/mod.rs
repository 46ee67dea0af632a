//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
    /// Allowed client origins for CORS (comma-separated); any origin when unset
    pub client_origin: Option<String>,

    /// Capacity of each session's outbound message queue
    pub outbound_queue: usize,
    /// Deadline for a single WebSocket send before the session is dropped
    pub send_timeout: Duration,
    /// Max inbound messages per second per session
    pub input_rate_limit: u32,

    /// Seed for the world RNG (random when unset)
    pub arena_seed: Option<u64>,
    /// Gameplay tuning
    pub arena: ArenaConfig,
}

/// Gameplay tuning for the arena simulation
#[derive(Clone, Debug)]
pub struct ArenaConfig {
    /// Playfield width in pixels
    pub width: f32,
    /// Playfield height in pixels
    pub height: f32,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Ship collision radius
    pub player_radius: f32,
    /// Fraction of the remaining distance to the target covered per tick
    pub player_gain: f32,
    /// Keep-out band along the playfield edges for spawn positions
    pub spawn_margin: f32,
    /// Smallest obstacle radius
    pub obstacle_min_radius: f32,
    /// Largest obstacle radius
    pub obstacle_max_radius: f32,
    /// Speed (pixels per tick) of a minimum-radius obstacle
    pub obstacle_base_speed: f32,
    /// Wall-clock time between obstacle spawns
    pub obstacle_spawn_interval: Duration,
    /// Simulated seconds between a decided round and the next one
    pub round_cooldown_secs: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            tick_rate: 60,
            player_radius: 15.0,
            player_gain: 0.4,
            spawn_margin: 100.0,
            obstacle_min_radius: 10.0,
            obstacle_max_radius: 40.0,
            obstacle_base_speed: 4.0,
            obstacle_spawn_interval: Duration::from_millis(500),
            round_cooldown_secs: 5.0,
        }
    }
}

impl ArenaConfig {
    /// Duration of one simulation tick
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }

    /// Simulated seconds covered by one tick
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Reject tuning the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("TICK_RATE must be positive"));
        }
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(ConfigError::Invalid("arena dimensions must be positive"));
        }
        if self.spawn_margin < 0.0
            || self.spawn_margin * 2.0 >= self.width
            || self.spawn_margin * 2.0 >= self.height
        {
            return Err(ConfigError::Invalid("SPAWN_MARGIN leaves no room to spawn"));
        }
        if !(self.player_gain > 0.0 && self.player_gain <= 1.0) {
            return Err(ConfigError::Invalid("PLAYER_GAIN must be in (0, 1]"));
        }
        if !(self.player_radius > 0.0) {
            return Err(ConfigError::Invalid("PLAYER_RADIUS must be positive"));
        }
        if !(self.obstacle_min_radius > 0.0) || self.obstacle_max_radius < self.obstacle_min_radius
        {
            return Err(ConfigError::Invalid(
                "obstacle radius range must be positive and ordered",
            ));
        }
        if !(self.obstacle_base_speed > 0.0) {
            return Err(ConfigError::Invalid("OBSTACLE_BASE_SPEED must be positive"));
        }
        if self.round_cooldown_secs < 0.0 {
            return Err(ConfigError::Invalid("ROUND_COOLDOWN_SECS must not be negative"));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT; fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8765".to_string()),
        };

        let defaults = ArenaConfig::default();
        let arena = ArenaConfig {
            width: parse_or(&lookup, "ARENA_WIDTH", defaults.width)?,
            height: parse_or(&lookup, "ARENA_HEIGHT", defaults.height)?,
            tick_rate: parse_or(&lookup, "TICK_RATE", defaults.tick_rate)?,
            player_radius: parse_or(&lookup, "PLAYER_RADIUS", defaults.player_radius)?,
            player_gain: parse_or(&lookup, "PLAYER_GAIN", defaults.player_gain)?,
            spawn_margin: parse_or(&lookup, "SPAWN_MARGIN", defaults.spawn_margin)?,
            obstacle_min_radius: parse_or(
                &lookup,
                "OBSTACLE_MIN_RADIUS",
                defaults.obstacle_min_radius,
            )?,
            obstacle_max_radius: parse_or(
                &lookup,
                "OBSTACLE_MAX_RADIUS",
                defaults.obstacle_max_radius,
            )?,
            obstacle_base_speed: parse_or(
                &lookup,
                "OBSTACLE_BASE_SPEED",
                defaults.obstacle_base_speed,
            )?,
            obstacle_spawn_interval: Duration::from_millis(parse_or(
                &lookup,
                "OBSTACLE_SPAWN_INTERVAL_MS",
                defaults.obstacle_spawn_interval.as_millis() as u64,
            )?),
            round_cooldown_secs: parse_or(
                &lookup,
                "ROUND_COOLDOWN_SECS",
                defaults.round_cooldown_secs,
            )?,
        };
        arena.validate()?;

        let outbound_queue: usize = parse_or(&lookup, "OUTBOUND_QUEUE", 64)?;
        if outbound_queue == 0 {
            return Err(ConfigError::Invalid("OUTBOUND_QUEUE must be positive"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: matches!(lookup("LOG_FORMAT").as_deref(), Some("json")),
            client_origin: lookup("CLIENT_ORIGIN").filter(|s| !s.trim().is_empty()),

            outbound_queue,
            send_timeout: Duration::from_millis(parse_or(&lookup, "SEND_TIMEOUT_MS", 250)?),
            input_rate_limit: parse_or(&lookup, "INPUT_RATE_LIMIT", 120)?,

            arena_seed: lookup("ARENA_SEED")
                .map(|v| {
                    v.parse::<u64>().map_err(|_| ConfigError::Malformed {
                        key: "ARENA_SEED",
                        value: v,
                    })
                })
                .transpose()?,
            arena,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Malformed { key, value }),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for environment variable {key}")]
    Malformed { key: &'static str, value: String },

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = assert_ok!(load(&[]));
        assert_eq!(config.server_addr.port(), 8765);
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert_eq!(config.arena.tick_rate, 60);
        assert_eq!(config.arena.obstacle_spawn_interval, Duration::from_millis(500));
        assert!(config.arena_seed.is_none());
    }

    #[test]
    fn port_takes_precedence_over_server_addr() {
        let config = assert_ok!(load(&[("PORT", "9000"), ("SERVER_ADDR", "127.0.0.1:1")]));
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn overrides_tuning() {
        let config = assert_ok!(load(&[
            ("TICK_RATE", "30"),
            ("OBSTACLE_BASE_SPEED", "6.5"),
            ("ARENA_SEED", "42"),
            ("LOG_FORMAT", "json"),
        ]));
        assert_eq!(config.arena.tick_rate, 30);
        assert_eq!(config.arena.obstacle_base_speed, 6.5);
        assert_eq!(config.arena_seed, Some(42));
        assert!(config.log_json);
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = assert_err!(load(&[("TICK_RATE", "fast")]));
        assert!(matches!(err, ConfigError::Malformed { key: "TICK_RATE", .. }));
    }

    #[test]
    fn rejects_inconsistent_tuning() {
        assert_err!(load(&[("TICK_RATE", "0")]));
        assert_err!(load(&[("PLAYER_GAIN", "1.5")]));
        assert_err!(load(&[("OBSTACLE_MIN_RADIUS", "50")]));
        assert_err!(load(&[("SPAWN_MARGIN", "400")]));
    }

    #[test]
    fn tick_timing_follows_rate() {
        let arena = ArenaConfig {
            tick_rate: 50,
            ..ArenaConfig::default()
        };
        assert_eq!(arena.tick_duration(), Duration::from_millis(20));
        assert!((arena.tick_delta() - 0.02).abs() < f32::EPSILON);
    }
}
