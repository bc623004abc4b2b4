//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::combat::CombatMode;
use crate::game::physics::{Arena, Wall};
use crate::game::GameConfig;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma-separated; any origin when unset
    pub client_origin: Option<String>,
    /// Outbound frames buffered per session
    pub session_queue: usize,
    /// Simulation settings
    pub game: GameConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        };

        let defaults = GameConfig::default();
        let arena = Arena {
            width: positive_extent("ARENA_WIDTH", parse_var("ARENA_WIDTH", defaults.arena.width)?)?,
            height: positive_extent(
                "ARENA_HEIGHT",
                parse_var("ARENA_HEIGHT", defaults.arena.height)?,
            )?,
        };

        let tick_ms: u64 = parse_var("TICK_MS", defaults.tick.as_millis() as u64)?;
        if tick_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "TICK_MS",
                value: tick_ms.to_string(),
            });
        }

        let walls = match env::var("WALLS") {
            Ok(raw) => parse_walls(&raw)?,
            Err(_) => Vec::new(),
        };

        let seed = match env::var("WORLD_SEED") {
            Ok(raw) => parse_value("WORLD_SEED", &raw)?,
            Err(_) => rand::random(),
        };

        let game = GameConfig {
            tick: Duration::from_millis(tick_ms),
            mode: parse_var("COMBAT_MODE", defaults.mode)?,
            spawn_point: (arena.width / 2.0, arena.height / 2.0),
            arena,
            walls,
            enemy_cap: parse_var("ENEMY_CAP", defaults.enemy_cap)?,
            enemy_spawn_every: Duration::from_secs(parse_var(
                "ENEMY_SPAWN_SECS",
                defaults.enemy_spawn_every.as_secs(),
            )?),
            drop_ttl: Duration::from_secs(parse_var("DROP_TTL_SECS", defaults.drop_ttl.as_secs())?),
            max_missed_sends: parse_var("MAX_MISSED_SENDS", defaults.max_missed_sends)?,
            seed,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(server_addr))?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|s| !s.trim().is_empty()),
            session_queue: parse_var("SESSION_QUEUE", 64usize)?.max(1),
            game,
        })
    }
}

/// Read an optional variable, falling back to `default` when unset
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

/// Accept only finite, strictly positive sizes
fn positive_extent(name: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
    }
}

/// Parse `x,y,w,h;x,y,w,h;...` into wall rectangles
pub fn parse_walls(raw: &str) -> Result<Vec<Wall>, ConfigError> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<f32> = entry
                .split(',')
                .map(|n| parse_value("WALLS", n))
                .collect::<Result<_, _>>()?;
            match parts.as_slice() {
                &[x, y, width, height]
                    if x.is_finite()
                        && y.is_finite()
                        && width.is_finite()
                        && height.is_finite()
                        && width > 0.0
                        && height > 0.0 =>
                {
                    Ok(Wall {
                        x,
                        y,
                        width,
                        height,
                    })
                }
                _ => Err(ConfigError::Invalid {
                    name: "WALLS",
                    value: entry.to_string(),
                }),
            }
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("Invalid server address format: {0}")]
    InvalidAddress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wall_list() {
        let walls = parse_walls("100,100,50,200; 400,0,10,10;").unwrap();
        assert_eq!(walls.len(), 2);
        assert_eq!(walls[0].x, 100.0);
        assert_eq!(walls[0].height, 200.0);
        assert_eq!(walls[1].width, 10.0);
    }

    #[test]
    fn rejects_malformed_walls() {
        assert!(matches!(
            parse_walls("1,2,3"),
            Err(ConfigError::Invalid { name: "WALLS", .. })
        ));
        assert!(parse_walls("1,2,a,4").is_err());
        assert!(parse_walls("1,2,0,4").is_err());
        assert!(parse_walls("").unwrap().is_empty());
    }

    #[test]
    fn rejects_non_finite_sizes() {
        let width: f32 = parse_value("ARENA_WIDTH", "nan").unwrap();
        assert!(matches!(
            positive_extent("ARENA_WIDTH", width),
            Err(ConfigError::Invalid { name: "ARENA_WIDTH", .. })
        ));
        let height: f32 = parse_value("ARENA_HEIGHT", "inf").unwrap();
        assert!(positive_extent("ARENA_HEIGHT", height).is_err());
        assert!(positive_extent("ARENA_WIDTH", -5.0).is_err());
        assert_eq!(positive_extent("ARENA_WIDTH", 800.0).unwrap(), 800.0);

        assert!(parse_walls("nan,0,10,10").is_err());
        assert!(parse_walls("0,0,inf,10").is_err());
    }

    #[test]
    fn parses_values_with_whitespace() {
        assert_eq!(parse_value::<u32>("ENEMY_CAP", " 12 ").unwrap(), 12);
        assert_eq!(
            parse_value::<CombatMode>("COMBAT_MODE", "ranged").unwrap(),
            CombatMode::Ranged
        );
        assert!(parse_value::<u64>("TICK_MS", "fast").is_err());
    }
}
