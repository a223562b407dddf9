use crate::level::Level;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Handler configuration.
///
/// **Fields**
/// - `level`: minimum level accepted by `enabled`.
/// - `buffered_output`: write through an internal buffer flushed by a
///   background task instead of issuing one write per record.
/// - `buffer_size`: size of the internal buffer in bytes.
/// - `flush_interval`: period of the background flush; in serialized
///   form it is given in milliseconds.
/// - `max_pool_buffer_size`: per-record buffers that grew beyond this
///   capacity are dropped instead of going back to the pool.
/// - `colors`: emit ANSI colors in the text format.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub level: Level,
    pub buffered_output: bool,
    pub buffer_size: usize,
    #[serde(rename = "flush_interval_ms", deserialize_with = "millis")]
    pub flush_interval: Duration,
    pub max_pool_buffer_size: usize,
    pub colors: bool,
}

pub const DEFAULT_BUFFER_SIZE: usize = 4096;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_MAX_POOL_BUFFER_SIZE: usize = 2048;

const MIN_BUFFER_SIZE: usize = 64;
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(10);

impl Default for Config {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            buffered_output: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            max_pool_buffer_size: DEFAULT_MAX_POOL_BUFFER_SIZE,
            colors: true,
        }
    }
}

impl Config {
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn buffered(mut self) -> Self {
        self.buffered_output = true;
        self
    }

    pub fn without_colors(mut self) -> Self {
        self.colors = false;
        self
    }

    // Enforce minimal thresholds to avoid degenerate configs.
    pub(crate) fn normalized(mut self) -> Self {
        self.buffer_size = self.buffer_size.max(MIN_BUFFER_SIZE);
        self.flush_interval = self.flush_interval.max(MIN_FLUSH_INTERVAL);
        self
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.level, Level::INFO);
        assert!(!cfg.buffered_output);
        assert_eq!(cfg.buffer_size, 4096);
        assert_eq!(cfg.flush_interval, Duration::from_millis(250));
        assert_eq!(cfg.max_pool_buffer_size, 2048);
        assert!(cfg.colors);
    }

    #[test]
    fn deserializes_partial_config() {
        let cfg: Config = serde_json::from_str(
            r#"{"level":"debug","buffered_output":true,"flush_interval_ms":100}"#,
        )
        .unwrap();
        assert_eq!(cfg.level, Level::DEBUG);
        assert!(cfg.buffered_output);
        assert_eq!(cfg.flush_interval, Duration::from_millis(100));
        assert_eq!(cfg.buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn normalizes_degenerate_values() {
        let cfg = Config {
            buffer_size: 0,
            flush_interval: Duration::ZERO,
            ..Config::default()
        }
        .normalized();
        assert_eq!(cfg.buffer_size, 64);
        assert_eq!(cfg.flush_interval, Duration::from_millis(10));
    }
}
