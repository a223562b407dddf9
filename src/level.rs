use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Severity of a log record.
///
/// Ordered so that `DEBUG < INFO < WARN < ERROR`. Values between the named
/// levels are allowed and render relative to the closest named level below
/// them, e.g. `Level(2)` is `INFO+2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "LevelRepr")]
pub struct Level(pub i8);

impl Level {
    pub const DEBUG: Level = Level(-4);
    pub const INFO: Level = Level(0);
    pub const WARN: Level = Level(4);
    pub const ERROR: Level = Level(8);

    /// The named level at or below `self`, plus the offset from it.
    fn base(self) -> (Level, i16) {
        let base = if self >= Level::ERROR {
            Level::ERROR
        } else if self >= Level::WARN {
            Level::WARN
        } else if self >= Level::INFO {
            Level::INFO
        } else {
            Level::DEBUG
        };
        (base, self.0 as i16 - base.0 as i16)
    }

    /// Four-letter code used by the text format.
    pub fn code(self) -> &'static str {
        match self.base().0 {
            Level::DEBUG => "DEBU",
            Level::INFO => "INFO",
            Level::WARN => "WARN",
            _ => "ERRO",
        }
    }

    fn base_name(self) -> &'static str {
        match self {
            Level::DEBUG => "DEBUG",
            Level::INFO => "INFO",
            Level::WARN => "WARN",
            _ => "ERROR",
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::INFO
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (base, offset) = self.base();
        match offset {
            0 => f.write_str(base.base_name()),
            n if n > 0 => write!(f, "{}+{}", base.base_name(), n),
            n => write!(f, "{}{}", base.base_name(), n),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown log level: {0:?}")]
pub struct ParseLevelError(String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseLevelError(s.to_string());
        let trimmed = s.trim();

        if let Ok(n) = trimmed.parse::<i8>() {
            return Ok(Level(n));
        }

        let (name, offset) = match trimmed.find(|c| c == '+' || c == '-') {
            Some(idx) => {
                let offset: i16 = trimmed[idx..]
                    .trim_start_matches('+')
                    .parse()
                    .map_err(|_| err())?;
                (&trimmed[..idx], offset)
            }
            None => (trimmed, 0),
        };

        let base = match name.to_ascii_lowercase().as_str() {
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" | "warning" => Level::WARN,
            "error" => Level::ERROR,
            _ => return Err(err()),
        };

        (base.0 as i16)
            .checked_add(offset)
            .and_then(|n| i8::try_from(n).ok())
            .map(Level)
            .ok_or_else(err)
    }
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level(Level::DEBUG.0 - 4),
            tracing::Level::DEBUG => Level::DEBUG,
            tracing::Level::INFO => Level::INFO,
            tracing::Level::WARN => Level::WARN,
            tracing::Level::ERROR => Level::ERROR,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LevelRepr {
    Int(i8),
    Name(String),
}

impl TryFrom<LevelRepr> for Level {
    type Error = ParseLevelError;

    fn try_from(repr: LevelRepr) -> Result<Self, Self::Error> {
        match repr {
            LevelRepr::Int(n) => Ok(Level(n)),
            LevelRepr::Name(name) => name.parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn named_levels_are_ordered() {
        assert!(Level::DEBUG < Level::INFO);
        assert!(Level::INFO < Level::WARN);
        assert!(Level::WARN < Level::ERROR);
    }

    #[rstest]
    #[case(Level::DEBUG, "DEBU", "DEBUG")]
    #[case(Level::INFO, "INFO", "INFO")]
    #[case(Level::WARN, "WARN", "WARN")]
    #[case(Level::ERROR, "ERRO", "ERROR")]
    #[case(Level(2), "INFO", "INFO+2")]
    #[case(Level(-6), "DEBU", "DEBUG-2")]
    #[case(Level(12), "ERRO", "ERROR+4")]
    fn renders_code_and_name(#[case] level: Level, #[case] code: &str, #[case] name: &str) {
        assert_eq!(level.code(), code);
        assert_eq!(level.to_string(), name);
    }

    #[rstest]
    #[case("debug", Level::DEBUG)]
    #[case("INFO", Level::INFO)]
    #[case("Warning", Level::WARN)]
    #[case("error", Level::ERROR)]
    #[case("info+2", Level(2))]
    #[case("DEBUG-2", Level(-6))]
    #[case("8", Level::ERROR)]
    fn parses_names_and_offsets(#[case] input: &str, #[case] expected: Level) {
        assert_eq!(input.parse::<Level>(), Ok(expected));
    }

    #[test]
    fn rejects_garbage() {
        assert!("verbose".parse::<Level>().is_err());
        assert!("info+x".parse::<Level>().is_err());
    }

    #[test]
    fn deserializes_from_string_or_int() {
        let level: Level = serde_json::from_str("\"warn\"").unwrap();
        assert_eq!(level, Level::WARN);
        let level: Level = serde_json::from_str("-4").unwrap();
        assert_eq!(level, Level::DEBUG);
    }

    #[test]
    fn maps_tracing_levels() {
        assert_eq!(Level::from(tracing::Level::ERROR), Level::ERROR);
        assert!(Level::from(tracing::Level::TRACE) < Level::DEBUG);
    }
}
