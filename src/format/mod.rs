//! Rendering of records into wire bytes.
//!
//! A [`Formatter`] is stateless; everything a derived handler accumulates
//! through `with_attrs` / `with_group` lives in an immutable
//! [`FormatterState`] snapshot that the formatter turns into a new
//! snapshot on every derivation.

use crate::attr::{AnyValue, Attr};
use crate::level::Level;
use crate::record::Record;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

pub mod json;
pub mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

pub(crate) const EMPTY_KEY: &str = "!EMPTY_KEY";
pub(crate) const EMPTY_VALUE: &str = "!EMPTY_VALUE";
pub(crate) const EMPTY_MESSAGE: &str = "!EMPTY_MSG";
pub(crate) const ERR_MARSHAL: &str = "!ERR_MARSHAL";
pub(crate) const UNHANDLED: &str = "!UNHANDLED";

pub(crate) const RESET: &str = "\x1b[0m";
pub(crate) const FAINT: &str = "\x1b[2m";
const RED: &str = "\x1b[91m";
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const BLUE: &str = "\x1b[94m";

/// Layout used for attribute times and the JSON record time.
pub(crate) const DATE_TIME: &str = "%Y-%m-%d %H:%M:%S";
/// Layout used for the text record time, e.g. `Jan  2 15:04:05`.
pub(crate) const STAMP: &str = "%b %e %H:%M:%S";

/// Turns records into bytes and folds derivations into state snapshots.
pub trait Formatter: Send + Sync + 'static {
    /// Append one complete log line for `record` to `buf`.
    ///
    /// **Parameters**
    /// - `buf`: destination; only appended to.
    /// - `record`: the event being logged.
    /// - `ctx_attrs`: attributes carried by the call context, rendered
    ///   first and outside any group opened by `with_group`.
    /// - `state`: snapshot accumulated by the handler's derivations.
    fn build_log(&self, buf: &mut Vec<u8>, record: &Record, ctx_attrs: &[Attr], state: &FormatterState);

    /// Snapshot with `attrs` rendered after the existing precomputed bytes.
    fn with_attrs(&self, state: &FormatterState, attrs: &[Attr]) -> FormatterState;

    /// Snapshot with one more group level opened.
    fn with_group(&self, state: &FormatterState, name: &str) -> FormatterState;
}

/// Accumulated prefix state of one derived handler.
///
/// Never mutated after construction: derivations copy the precomputed
/// bytes into a fresh allocation before appending, so siblings derived
/// from the same parent cannot see each other's bytes.
#[derive(Debug, Clone)]
pub struct FormatterState {
    pub(crate) precomputed: Arc<[u8]>,
    /// Dot-terminated group path, e.g. `http.server.` (text).
    pub(crate) group_prefix: Arc<str>,
    /// Number of objects opened in `precomputed` (JSON).
    pub(crate) depth: usize,
    /// Trailing opened groups that have no member yet (JSON).
    pub(crate) pending_groups: usize,
    /// Offset in `precomputed` where the first pending group starts.
    pub(crate) pending_start: usize,
}

impl Default for FormatterState {
    fn default() -> Self {
        Self {
            precomputed: Arc::from(Vec::new()),
            group_prefix: Arc::from(""),
            depth: 0,
            pending_groups: 0,
            pending_start: 0,
        }
    }
}

impl FormatterState {
    pub fn precomputed(&self) -> &[u8] {
        &self.precomputed
    }

    pub fn group_prefix(&self) -> &str {
        &self.group_prefix
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Fresh buffer holding a copy of the precomputed bytes.
    pub(crate) fn copy_precomputed(&self, extra: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.precomputed.len() + extra);
        buf.extend_from_slice(&self.precomputed);
        buf
    }
}

pub(crate) fn level_color(level: Level) -> &'static str {
    match level {
        Level::DEBUG => BLUE,
        Level::INFO => GREEN,
        Level::WARN => YELLOW,
        Level::ERROR => RED,
        _ => "",
    }
}

pub(crate) fn append_time(buf: &mut Vec<u8>, time: &DateTime<Utc>, layout: &str) {
    // Writing into a Vec cannot fail.
    let _ = write!(buf, "{}", time.format(layout));
}

pub(crate) fn append_int<T: std::fmt::Display>(buf: &mut Vec<u8>, n: T) {
    let _ = write!(buf, "{}", n);
}

/// Shortest decimal form without exponent; non-finite values as
/// `NaN`, `+Inf`, `-Inf`.
pub(crate) fn append_float(buf: &mut Vec<u8>, f: f64) {
    if f.is_nan() {
        buf.extend_from_slice(b"NaN");
    } else if f.is_infinite() {
        buf.extend_from_slice(if f > 0.0 { b"+Inf" } else { b"-Inf" });
    } else {
        let _ = write!(buf, "{}", f);
    }
}

/// Human form of a duration: `0s`, `750ns`, `1.5\u{b5}s`, `15ms`, `2m0s`,
/// `1h2m3.5s`.
pub(crate) fn append_duration(buf: &mut Vec<u8>, d: Duration) {
    const MICRO: u128 = 1_000;
    const MILLI: u128 = 1_000_000;
    const SECOND: u128 = 1_000_000_000;

    let nanos = d.as_nanos();
    if nanos == 0 {
        buf.extend_from_slice(b"0s");
    } else if nanos < MICRO {
        append_int(buf, nanos);
        buf.extend_from_slice(b"ns");
    } else if nanos < MILLI {
        append_fraction(buf, nanos, MICRO, 3);
        buf.extend_from_slice("\u{b5}s".as_bytes());
    } else if nanos < SECOND {
        append_fraction(buf, nanos, MILLI, 6);
        buf.extend_from_slice(b"ms");
    } else {
        let secs = nanos / SECOND;
        let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
        if hours > 0 {
            append_int(buf, hours);
            buf.push(b'h');
        }
        if hours > 0 || minutes > 0 {
            append_int(buf, minutes);
            buf.push(b'm');
        }
        append_fraction(buf, seconds * SECOND + nanos % SECOND, SECOND, 9);
        buf.push(b's');
    }
}

fn append_fraction(buf: &mut Vec<u8>, value: u128, unit: u128, width: usize) {
    append_int(buf, value / unit);
    let rem = value % unit;
    if rem == 0 {
        return;
    }
    buf.push(b'.');
    let start = buf.len();
    let _ = write!(buf, "{:0width$}", rem, width = width);
    while buf.len() > start && buf.last() == Some(&b'0') {
        buf.pop();
    }
}

/// Marshal an arbitrary value, replacing partial output with the error
/// token if marshaling fails or produces nothing.
pub(crate) fn append_marshaled(buf: &mut Vec<u8>, value: &dyn AnyValue, quote_token: bool) {
    let mark = buf.len();
    if value.marshal(buf).is_err() || buf.len() == mark {
        buf.truncate(mark);
        if quote_token {
            buf.push(b'"');
            buf.extend_from_slice(ERR_MARSHAL.as_bytes());
            buf.push(b'"');
        } else {
            buf.extend_from_slice(ERR_MARSHAL.as_bytes());
        }
    }
}
