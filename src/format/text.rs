//! Colorized single-line text format:
//!
//! ```text
//! Jan  2 15:04:05 INFO message key=value group.key=value
//! ```

use super::{
    append_duration, append_float, append_int, append_marshaled, append_time, level_color,
    Formatter, FormatterState, DATE_TIME, EMPTY_KEY, EMPTY_VALUE, FAINT, RESET, STAMP, UNHANDLED,
};
use crate::attr::{Attr, Value};
use crate::escape::{decode_char, is_safe};
use crate::record::Record;
use std::io::Write;
use std::sync::Arc;

/// Text formatter; groups flatten into dot-joined key prefixes.
#[derive(Debug, Clone, Copy)]
pub struct TextFormatter {
    colors: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self { colors: true }
    }
}

/// Group path of an attribute, built on the stack while walking nested
/// groups.
#[derive(Clone, Copy)]
enum Prefix<'a> {
    /// Already dot-terminated prefix from `with_group`.
    Root(&'a str),
    Group(&'a Prefix<'a>, &'a str),
}

impl Prefix<'_> {
    fn write(&self, buf: &mut Vec<u8>) {
        match self {
            Prefix::Root(path) => buf.extend_from_slice(path.as_bytes()),
            Prefix::Group(parent, name) => {
                parent.write(buf);
                buf.extend_from_slice(name.as_bytes());
                buf.push(b'.');
            }
        }
    }
}

impl TextFormatter {
    pub fn new(colors: bool) -> Self {
        Self { colors }
    }

    #[inline]
    fn color(&self, buf: &mut Vec<u8>, code: &str) {
        if self.colors {
            buf.extend_from_slice(code.as_bytes());
        }
    }

    fn append_attr(&self, buf: &mut Vec<u8>, prefix: &Prefix<'_>, attr: &Attr) {
        if attr.is_empty() {
            return;
        }
        let value = attr.value.resolve();

        // Nested groups flatten to "prefix.key".
        if let Value::Group(attrs) = value.as_ref() {
            if attr.key.is_empty() {
                for child in attrs {
                    self.append_attr(buf, prefix, child);
                }
            } else {
                let nested = Prefix::Group(prefix, &attr.key);
                for child in attrs {
                    self.append_attr(buf, &nested, child);
                }
            }
            return;
        }

        buf.push(b' ');
        self.color(buf, FAINT);
        prefix.write(buf);
        if attr.key.is_empty() {
            buf.extend_from_slice(EMPTY_KEY.as_bytes());
        } else {
            buf.extend_from_slice(attr.key.as_bytes());
        }
        buf.push(b'=');
        self.write_value(buf, value.as_ref());
        self.color(buf, RESET);
    }

    fn write_value(&self, buf: &mut Vec<u8>, value: &Value) {
        match value {
            Value::String(s) => append_string(buf, s),
            Value::Int64(n) => append_int(buf, n),
            Value::Uint64(n) => append_int(buf, n),
            Value::Float64(f) => append_float(buf, *f),
            Value::Bool(b) => buf.extend_from_slice(if *b { "true" } else { "false" }.as_bytes()),
            Value::Duration(d) => append_duration(buf, *d),
            Value::Time(t) => append_time(buf, t, DATE_TIME),
            Value::Any(any) => match any.as_error() {
                Some(err) => append_string(buf, &err.to_string()),
                None => append_marshaled(buf, any.as_ref(), false),
            },
            Value::Empty => buf.extend_from_slice(EMPTY_VALUE.as_bytes()),
            Value::Group(_) | Value::Lazy(_) => buf.extend_from_slice(UNHANDLED.as_bytes()),
        }
    }
}

fn append_string(buf: &mut Vec<u8>, s: &str) {
    if s.is_empty() {
        buf.extend_from_slice(EMPTY_VALUE.as_bytes());
    } else if needs_quoting(s) {
        let _ = write!(buf, "{:?}", s);
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

/// Whether a value must be quoted to stay a single `key=value` token.
pub(crate) fn needs_quoting(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b < 0x80 {
            if b != b'\\' && (b == b' ' || b == b'=' || !is_safe(b)) {
                return true;
            }
            i += 1;
            continue;
        }
        match decode_char(&bytes[i..]) {
            Some((c, size)) => {
                // Debug escapes exactly the non-printable chars.
                if c == char::REPLACEMENT_CHARACTER || c.escape_debug().next() == Some('\\') {
                    return true;
                }
                i += size;
            }
            None => return true,
        }
    }
    false
}

impl Formatter for TextFormatter {
    fn build_log(&self, buf: &mut Vec<u8>, record: &Record, ctx_attrs: &[Attr], state: &FormatterState) {
        self.color(buf, FAINT);
        append_time(buf, &record.timestamp, STAMP);
        self.color(buf, RESET);
        buf.push(b' ');

        self.color(buf, level_color(record.level));
        buf.extend_from_slice(record.level.code().as_bytes());
        self.color(buf, RESET);
        buf.push(b' ');

        buf.extend_from_slice(record.message.as_bytes());

        // Context attributes are not part of any handler group.
        let root = Prefix::Root("");
        for attr in ctx_attrs {
            self.append_attr(buf, &root, attr);
        }

        buf.extend_from_slice(&state.precomputed);

        let prefix = Prefix::Root(&state.group_prefix);
        for attr in &record.attrs {
            self.append_attr(buf, &prefix, attr);
        }

        buf.push(b'\n');
    }

    fn with_attrs(&self, state: &FormatterState, attrs: &[Attr]) -> FormatterState {
        let mut precomputed = state.copy_precomputed(attrs.len() * 32);
        let prefix = Prefix::Root(&state.group_prefix);
        for attr in attrs {
            self.append_attr(&mut precomputed, &prefix, attr);
        }

        FormatterState {
            precomputed: Arc::from(precomputed),
            ..state.clone()
        }
    }

    fn with_group(&self, state: &FormatterState, name: &str) -> FormatterState {
        let mut prefix = String::with_capacity(state.group_prefix.len() + name.len() + 1);
        prefix.push_str(&state.group_prefix);
        prefix.push_str(name);
        prefix.push('.');

        FormatterState {
            group_prefix: Arc::from(prefix),
            ..state.clone()
        }
    }
}
