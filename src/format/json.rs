//! Single-line JSON format:
//!
//! ```text
//! {"time":"2024-01-02 15:04:05","level":"INFO","msg":"message","key":"value"}
//! ```

use super::{
    append_float, append_int, append_marshaled, append_time, Formatter, FormatterState, DATE_TIME,
    EMPTY_KEY, EMPTY_MESSAGE, EMPTY_VALUE, UNHANDLED,
};
use crate::attr::{Attr, Value};
use crate::escape::append_escaped_str;
use crate::record::Record;
use std::io::Write;
use std::sync::Arc;

/// JSON formatter; groups become nested objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

/// A member may follow the last byte written without a separator only
/// right after an opening brace/bracket or an existing comma.
#[inline]
fn needs_comma(buf: &[u8]) -> bool {
    !matches!(buf.last(), None | Some(b'{' | b',' | b'['))
}

fn append_quoted(buf: &mut Vec<u8>, s: &str, placeholder: &str) {
    buf.push(b'"');
    if s.is_empty() {
        buf.extend_from_slice(placeholder.as_bytes());
    } else {
        append_escaped_str(buf, s);
    }
    buf.push(b'"');
}

impl JsonFormatter {
    fn append_attr(&self, buf: &mut Vec<u8>, attr: &Attr) {
        if attr.is_empty() {
            return;
        }
        let value = attr.value.resolve();

        if let Value::Group(attrs) = value.as_ref() {
            if attr.key.is_empty() {
                // Unnamed groups inline their members.
                for child in attrs {
                    self.append_attr(buf, child);
                }
                return;
            }

            let mark = buf.len();
            if needs_comma(buf) {
                buf.push(b',');
            }
            buf.push(b'"');
            append_escaped_str(buf, &attr.key);
            buf.extend_from_slice(b"\":{");

            let body = buf.len();
            for child in attrs {
                self.append_attr(buf, child);
            }
            if buf.len() == body {
                // Empty groups are omitted entirely.
                buf.truncate(mark);
            } else {
                buf.push(b'}');
            }
            return;
        }

        if needs_comma(buf) {
            buf.push(b',');
        }
        append_quoted(buf, &attr.key, EMPTY_KEY);
        buf.push(b':');
        self.write_value(buf, value.as_ref());
    }

    fn write_value(&self, buf: &mut Vec<u8>, value: &Value) {
        match value {
            Value::String(s) => append_quoted(buf, s, EMPTY_VALUE),
            Value::Int64(n) => append_int(buf, n),
            Value::Uint64(n) => append_int(buf, n),
            Value::Float64(f) if f.is_finite() => append_float(buf, *f),
            Value::Float64(f) => {
                buf.push(b'"');
                append_float(buf, *f);
                buf.push(b'"');
            }
            Value::Bool(b) => buf.extend_from_slice(if *b { "true" } else { "false" }.as_bytes()),
            Value::Duration(d) => append_int(buf, d.as_nanos()),
            Value::Time(t) => {
                buf.push(b'"');
                append_time(buf, t, DATE_TIME);
                buf.push(b'"');
            }
            Value::Any(any) => match any.as_error() {
                Some(err) => append_quoted(buf, &err.to_string(), EMPTY_VALUE),
                None => append_marshaled(buf, any.as_ref(), true),
            },
            Value::Empty => append_quoted(buf, EMPTY_VALUE, EMPTY_VALUE),
            Value::Group(_) | Value::Lazy(_) => append_quoted(buf, UNHANDLED, UNHANDLED),
        }
    }
}

impl Formatter for JsonFormatter {
    fn build_log(&self, buf: &mut Vec<u8>, record: &Record, ctx_attrs: &[Attr], state: &FormatterState) {
        buf.extend_from_slice(b"{\"time\":\"");
        append_time(buf, &record.timestamp, DATE_TIME);
        buf.extend_from_slice(b"\",\"level\":\"");
        let _ = write!(buf, "{}", record.level);
        buf.extend_from_slice(b"\",\"msg\":");
        append_quoted(buf, &record.message, EMPTY_MESSAGE);

        for attr in ctx_attrs {
            self.append_attr(buf, attr);
        }

        let mut open = state.depth;
        if state.precomputed.is_empty() {
            for attr in &record.attrs {
                self.append_attr(buf, attr);
            }
        } else {
            let mark = buf.len();
            if needs_comma(buf) {
                buf.push(b',');
            }
            let start = buf.len();
            buf.extend_from_slice(&state.precomputed);
            let end = buf.len();

            for attr in &record.attrs {
                self.append_attr(buf, attr);
            }

            // Groups opened by with_group that never received a member.
            if state.pending_groups > 0 && buf.len() == end {
                if state.pending_start == 0 {
                    buf.truncate(mark);
                } else {
                    buf.truncate(start + state.pending_start);
                }
                open -= state.pending_groups;
            }
        }

        for _ in 0..open {
            buf.push(b'}');
        }
        buf.extend_from_slice(b"}\n");
    }

    fn with_attrs(&self, state: &FormatterState, attrs: &[Attr]) -> FormatterState {
        let mut precomputed = state.copy_precomputed(attrs.len() * 32);
        let before = precomputed.len();
        for attr in attrs {
            self.append_attr(&mut precomputed, attr);
        }
        let wrote = precomputed.len() > before;

        FormatterState {
            precomputed: Arc::from(precomputed),
            pending_groups: if wrote { 0 } else { state.pending_groups },
            pending_start: if wrote { 0 } else { state.pending_start },
            ..state.clone()
        }
    }

    fn with_group(&self, state: &FormatterState, name: &str) -> FormatterState {
        let mut precomputed = state.copy_precomputed(name.len() + 8);
        let start = precomputed.len();
        if needs_comma(&precomputed) {
            precomputed.push(b',');
        }
        precomputed.push(b'"');
        append_escaped_str(&mut precomputed, name);
        precomputed.extend_from_slice(b"\":{");

        FormatterState {
            precomputed: Arc::from(precomputed),
            depth: state.depth + 1,
            pending_groups: state.pending_groups + 1,
            pending_start: if state.pending_groups == 0 {
                start
            } else {
                state.pending_start
            },
            ..state.clone()
        }
    }
}
