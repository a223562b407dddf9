use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A key/value pair attached to a record, or a named group of pairs.
///
/// `Attr::default()` (empty key, [`Value::Empty`]) is a sentinel meaning
/// "skip" and never produces output.
#[derive(Debug, Clone, Default)]
pub struct Attr {
    pub key: String,
    pub value: Value,
}

/// Typed attribute value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Empty,
    String(String),
    Int64(i64),
    Uint64(u64),
    Float64(f64),
    Bool(bool),
    Duration(Duration),
    Time(DateTime<Utc>),
    Group(Vec<Attr>),
    Any(Arc<dyn AnyValue>),
    Lazy(Arc<dyn LogValuer>),
}

/// An arbitrarily typed value rendered through JSON marshaling.
pub trait AnyValue: fmt::Debug + Send + Sync {
    /// Append the JSON encoding of the value to `buf`.
    ///
    /// On error `buf` may hold partial output; callers truncate it.
    fn marshal(&self, buf: &mut Vec<u8>) -> serde_json::Result<()>;

    /// The error capability, if the value is an error.
    fn as_error(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

/// A value computed at render time rather than at call time.
pub trait LogValuer: fmt::Debug + Send + Sync {
    fn log_value(&self) -> Value;
}

#[derive(Debug)]
struct Serialized<T>(T);

impl<T> AnyValue for Serialized<T>
where
    T: Serialize + fmt::Debug + Send + Sync,
{
    fn marshal(&self, buf: &mut Vec<u8>) -> serde_json::Result<()> {
        serde_json::to_writer(buf, &self.0)
    }
}

#[derive(Debug)]
struct ErrorValue<E>(E);

impl<E> AnyValue for ErrorValue<E>
where
    E: Error + Send + Sync + 'static,
{
    fn marshal(&self, buf: &mut Vec<u8>) -> serde_json::Result<()> {
        serde_json::to_writer(buf, &self.0.to_string())
    }

    fn as_error(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl Value {
    /// Wrap any serializable value; it is marshaled to JSON when rendered.
    pub fn any<T>(value: T) -> Self
    where
        T: Serialize + fmt::Debug + Send + Sync + 'static,
    {
        Value::Any(Arc::new(Serialized(value)))
    }

    /// Wrap an error; it renders as its message.
    pub fn error<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Value::Any(Arc::new(ErrorValue(err)))
    }

    pub fn lazy<V: LogValuer + 'static>(valuer: V) -> Self {
        Value::Lazy(Arc::new(valuer))
    }

    /// Resolve a lazy value with a single call-out.
    ///
    /// A valuer returning another lazy value is not followed further.
    pub fn resolve(&self) -> std::borrow::Cow<'_, Value> {
        match self {
            Value::Lazy(valuer) => std::borrow::Cow::Owned(valuer.log_value()),
            other => std::borrow::Cow::Borrowed(other),
        }
    }
}

impl Attr {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Attr {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Attr::new(key, Value::String(value.into()))
    }

    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Attr::new(key, Value::Int64(value))
    }

    pub fn uint(key: impl Into<String>, value: u64) -> Self {
        Attr::new(key, Value::Uint64(value))
    }

    pub fn float(key: impl Into<String>, value: f64) -> Self {
        Attr::new(key, Value::Float64(value))
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Attr::new(key, Value::Bool(value))
    }

    pub fn duration(key: impl Into<String>, value: Duration) -> Self {
        Attr::new(key, Value::Duration(value))
    }

    pub fn time(key: impl Into<String>, value: DateTime<Utc>) -> Self {
        Attr::new(key, Value::Time(value))
    }

    pub fn group(key: impl Into<String>, attrs: Vec<Attr>) -> Self {
        Attr::new(key, Value::Group(attrs))
    }

    pub fn any<T>(key: impl Into<String>, value: T) -> Self
    where
        T: Serialize + fmt::Debug + Send + Sync + 'static,
    {
        Attr::new(key, Value::any(value))
    }

    pub fn error<E>(key: impl Into<String>, err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Attr::new(key, Value::error(err))
    }

    /// True for the zero-valued sentinel attribute.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && matches!(self.value, Value::Empty)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

impl From<Vec<Attr>> for Value {
    fn from(v: Vec<Attr>) -> Self {
        Value::Group(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Port(u16);

    impl LogValuer for Port {
        fn log_value(&self) -> Value {
            Value::Int64(self.0 as i64)
        }
    }

    #[test]
    fn default_attr_is_skip_sentinel() {
        assert!(Attr::default().is_empty());
        assert!(!Attr::string("", "x").is_empty());
        assert!(!Attr::new("k", Value::Empty).is_empty());
    }

    #[test]
    fn resolve_calls_valuer_once() {
        let value = Value::lazy(Port(8080));
        assert!(matches!(value.resolve().as_ref(), Value::Int64(8080)));
    }

    #[test]
    fn error_value_exposes_error_capability() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let Value::Any(any) = Value::error(err) else {
            panic!("expected any value");
        };
        assert_eq!(any.as_error().map(|e| e.to_string()), Some("boom".into()));
    }

    #[test]
    fn serialized_value_marshals_json() {
        let Value::Any(any) = Value::any(vec![1, 2, 3]) else {
            panic!("expected any value");
        };
        let mut buf = Vec::new();
        any.marshal(&mut buf).unwrap();
        assert_eq!(buf, b"[1,2,3]");
        assert!(any.as_error().is_none());
    }
}
