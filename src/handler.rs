use crate::attr::Attr;
use crate::config::Config;
use crate::context::LogContext;
use crate::error::Result;
use crate::format::{Formatter, FormatterState, JsonFormatter, TextFormatter};
use crate::level::Level;
use crate::pool::BufferPool;
use crate::record::Record;
use crate::sink::SinkState;
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;

/// Capabilities a logging front-end needs from a handler.
///
/// Object safe, so front-ends can hold an `Arc<dyn LogHandler>` without
/// knowing the output format.
#[async_trait]
pub trait LogHandler: Send + Sync {
    /// Whether a record at `level` would be written.
    fn enabled(&self, level: Level) -> bool;

    /// Format and write one record.
    ///
    /// **Parameters**
    /// - `ctx`: attributes attached to this call only.
    /// - `record`: the event.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was written, or dropped because the
    ///   handler is closed.
    /// - `Err(HandlerError::Io)` with the destination's error otherwise;
    ///   the write is not retried.
    fn handle(&self, ctx: &LogContext, record: &Record) -> Result<()>;

    fn with_attrs(&self, attrs: &[Attr]) -> Arc<dyn LogHandler>;

    fn with_group(&self, name: &str) -> Arc<dyn LogHandler>;

    /// Stop background flushing and flush the internal buffer.
    async fn close(&self) -> Result<()>;
}

/// Handler generic over its output format.
///
/// Cloning is cheap: the sink state is shared by reference and the
/// formatter state is an immutable snapshot.
pub struct Handler<F: Formatter> {
    formatter: Arc<F>,
    shared: Arc<SinkState>,
    state: FormatterState,
    level: Level,
    max_pool_buffer_size: usize,
}

/// Colorized text handler.
pub type TextHandler = Handler<TextFormatter>;

/// Single-line JSON handler.
pub type JsonHandler = Handler<JsonFormatter>;

impl<F: Formatter> Clone for Handler<F> {
    fn clone(&self) -> Self {
        Self {
            formatter: Arc::clone(&self.formatter),
            shared: Arc::clone(&self.shared),
            state: self.state.clone(),
            level: self.level,
            max_pool_buffer_size: self.max_pool_buffer_size,
        }
    }
}

impl TextHandler {
    pub fn text(writer: impl Write + Send + 'static, config: Config) -> Result<Self> {
        let formatter = TextFormatter::new(config.colors);
        Handler::new(writer, formatter, config)
    }
}

impl JsonHandler {
    pub fn json(writer: impl Write + Send + 'static, config: Config) -> Result<Self> {
        Handler::new(writer, JsonFormatter, config)
    }
}

impl<F: Formatter> Handler<F> {
    /// Create a root handler writing to `writer`.
    ///
    /// **Returns**
    /// - `Err(HandlerError::NoRuntime)` if `config.buffered_output` is set
    ///   and no Tokio runtime is running.
    pub fn new(writer: impl Write + Send + 'static, formatter: F, config: Config) -> Result<Self> {
        let config = config.normalized();
        let shared = SinkState::new(Box::new(writer), &config)?;

        Ok(Self {
            formatter: Arc::new(formatter),
            shared,
            state: FormatterState::default(),
            level: config.level,
            max_pool_buffer_size: config.max_pool_buffer_size,
        })
    }

    /// Create a root handler writing to standard error.
    pub fn stderr(formatter: F, config: Config) -> Result<Self> {
        Self::new(std::io::stderr(), formatter, config)
    }

    pub fn enabled(&self, level: Level) -> bool {
        if self.shared.is_closed() {
            return false;
        }
        level >= self.level
    }

    pub fn handle(&self, ctx: &LogContext, record: &Record) -> Result<()> {
        if self.shared.is_closed() {
            return Ok(());
        }

        let pool = BufferPool::global();
        let mut buf = pool.acquire();

        // Format outside the lock; only the write is serialized.
        self.formatter
            .build_log(&mut buf, record, ctx.attrs(), &self.state);
        let res = self.shared.write(&buf);

        pool.release(buf, self.max_pool_buffer_size);
        res.map_err(Into::into)
    }

    /// Derive a handler with `attrs` rendered once and reused on every
    /// record. Returns a plain clone when `attrs` is empty.
    pub fn with_attrs(&self, attrs: &[Attr]) -> Self {
        if attrs.is_empty() {
            return self.clone();
        }
        Self {
            state: self.formatter.with_attrs(&self.state, attrs),
            ..self.clone()
        }
    }

    /// Derive a handler whose later attributes live under group `name`.
    /// Returns a plain clone when `name` is empty.
    pub fn with_group(&self, name: &str) -> Self {
        if name.is_empty() {
            return self.clone();
        }
        Self {
            state: self.formatter.with_group(&self.state, name),
            ..self.clone()
        }
    }

    pub async fn close(&self) -> Result<()> {
        self.shared.close().await
    }

    /// Push buffered output to the destination without closing.
    pub fn flush(&self) -> Result<()> {
        self.shared.flush().map_err(Into::into)
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn formatter_state(&self) -> &FormatterState {
        &self.state
    }

    /// Whether `other` writes through the same sink state.
    pub fn shares_sink_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

#[async_trait]
impl<F: Formatter> LogHandler for Handler<F> {
    fn enabled(&self, level: Level) -> bool {
        Handler::enabled(self, level)
    }

    fn handle(&self, ctx: &LogContext, record: &Record) -> Result<()> {
        Handler::handle(self, ctx, record)
    }

    fn with_attrs(&self, attrs: &[Attr]) -> Arc<dyn LogHandler> {
        Arc::new(Handler::with_attrs(self, attrs))
    }

    fn with_group(&self, name: &str) -> Arc<dyn LogHandler> {
        Arc::new(Handler::with_group(self, name))
    }

    async fn close(&self) -> Result<()> {
        Handler::close(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::memory::InMemoryWriter;
    use rstest::rstest;

    fn plain() -> Config {
        Config::default().without_colors()
    }

    #[rstest]
    #[case(Level::DEBUG, false)]
    #[case(Level(-1), false)]
    #[case(Level::INFO, true)]
    #[case(Level::WARN, true)]
    #[case(Level::ERROR, true)]
    fn enabled_is_inclusive_threshold(#[case] level: Level, #[case] expected: bool) {
        let h = TextHandler::text(InMemoryWriter::new(), plain()).unwrap();
        assert_eq!(h.enabled(level), expected);
    }

    #[test]
    fn text_scenario() {
        let out = InMemoryWriter::new();
        let h = TextHandler::text(out.clone(), plain()).unwrap();
        let rec = Record::new(Level::INFO, "msg").add_attrs([Attr::string("user_id", "user_99")]);
        h.handle(&LogContext::new(), &rec).unwrap();

        let lines = out.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" INFO msg user_id=user_99"), "{}", lines[0]);
    }

    #[test]
    fn derived_handlers_share_the_sink() {
        let out = InMemoryWriter::new();
        let root = JsonHandler::json(out.clone(), plain()).unwrap();
        let child = root.with_group("g").with_attrs(&[Attr::int("a", 1)]);
        assert!(root.shares_sink_with(&child));

        root.handle(&LogContext::new(), &Record::new(Level::INFO, "root")).unwrap();
        child.handle(&LogContext::new(), &Record::new(Level::INFO, "child")).unwrap();

        let lines = out.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with(r#""msg":"child","g":{"a":1}}"#), "{}", lines[1]);
    }

    #[test]
    fn empty_derivations_keep_state() {
        let h = TextHandler::text(InMemoryWriter::new(), plain()).unwrap();
        let same = h.with_attrs(&[]).with_group("");
        assert!(same.formatter_state().precomputed().is_empty());
        assert!(same.formatter_state().group_prefix().is_empty());
    }

    #[tokio::test]
    async fn close_lifecycle() {
        let out = InMemoryWriter::new();
        let h = JsonHandler::json(out.clone(), plain().buffered()).unwrap();
        h.handle(&LogContext::new(), &Record::new(Level::WARN, "buffered")).unwrap();
        assert!(out.is_empty());

        h.close().await.unwrap();
        assert_eq!(out.lines().len(), 1);
        assert!(!h.enabled(Level::ERROR));

        // Closed handlers accept and drop records.
        h.handle(&LogContext::new(), &Record::new(Level::ERROR, "dropped")).unwrap();
        assert_eq!(out.lines().len(), 1);

        assert!(matches!(h.close().await, Err(HandlerError::AlreadyClosed)));
    }

    #[tokio::test]
    async fn close_unbuffered_is_an_error() {
        let h = TextHandler::text(InMemoryWriter::new(), plain()).unwrap();
        assert!(matches!(h.close().await, Err(HandlerError::NothingToClose)));
        assert!(h.enabled(Level::INFO));
    }

    #[test]
    fn write_errors_are_returned() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let h = TextHandler::text(Broken, plain()).unwrap();
        let err = h
            .handle(&LogContext::new(), &Record::new(Level::INFO, "x"))
            .unwrap_err();
        assert!(matches!(err, HandlerError::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn usable_as_trait_object() {
        let out = InMemoryWriter::new();
        let h: Arc<dyn LogHandler> = Arc::new(TextHandler::text(out.clone(), plain()).unwrap());
        let h = h.with_group("http").with_attrs(&[Attr::string("method", "GET")]);
        h.handle(&LogContext::new(), &Record::new(Level::INFO, "req")).unwrap();
        assert!(out.lines()[0].ends_with(" req http.method=GET"), "{:?}", out.lines());
    }
}
