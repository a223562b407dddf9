//! Buffer-pooled structured log handler.
//!
//! A [`Handler`] renders [`Record`]s either as colorized text lines or as
//! single-line JSON documents, reusing per-record buffers from a shared
//! [`BufferPool`] and serializing only the final write to the sink.
//! Handlers derived with `with_attrs` / `with_group` share one sink and
//! render their accumulated attributes once, at derivation time.
//!
//! ```no_run
//! use slogpool::{Attr, Config, Level, LogContext, Record, TextHandler};
//!
//! let handler = TextHandler::text(std::io::stdout(), Config::default()).unwrap();
//! let http = handler.with_group("http").with_attrs(&[Attr::string("method", "GET")]);
//!
//! let record = Record::new(Level::INFO, "request served").add_attrs([Attr::int("status", 200)]);
//! http.handle(&LogContext::new(), &record).unwrap();
//! ```

pub mod attr;
pub mod config;
pub mod context;
pub mod error;
pub mod escape;
pub mod format;
pub mod handler;
pub mod init;
pub mod layer;
pub mod level;
pub mod memory;
pub mod pool;
pub mod record;
pub mod sink;

pub use attr::{AnyValue, Attr, LogValuer, Value};
pub use config::Config;
pub use context::LogContext;
pub use error::{HandlerError, Result};
pub use format::{Formatter, FormatterState, JsonFormatter, TextFormatter};
pub use handler::{Handler, JsonHandler, LogHandler, TextHandler};
pub use level::Level;
pub use memory::InMemoryWriter;
pub use pool::BufferPool;
pub use record::Record;
