use crate::config::Config;
use crate::error::{HandlerError, Result};
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Destination byte stream, optionally behind an internal buffer.
enum Destination {
    Direct(Box<dyn Write + Send>),
    Buffered(BufWriter<Box<dyn Write + Send>>),
}

/// State shared by a root handler and every handler derived from it.
///
/// Holds the only lock in the write path; formatting happens before it is
/// taken, so the critical section is just the copy into the destination.
pub struct SinkState {
    destination: Mutex<Destination>,
    buffered: bool,
    closed: AtomicBool,
    daemon: FlushDaemon,
}

// A poisoned lock only means another writer panicked mid-write; the
// destination itself is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SinkState {
    /// Create the shared state for `writer`.
    ///
    /// With `buffered_output` enabled the writer is wrapped in a buffer of
    /// `buffer_size` bytes and a flush daemon is spawned on the current
    /// Tokio runtime.
    ///
    /// **Returns**
    /// - `Err(HandlerError::NoRuntime)` if buffering is requested outside
    ///   a Tokio runtime.
    pub fn new(writer: Box<dyn Write + Send>, config: &Config) -> Result<Arc<Self>> {
        if !config.buffered_output {
            return Ok(Arc::new(SinkState {
                destination: Mutex::new(Destination::Direct(writer)),
                buffered: false,
                closed: AtomicBool::new(false),
                daemon: FlushDaemon::default(),
            }));
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| HandlerError::NoRuntime)?;
        let state = Arc::new(SinkState {
            destination: Mutex::new(Destination::Buffered(BufWriter::with_capacity(
                config.buffer_size,
                writer,
            ))),
            buffered: true,
            closed: AtomicBool::new(false),
            daemon: FlushDaemon::default(),
        });
        state
            .daemon
            .start(&runtime, Arc::downgrade(&state), config.flush_interval);

        Ok(state)
    }

    pub fn is_buffered(&self) -> bool {
        self.buffered
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Write one complete record.
    ///
    /// Once the state is closed a write that raced past the caller's open
    /// check is flushed through together with anything still buffered, so
    /// it is neither lost nor reordered ahead of earlier records.
    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut destination = lock(&self.destination);
        match &mut *destination {
            Destination::Direct(w) => w.write_all(bytes),
            Destination::Buffered(w) if self.is_closed() => {
                w.write_all(bytes)?;
                w.flush()
            }
            Destination::Buffered(w) => w.write_all(bytes),
        }
    }

    /// Push buffered bytes to the destination.
    pub fn flush(&self) -> io::Result<()> {
        lock(&self.destination).flush()
    }

    /// Stop the flush daemon and flush what is left.
    ///
    /// **Returns**
    /// - `Err(HandlerError::NothingToClose)` if buffering was never enabled.
    /// - `Err(HandlerError::AlreadyClosed)` for every call after the first
    ///   successful one; concurrent callers race on an atomic swap and
    ///   exactly one wins.
    pub async fn close(&self) -> Result<()> {
        if !self.is_buffered() {
            return Err(HandlerError::NothingToClose);
        }
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(HandlerError::AlreadyClosed);
        }

        if let Some(task) = self.daemon.stop() {
            // The task never panics; a join error can only mean cancellation.
            let _ = task.await;
        }

        tracing::debug!(target: "slogpool", "log sink closed");
        self.flush()?;
        Ok(())
    }
}

impl Write for Destination {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Destination::Direct(w) => w.write(buf),
            Destination::Buffered(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Destination::Direct(w) => w.flush(),
            Destination::Buffered(w) => w.flush(),
        }
    }
}

/// Lifecycle of the background task that periodically flushes a
/// buffered sink.
///
/// The task holds only a weak reference to the sink, so dropping the last
/// handler drops the shutdown sender and the task exits on its own.
#[derive(Default)]
pub(crate) struct FlushDaemon {
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FlushDaemon {
    fn start(&self, runtime: &tokio::runtime::Handle, sink: Weak<SinkState>, period: Duration) {
        let (tx, mut rx) = oneshot::channel::<()>();

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = &mut rx => break,
                    _ = ticker.tick() => {
                        let Some(sink) = sink.upgrade() else { break };
                        // The lock is released inside flush(), before logging.
                        if let Err(err) = sink.flush() {
                            tracing::warn!(target: "slogpool", error = %err, "periodic log flush failed");
                        }
                    }
                }
            }

            tracing::trace!(target: "slogpool", "flush daemon stopped");
        });

        *lock(&self.shutdown) = Some(tx);
        *lock(&self.task) = Some(task);
        tracing::trace!(target: "slogpool", period_ms = period.as_millis() as u64, "flush daemon started");
    }

    /// Signal the task to stop. Returns its handle the first time only.
    fn stop(&self) -> Option<JoinHandle<()>> {
        if let Some(tx) = lock(&self.shutdown).take() {
            let _ = tx.send(());
        }
        lock(&self.task).take()
    }

    pub(crate) fn is_running(&self) -> bool {
        lock(&self.task).as_ref().is_some_and(|task| !task.is_finished())
    }
}


#[cfg(test)]
impl FlushDaemon {
    fn stop_handle_for_test(&self) -> JoinHandle<()> {
        lock(&self.task).take().expect("daemon started")
    }
}
