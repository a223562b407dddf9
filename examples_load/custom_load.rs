use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;

use slogpool::{Attr, Config, Level, LogContext, LogHandler, Record, TextHandler};

#[tokio::main]
async fn main() {
    let config = Config {
        level: Level::DEBUG,
        buffered_output: true,
        buffer_size: 64 * 1024,
        flush_interval: Duration::from_millis(200),
        max_pool_buffer_size: 4096,
        colors: false,
    };

    let root: Arc<dyn LogHandler> = Arc::new(
        TextHandler::text(std::io::sink(), config).expect("running inside a tokio runtime"),
    );
    let handler = root
        .with_group("load")
        .with_attrs(&[Attr::string("mode", "custom")]);
    let ctx = LogContext::new().append_attrs([Attr::string("run", "bench")]);

    let n: i64 = 100_000;
    let start = Instant::now();

    let workers: Vec<_> = (0..4)
        .map(|w| {
            let handler = Arc::clone(&handler);
            let ctx = ctx.clone();
            tokio::task::spawn_blocking(move || {
                for i in 0..n / 4 {
                    let record = Record::new(Level::ERROR, "custom load test error")
                        .add_attrs([Attr::int("worker", w), Attr::int("iteration", i)]);
                    if let Err(err) = handler.handle(&ctx, &record) {
                        eprintln!("write failed: {err}");
                        return;
                    }
                }
            })
        })
        .collect();
    for w in workers {
        w.await.expect("worker panicked");
    }

    let elapsed = start.elapsed();
    println!("custom config: wrote {} records in {:?} (~{:.0} rec/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    if let Err(err) = root.close().await {
        eprintln!("close failed: {err}");
    }
}
