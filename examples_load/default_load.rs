use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use slogpool::init::init_tracing;
use slogpool::{BufferPool, Config, JsonHandler};

fn main() {
    let handler = JsonHandler::json(std::io::sink(), Config::default())
        .expect("unbuffered handler needs no runtime");
    init_tracing(Arc::new(handler)).expect("no global subscriber yet");

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: wrote {} records in {:?} (~{:.0} rec/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    let pool = BufferPool::global().metrics().snapshot();
    println!("pool: {} hits, {} misses, hit rate {:.3}", pool.hits, pool.misses, pool.hit_rate());
}
