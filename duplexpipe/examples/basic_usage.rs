//! Basic usage example for duplexpipe.
//!
//! Drives both ends of a pair by hand and shows the retry signals and the
//! read-request hint.
//!
//! Run with: RUST_LOG=trace cargo run --example basic_usage --features std

use std::io::Read;

use duplexpipe::{create_pair, PairConfig, Transfer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    println!("=== duplexpipe Basic Usage Example ===\n");

    let config = PairConfig::new().with_capacity(10);
    let (engine, io) = duplexpipe::create_pair_with(&config)?;
    println!("Created pair: capacity {} / {}", engine.write_buf_size(), io.write_buf_size());

    // 1. Plain transfer
    let written = engine.write(b"hello")?;
    println!("engine wrote: {:?}", written);

    let mut buf = [0u8; 32];
    if let Transfer::Progress(n) = io.read(&mut buf)? {
        println!("io read: {:?}", String::from_utf8_lossy(&buf[..n]));
    }

    // 2. Backpressure
    engine.write(b"0123456789")?;
    println!("write guarantee after filling: {}", engine.write_guarantee());
    println!("one more byte: {:?}", engine.write(b"!")?);

    // 3. Read request hint
    io.read(&mut buf)?;
    println!("drain, then read again: {:?}", io.read(&mut buf)?);
    println!("engine sees read request: {}", engine.read_request());

    // 4. Half close
    engine.write(b"bye")?;
    engine.shutdown_write()?;
    let mut tail = Vec::new();
    (&io).read_to_end(&mut tail)?;
    println!("io drained {:?}, eof={}", String::from_utf8_lossy(&tail), io.is_eof());

    // 5. Teardown
    drop(engine);
    println!("io still paired after engine dropped: {}", io.is_paired());

    let (a, b) = create_pair(0, 0)?;
    println!("default pair capacity: {} / {}", a.write_buf_size(), b.write_buf_size());

    println!("\n=== Example Complete ===");
    Ok(())
}
