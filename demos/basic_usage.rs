//! Basic logger usage example
//!
//! Builds a logger through the factory that writes to `./logs/demo.log` and
//! mirrors to stdout. Set `REDIS_ADDR=host:port` to also push every record
//! onto the `ELK_LOG` list.
//!
//! Run with: cargo run --example basic_usage

use fanout_logger::factory::{self, LoggerOptions};
use fanout_logger::prelude::*;
use fanout_logger::{info, warn};

fn main() -> Result<()> {
    println!("=== Fan-out Logger - Basic Usage Example ===\n");

    let opts = LoggerOptions::from_overrides(vec![
        factory::log_name("demo"),
        factory::project_name("demo"),
        factory::is_stdout("yes"),
        factory::redis_addr(std::env::var("REDIS_ADDR").unwrap_or_default()),
    ]);
    let logger = factory::new(opts)?;

    println!("1. Logging at different levels:");
    logger.debug("This is a debug message");
    logger.info("This is an info message");
    logger.warn("This is a warning message");
    logger.error("This is an error message, with a stack trace");

    println!("\n2. Raising the threshold to warn:");
    logger.set_min_level(LogLevel::Warn);
    logger.info("Info message (hidden)");
    warn!(logger, "Disk usage at {}%", 91);

    println!("\n3. Child loggers with extra fields:");
    logger.set_min_level(LogLevel::Debug);
    let orders = logger.named("orders").with_field("order_id", 1234i64);
    info!(orders, "Order shipped to {}", "Berlin");

    println!("\n4. Records from the log crate:");
    log::info!("Library code logs here too");

    logger.flush()?;
    let metrics = logger.metrics();
    println!(
        "\nLogged: {}, sink failures: {}, dropped: {}",
        metrics.total_logged(),
        metrics.sink_failures(),
        metrics.dropped_count()
    );

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
