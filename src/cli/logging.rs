use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

/// Install a compact stderr subscriber; `-v` raises the level from WARN.
pub(crate) fn init(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry().with(level).with(layer).init();
}
