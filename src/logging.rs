//! 日志初始化：tracing + EnvFilter，输出到 stderr

use tracing_subscriber::EnvFilter;

/// 初始化全局日志；`RUST_LOG` 优先，否则 verbose 时为 debug，默认 warn
pub fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
