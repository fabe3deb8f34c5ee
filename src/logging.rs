use std::sync::Once;

use env_logger::Env;
use log::LevelFilter;
use once_cell::sync::OnceCell;

static INIT_ONCE: Once = Once::new();
static ACTIVE_LEVEL: OnceCell<LevelFilter> = OnceCell::new();

fn env_level() -> LevelFilter {
    std::env::var("SIGFLOW_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .as_deref()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info)
}

fn level_to_str(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}

/// Initialize the stderr logger based on `SIGFLOW_LOG`/`RUST_LOG`.
/// Safe to call multiple times; the logger is installed on first call.
pub fn init_logging() {
    let level = env_level();
    INIT_ONCE.call_once(|| {
        let env = Env::default().default_filter_or(level_to_str(level));
        env_logger::Builder::from_env(env)
            .format_timestamp_millis()
            .format_module_path(true)
            .format_target(true)
            .init();
        let _ = ACTIVE_LEVEL.set(level);
    });
}

/// The level the logger was initialized with, if it has been initialized.
pub fn active_level() -> Option<LevelFilter> {
    ACTIVE_LEVEL.get().copied()
}
