// SPDX-License-Identifier: MIT
//! Logging bootstrap for host embedders.

use crate::config::HostConfig;

/// Initialise tracing from the resolved config.
///
/// Logs go to stdout in the configured format ("pretty" | "json") and, when
/// `log_file` is true, additionally to a daily-rolled file under
/// `{data_dir}/logs`. Returns the appender guard — hold it for the process
/// lifetime or buffered lines are lost on exit.
///
/// Call once; a second call panics (the global subscriber is already set).
pub fn setup_logging(
    config: &HostConfig,
    log_file: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = config.log_format == "json";
    let log_level = config.log.as_str();

    if log_file {
        let dir = config.data_dir.join("logs");
        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(&dir) {
            // Fall back to stdout-only — don't panic on a bad log path.
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
        } else {
            let appender = tracing_appender::rolling::daily(dir, "courseforge.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            if use_json {
                tracing_subscriber::registry()
                    .with(EnvFilter::new(log_level))
                    .with(fmt::layer().json())
                    .with(fmt::layer().json().with_writer(non_blocking))
                    .init();
            } else {
                tracing_subscriber::registry()
                    .with(EnvFilter::new(log_level))
                    .with(fmt::layer().compact())
                    .with(fmt::layer().with_writer(non_blocking))
                    .init();
            }
            return Some(guard);
        }
    }

    if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
    }
    None
}
