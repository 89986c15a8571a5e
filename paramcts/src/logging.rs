//! One `tracing_subscriber::fmt` subscriber per process, writing under
//! `log/<timestamp>/<component>.log`, grounded on
//! `bench-harness/src/main.rs`'s `tracing_subscriber::fmt()...
//! with_env_filter(...)` setup (spec.md §10).

use std::path::PathBuf;

/// Keeps the non-blocking writer's worker thread alive for the life of
/// the process; dropping it would silently stop flushing log lines.
pub struct LogGuard(#[allow(dead_code)] tracing_appender::non_blocking::WorkerGuard);

pub fn init(component: &str) -> anyhow::Result<LogGuard> {
    let format =
        time::format_description::parse("[year][month][day]-[hour][minute][second]").expect("constant format");
    let stamp = time::OffsetDateTime::now_utc().format(&format).unwrap_or_else(|_| "unknown-time".to_string());
    let dir: PathBuf = ["log", &stamp].iter().collect();
    std::fs::create_dir_all(&dir)?;

    let file_appender = tracing_appender::rolling::never(&dir, format!("{component}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_env_var("RUST_LOG")
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .init();

    Ok(LogGuard(guard))
}
