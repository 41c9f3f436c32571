//! Stderr logger for the calibration tools.
//!
//! Lines look like `[  1.204s  INFO select] 12 frames selected`. The
//! `camcal` crate prefix is stripped from the target, so selector
//! (`select`), detector (`chessboard::detector`), solver
//! (`solve::calibrate`) and rectifier output can be told apart at a glance.
//!
//! Records from dependencies such as the ChESS detector or the LM solver are
//! held to `Warn` unless the level is `Trace`; at `Debug` the output stays
//! about the calibration stages, not their internals.
//!
//! Install once at startup with [`init_with_level`], or use
//! `init_tracing` with the `tracing` feature.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl StderrLogger {
    fn level_for(&self, target: &str) -> LevelFilter {
        if is_own_target(target) || self.level == LevelFilter::Trace {
            self.level
        } else {
            self.level.min(LevelFilter::Warn)
        }
    }
}

fn is_own_target(target: &str) -> bool {
    target == "camcal" || target.starts_with("camcal::") || target.starts_with("camcal_")
}

/// `camcal_solve::calibrate` -> `solve::calibrate`, `camcal::select` ->
/// `select`; other targets are kept as they are.
fn short_target(target: &str) -> &str {
    if let Some(rest) = target.strip_prefix("camcal::") {
        rest
    } else if let Some(rest) = target.strip_prefix("camcal_") {
        rest
    } else {
        target
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:7.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            short_target(record.target()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger with the given level filter.
///
/// Later calls are no-ops once a logger from this module is installed.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Span close events are reported so the time spent in map building,
/// detection and the solver shows up in the output.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    if json {
        let _ = builder.json().flatten_event(true).finish().try_init();
    } else {
        let _ = builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    fn logger(level: LevelFilter) -> StderrLogger {
        StderrLogger {
            level,
            started: Instant::now(),
        }
    }

    fn enabled(l: &StderrLogger, level: Level, target: &str) -> bool {
        l.enabled(&Metadata::builder().level(level).target(target).build())
    }

    #[test]
    fn crate_prefix_is_stripped() {
        assert_eq!(short_target("camcal::select"), "select");
        assert_eq!(short_target("camcal_solve::calibrate"), "solve::calibrate");
        assert_eq!(short_target("camcal_chessboard::detector"), "chessboard::detector");
        assert_eq!(short_target("chess_corners::multiscale"), "chess_corners::multiscale");
    }

    #[test]
    fn dependencies_are_held_to_warn_below_trace() {
        let debug = logger(LevelFilter::Debug);
        assert!(enabled(&debug, Level::Debug, "camcal_chessboard::grid"));
        assert!(enabled(&debug, Level::Debug, "camcal"));
        assert!(!enabled(&debug, Level::Debug, "chess_corners"));
        assert!(!enabled(&debug, Level::Info, "levenberg_marquardt"));
        assert!(enabled(&debug, Level::Warn, "chess_corners"));

        let trace = logger(LevelFilter::Trace);
        assert!(enabled(&trace, Level::Trace, "chess_corners"));

        let error = logger(LevelFilter::Error);
        assert!(!enabled(&error, Level::Warn, "chess_corners"));
        assert!(!enabled(&error, Level::Info, "camcal::select"));
    }
}
