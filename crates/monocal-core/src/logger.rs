//! Stderr logger for the calibration crates.
//!
//! Lines look like `[  0.412s  INFO calibrator] accepted 12 of 14 images`.
//! Records from the `monocal*` crates pass at the configured level; records
//! from dependencies are capped at `Info` so corner-detector internals stay
//! quiet under `--verbose`.

use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable read by [`level_from_env`].
pub const LOG_ENV: &str = "MONOCAL_LOG";

const OWN_PREFIX: &str = "monocal";

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl StderrLogger {
    fn limit(&self, target: &str) -> LevelFilter {
        if target.starts_with(OWN_PREFIX) {
            self.level
        } else {
            self.level.min(LevelFilter::Info)
        }
    }
}

/// `monocal_solver::lm` -> `solver::lm`, `monocal::calibrator` -> `calibrator`.
fn short_target(target: &str) -> &str {
    let Some(rest) = target.strip_prefix(OWN_PREFIX) else {
        return target;
    };
    rest.strip_prefix("::")
        .or_else(|| rest.strip_prefix('_'))
        .unwrap_or(target)
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.limit(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let secs = self.started.elapsed().as_secs_f64();
        let _ = writeln!(
            std::io::stderr().lock(),
            "[{secs:7.3}s {:>5} {}] {}",
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

/// Install the stderr logger at `level`.
///
/// Only the first call installs anything; later calls return `Ok(())` and
/// keep the original level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| StderrLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Level named by `MONOCAL_LOG` (`warn`, `debug`, ...), if set and valid.
pub fn level_from_env() -> Option<LevelFilter> {
    let raw = std::env::var(LOG_ENV).ok()?;
    LevelFilter::from_str(raw.trim()).ok()
}

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Span close events carry their timings, which is how the collection, solve
/// and undistortion stages are profiled.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
