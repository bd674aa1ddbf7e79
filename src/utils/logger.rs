use crate::config::LogConfig;
use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";

#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Configure process-wide logging: `app.log` for the root logger, `metrics.log` for
/// `firelite::metrics`, and `dev6.log` for `dev6!` lines when `enable_dev6` is set.
/// A no-op (apart from directory creation) if a logger is already installed.
///
/// # Errors
/// Returns an error if the directory or appenders cannot be created.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
    enable_dev6: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let base = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&base)?;
    let keep = u32::try_from(retention.unwrap_or(7)).unwrap_or(u32::MAX);
    let lvl = parse_level(level.unwrap_or("info"));

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(&base, "metrics", keep)?)))
        .logger(Logger::builder().appender("metrics").additive(false).build("firelite::metrics", lvl));

    builder = if enable_dev6 {
        builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(&base, "dev6", keep)?)))
            .logger(
                Logger::builder()
                    .appender("dev6")
                    .additive(false)
                    .build("firelite::dev6", LevelFilter::Trace),
            )
    } else {
        builder.logger(Logger::builder().additive(false).build("firelite::dev6", LevelFilter::Off))
    };

    let config = builder.build(Root::builder().appender("app").build(lvl))?;
    // log4rs refuses a second global init; the first configuration wins
    if log4rs::init_config(config).is_err() {
        log::debug!("logger already initialized; keeping existing configuration");
    }
    Ok(())
}

/// Configure logging from `FIRELITE_LOG_DIR`, `FIRELITE_LOG_LEVEL`,
/// `FIRELITE_LOG_RETENTION` and `FIRELITE_DEV6`.
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = LogConfig::default();
    if let Ok(d) = std::env::var("FIRELITE_LOG_DIR") {
        cfg.dir = Some(PathBuf::from(d));
    }
    if let Ok(l) = std::env::var("FIRELITE_LOG_LEVEL") {
        cfg.level = l;
    }
    if let Some(r) = std::env::var("FIRELITE_LOG_RETENTION").ok().and_then(|s| s.parse().ok()) {
        cfg.retention = r;
    }
    cfg.dev6 = std::env::var("FIRELITE_DEV6")
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    init_from_config(&cfg)
}

/// # Errors
/// See [`configure_logging`].
pub fn init_from_config(cfg: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    configure_logging(cfg.dir.as_deref(), Some(&cfg.level), Some(cfg.retention), cfg.dev6)
}
