use anyhow::Context;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config as LogConfig, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::configure::AppConfig;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} [{l}] {t} - {m}{n}";
/// Target of every ledger, service and CLI log line
const CRATE_TARGET: &str = "demi_sale";

pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Sale events log at the configured level; dependencies stay at `warn`
/// unless the configured level is stricter.
pub fn build_log_config(config: &AppConfig) -> anyhow::Result<LogConfig> {
    let level = parse_level(&config.log_level);
    let mut appenders = vec!["stdout"];

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let mut builder =
        LogConfig::builder().appender(Appender::builder().build("stdout", Box::new(stdout)));

    if config.log_to_file {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build(&config.log_file)
            .with_context(|| format!("Failed to open log file {}", config.log_file))?;
        builder = builder.appender(Appender::builder().build("ledger_file", Box::new(file)));
        appenders.push("ledger_file");
    }

    let sale_logger = Logger::builder()
        .appenders(appenders.iter().copied())
        .additive(false)
        .build(CRATE_TARGET, level);

    let root = Root::builder()
        .appenders(appenders)
        .build(level.min(LevelFilter::Warn));

    builder
        .logger(sale_logger)
        .build(root)
        .context("Invalid log configuration")
}

pub fn setup_logger(config: &AppConfig) -> anyhow::Result<()> {
    let log_config = build_log_config(config)?;
    log4rs::init_config(log_config).context("Logger already initialised")?;
    log::debug!("[DEMI] logging at {} (file: {})", config.log_level, config.log_to_file);
    Ok(())
}
