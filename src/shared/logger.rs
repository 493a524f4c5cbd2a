use chrono::Local;
use clap::ValueEnum;
use std::fmt;
use tracing::level_filters::LevelFilter;
use tracing::{Dispatch, Event, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// `[LEVEL@time][file:line - target] message`
    Text,
    /// One JSON object per event
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink {
    Stdout,
    Stderr,
}

// Caller-supplied logging configuration. Nothing here is fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub sink: LogSink,
}

// Build a logging handle from config. `RUST_LOG`, when set, takes precedence over `config.level`.
// The handle is injected into whatever needs it; callers decide whether to also install it globally.
pub fn dispatch(config: &LogConfig) -> Dispatch {
    let level = LevelFilter::from(config.level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let writer = match config.sink {
        LogSink::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogSink::Stderr => BoxMakeWriter::new(std::io::stderr),
    };

    let output: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .event_format(LineFormat)
            .with_writer(writer)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
            .with_file(true)
            .with_line_number(true)
            .with_writer(writer)
            .boxed(),
    };

    Dispatch::new(tracing_subscriber::registry().with(output).with(filter))
}

// Text layout: `[LEVEL@timestamp][file:line - target] message fields`.
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        write!(
            writer,
            "{} ",
            line_prefix(
                meta.level().as_str(),
                &Local::now().format(TIMESTAMP_FORMAT).to_string(),
                meta.file().unwrap_or("?"),
                meta.line().unwrap_or(0),
                meta.target(),
            )
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn line_prefix(level: &str, timestamp: &str, file: &str, line: u32, target: &str) -> String {
    format!("[{level}@{timestamp}][{file}:{line} - {target}]")
}
