use crate::config::{resolve_path, LoggingConfig, Section};
use parking_lot::Mutex;
use std::io::IsTerminal;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, util::SubscriberInitExt, Layer};

// Keep a guard for non-blocking console to avoid being dropped.
static CONSOLE_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

const DEFAULT_SECTION: &str = "default";

// ================= level helpers =================

fn parse_tracing_level(s: &str) -> Option<Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

fn level_filter(s: &str) -> LevelFilter {
    parse_tracing_level(s)
        .map(LevelFilter::from_level)
        .unwrap_or(LevelFilter::OFF)
}

// ================= rotating writer for the log file =================

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

#[derive(Clone)]
struct RotWriter(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl<'a> fmt::MakeWriter<'a> for RotWriter {
    type Writer = RotWriterHandle;
    fn make_writer(&'a self) -> Self::Writer {
        RotWriterHandle(self.0.clone())
    }
}

struct RotWriterHandle(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl Write for RotWriterHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().flush()
    }
}

fn create_rotating_writer(section: &Section, base_dir: &Path) -> std::io::Result<RotWriter> {
    let log_path = resolve_path(&section.file, base_dir);
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Prefer MaxFiles when given, else age-based retention.
    let limit = match section.max_backups {
        Some(n) => FileLimit::MaxFiles(n),
        None => FileLimit::Age(chrono::Duration::days(
            i64::from(section.max_age_days.unwrap_or(1)),
        )),
    };
    let max_bytes = section.max_size_mb.unwrap_or(100) as usize * 1024 * 1024;

    let rot = FileRotate::new(
        &log_path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        None,
    );
    Ok(RotWriter(Arc::new(Mutex::new(rot))))
}

// ================= targets =================

/// Which level field of a section a sink reads.
#[derive(Clone, Copy)]
enum SinkKind {
    Console,
    File,
}

impl SinkKind {
    fn level_of(self, section: &Section) -> &str {
        match self {
            SinkKind::Console => &section.console_level,
            SinkKind::File => &section.file_level,
        }
    }
}

/// The "default" section sets the fallback level; every other key is a
/// tracing target prefix with its own level.
fn build_targets(cfg: &LoggingConfig, kind: SinkKind) -> Targets {
    let default_level = cfg
        .get(DEFAULT_SECTION)
        .map(|s| level_filter(kind.level_of(s)))
        .unwrap_or(match kind {
            SinkKind::Console => LevelFilter::INFO,
            SinkKind::File => LevelFilter::OFF,
        });

    cfg.iter()
        .filter(|(target, _)| target.as_str() != DEFAULT_SECTION)
        .filter(|(_, section)| !kind.level_of(section).trim().is_empty())
        .fold(
            Targets::new().with_default(default_level),
            |targets, (target, section)| {
                targets.with_target(target.clone(), level_filter(kind.level_of(section)))
            },
        )
}

// ================= public init =================

/// Installs the global `tracing` subscriber: a console layer on non-blocking
/// stderr and, when the "default" section names a file, a JSON layer written
/// through a size-rotated file. `RUST_LOG` caps both when set.
pub fn init_logging(cfg: &LoggingConfig, base_dir: &Path) {
    use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

    // Bridge `log` → `tracing` *before* installing the subscriber
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    let env: Option<EnvFilter> = EnvFilter::try_from_default_env().ok();

    let (nb_stderr, guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = CONSOLE_GUARD.set(guard);

    let console_layer = fmt::layer()
        .with_writer(nb_stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(build_targets(cfg, SinkKind::Console));

    let file_writer = cfg
        .get(DEFAULT_SECTION)
        .filter(|s| !s.file.trim().is_empty())
        .and_then(|section| match create_rotating_writer(section, base_dir) {
            Ok(writer) => Some(writer),
            Err(e) => {
                eprintln!(
                    "Failed to initialize log file '{}': {e}",
                    resolve_path(&section.file, base_dir).display()
                );
                None
            }
        });

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(writer)
            .with_filter(build_targets(cfg, SinkKind::File))
    });

    let subscriber = Registry::default()
        .with(env)
        .with(console_layer)
        .with(file_layer);

    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_logging_config;
    use std::collections::HashMap;

    fn section(console: &str, file_level: &str) -> Section {
        Section {
            console_level: console.to_string(),
            file: String::new(),
            file_level: file_level.to_string(),
            max_age_days: None,
            max_backups: None,
            max_size_mb: None,
        }
    }

    #[test]
    fn parses_levels_leniently() {
        assert_eq!(parse_tracing_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_tracing_level("warning"), Some(Level::WARN));
        assert_eq!(parse_tracing_level("off"), None);
        assert_eq!(parse_tracing_level("loud"), Some(Level::INFO));
    }

    #[test]
    fn console_targets_use_default_and_overrides() {
        let mut cfg: LoggingConfig = HashMap::new();
        cfg.insert("default".into(), section("warn", ""));
        cfg.insert("wirekit".into(), section("debug", ""));

        let targets = build_targets(&cfg, SinkKind::Console);
        assert!(targets.would_enable("wirekit::tree", &Level::DEBUG));
        assert!(!targets.would_enable("greeter", &Level::INFO));
        assert!(targets.would_enable("greeter", &Level::WARN));
    }

    #[test]
    fn file_targets_are_off_without_default_section() {
        let mut cfg: LoggingConfig = HashMap::new();
        cfg.insert("wirekit".into(), section("info", ""));

        let targets = build_targets(&cfg, SinkKind::File);
        assert!(!targets.would_enable("greeter", &Level::ERROR));
        // An empty level leaves the target on the default.
        assert!(!targets.would_enable("wirekit", &Level::ERROR));
    }

    #[test]
    fn default_config_logs_info_to_console() {
        let targets = build_targets(&default_logging_config(), SinkKind::Console);
        assert!(targets.would_enable("wirekit_host", &Level::INFO));
        assert!(!targets.would_enable("wirekit_host", &Level::DEBUG));
    }

    #[test]
    fn rotating_writer_creates_parent_dirs() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut s = section("info", "debug");
        s.file = "logs/nested/wirekit.log".to_string();
        s.max_backups = Some(2);

        let writer = create_rotating_writer(&s, dir.path()).expect("writer");
        let mut handle = fmt::MakeWriter::make_writer(&writer);
        handle.write_all(b"{\"msg\":\"hello\"}\n").expect("write");
        handle.flush().expect("flush");

        assert!(dir.path().join("logs/nested/wirekit.log").exists());
    }
}
