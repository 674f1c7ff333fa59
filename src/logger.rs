use chrono::{DateTime, Utc};
use colored::*;
use log::{Level, Metadata, Record};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

static BOOTH_LOGGER: Lazy<BoothLogger> = Lazy::new(BoothLogger::new);

pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let max_level = config.min_level.to_log_level_filter();
    BOOTH_LOGGER.update_config(config)?;

    if let Err(e) = log::set_logger(&*BOOTH_LOGGER) {
        return Err(format!("Failed to set logger: {:?}", e));
    }

    log::set_max_level(max_level);
    Ok(())
}

/// Tags every following log line with the given session id.
pub fn set_session_id(session_id: impl Into<String>) {
    if let Ok(mut current) = BOOTH_LOGGER.session_id.lock() {
        *current = Some(session_id.into());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::Cyan,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LogLevel::Trace => "🔍",
            LogLevel::Debug => "🐛",
            LogLevel::Info => "📸",
            LogLevel::Warn => "⚠️",
            LogLevel::Error => "❌",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn to_log_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::Trace,
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warn => Level::Warn,
            LogLevel::Error => Level::Error,
        }
    }

    pub fn to_log_level_filter(&self) -> log::LevelFilter {
        self.to_log_level().to_level_filter()
    }

    pub fn from_log_level(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub module: String,
    pub file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: String, module: String, file: String, line: u32) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message,
            module,
            file,
            line,
            session_id: None,
        }
    }

    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub show_colors: bool,
    pub show_emojis: bool,
    pub show_file_location: bool,
    pub show_module: bool,
    pub include_timestamp: bool,
    pub timestamp_format: String,
    pub output_json: bool,
    pub log_to_file: bool,
    pub log_file_path: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: true,
            show_emojis: true,
            show_file_location: false,
            show_module: true,
            include_timestamp: true,
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            output_json: false,
            log_to_file: false,
            log_file_path: "photobooth.log".to_string(),
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `PHOTOBOOTH_LOG_LEVEL`, `PHOTOBOOTH_LOG_JSON` and `PHOTOBOOTH_LOG_FILE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(level) = env::var("PHOTOBOOTH_LOG_LEVEL")
            .ok()
            .and_then(|value| LogLevel::parse(&value))
        {
            config.min_level = level;
        }
        if env::var("PHOTOBOOTH_LOG_JSON").map_or(false, |val| val == "true") {
            config = config.with_json_output(true).with_colors(false);
        }
        if let Ok(path) = env::var("PHOTOBOOTH_LOG_FILE") {
            config = config.with_file_output(&path);
        }
        config
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.show_colors = enabled;
        self
    }

    pub fn with_file_output(mut self, path: &str) -> Self {
        self.log_to_file = true;
        self.log_file_path = path.to_string();
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.output_json = enabled;
        self
    }
}

/// Console logger. Writes to stderr so stdout stays free for the generated image.
pub struct BoothLogger {
    config: Mutex<LoggerConfig>,
    log_file: Mutex<Option<File>>,
    session_id: Mutex<Option<String>>,
}

impl BoothLogger {
    pub fn new() -> Self {
        Self {
            config: Mutex::new(LoggerConfig::default()),
            log_file: Mutex::new(None),
            session_id: Mutex::new(None),
        }
    }

    pub fn update_config(&self, new_config: LoggerConfig) -> Result<(), String> {
        if new_config.log_to_file {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&new_config.log_file_path)
                .map_err(|e| format!("Failed to open {}: {}", new_config.log_file_path, e))?;
            if let Ok(mut log_file) = self.log_file.lock() {
                *log_file = Some(file);
            }
        }

        let mut config = self
            .config
            .lock()
            .map_err(|_| "Logger config lock poisoned".to_string())?;
        *config = new_config;
        Ok(())
    }

    fn format_console_output(&self, entry: &LogEntry, config: &LoggerConfig) -> String {
        let mut output = String::new();

        if config.include_timestamp {
            let timestamp = entry.timestamp.format(&config.timestamp_format).to_string();
            if config.show_colors {
                output.push_str(&format!("{} ", timestamp.bright_black()));
            } else {
                output.push_str(&format!("{} ", timestamp));
            }
        }

        let level_str = if config.show_emojis {
            format!("{} {}", entry.level.emoji(), entry.level.as_str())
        } else {
            entry.level.as_str().to_string()
        };

        if config.show_colors {
            output.push_str(&format!(
                "[{}] ",
                level_str.color(entry.level.color()).bold()
            ));
        } else {
            output.push_str(&format!("[{}] ", level_str));
        }

        if config.show_module && !entry.module.is_empty() {
            if config.show_colors {
                output.push_str(&format!("{}::", entry.module.bright_blue()));
            } else {
                output.push_str(&format!("{}::", entry.module));
            }
        }

        if config.show_colors {
            output.push_str(&entry.message.white().bold().to_string());
        } else {
            output.push_str(&entry.message);
        }

        if let Some(session_id) = &entry.session_id {
            if config.show_colors {
                output.push_str(&format!(" [session:{}]", session_id.bright_yellow()));
            } else {
                output.push_str(&format!(" [session:{}]", session_id));
            }
        }

        if config.show_file_location {
            let location = format!("{}:{}", entry.file, entry.line);
            if config.show_colors {
                output.push_str(&format!(" ({})", location.bright_black()));
            } else {
                output.push_str(&format!(" ({})", location));
            }
        }

        output
    }

    fn render(&self, entry: &LogEntry, config: &LoggerConfig) -> String {
        if config.output_json {
            serde_json::to_string(entry).unwrap_or_default()
        } else {
            self.format_console_output(entry, config)
        }
    }

    fn write_to_file(&self, line: &str) {
        if let Ok(mut log_file_guard) = self.log_file.lock() {
            if let Some(ref mut file) = *log_file_guard {
                let _ = writeln!(file, "{}", line);
            }
        }
    }

    fn create_log_entry(&self, record: &Record) -> LogEntry {
        let session_id = self.session_id.lock().ok().and_then(|id| id.clone());
        LogEntry::new(
            LogLevel::from_log_level(record.level()),
            record.args().to_string(),
            record.module_path().unwrap_or("unknown").to_string(),
            record.file().unwrap_or("unknown").to_string(),
            record.line().unwrap_or(0),
        )
        .with_session_id(session_id)
    }
}

impl Default for BoothLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl log::Log for BoothLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if let Ok(config) = self.config.lock() {
            metadata.level() <= config.min_level.to_log_level()
        } else {
            true
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = self.create_log_entry(record);

        if let Ok(config) = self.config.lock() {
            let line = self.render(&entry, &config);
            eprintln!("{}", line);

            if config.log_to_file {
                let file_line = if config.show_colors && !config.output_json {
                    let plain = LoggerConfig {
                        show_colors: false,
                        ..config.clone()
                    };
                    self.render(&entry, &plain)
                } else {
                    line
                };
                self.write_to_file(&file_line);
            }
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
        if let Ok(mut log_file_guard) = self.log_file.lock() {
            if let Some(ref mut file) = *log_file_guard {
                let _ = file.flush();
            }
        }
    }
}

/// Measures how long an operation took. Logs on `finish` or when dropped.
pub struct Timer {
    start: Instant,
    name: String,
    finished: bool,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::debug!("⏱️  Starting timer: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
            finished: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(mut self) -> Duration {
        self.finished = true;
        self.report()
    }

    fn report(&self) -> Duration {
        let duration = self.elapsed();
        log::info!(
            "⏱️  {} completed in {}ms",
            self.name,
            duration.as_millis()
        );
        duration
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if !self.finished {
            self.report();
        }
    }
}

pub fn timer(name: &str) -> Timer {
    Timer::new(name)
}

pub fn log_startup_info(app_name: &str, version: &str) {
    log::info!("🚀 Starting {} v{}", app_name, version);
}

pub fn log_config_info(config: &crate::config::BoothConfig) {
    log::info!("⚙️  Configuration loaded:");
    log::info!("   Model: {}", config.gemini.model);
    log::info!("   Endpoint: {}", config.gemini.base_url);
    log::info!("   Max uploads: {}", config.max_uploads);
    log::info!(
        "   API key: {}",
        if config.gemini.api_key.is_some() { "✅" } else { "❌" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        assert_eq!(LogLevel::Info.as_str(), "INFO");
        assert_eq!(LogLevel::Error.emoji(), "❌");
        assert_eq!(LogLevel::Debug.color(), Color::Blue);
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_logger_config() {
        let config = LoggerConfig::new()
            .with_level(LogLevel::Debug)
            .with_json_output(true)
            .with_colors(false)
            .with_file_output("booth.log");
        assert_eq!(config.min_level, LogLevel::Debug);
        assert!(config.output_json);
        assert!(!config.show_colors);
        assert!(config.log_to_file);
        assert_eq!(config.log_file_path, "booth.log");
    }

    #[test]
    fn test_plain_console_line() {
        let logger = BoothLogger::new();
        let config = LoggerConfig {
            show_colors: false,
            show_emojis: false,
            include_timestamp: false,
            ..LoggerConfig::default()
        };
        let entry = LogEntry::new(
            LogLevel::Warn,
            "quota reached".into(),
            "photobooth::session".into(),
            "src/session.rs".into(),
            10,
        )
        .with_session_id(Some("abc".into()));

        assert_eq!(
            logger.format_console_output(&entry, &config),
            "[WARN] photobooth::session::quota reached [session:abc]"
        );
    }

    #[test]
    fn test_json_entry_omits_missing_session() {
        let entry = LogEntry::new(
            LogLevel::Info,
            "hi".into(),
            "m".into(),
            "f".into(),
            1,
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("session_id").is_none());
        assert_eq!(json["level"], "Info");
    }
}
