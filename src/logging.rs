use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR: ",
            LogLevel::Warn => "Warning: ",
            LogLevel::Info => "",
            LogLevel::Debug => "DEBUG: ",
        }
    }
}

fn level_cell() -> &'static AtomicU8 {
    static CELL: OnceLock<AtomicU8> = OnceLock::new();
    CELL.get_or_init(|| AtomicU8::new(LogLevel::Info as u8))
}

pub fn set_level(level: LogLevel) {
    level_cell().store(level as u8, Ordering::Relaxed);
}

pub fn enabled(level: LogLevel) -> bool {
    (level as u8) <= level_cell().load(Ordering::Relaxed)
}

fn emit(level: LogLevel, message: &str) {
    if !enabled(level) {
        return;
    }
    // Only progress output goes to stdout so it can be piped separately
    if level == LogLevel::Info {
        println!("{}{}", level.prefix(), message);
    } else {
        eprintln!("{}{}", level.prefix(), message);
    }
}

pub fn error(message: &str) {
    emit(LogLevel::Error, message);
}

pub fn warn(message: &str) {
    emit(LogLevel::Warn, message);
}

pub fn info(message: &str) {
    emit(LogLevel::Info, message);
}

/// Log one source conversion: `kind: original -> replacement`
pub fn conversion(kind: &str, original: &str, replacement: &str) {
    if enabled(LogLevel::Debug) {
        emit(
            LogLevel::Debug,
            &format!("{}: {} -> {}", kind, original, replacement),
        );
    }
}

pub fn debug(message: &str) {
    emit(LogLevel::Debug, message);
}
