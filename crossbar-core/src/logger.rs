//! Per-node leveled logging.
//!
//! Each node shares one [`NodeLogger`] across its call sites (the registry
//! keys loggers by node name). A line is emitted when its level passes both
//! the logger's local level and the process-wide ceiling; writes are
//! serialised by a process-wide mutex so lines never interleave.

use arcstr::ArcStr;
use crossterm::style::Stylize;
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU8, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;

/// Verbosity, from silent to chatty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    None = 0,
    Error = 1,
    Warning = 2,
    Info = 3,
}

impl LogLevel {
    fn from_u8(v: u8) -> LogLevel {
        match v {
            0 => LogLevel::None,
            1 => LogLevel::Error,
            2 => LogLevel::Warning,
            _ => LogLevel::Info,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            LogLevel::None => "NONE",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::None => "none",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("expected one of none, error, warning, info")]
pub struct ParseLevelError;

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(LogLevel::None),
            "error" => Ok(LogLevel::Error),
            "warning" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            _ => Err(ParseLevelError),
        }
    }
}

static GLOBAL_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static STREAM: Mutex<()> = Mutex::new(());

/// The process-wide ceiling applied on top of every logger's local level.
pub fn global_level() -> LogLevel {
    LogLevel::from_u8(GLOBAL_LEVEL.load(Ordering::Relaxed))
}

pub fn set_global_level(level: LogLevel) {
    GLOBAL_LEVEL.store(level as u8, Ordering::Relaxed)
}

#[derive(Default)]
struct Rate {
    count: u32,
    second: u64,
}

/// A node's logger.
pub struct NodeLogger {
    name: ArcStr,
    level: AtomicU8,
    rates: Mutex<FxHashMap<String, Rate>>,
}

impl NodeLogger {
    pub fn new(name: ArcStr) -> Self {
        NodeLogger {
            name,
            level: AtomicU8::new(LogLevel::Info as u8),
            rates: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    pub fn local_level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    pub fn set_local_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Relaxed)
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None && level <= self.local_level() && level <= global_level()
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.write(LogLevel::Info, args)
    }

    pub fn warning(&self, args: fmt::Arguments<'_>) {
        self.write(LogLevel::Warning, args)
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.write(LogLevel::Error, args)
    }

    fn write(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        let line = format!("[{}] <{}>: {}", self.name, level.tag(), args);
        let styled = match level {
            LogLevel::Error => line.red(),
            LogLevel::Warning => line.yellow(),
            _ => line.grey(),
        };
        let _stream = STREAM.lock();
        println!("{styled}");
    }

    /// Count an event under `tag`; each time the wall-clock second rolls
    /// over, log and return the count accumulated since the last rollover.
    pub fn count_rate(&self, tag: &str) -> Option<u32> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let mut rates = self.rates.lock();
        let rate = rates.entry(tag.to_string()).or_default();
        rate.count += 1;
        if rate.second == now {
            return None;
        }
        rate.second = now;
        let n = rate.count;
        rate.count = 0;
        drop(rates);
        self.info(format_args!("rate-{tag}: {n}"));
        Some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_order_none_to_info() {
        assert!(LogLevel::None < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Info);
    }

    #[test]
    fn parse_levels() {
        assert_eq!("info".parse(), Ok(LogLevel::Info));
        assert_eq!("none".parse(), Ok(LogLevel::None));
        assert_eq!("verbose".parse::<LogLevel>(), Err(ParseLevelError));
    }

    #[test]
    fn count_rate_logs_on_rollover() {
        let log = NodeLogger::new(ArcStr::from("rate-test"));
        log.set_local_level(LogLevel::None);
        assert_eq!(log.count_rate("x"), Some(1));
    }

    #[test]
    fn emission_respects_both_levels() {
        let log = NodeLogger::new(ArcStr::from("emission-test"));
        assert!(log.enabled(LogLevel::Info));
        log.set_local_level(LogLevel::Error);
        assert!(!log.enabled(LogLevel::Info));
        assert!(log.enabled(LogLevel::Error));
        log.set_local_level(LogLevel::None);
        assert!(!log.enabled(LogLevel::Error));
        // the message level None never emits
        log.set_local_level(LogLevel::Info);
        assert!(!log.enabled(LogLevel::None));
    }
}
