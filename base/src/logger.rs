// Global logging system for Charon

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Write as _;

use spin::Mutex;

const MAX_LOG_ENTRIES: usize = 64;

struct LogBuffer {
    entries: Vec<String>,
    dropped: usize,
}

static LOG: Mutex<LogBuffer> = Mutex::new(LogBuffer {
    entries: Vec::new(),
    dropped: 0,
});

/// Message severity. There is no filtering; the level only tags the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "I",
            Level::Error => "E",
        }
    }
}

pub fn log(level: Level, args: fmt::Arguments) {
    let mut buf = LOG.lock();
    if buf.entries.len() >= MAX_LOG_ENTRIES {
        buf.dropped += 1;
        return;
    }
    let mut line = String::new();
    let _ = write!(line, "{}: {}", level.tag(), args);
    buf.entries.push(line);
}

/// Snapshot of the buffered log lines, oldest first.
pub fn entries() -> Vec<String> {
    LOG.lock().entries.clone()
}

/// Number of messages discarded because the buffer was full.
pub fn dropped() -> usize {
    LOG.lock().dropped
}

pub fn clear() {
    let mut buf = LOG.lock();
    buf.entries.clear();
    buf.dropped = 0;
}

// Macros for easier logging
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Info, core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Error, core::format_args!($($arg)*))
    };
}
