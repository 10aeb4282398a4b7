//! Log level and user callback on top of the `log` facade.
//!
//! Every message passes the runtime level filter first, then goes to the installed
//! callback (if any) and to `log` under the `vgpu` target.

use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    #[default]
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    fn to_log(self) -> Option<log::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(log::Level::Error),
            LogLevel::Warn => Some(log::Level::Warn),
            LogLevel::Info => Some(log::Level::Info),
            LogLevel::Debug => Some(log::Level::Debug),
            LogLevel::Trace => Some(log::Level::Trace),
        }
    }
}

pub type LogCallback = Box<dyn Fn(LogLevel, &str) + Send + Sync>;

static LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static CALLBACK: RwLock<Option<LogCallback>> = RwLock::new(None);

pub fn log_level() -> LogLevel {
    LogLevel::from_u8(LEVEL.load(Ordering::Relaxed))
}

pub fn set_log_level(level: LogLevel) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Route runtime messages to `callback` in addition to the `log` facade.
pub fn set_log_callback<F>(callback: F)
where
    F: Fn(LogLevel, &str) + Send + Sync + 'static,
{
    *CALLBACK.write() = Some(Box::new(callback));
}

pub fn clear_log_callback() {
    *CALLBACK.write() = None;
}

#[doc(hidden)]
pub fn emit(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if level == LogLevel::Off || level > log_level() {
        return;
    }
    if let Some(callback) = CALLBACK.read().as_ref() {
        callback(level, &args.to_string());
    }
    if let Some(l) = level.to_log() {
        log::log!(target: "vgpu", l, "{}", args);
    }
}

macro_rules! vgpu_error {
    ($($arg:tt)+) => { $crate::logging::emit($crate::logging::LogLevel::Error, format_args!($($arg)+)) };
}
macro_rules! vgpu_warn {
    ($($arg:tt)+) => { $crate::logging::emit($crate::logging::LogLevel::Warn, format_args!($($arg)+)) };
}
macro_rules! vgpu_info {
    ($($arg:tt)+) => { $crate::logging::emit($crate::logging::LogLevel::Info, format_args!($($arg)+)) };
}
macro_rules! vgpu_debug {
    ($($arg:tt)+) => { $crate::logging::emit($crate::logging::LogLevel::Debug, format_args!($($arg)+)) };
}

pub(crate) use {vgpu_debug, vgpu_error, vgpu_info, vgpu_warn};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use parking_lot::Mutex;

    #[test]
    fn callback_respects_level() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        set_log_callback(move |level, msg| sink.lock().push((level, msg.to_string())));
        set_log_level(LogLevel::Warn);
        vgpu_info!("hidden");
        vgpu_warn!("shown {}", 1);
        set_log_level(LogLevel::Info);
        clear_log_callback();
        let seen = seen.lock();
        assert!(seen.iter().any(|(l, m)| *l == LogLevel::Warn && m == "shown 1"));
        assert!(!seen.iter().any(|(_, m)| m == "hidden"));
    }
}
