//! Logging setup and log-rate limiting.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::config::{LogFormat, LoggingConfig};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `cfg.level`. Returns `false` when a
/// global subscriber was already installed (common in tests); the existing
/// one is left in place.
pub fn init_logging(cfg: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match cfg.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
    };

    installed.is_ok()
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub(crate) fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Per-key rate limit for a recurring warning.
///
/// The first event for a key is admitted, then at most one per `interval`.
/// An admitted event reports how many were held back since the last one.
#[derive(Debug)]
pub struct WarnThrottle {
    interval: Duration,
    windows: DashMap<String, Window>,
}

#[derive(Debug)]
struct Window {
    opened: Instant,
    suppressed: u64,
}

impl WarnThrottle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            windows: DashMap::new(),
        }
    }

    /// `Some(suppressed)` when the event for `key` should be logged.
    #[must_use]
    pub fn admit(&self, key: &str) -> Option<u64> {
        let now = Instant::now();
        if let Some(mut window) = self.windows.get_mut(key) {
            if now.duration_since(window.opened) < self.interval {
                window.suppressed += 1;
                return None;
            }
            window.opened = now;
            return Some(std::mem::take(&mut window.suppressed));
        }

        match self.windows.entry(key.to_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(Window {
                    opened: now,
                    suppressed: 0,
                });
                Some(0)
            }
            // Another caller opened the window first.
            Entry::Occupied(mut slot) => {
                slot.get_mut().suppressed += 1;
                None
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn one_event_per_key_and_interval() {
        let throttle = WarnThrottle::new(Duration::from_secs(10));
        assert_eq!(throttle.admit("Order.Get"), Some(0));
        assert_eq!(throttle.admit("Order.Get"), None);
        assert_eq!(throttle.admit("Order.Get"), None);
        assert_eq!(throttle.admit("Order.Cancel"), Some(0));
    }

    #[test]
    fn reopened_window_reports_suppressed_events() {
        let throttle = WarnThrottle::new(Duration::from_millis(20));
        assert_eq!(throttle.admit("Order.Get"), Some(0));
        assert_eq!(throttle.admit("Order.Get"), None);
        assert_eq!(throttle.admit("Order.Get"), None);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(throttle.admit("Order.Get"), Some(2));
        assert_eq!(throttle.admit("Order.Get"), None);
    }

    #[test]
    fn zero_interval_admits_everything() {
        let throttle = WarnThrottle::new(Duration::ZERO);
        assert_eq!(throttle.admit("k"), Some(0));
        assert_eq!(throttle.admit("k"), Some(0));
    }

    #[test]
    fn millis_saturate() {
        assert_eq!(duration_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn second_init_is_a_no_op() {
        let cfg = LoggingConfig::default();
        let _ = init_logging(&cfg);
        assert!(!init_logging(&cfg));
    }
}
