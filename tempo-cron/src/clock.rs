//! Time sources for due-time evaluation.

use chrono::{Datelike, Local, Timelike, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Calendar components a schedule is matched against.
///
/// Month is 1-12 and day of week is 0-6 with Sunday as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeComponents {
    pub minute: u8,
    pub hour: u8,
    pub day_of_month: u8,
    pub month: u8,
    pub day_of_week: u8,
}

impl TimeComponents {
    pub fn new(minute: u8, hour: u8, day_of_month: u8, month: u8, day_of_week: u8) -> Self {
        Self {
            minute,
            hour,
            day_of_month,
            month,
            day_of_week,
        }
    }

    /// Extract the components from any chrono date-time.
    pub fn from_datetime<T: Datelike + Timelike>(time: &T) -> Self {
        Self {
            minute: time.minute() as u8,
            hour: time.hour() as u8,
            day_of_month: time.day() as u8,
            month: time.month() as u8,
            day_of_week: time.weekday().num_days_from_sunday() as u8,
        }
    }
}

/// Source of the current time components.
pub trait Clock: Send + Sync {
    fn current_minute(&self) -> u8;
    fn current_hour(&self) -> u8;
    fn current_day_of_month(&self) -> u8;
    fn current_month(&self) -> u8;
    fn current_day_of_week(&self) -> u8;

    /// All five components.
    ///
    /// Implementations that read a live clock should override this so the
    /// components come from a single reading.
    fn now(&self) -> TimeComponents {
        TimeComponents {
            minute: self.current_minute(),
            hour: self.current_hour(),
            day_of_month: self.current_day_of_month(),
            month: self.current_month(),
            day_of_week: self.current_day_of_week(),
        }
    }
}

/// Which wall clock [`SystemClock`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeZoneMode {
    #[default]
    Local,
    Utc,
}

impl TimeZoneMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Some(TimeZoneMode::Local),
            "utc" => Some(TimeZoneMode::Utc),
            _ => None,
        }
    }
}

/// The host's clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    zone: TimeZoneMode,
}

impl SystemClock {
    pub fn new(zone: TimeZoneMode) -> Self {
        Self { zone }
    }

    pub fn local() -> Self {
        Self::new(TimeZoneMode::Local)
    }

    pub fn utc() -> Self {
        Self::new(TimeZoneMode::Utc)
    }
}

impl Clock for SystemClock {
    fn current_minute(&self) -> u8 {
        self.now().minute
    }

    fn current_hour(&self) -> u8 {
        self.now().hour
    }

    fn current_day_of_month(&self) -> u8 {
        self.now().day_of_month
    }

    fn current_month(&self) -> u8 {
        self.now().month
    }

    fn current_day_of_week(&self) -> u8 {
        self.now().day_of_week
    }

    fn now(&self) -> TimeComponents {
        match self.zone {
            TimeZoneMode::Local => TimeComponents::from_datetime(&Local::now()),
            TimeZoneMode::Utc => TimeComponents::from_datetime(&Utc::now()),
        }
    }
}

/// A clock that reports whatever it was last set to.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<TimeComponents>,
}

impl FixedClock {
    pub fn new(now: TimeComponents) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: TimeComponents) {
        *self.now.write() = now;
    }
}

impl Clock for FixedClock {
    fn current_minute(&self) -> u8 {
        self.now.read().minute
    }

    fn current_hour(&self) -> u8 {
        self.now.read().hour
    }

    fn current_day_of_month(&self) -> u8 {
        self.now.read().day_of_month
    }

    fn current_month(&self) -> u8 {
        self.now.read().month
    }

    fn current_day_of_week(&self) -> u8 {
        self.now.read().day_of_week
    }

    fn now(&self) -> TimeComponents {
        *self.now.read()
    }
}
