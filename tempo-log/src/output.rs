use crate::sink::{LogSink, Record};
use crate::{Format, LogConfig};
use std::io::Write;

/// Writes one rendered line per record to stderr. The default output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StderrSink {
    format: Format,
    timestamps: bool,
}

impl StderrSink {
    pub fn new(format: Format, timestamps: bool) -> Self {
        Self { format, timestamps }
    }

    pub fn from_config(config: &LogConfig) -> Self {
        Self::new(config.format, config.timestamps)
    }

    pub fn render(&self, record: &Record<'_>) -> String {
        match self.format {
            Format::Json => render_json(record),
            Format::Pretty => {
                let stamp = self.stamp("%Y-%m-%d %H:%M:%S%.3f ");
                if record.target.is_empty() {
                    format!("{}{:5} {}", stamp, record.level, record.message)
                } else {
                    format!("{}{:5} [{}] {}", stamp, record.level, record.target, record.message)
                }
            }
            Format::Compact => {
                let stamp = self.stamp("%H:%M:%S ");
                let initial = &record.level.as_str()[..1];
                if record.target.is_empty() {
                    format!("{}{} {}", stamp, initial, record.message)
                } else {
                    format!("{}{} {}: {}", stamp, initial, record.target, record.message)
                }
            }
        }
    }

    fn stamp(&self, pattern: &str) -> String {
        if self.timestamps {
            chrono::Local::now().format(pattern).to_string()
        } else {
            String::new()
        }
    }
}

impl LogSink for StderrSink {
    fn write(&self, record: &Record<'_>) {
        let line = self.render(record);
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }
}

#[cfg(feature = "json")]
fn render_json(record: &Record<'_>) -> String {
    serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "level": record.level.as_str(),
        "target": record.target,
        "message": record.message,
    })
    .to_string()
}

#[cfg(not(feature = "json"))]
fn render_json(record: &Record<'_>) -> String {
    format!(
        "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"target\":{:?},\"message\":{:?}}}",
        chrono::Utc::now().to_rfc3339(),
        record.level.as_str(),
        record.target,
        record.message
    )
}
