use chrono::{DateTime, Utc};

/// Worksheet the bot writes to.
pub const WORKSHEET_NAME: &str = "bot_entries";

/// Fixed header row of [`WORKSHEET_NAME`].
pub const HEADERS: [&str; 3] = ["Timestamp", "User", "Message"];

/// Display name used when an update carries no sender.
pub const UNKNOWN_USER: &str = "Unknown";

/// Identity of whoever sent an update, as far as the messenger exposes it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sender {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Sender {
    pub fn new(first_name: impl Into<String>, last_name: Option<String>) -> Self {
        Self {
            first_name: Some(first_name.into()),
            last_name,
        }
    }

    /// First name, if it has any visible characters.
    pub fn first_name(&self) -> Option<&str> {
        self.first_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// "First Last", or just the first name when there is no last name.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// One logged chat message; one row of the worksheet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: String,
    pub user: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(at: DateTime<Utc>, user: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: format_timestamp(at),
            user: user.into(),
            message: message.into(),
        }
    }

    /// Cell values in header order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.user.clone(),
            self.message.clone(),
        ]
    }

    /// Missing trailing cells read as empty, extra cells are ignored.
    pub fn from_row(row: &[String]) -> Self {
        let cell = |i: usize| row.get(i).cloned().unwrap_or_default();
        Self {
            timestamp: cell(0),
            user: cell(1),
            message: cell(2),
        }
    }
}

/// ISO-8601 UTC, whole seconds, trailing `Z` (e.g. `2024-05-01T12:30:00Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
