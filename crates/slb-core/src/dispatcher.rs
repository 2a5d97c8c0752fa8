//! Chat command handling, independent of the messenger.
//!
//! The dispatcher turns an inbound text (command or plain message) into
//! row-store calls and a reply. It holds no per-chat state.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    domain::{LogEntry, Sender, HEADERS, UNKNOWN_USER, WORKSHEET_NAME},
    ports::RowStore,
    Result,
};

/// How many entries `/list` shows.
pub const LIST_PREVIEW_LEN: usize = 5;

pub const EMPTY_LIST_TEXT: &str = "No entries yet. Send me a message to log it!";
pub const SAVED_TEXT: &str = "Saved! Use /list to see recent entries.";
pub const STORE_FAILURE_TEXT: &str =
    "Sorry, I couldn't reach the spreadsheet. Please try again later.";

/// Commands the bot answers, in the order they are advertised.
pub const COMMANDS: [(&str, &str); 3] = [
    ("start", "Get started."),
    ("list", "Show the latest 5 entries from the sheet."),
    ("help", "Display this message."),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    Start,
    Help,
    List,
    /// Non-command text to be logged.
    Text(String),
    /// A `/command` this bot does not know; ignored.
    Unknown(String),
}

impl Trigger {
    /// `bot_username` is this bot's own username; `/cmd@other_bot` addressed
    /// to someone else parses as [`Trigger::Unknown`].
    pub fn parse(text: &str, bot_username: Option<&str>) -> Self {
        let Some((cmd, target)) = parse_command(text) else {
            return Trigger::Text(text.to_string());
        };
        if let (Some(target), Some(own)) = (target, bot_username) {
            if !target.eq_ignore_ascii_case(own.trim_start_matches('@')) {
                return Trigger::Unknown(format!("{cmd}@{target}"));
            }
        }
        match cmd.as_str() {
            "start" => Trigger::Start,
            "help" => Trigger::Help,
            "list" => Trigger::List,
            _ => Trigger::Unknown(cmd),
        }
    }
}

/// Outgoing reply. `force_reply` asks the client to open a reply prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub force_reply: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            force_reply: false,
        }
    }
}

#[derive(Clone)]
pub struct CommandDispatcher {
    store: Arc<dyn RowStore>,
    bot_username: Option<String>,
}

impl CommandDispatcher {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self {
            store,
            bot_username: None,
        }
    }

    /// Only answer `/cmd@name` when `name` is this bot.
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    /// Create the log worksheet or fix its header row.
    pub async fn prepare(&self) -> Result<()> {
        self.store.ensure_worksheet(WORKSHEET_NAME, &HEADERS).await
    }

    /// Handle one inbound text. `Ok(None)` means nothing should be sent back.
    pub async fn dispatch(&self, sender: Option<&Sender>, text: &str) -> Result<Option<Reply>> {
        self.dispatch_at(sender, text, Utc::now()).await
    }

    pub async fn dispatch_at(
        &self,
        sender: Option<&Sender>,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Reply>> {
        let reply = match Trigger::parse(text, self.bot_username.as_deref()) {
            Trigger::Start => start_reply(sender),
            Trigger::Help => Reply::text(help_text()),
            Trigger::List => self.list_entries().await?,
            Trigger::Text(message) => self.log_message(sender, &message, now).await?,
            Trigger::Unknown(cmd) => {
                tracing::debug!(command = %cmd, "ignoring unknown command");
                return Ok(None);
            }
        };
        Ok(Some(reply))
    }

    /// `/list`: the newest [`LIST_PREVIEW_LEN`] entries, oldest first.
    pub async fn list_entries(&self) -> Result<Reply> {
        // Read the whole sheet: a limited read truncates from the top and
        // would only ever show the oldest rows.
        let mut rows = self.store.get_rows(WORKSHEET_NAME, None).await?;
        if rows.first().is_some_and(|r| is_header_row(r)) {
            rows.remove(0);
        }

        if rows.is_empty() {
            return Ok(Reply::text(EMPTY_LIST_TEXT));
        }

        let start = rows.len().saturating_sub(LIST_PREVIEW_LEN);
        let mut lines = vec!["Latest entries:".to_string()];
        for row in &rows[start..] {
            let e = LogEntry::from_row(row);
            lines.push(format!("• {} — {}: {}", e.timestamp, e.user, e.message));
        }
        Ok(Reply::text(lines.join("\n")))
    }

    /// Plain text: append a row and confirm.
    pub async fn log_message(
        &self,
        sender: Option<&Sender>,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<Reply> {
        let user = sender
            .and_then(Sender::full_name)
            .unwrap_or_else(|| UNKNOWN_USER.to_string());
        let entry = LogEntry::new(now, user, message);

        self.store
            .append_row(WORKSHEET_NAME, &entry.to_row())
            .await?;
        tracing::info!(user = %entry.user, at = %entry.timestamp, "logged message");

        Ok(Reply::text(SAVED_TEXT))
    }
}

pub fn start_reply(sender: Option<&Sender>) -> Reply {
    let text = match sender.and_then(Sender::first_name) {
        Some(first) => format!("Hi {first}! Send me any message to log it to Google Sheets."),
        None => "Hi! Send me any message to log it to Google Sheets.".to_string(),
    };
    Reply {
        text,
        force_reply: true,
    }
}

pub fn help_text() -> String {
    let mut lines = vec![
        "I can log your messages to a Google Sheet.".to_string(),
        "Commands:".to_string(),
    ];
    lines.extend(COMMANDS.iter().map(|(cmd, desc)| format!("- /{cmd}: {desc}")));
    lines.join("\n")
}

fn is_header_row(row: &[String]) -> bool {
    row.len() == HEADERS.len() && row.iter().zip(HEADERS).all(|(a, b)| a == b)
}

/// Telegram may send `/cmd@botname arg1 ...`; returns the lowercased `cmd`
/// and the `botname`, if any. A lone `/` (or `/ text`) is not a command.
fn parse_command(text: &str) -> Option<(String, Option<String>)> {
    let first = text.trim_start().strip_prefix('/')?;
    let token = first.split_whitespace().next().unwrap_or("");
    if first.starts_with(char::is_whitespace) || token.is_empty() {
        return None;
    }

    let (cmd, target) = match token.split_once('@') {
        Some((cmd, target)) => (cmd, Some(target.to_string())),
        None => (token, None),
    };
    Some((cmd.to_lowercase(), target))
}
