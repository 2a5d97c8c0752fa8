//! Telegram adapter (teloxide).
//!
//! Maps Telegram updates onto the `slb-core` command dispatcher and sends its
//! replies back over the Bot API.

use teloxide::types::{BotCommand, User};

use slb_core::{dispatcher::COMMANDS, domain::Sender};

pub mod handlers;
pub mod router;

/// Identity fields the dispatcher cares about.
pub fn sender_from_user(user: &User) -> Sender {
    Sender {
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
    }
}

/// Command menu shown by Telegram clients.
pub fn bot_commands() -> Vec<BotCommand> {
    COMMANDS
        .iter()
        .map(|(cmd, desc)| BotCommand::new(*cmd, *desc))
        .collect()
}
