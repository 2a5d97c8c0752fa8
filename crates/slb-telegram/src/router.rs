use std::sync::Arc;

use anyhow::Context;
use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use slb_core::dispatcher::CommandDispatcher;

use crate::{bot_commands, handlers};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<CommandDispatcher>,
}

/// Long-poll Telegram until the process is interrupted.
///
/// Reconnects and backoff are left to teloxide's update listener. The
/// dispatcher is bound to the bot's own username so group commands addressed
/// to other bots are ignored.
pub async fn run_polling(bot_token: &str, dispatcher: CommandDispatcher) -> anyhow::Result<()> {
    let bot = Bot::new(bot_token);

    let me = bot.get_me().await.context("telegram getMe failed")?;
    tracing::info!(username = %me.username(), "bot started");

    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        tracing::warn!(error = %e, "failed to register command menu");
    }

    let dispatcher = dispatcher.with_bot_username(me.username());
    let state = Arc::new(AppState {
        dispatcher: Arc::new(dispatcher),
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
