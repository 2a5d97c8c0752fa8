//! Telegram update handlers.
//!
//! Every text update goes through the core dispatcher; the handler only maps
//! identities in and replies out, and turns store failures into a generic
//! answer so the chat is never left without a response.

use std::sync::Arc;

use teloxide::{
    payloads::SendMessage,
    prelude::*,
    requests::JsonRequest,
    types::{ChatId, ForceReply, Message, MessageId},
};

use slb_core::{
    dispatcher::{CommandDispatcher, Reply, STORE_FAILURE_TEXT},
    domain::Sender,
};

use crate::{router::AppState, sender_from_user};

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    // Photos, stickers, etc. are not logged.
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let sender = msg.from().map(sender_from_user);

    let reply = respond(&state.dispatcher, sender.as_ref(), text, msg.chat.id.0).await;
    let Some(reply) = reply else {
        return Ok(());
    };

    build_reply(&bot, msg.chat.id, quote_target(&msg), reply).await?;
    Ok(())
}

/// In groups a reply quotes the triggering message so a selective force
/// reply reaches its author.
fn quote_target(msg: &Message) -> Option<MessageId> {
    (!msg.chat.is_private()).then_some(msg.id)
}

/// Dispatch one text; store failures become [`STORE_FAILURE_TEXT`].
async fn respond(
    dispatcher: &CommandDispatcher,
    sender: Option<&Sender>,
    text: &str,
    chat_id: i64,
) -> Option<Reply> {
    match dispatcher.dispatch(sender, text).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(chat_id, error = %e, "command failed");
            Some(Reply::text(STORE_FAILURE_TEXT))
        }
    }
}

fn build_reply(
    bot: &Bot,
    chat_id: ChatId,
    reply_to: Option<MessageId>,
    reply: Reply,
) -> JsonRequest<SendMessage> {
    let mut req = bot.send_message(chat_id, reply.text);
    if let Some(id) = reply_to {
        req = req.reply_to_message_id(id);
    }
    if reply.force_reply {
        req = req.reply_markup(ForceReply::new().selective(true));
    }
    req
}
