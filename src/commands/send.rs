//! Send a message to a chat.

use grammers_client::InputMessage;
use serde_json::{json, Value};

use crate::chat::{display_name, resolve_chat};
use crate::client;
use crate::error::{Error, Result};
use crate::lock::SessionLock;
use crate::store::Store;

pub async fn run(
    store: &Store,
    chat_arg: &str,
    message: &str,
    reply_to: Option<i32>,
) -> Result<Value> {
    if message.trim().is_empty() {
        return Err(Error::InvalidInput("Message cannot be empty".to_string()));
    }

    let _lock = SessionLock::acquire(store.dir())?;
    let client = client::connect(store).await?;

    let chat = resolve_chat(&client, chat_arg).await?;

    let sent = client
        .send_message(&chat, InputMessage::text(message).reply_to(reply_to))
        .await
        .map_err(|err| match Error::from(err) {
            err @ Error::RateLimited(_) => err,
            other => Error::SendError(other.to_string()),
        })?;

    Ok(json!({
        "success": true,
        "messageId": sent.id(),
        "chat": display_name(&chat),
        "date": sent.date().to_rfc3339(),
    }))
}
