//! Create a basic group chat and optionally send a first message.

use grammers_client::types::Chat;
use grammers_tl_types as tl;
use serde_json::{json, Value};

use crate::chat::{resolve_chat, resolve_user, user_to_input};
use crate::client;
use crate::error::{Error, Result};
use crate::format::format_sender;
use crate::lock::SessionLock;
use crate::store::Store;

pub async fn run(
    store: &Store,
    title: &str,
    user_args: &[String],
    message: Option<&str>,
) -> Result<Value> {
    if title.trim().is_empty() {
        return Err(Error::InvalidInput("Group title cannot be empty".to_string()));
    }
    if user_args.is_empty() {
        return Err(Error::InvalidInput("At least one user is required".to_string()));
    }

    let _lock = SessionLock::acquire(store.dir())?;
    let client = client::connect(store).await?;

    let mut resolved = Vec::new();
    let mut failed = Vec::new();
    for user_arg in user_args {
        match resolve_user(&client, user_arg).await {
            Ok(user) => resolved.push(user),
            Err(_) => failed.push(user_arg.clone()),
        }
    }

    if !failed.is_empty() {
        return Err(Error::UserNotFound(failed.join(", ")));
    }

    let created = client
        .invoke(&tl::functions::messages::CreateChat {
            users: resolved.iter().map(user_to_input).collect(),
            title: title.to_string(),
            ttl_period: None,
        })
        .await
        .map_err(|err| match Error::from(err) {
            err @ Error::RateLimited(_) => err,
            other => Error::CreateError(other.to_string()),
        })?;

    let (chat_id, chat_title) = created_chat_identity(&created)
        .unwrap_or((None, title.to_string()));

    // The group exists at this point; a failing first message must not turn
    // the whole command into an error.
    let first_message = match (message, chat_id) {
        (Some(text), Some(id)) if !text.trim().is_empty() => {
            Some(send_first_message(&client, id, text).await)
        }
        _ => None,
    };

    let members: Vec<Value> = resolved
        .iter()
        .map(|user| format_sender(Some(&Chat::User(user.clone()))))
        .collect();

    Ok(json!({
        "success": true,
        "chatId": chat_id,
        "title": chat_title,
        "members": members,
        "memberCount": members.len() + 1,
        "firstMessage": first_message,
    }))
}

/// Pull the created chat's id and title out of the returned updates.
fn created_chat_identity(
    created: &tl::enums::messages::InvitedUsers,
) -> Option<(Option<i64>, String)> {
    let tl::enums::messages::InvitedUsers::Users(invited) = created;
    let tl::enums::Updates::Updates(updates) = &invited.updates else {
        return None;
    };

    for chat in &updates.chats {
        if let tl::enums::Chat::Chat(chat) = chat {
            return Some((Some(chat.id), chat.title.clone()));
        }
    }
    None
}

async fn send_first_message(
    client: &grammers_client::Client,
    chat_id: i64,
    text: &str,
) -> Value {
    let target = match resolve_chat(client, &chat_id.to_string()).await {
        Ok(chat) => chat,
        Err(err) => {
            return json!({
                "error": format!("Group created but failed to send message: {}", err),
            })
        }
    };

    match client.send_message(&target, text).await {
        Ok(sent) => json!({
            "messageId": sent.id(),
            "text": text,
            "date": sent.date().to_rfc3339(),
        }),
        Err(err) => json!({
            "error": format!("Group created but failed to send message: {}", err),
        }),
    }
}
