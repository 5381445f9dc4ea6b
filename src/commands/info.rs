//! Full metadata for one chat: description, members, pinned messages.

use grammers_client::types::Chat;
use grammers_client::Client;
use grammers_tl_types as tl;
use serde_json::{json, Value};

use crate::chat::{classify, display_name, join_name, resolve_chat, username};
use crate::client;
use crate::error::{Error, Result};
use crate::format::format_sender;
use crate::lock::SessionLock;
use crate::store::Store;

pub async fn run(store: &Store, chat_arg: &str, all_members: bool) -> Result<Value> {
    let _lock = SessionLock::acquire(store.dir())?;
    let client = client::connect(store).await?;

    let chat = resolve_chat(&client, chat_arg).await?;

    let mut info = json!({
        "id": chat.id().to_string(),
        "name": display_name(&chat),
        "type": classify(&chat),
        "username": username(&chat),
    });

    let details = match &chat {
        Chat::Channel(_) => channel_details(&client, &chat, &mut info, all_members).await,
        Chat::Group(group) => match &group.raw {
            tl::enums::Chat::Channel(_) => {
                channel_details(&client, &chat, &mut info, all_members).await
            }
            _ => group_details(&client, &chat, &mut info).await,
        },
        Chat::User(user) => {
            user_details(user, &mut info);
            Ok(())
        }
    };

    // A full-info failure other than a flood wait degrades to a note; the
    // base metadata is still useful.
    if let Err(err) = details {
        if matches!(err, Error::RateLimited(_)) {
            return Err(err);
        }
        info["error"] = json!(format!("Could not fetch full info: {}", err));
    }

    Ok(info)
}

async fn channel_details(
    client: &Client,
    chat: &Chat,
    info: &mut Value,
    all_members: bool,
) -> Result<()> {
    let packed = chat.pack();
    let full = client
        .invoke(&tl::functions::channels::GetFullChannel {
            channel: tl::enums::InputChannel::Channel(tl::types::InputChannel {
                channel_id: packed.id,
                access_hash: packed.access_hash.unwrap_or(0),
            }),
        })
        .await
        .map_err(Error::from)?;

    let tl::enums::messages::ChatFull::Full(full) = full;
    if let tl::enums::ChatFull::ChannelFull(channel_full) = &full.full_chat {
        info["description"] = optional_text(&channel_full.about);
        info["memberCount"] = json!(channel_full.participants_count);
    }

    info["pinnedMessages"] = json!(collect_pinned(client, chat).await);

    let member_limit = if all_members { 200 } else { 50 };
    match collect_members(client, chat, member_limit).await {
        Ok(members) if !members.is_empty() => info["members"] = json!(members),
        Ok(_) => {}
        Err(_) => {
            info["membersNote"] =
                json!("Cannot access member list (admin required or restricted)");
        }
    }

    Ok(())
}

async fn group_details(client: &Client, chat: &Chat, info: &mut Value) -> Result<()> {
    let full = client
        .invoke(&tl::functions::messages::GetFullChat { chat_id: chat.id() })
        .await
        .map_err(Error::from)?;

    let tl::enums::messages::ChatFull::Full(full) = full;
    if let tl::enums::ChatFull::Full(chat_full) = &full.full_chat {
        info["description"] = optional_text(&chat_full.about);
    }

    match collect_members(client, chat, 200).await {
        Ok(members) if !members.is_empty() => {
            info["memberCount"] = json!(members.len());
            info["members"] = json!(members);
        }
        _ => {}
    }

    Ok(())
}

fn user_details(user: &grammers_client::types::User, info: &mut Value) {
    if let tl::enums::User::User(raw) = &user.raw {
        info["phone"] = raw.phone.clone().map(Value::String).unwrap_or(Value::Null);
        info["isBot"] = json!(raw.bot);
        info["fullName"] = json!(join_name(
            raw.first_name.as_deref(),
            raw.last_name.as_deref()
        ));
        if let Some(status) = &raw.status {
            info["status"] = json!(status_name(status));
        }
    }
}

fn status_name(status: &tl::enums::UserStatus) -> &'static str {
    match status {
        tl::enums::UserStatus::Empty => "empty",
        tl::enums::UserStatus::Online(_) => "online",
        tl::enums::UserStatus::Offline(_) => "offline",
        tl::enums::UserStatus::Recently(_) => "recently",
        tl::enums::UserStatus::LastWeek(_) => "lastweek",
        tl::enums::UserStatus::LastMonth(_) => "lastmonth",
    }
}

/// Scan recent history for pinned messages (at most five).
async fn collect_pinned(client: &Client, chat: &Chat) -> Vec<Value> {
    let mut pinned = Vec::new();
    let mut scanned = 0;
    let mut iter = client.iter_messages(chat);

    while let Ok(Some(msg)) = iter.next().await {
        if msg.raw.pinned {
            let text: String = msg.text().chars().take(200).collect();
            pinned.push(json!({
                "id": msg.id().to_string(),
                "text": text,
                "date": msg.date().to_rfc3339(),
            }));
            if pinned.len() >= 5 {
                break;
            }
        }
        scanned += 1;
        if scanned >= 50 {
            break;
        }
    }

    pinned
}

async fn collect_members(client: &Client, chat: &Chat, limit: usize) -> Result<Vec<Value>> {
    let mut members = Vec::new();
    let mut iter = client.iter_participants(chat);

    while let Some(participant) = iter.next().await? {
        members.push(format_sender(Some(&Chat::User(participant.user.clone()))));
        if members.len() >= limit {
            break;
        }
    }

    Ok(members)
}

fn optional_text(text: &str) -> Value {
    if text.is_empty() {
        Value::Null
    } else {
        Value::String(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_text_maps_empty_to_null() {
        assert_eq!(optional_text(""), Value::Null);
        assert_eq!(optional_text("About"), Value::String("About".to_string()));
    }
}
