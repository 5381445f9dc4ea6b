//! List dialogs (chats, groups, channels, DMs), optionally pushing the
//! metadata to the sync API.

use serde_json::{json, Value};

use crate::chat::{
    classify, display_name, fetch_dialogs, is_archived, member_count, unread_count, username,
};
use crate::client;
use crate::config;
use crate::error::Result;
use crate::format::format_sender;
use crate::lock::SessionLock;
use crate::store::Store;
use crate::sync::{ChatUpsert, SyncClient};

pub struct ChatsArgs {
    pub limit: usize,
    pub chat_type: String,
    pub archived: bool,
    pub sync: bool,
}

pub async fn run(store: &Store, args: ChatsArgs) -> Result<Value> {
    let _lock = SessionLock::acquire(store.dir())?;
    let client = client::connect(store).await?;

    // Over-fetch when a type filter is set so filtering does not starve
    // the requested limit.
    let fetch_limit = if args.chat_type == "all" {
        args.limit
    } else {
        args.limit * 2
    };
    let fetch_limit = if args.sync { args.limit.max(500) } else { fetch_limit };

    let dialogs = fetch_dialogs(&client, fetch_limit).await?;

    if args.sync {
        return sync_chats(store, &dialogs, &args).await;
    }

    let mut chats = Vec::new();
    for dialog in &dialogs {
        if !args.archived && is_archived(dialog) {
            continue;
        }

        let chat = dialog.chat();
        let chat_type = classify(chat);
        if args.chat_type != "all" && chat_type != args.chat_type {
            continue;
        }

        let last_message = dialog.last_message.as_ref().map(|msg| {
            let text = msg.text();
            json!({
                "date": msg.date().to_rfc3339(),
                "sender": format_sender(msg.sender().as_ref())["name"],
                "text": if text.is_empty() {
                    Value::Null
                } else {
                    Value::String(text.chars().take(200).collect())
                },
            })
        });

        let mut entry = json!({
            "id": chat.id().to_string(),
            "name": display_name(chat),
            "type": chat_type,
            "unreadCount": unread_count(dialog),
            "lastMessage": last_message,
            "username": username(chat),
        });
        if let Some(count) = member_count(chat) {
            entry["memberCount"] = json!(count);
        }

        chats.push(entry);
        if chats.len() >= args.limit {
            break;
        }
    }

    Ok(json!({ "chats": chats, "count": chats.len() }))
}

async fn sync_chats(
    store: &Store,
    dialogs: &[grammers_client::types::Dialog],
    args: &ChatsArgs,
) -> Result<Value> {
    let creds = config::load_sync_credentials(store.dir())?;
    let sync = SyncClient::new(&creds)?;

    let batch: Vec<ChatUpsert> = dialogs
        .iter()
        .filter(|dialog| {
            args.chat_type == "all" || classify(dialog.chat()) == args.chat_type
        })
        .map(|dialog| {
            let chat = dialog.chat();
            ChatUpsert {
                telegram_id: chat.id().to_string(),
                name: display_name(chat),
                chat_type: classify(chat).to_string(),
                username: username(chat),
                member_count: member_count(chat),
            }
        })
        .collect();

    let counts = sync.sync_chats(&batch).await?;

    Ok(json!({
        "synced": batch.len(),
        "created": counts.created,
        "updated": counts.updated,
    }))
}
