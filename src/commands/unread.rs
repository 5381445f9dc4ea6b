//! List chats with unread messages, mentions first, busiest on top.

use serde_json::{json, Value};

use crate::chat::{classify, display_name, fetch_dialogs, mention_count, unread_count, username};
use crate::client;
use crate::error::Result;
use crate::lock::SessionLock;
use crate::store::Store;

pub async fn run(store: &Store, limit: usize, min_unread: i32) -> Result<Value> {
    let _lock = SessionLock::acquire(store.dir())?;
    let client = client::connect(store).await?;

    let dialogs = fetch_dialogs(&client, 500).await?;

    let mut total_unread = 0;
    let mut entries: Vec<(i32, i32, Value)> = Vec::new();

    for dialog in &dialogs {
        let unread = unread_count(dialog);
        if unread < min_unread {
            continue;
        }
        total_unread += unread;

        let chat = dialog.chat();
        let mentions = mention_count(dialog);
        let last_message = dialog.last_message.as_ref().map(|msg| {
            let text = msg.text();
            json!({
                "date": msg.date().to_rfc3339(),
                "text": if text.is_empty() {
                    Value::Null
                } else {
                    Value::String(text.chars().take(200).collect())
                },
            })
        });

        entries.push((
            mentions,
            unread,
            json!({
                "id": chat.id().to_string(),
                "name": display_name(chat),
                "type": classify(chat),
                "unreadCount": unread,
                "mentionCount": mentions,
                "lastMessage": last_message,
                "username": username(chat),
            }),
        ));
    }

    entries.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
    let chats: Vec<Value> = entries
        .into_iter()
        .take(limit)
        .map(|(_, _, value)| value)
        .collect();

    Ok(json!({
        "chats": chats,
        "count": chats.len(),
        "totalUnread": total_unread,
    }))
}
