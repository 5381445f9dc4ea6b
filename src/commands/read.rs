//! Read messages from one chat, with date and sender filters, optionally
//! pushing the result to the sync API.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::chat::{resolve_chat, resolve_user};
use crate::client;
use crate::config;
use crate::error::Result;
use crate::format::{
    chat_summary, format_message, format_message_for_sync, parse_date, parse_date_end_of_day,
};
use crate::lock::SessionLock;
use crate::store::Store;
use crate::sync::SyncClient;

pub struct ReadArgs {
    pub chat: String,
    pub limit: usize,
    pub offset_id: i32,
    pub since: Option<String>,
    pub until: Option<String>,
    pub from_user: Option<String>,
    pub sync: bool,
}

pub async fn run(store: &Store, args: ReadArgs) -> Result<Value> {
    let since = args.since.as_deref().map(parse_date).transpose()?;
    let until = args.until.as_deref().map(parse_date_end_of_day).transpose()?;

    let _lock = SessionLock::acquire(store.dir())?;
    let client = client::connect(store).await?;

    let chat = resolve_chat(&client, &args.chat).await?;

    let sender_filter = match &args.from_user {
        Some(user_arg) => Some(resolve_user(&client, user_arg).await?.id()),
        None => None,
    };

    let mut messages = Vec::new();
    let mut has_more = false;
    let mut iter = client.iter_messages(&chat);
    if args.offset_id > 0 {
        iter = iter.offset_id(args.offset_id);
    }

    while let Some(msg) = iter.next().await? {
        // Newest-first: anything older than `since` ends the scan.
        if let Some(min_date) = since {
            if msg.date() < min_date {
                break;
            }
        }
        if !within_until(&msg.date(), until) {
            continue;
        }
        if let Some(wanted) = sender_filter {
            let sender_id = msg.sender().map(|s| s.id());
            if sender_id != Some(wanted) {
                continue;
            }
        }

        messages.push(msg);
        if messages.len() >= args.limit {
            has_more = true;
            break;
        }
    }

    if args.sync {
        return sync_messages(store, &chat, &messages).await;
    }

    let formatted: Vec<Value> = messages.iter().map(format_message).collect();
    Ok(json!({
        "chat": chat_summary(&chat),
        "messages": formatted,
        "count": formatted.len(),
        "hasMore": has_more,
    }))
}

fn within_until(date: &DateTime<Utc>, until: Option<DateTime<Utc>>) -> bool {
    match until {
        Some(max_date) => *date <= max_date,
        None => true,
    }
}

async fn sync_messages(
    store: &Store,
    chat: &grammers_client::types::Chat,
    messages: &[grammers_client::types::Message],
) -> Result<Value> {
    if messages.is_empty() {
        return Ok(json!({
            "synced": 0,
            "chat": chat_summary(chat)["name"],
            "note": "No messages to sync",
        }));
    }

    let creds = config::load_sync_credentials(store.dir())?;
    let sync = SyncClient::new(&creds)?;

    let payload: Vec<Value> = messages.iter().map(format_message_for_sync).collect();
    let counts = sync
        .sync_messages(&chat.id().to_string(), &payload)
        .await?;

    Ok(json!({
        "synced": payload.len(),
        "created": counts.created,
        "updated": counts.updated,
        "skipped": counts.skipped,
        "chat": chat_summary(chat)["name"],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn until_filter_is_inclusive() {
        let cutoff = parse_date_end_of_day("2026-02-10").unwrap();
        let inside = parse_date("2026-02-10T23:59:59").unwrap();
        let outside = parse_date("2026-02-11T00:00:00").unwrap();

        assert!(within_until(&inside, Some(cutoff)));
        assert!(!within_until(&outside, Some(cutoff)));
        assert!(within_until(&outside, None));
    }
}
