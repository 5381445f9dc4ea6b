//! Sync all chats and messages to the sync API.
//!
//! Best-effort bulk path: per-chat failures are reported on stderr and
//! skipped, and a flood wait sleeps out the indicated duration before
//! moving on instead of aborting the batch.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::warn;

use crate::chat::{classify, display_name, fetch_dialogs, member_count, resolve_chat, username};
use crate::client;
use crate::config;
use crate::error::{Error, Result};
use crate::format::format_message_for_sync;
use crate::lock::SessionLock;
use crate::store::Store;
use crate::sync::{ChatUpsert, SyncClient};

pub struct SyncAllArgs {
    pub full: bool,
    pub chats: Vec<String>,
    pub limit: usize,
}

pub async fn run(store: &Store, args: SyncAllArgs) -> Result<Value> {
    let creds = config::load_sync_credentials(store.dir())?;
    let sync = SyncClient::new(&creds)?;

    let _lock = SessionLock::acquire(store.dir())?;
    let client = client::connect(store).await?;

    // Step 1: push metadata for every dialog.
    eprintln!("{}", json!({ "status": "syncing_chats" }));
    let dialogs = fetch_dialogs(&client, 500).await?;

    let batch: Vec<ChatUpsert> = dialogs
        .iter()
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
    let chat_counts = sync.sync_chats(&batch).await?;

    // Step 2: decide which chats get their messages synced.
    let mut targets: Vec<grammers_client::types::Chat> = Vec::new();
    if args.chats.is_empty() {
        match sync.enabled_chats().await {
            Ok(api_chats) => {
                let enabled: HashSet<String> = api_chats
                    .into_iter()
                    .filter(|c| c.sync_enabled)
                    .map(|c| c.telegram_id)
                    .collect();
                targets.extend(
                    dialogs
                        .iter()
                        .filter(|d| enabled.contains(&d.chat().id().to_string()))
                        .map(|d| d.chat().clone()),
                );
            }
            Err(err) => {
                // No listing — fall back to everything that looks like a
                // group or channel.
                warn!("Sync API chat listing failed, falling back: {}", err);
                targets.extend(
                    dialogs
                        .iter()
                        .filter(|d| {
                            matches!(classify(d.chat()), "group" | "supergroup" | "channel")
                        })
                        .map(|d| d.chat().clone()),
                );
            }
        }
    } else {
        for name in &args.chats {
            match resolve_chat(&client, name).await {
                Ok(chat) => targets.push(chat),
                Err(_) => eprintln!("{}", json!({ "warning": format!("Chat not found: {}", name) })),
            }
        }
    }

    // Step 3: per-chat message sync, skip-and-continue on failure.
    // A full backfill walks the entire history; incremental takes the most
    // recent `limit` messages per chat.
    let per_chat_limit = if args.full { usize::MAX } else { args.limit };
    let mut total_synced = 0u64;
    let mut chat_results = Vec::new();

    for chat in &targets {
        let chat_name = display_name(chat);
        eprintln!(
            "{}",
            json!({ "status": "syncing_messages", "chat": chat_name })
        );

        let messages = match collect_messages(&client, chat, per_chat_limit).await {
            Ok(messages) => messages,
            Err(Error::RateLimited(seconds)) => {
                eprintln!(
                    "{}",
                    json!({
                        "warning": format!("Rate limited on {}, waiting {}s", chat_name, seconds)
                    })
                );
                sleep(Duration::from_secs(u64::from(seconds))).await;
                continue;
            }
            Err(err) => {
                eprintln!(
                    "{}",
                    json!({ "warning": format!("Failed to read {}: {}", chat_name, err) })
                );
                continue;
            }
        };

        if messages.is_empty() {
            continue;
        }

        let counts = match sync.sync_messages(&chat.id().to_string(), &messages).await {
            Ok(counts) => counts,
            Err(err) => {
                eprintln!(
                    "{}",
                    json!({ "warning": format!("Sync failed for {}: {}", chat_name, err) })
                );
                continue;
            }
        };

        total_synced += counts.created + counts.updated;
        chat_results.push(json!({
            "chat": chat_name,
            "synced": messages.len(),
            "created": counts.created,
            "updated": counts.updated,
            "skipped": counts.skipped,
        }));

        // Brief pause between chats keeps the account under the flood
        // limits during large backfills.
        sleep(Duration::from_millis(500)).await;
    }

    Ok(json!({
        "chatsSynced": chat_counts.created + chat_counts.updated,
        "messagesSynced": total_synced,
        "chatDetails": chat_results,
    }))
}

async fn collect_messages(
    client: &grammers_client::Client,
    chat: &grammers_client::types::Chat,
    limit: usize,
) -> Result<Vec<Value>> {
    let mut messages = Vec::new();
    let mut iter = client.iter_messages(chat);

    while let Some(msg) = iter.next().await? {
        messages.push(format_message_for_sync(&msg));
        if messages.len() >= limit {
            break;
        }
    }

    Ok(messages)
}
