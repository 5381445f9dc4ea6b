//! Fetch new messages since the last digest for all active chats.
//!
//! Candidate chats are, with a filter, the named chats; without one, every
//! chat with unread messages plus — under `--include-read` — every chat
//! that already has a watermark even if Telegram shows it as read.
//! Telegram's unread flag resets when the user opens the app, so it says
//! nothing about what the agent has processed; the watermark does.

use serde_json::{json, Value};
use tracing::debug;

use crate::chat::{classify, display_name, fetch_dialogs, unread_count, username};
use crate::client;
use crate::error::{Error, Result};
use crate::format::format_message;
use crate::lock::SessionLock;
use crate::store::Store;
use crate::watermarks::{WatermarkStore, WatermarkUpdate};

pub struct DigestArgs {
    /// Comma-separated chat names/usernames; None selects automatically.
    pub chats: Option<String>,
    pub limit: usize,
    pub include_read: bool,
    pub dry_run: bool,
}

/// What candidate selection needs to know about one dialog.
#[derive(Debug, Clone)]
pub struct DialogMeta {
    pub chat_id: String,
    pub name: String,
    pub username: Option<String>,
    pub unread_count: i32,
    pub watermark_id: Option<i32>,
}

/// Split the `--chats` argument into trimmed, non-empty filters.
pub fn parse_chat_filter(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Case-insensitive match against a chat's name (exact or substring) or
/// its username (exact, leading `@` ignored).
pub fn matches_filter(name: &str, username: Option<&str>, filters: &[String]) -> bool {
    let name_lower = name.to_lowercase();
    filters.iter().any(|filter| {
        let filter_lower = filter.to_lowercase();
        if name_lower == filter_lower || name_lower.contains(&filter_lower) {
            return true;
        }
        match username {
            Some(un) => un.to_lowercase() == filter_lower.trim_start_matches('@'),
            None => false,
        }
    })
}

/// Pick the chats this run will fetch, as indices into `metas`.
pub fn select_candidates(
    metas: &[DialogMeta],
    filters: &[String],
    include_read: bool,
) -> Vec<usize> {
    metas
        .iter()
        .enumerate()
        .filter(|(_, meta)| {
            if !filters.is_empty() {
                return matches_filter(&meta.name, meta.username.as_deref(), filters);
            }
            meta.unread_count > 0 || (include_read && meta.watermark_id.is_some())
        })
        .map(|(index, _)| index)
        .collect()
}

pub async fn run(store: &Store, args: DigestArgs) -> Result<Value> {
    let filters = parse_chat_filter(args.chats.as_deref());
    let watermark_store = WatermarkStore::new(store.dir());
    let watermarks = watermark_store.load();

    let _lock = SessionLock::acquire(store.dir())?;
    let client = client::connect(store).await?;

    let dialogs = fetch_dialogs(&client, 500).await?;

    let metas: Vec<DialogMeta> = dialogs
        .iter()
        .map(|dialog| {
            let chat = dialog.chat();
            let chat_id = chat.id().to_string();
            let watermark_id = watermarks.get(&chat_id).map(|w| w.last_message_id);
            DialogMeta {
                chat_id,
                name: display_name(chat),
                username: username(chat),
                unread_count: unread_count(dialog),
                watermark_id,
            }
        })
        .collect();

    let candidates = select_candidates(&metas, &filters, args.include_read);

    if candidates.is_empty() {
        return Ok(json!({
            "chats": [],
            "totalNewMessages": 0,
            "note": "No chats with new messages since last digest.",
        }));
    }

    let mut digest_chats = Vec::new();
    let mut updates: Vec<WatermarkUpdate> = Vec::new();
    let mut total_new = 0usize;

    for index in candidates {
        let meta = &metas[index];
        let chat = dialogs[index].chat();

        let chat_block = json!({
            "id": meta.chat_id,
            "name": meta.name,
            "type": classify(chat),
            "username": meta.username,
        });

        // Per-chat failures are recorded and the batch keeps going.
        let messages = match fetch_new_messages(&client, chat, meta.watermark_id, args.limit)
            .await
        {
            Ok(messages) => messages,
            Err(err) => {
                let description = match &err {
                    Error::RateLimited(seconds) => format!("Rate limited ({}s)", seconds),
                    other => other.to_string(),
                };
                digest_chats.push(json!({
                    "chat": chat_block,
                    "error": description,
                    "messages": [],
                    "newCount": 0,
                }));
                continue;
            }
        };

        if messages.is_empty() {
            debug!(chat = %meta.name, "no new messages");
            continue;
        }

        let max_id = messages.iter().map(|m| m.id()).max().unwrap_or(0);
        let formatted: Vec<Value> = messages.iter().map(format_message).collect();
        total_new += formatted.len();

        digest_chats.push(json!({
            "chat": chat_block,
            "messages": formatted,
            "newCount": formatted.len(),
            "previousWatermark": meta.watermark_id,
        }));

        updates.push(WatermarkUpdate {
            chat_id: meta.chat_id.clone(),
            message_id: max_id,
            chat_name: Some(meta.name.clone()),
        });
    }

    let updated = !args.dry_run && !updates.is_empty();
    if updated {
        watermark_store.set_batch(&updates)?;
    }

    Ok(json!({
        "chats": digest_chats,
        "chatCount": digest_chats.len(),
        "totalNewMessages": total_new,
        "watermarksUpdated": updated,
        "dryRun": args.dry_run,
    }))
}

/// Fetch messages newer than the watermark, newest-first, up to `limit`.
/// The stored cursor doubles as the fetch's lower bound, so the two can
/// never drift apart. The result is reversed to chronological order.
async fn fetch_new_messages(
    client: &grammers_client::Client,
    chat: &grammers_client::types::Chat,
    watermark_id: Option<i32>,
    limit: usize,
) -> Result<Vec<grammers_client::types::Message>> {
    let mut messages = Vec::new();
    let mut iter = client.iter_messages(chat);

    while let Some(msg) = iter.next().await? {
        if let Some(lower_bound) = watermark_id {
            if msg.id() <= lower_bound {
                break;
            }
        }
        messages.push(msg);
        if messages.len() >= limit {
            break;
        }
    }

    messages.reverse();
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(
        chat_id: &str,
        name: &str,
        username: Option<&str>,
        unread: i32,
        watermark: Option<i32>,
    ) -> DialogMeta {
        DialogMeta {
            chat_id: chat_id.to_string(),
            name: name.to_string(),
            username: username.map(str::to_string),
            unread_count: unread,
            watermark_id: watermark,
        }
    }

    #[test]
    fn filter_parsing_trims_and_drops_empties() {
        assert_eq!(
            parse_chat_filter(Some("Chat A, Chat B ,,")),
            vec!["Chat A".to_string(), "Chat B".to_string()]
        );
        assert!(parse_chat_filter(None).is_empty());
    }

    #[test]
    fn filter_matches_name_exact_and_substring() {
        let filters = vec!["deals".to_string()];
        assert!(matches_filter("Deals", None, &filters));
        assert!(matches_filter("Seed Club Deals", None, &filters));
        assert!(!matches_filter("Announcements", None, &filters));
    }

    #[test]
    fn filter_matches_username_exactly() {
        let filters = vec!["@seedclub".to_string()];
        assert!(matches_filter("Whatever", Some("seedclub"), &filters));
        assert!(!matches_filter("Whatever", Some("seedclubdeals"), &filters));
    }

    #[test]
    fn explicit_filter_overrides_unread_state() {
        let metas = vec![
            meta("1", "Deals", None, 0, None),
            meta("2", "Other", None, 5, None),
        ];
        let selected = select_candidates(&metas, &["deals".to_string()], false);
        assert_eq!(selected, vec![0]);
    }

    #[test]
    fn auto_selection_takes_unread_chats() {
        let metas = vec![
            meta("1", "Quiet", None, 0, None),
            meta("2", "Busy", None, 3, None),
        ];
        let selected = select_candidates(&metas, &[], false);
        assert_eq!(selected, vec![1]);
    }

    #[test]
    fn read_chats_with_watermarks_need_include_read() {
        // A previously-digested chat the user has since opened: unread is
        // zero but the watermark exists.
        let metas = vec![meta("1", "Digested", None, 0, Some(100))];

        assert!(select_candidates(&metas, &[], false).is_empty());
        assert_eq!(select_candidates(&metas, &[], true), vec![0]);
    }

    #[test]
    fn unwatermarked_read_chats_stay_excluded_even_with_include_read() {
        let metas = vec![meta("1", "Fresh", None, 0, None)];
        assert!(select_candidates(&metas, &[], true).is_empty());
    }

    #[test]
    fn unread_chat_without_watermark_is_selected() {
        // The end-to-end shape: one unread chat, no prior watermark.
        let metas = vec![meta("42", "Inbox", None, 3, None)];
        let selected = select_candidates(&metas, &[], false);
        assert_eq!(selected, vec![0]);
        assert_eq!(metas[selected[0]].watermark_id, None);
    }
}
