//! Search messages in one chat or across all chats.

use serde_json::{json, Value};

use crate::chat::{resolve_chat, resolve_user};
use crate::client;
use crate::error::{Error, Result};
use crate::format::{chat_summary, format_message, parse_date};
use crate::lock::SessionLock;
use crate::store::Store;

pub struct SearchArgs {
    pub query: String,
    pub chat: Option<String>,
    pub limit: usize,
    pub from_user: Option<String>,
    pub since: Option<String>,
}

pub async fn run(store: &Store, args: SearchArgs) -> Result<Value> {
    if args.query.trim().chars().count() < 2 {
        return Err(Error::InvalidQuery);
    }

    let since = args.since.as_deref().map(parse_date).transpose()?;

    let _lock = SessionLock::acquire(store.dir())?;
    let client = client::connect(store).await?;

    let chat = match &args.chat {
        Some(chat_arg) => Some(resolve_chat(&client, chat_arg).await?),
        None => None,
    };

    // Sender filter failures are ignored here: search narrows, it does not
    // fail, when the user cannot be resolved.
    let sender_filter = match &args.from_user {
        Some(user_arg) => resolve_user(&client, user_arg).await.ok().map(|u| u.id()),
        None => None,
    };

    let mut formatted = Vec::new();

    match &chat {
        Some(chat) => {
            let mut iter = client.search_messages(chat).query(&args.query);
            while let Some(msg) = iter.next().await? {
                if let Some(min_date) = since {
                    if msg.date() < min_date {
                        continue;
                    }
                }
                if let Some(wanted) = sender_filter {
                    if msg.sender().map(|s| s.id()) != Some(wanted) {
                        continue;
                    }
                }
                formatted.push(format_message(&msg));
                if formatted.len() >= args.limit {
                    break;
                }
            }
        }
        None => {
            let mut iter = client.search_all_messages().query(&args.query);
            while let Some(msg) = iter.next().await? {
                if let Some(min_date) = since {
                    if msg.date() < min_date {
                        continue;
                    }
                }
                if let Some(wanted) = sender_filter {
                    if msg.sender().map(|s| s.id()) != Some(wanted) {
                        continue;
                    }
                }
                let mut entry = format_message(&msg);
                entry["chat"] = chat_summary(&msg.chat());
                formatted.push(entry);
                if formatted.len() >= args.limit {
                    break;
                }
            }
        }
    }

    let mut result = json!({
        "query": args.query,
        "messages": formatted,
        "count": formatted.len(),
    });
    if let Some(chat) = &chat {
        result["chat"] = chat_summary(chat);
    }

    Ok(result)
}
