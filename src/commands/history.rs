//! Export full chat history as JSONL for backfill/indexing.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use serde_json::{json, Value};

use crate::chat::{display_name, resolve_chat};
use crate::client;
use crate::error::{Error, Result};
use crate::format::{format_message, parse_date};
use crate::lock::SessionLock;
use crate::store::Store;

pub struct HistoryArgs {
    pub chat: String,
    pub output: Option<PathBuf>,
    pub since: Option<String>,
    pub batch_size: usize,
}

pub async fn run(store: &Store, args: HistoryArgs) -> Result<Value> {
    let min_date = args.since.as_deref().map(parse_date).transpose()?;

    let _lock = SessionLock::acquire(store.dir())?;
    let client = client::connect(store).await?;

    let chat = resolve_chat(&client, &args.chat).await?;
    let chat_name = display_name(&chat);
    let chat_id = chat.id().to_string();

    let output_path = args
        .output
        .unwrap_or_else(|| default_output_path(&chat_name));
    let file = File::create(&output_path)?;
    let mut writer = BufWriter::new(file);

    let batch_size = args.batch_size.max(1);
    let mut total = 0usize;
    let mut iter = client.iter_messages(&chat);

    loop {
        let msg = match iter.next().await {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(err) => {
                // A partial export is still useful; report how far it got
                // and when to resume.
                writer.flush()?;
                let err: Error = err.into();
                if let Some(seconds) = err.flood_wait_seconds() {
                    return Ok(json!({
                        "exported": total,
                        "outputPath": output_path.display().to_string(),
                        "chat": chat_name,
                        "partial": true,
                        "floodWait": seconds,
                        "note": format!(
                            "Rate limited after {} messages. Retry in {}s to continue.",
                            total, seconds
                        ),
                    }));
                }
                return Err(Error::ExportError(err.to_string()));
            }
        };

        if let Some(min_date) = min_date {
            if msg.date() < min_date {
                break;
            }
        }

        let mut line = format_message(&msg);
        line["chatId"] = json!(chat_id);
        line["chatName"] = json!(chat_name);
        writeln!(writer, "{}", line)?;
        total += 1;

        if total % batch_size == 0 {
            eprintln!("{}", json!({ "status": "progress", "exported": total }));
        }
    }

    writer.flush()?;

    Ok(json!({
        "exported": total,
        "outputPath": output_path.display().to_string(),
        "chat": chat_name,
        "partial": false,
    }))
}

fn default_output_path(chat_name: &str) -> PathBuf {
    let safe: String = chat_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(30)
        .collect();
    std::env::temp_dir().join(format!("telegram-{}-{}.jsonl", safe, std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_path_sanitizes_name() {
        let path = default_output_path("Seed Club: Deals!");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("telegram-Seed_Club__Deals_"));
        assert!(name.ends_with(".jsonl"));
    }
}
