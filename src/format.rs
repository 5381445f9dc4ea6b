//! JSON shaping for senders and messages, plus date-argument parsing.
//!
//! Output keys are camelCase and stable; they are consumed by scripts, not
//! humans.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use grammers_client::types::{Chat, Media, Message};
use grammers_tl_types as tl;
use serde_json::{json, Value};

use crate::chat::{classify, display_name, is_bot, username};
use crate::error::{Error, Result};

/// Format a message sender. Missing senders degrade to "Unknown" rather
/// than failing the command.
pub fn format_sender(sender: Option<&Chat>) -> Value {
    match sender {
        None => json!({ "id": null, "name": "Unknown", "username": null }),
        Some(chat) => {
            let bot = match chat {
                Chat::User(user) => is_bot(user),
                _ => false,
            };
            json!({
                "id": chat.id().to_string(),
                "name": display_name(chat),
                "username": username(chat),
                "isBot": bot,
            })
        }
    }
}

/// Format one message into the wire shape shared by read/search/digest.
pub fn format_message(msg: &Message) -> Value {
    let text = msg.text();

    json!({
        "id": msg.id().to_string(),
        "date": msg.date().to_rfc3339(),
        "sender": format_sender(msg.sender().as_ref()),
        "text": if text.is_empty() { Value::Null } else { Value::String(text.to_string()) },
        "replyTo": msg.reply_to_message_id().map(|id| id.to_string()),
        "forwardFrom": forward_origin(msg),
        "mediaType": msg.media().as_ref().map(media_kind),
        "views": msg.raw.views,
        "reactions": format_reactions(msg.raw.reactions.as_ref()),
        "isPinned": msg.raw.pinned,
        "editDate": msg.raw.edit_date
            .and_then(|ts| Utc.timestamp_opt(i64::from(ts), 0).single())
            .map(|dt| dt.to_rfc3339()),
    })
}

/// Original author of a forwarded message, when the header names one.
fn forward_origin(msg: &Message) -> Value {
    match &msg.raw.fwd_from {
        Some(tl::enums::MessageFwdHeader::Header(header)) => header
            .from_name
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
        None => Value::Null,
    }
}

/// Classify message media into the wire type string.
pub fn media_kind(media: &Media) -> &'static str {
    match media {
        Media::Photo(_) => "photo",
        Media::Sticker(_) => "sticker",
        Media::Document(document) => match &document.raw {
            tl::enums::Document::Document(doc) => document_kind(&doc.attributes),
            tl::enums::Document::Empty(_) => "document",
        },
        Media::Contact(_) => "contact",
        Media::Poll(_) => "poll",
        Media::Geo(_) | Media::GeoLive(_) => "geo",
        Media::Venue(_) => "venue",
        Media::Dice(_) => "dice",
        Media::WebPage(_) => "webpage",
        _ => "media",
    }
}

/// Pick a media kind from document attributes.
pub fn document_kind(attributes: &[tl::enums::DocumentAttribute]) -> &'static str {
    for attr in attributes {
        match attr {
            tl::enums::DocumentAttribute::Video(_) => return "video",
            tl::enums::DocumentAttribute::Audio(audio) => {
                return if audio.voice { "voice" } else { "audio" };
            }
            tl::enums::DocumentAttribute::Sticker(_) => return "sticker",
            _ => {}
        }
    }
    "document"
}

/// Extract (emoji, count) pairs from a message's raw reactions.
fn reaction_counts(reactions: Option<&tl::enums::MessageReactions>) -> Vec<(String, i32)> {
    let Some(tl::enums::MessageReactions::Reactions(reactions)) = reactions else {
        return Vec::new();
    };

    reactions
        .results
        .iter()
        .map(|result| {
            let tl::enums::ReactionCount::Count(count) = result;
            let emoji = match &count.reaction {
                tl::enums::Reaction::Emoji(emoji) => emoji.emoticon.clone(),
                other => format!("{:?}", other),
            };
            (emoji, count.count)
        })
        .collect()
}

/// Render reaction pairs, or null when the message has none.
pub fn render_reactions(counts: &[(String, i32)]) -> Value {
    if counts.is_empty() {
        return Value::Null;
    }
    Value::Array(
        counts
            .iter()
            .map(|(emoji, count)| json!({ "emoji": emoji, "count": count }))
            .collect(),
    )
}

fn format_reactions(reactions: Option<&tl::enums::MessageReactions>) -> Value {
    render_reactions(&reaction_counts(reactions))
}

/// Flattened message shape expected by the sync API.
pub fn format_message_for_sync(msg: &Message) -> Value {
    let sender = msg.sender();
    let (sender_id, sender_name, sender_username, sender_is_bot) = match &sender {
        None => (Value::Null, Value::Null, Value::Null, false),
        Some(chat) => (
            Value::String(chat.id().to_string()),
            Value::String(display_name(chat)),
            username(chat).map(Value::String).unwrap_or(Value::Null),
            match chat {
                Chat::User(user) => is_bot(user),
                _ => false,
            },
        ),
    };

    let text = msg.text();
    json!({
        "telegramMessageId": msg.id().to_string(),
        "senderId": sender_id,
        "senderName": sender_name,
        "senderUsername": sender_username,
        "senderIsBot": sender_is_bot,
        "text": if text.is_empty() { Value::Null } else { Value::String(text.to_string()) },
        "date": msg.date().to_rfc3339(),
        "replyToMessageId": msg.reply_to_message_id().map(|id| id.to_string()),
        "mediaType": msg.media().as_ref().map(media_kind),
        "views": msg.raw.views,
        "isPinned": msg.raw.pinned,
        "editDate": msg.raw.edit_date
            .and_then(|ts| Utc.timestamp_opt(i64::from(ts), 0).single())
            .map(|dt| dt.to_rfc3339()),
    })
}

/// Summary block for a chat, used by read/search/digest output.
pub fn chat_summary(chat: &Chat) -> Value {
    json!({
        "id": chat.id().to_string(),
        "name": display_name(chat),
        "type": classify(chat),
        "username": username(chat),
    })
}

/// Parse an ISO-8601 timestamp or a `YYYY-MM-DD` date, as UTC.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(Error::InvalidInput(format!(
        "Invalid date '{}'. Use ISO 8601 or YYYY-MM-DD.",
        input
    )))
}

/// Like [`parse_date`], but date-only inputs resolve to the end of that
/// day; full timestamps keep their time.
pub fn parse_date_end_of_day(input: &str) -> Result<DateTime<Utc>> {
    let parsed = parse_date(input)?;
    if !input.contains('T') && !input.contains(' ') {
        if let Some(end) = parsed.date_naive().and_hms_opt(23, 59, 59) {
            return Ok(Utc.from_utc_datetime(&end));
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parse_date_iso_timestamp() {
        let dt = parse_date("2026-02-10T15:30:00").unwrap();
        assert_eq!(dt.hour(), 15);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn parse_date_rfc3339_with_offset() {
        let dt = parse_date("2026-02-10T15:30:00+02:00").unwrap();
        assert_eq!(dt.hour(), 13);
    }

    #[test]
    fn parse_date_date_only_is_midnight() {
        let dt = parse_date("2026-02-10").unwrap();
        assert_eq!(dt.hour(), 0);
        assert_eq!(dt.minute(), 0);
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("tomorrow").is_err());
        assert!(parse_date("2026-13-45").is_err());
    }

    #[test]
    fn end_of_day_for_date_only() {
        let dt = parse_date_end_of_day("2026-02-10").unwrap();
        assert_eq!(dt.hour(), 23);
        assert_eq!(dt.minute(), 59);
        assert_eq!(dt.second(), 59);
    }

    #[test]
    fn end_of_day_preserves_explicit_time() {
        let dt = parse_date_end_of_day("2026-02-10T08:00:00").unwrap();
        assert_eq!(dt.hour(), 8);
        assert_eq!(dt.minute(), 0);
    }

    #[test]
    fn document_kind_prefers_typed_attributes() {
        let audio = tl::enums::DocumentAttribute::Audio(tl::types::DocumentAttributeAudio {
            voice: false,
            duration: 120,
            title: Some("Song".to_string()),
            performer: None,
            waveform: None,
        });
        assert_eq!(document_kind(&[audio]), "audio");

        let voice = tl::enums::DocumentAttribute::Audio(tl::types::DocumentAttributeAudio {
            voice: true,
            duration: 5,
            title: None,
            performer: None,
            waveform: None,
        });
        assert_eq!(document_kind(&[voice]), "voice");
    }

    #[test]
    fn document_kind_defaults_to_document() {
        let filename =
            tl::enums::DocumentAttribute::Filename(tl::types::DocumentAttributeFilename {
                file_name: "report.pdf".to_string(),
            });
        assert_eq!(document_kind(&[filename]), "document");
        assert_eq!(document_kind(&[]), "document");
    }

    #[test]
    fn reactions_render_emoji_counts() {
        let counts = vec![("👍".to_string(), 5), ("❤️".to_string(), 3)];
        let value = render_reactions(&counts);
        assert_eq!(value[0]["emoji"], "👍");
        assert_eq!(value[0]["count"], 5);
        assert_eq!(value[1]["emoji"], "❤️");
        assert_eq!(value[1]["count"], 3);
    }

    #[test]
    fn no_reactions_is_null() {
        assert_eq!(render_reactions(&[]), Value::Null);
    }

    #[test]
    fn missing_sender_formats_as_unknown() {
        let value = format_sender(None);
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["name"], "Unknown");
        assert_eq!(value["username"], Value::Null);
    }
}
