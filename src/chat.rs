//! Chat resolution and classification.
//!
//! A chat argument can be a numeric id, an `@username`, or a display name
//! (exact, then prefix, then substring match against the dialog list).

use grammers_client::types::{Chat, User};
use grammers_client::Client;
use grammers_tl_types as tl;

use crate::error::{Error, Result};

/// Classify a chat into the wire type string.
pub fn classify(chat: &Chat) -> &'static str {
    match chat {
        Chat::User(user) => user_kind(is_bot(user)),
        Chat::Group(group) => match &group.raw {
            tl::enums::Chat::Channel(_) | tl::enums::Chat::ChannelForbidden(_) => "supergroup",
            _ => "group",
        },
        Chat::Channel(channel) => channel_kind(channel.raw.broadcast),
    }
}

pub fn user_kind(bot: bool) -> &'static str {
    if bot {
        "bot"
    } else {
        "user"
    }
}

pub fn channel_kind(broadcast: bool) -> &'static str {
    if broadcast {
        "channel"
    } else {
        "supergroup"
    }
}

pub fn is_bot(user: &User) -> bool {
    match &user.raw {
        tl::enums::User::User(u) => u.bot,
        tl::enums::User::Empty(_) => false,
    }
}

/// Display name for any chat kind.
pub fn display_name(chat: &Chat) -> String {
    match chat {
        Chat::User(user) => {
            let name = user.full_name();
            if name.is_empty() {
                "Unknown".to_string()
            } else {
                name
            }
        }
        Chat::Group(group) => group.title().unwrap_or("Unknown").to_string(),
        Chat::Channel(channel) => channel.title().to_string(),
    }
}

/// Public username, if the chat has one.
pub fn username(chat: &Chat) -> Option<String> {
    match chat {
        Chat::User(user) => user.username().map(str::to_string),
        Chat::Channel(channel) => channel.username().map(str::to_string),
        Chat::Group(group) => match &group.raw {
            tl::enums::Chat::Channel(c) => c.username.clone(),
            _ => None,
        },
    }
}

/// Member count as reported on the dialog entity itself, if any.
pub fn member_count(chat: &Chat) -> Option<i32> {
    match chat {
        Chat::User(_) => None,
        Chat::Group(group) => match &group.raw {
            tl::enums::Chat::Chat(c) => Some(c.participants_count),
            tl::enums::Chat::Channel(c) => c.participants_count,
            _ => None,
        },
        Chat::Channel(channel) => channel.raw.participants_count,
    }
}

/// Convert a chat to an InputPeer for raw API calls.
pub fn to_input_peer(chat: &Chat) -> tl::enums::InputPeer {
    let packed = chat.pack();
    match chat {
        Chat::User(_) => tl::enums::InputPeer::User(tl::types::InputPeerUser {
            user_id: packed.id,
            access_hash: packed.access_hash.unwrap_or(0),
        }),
        Chat::Channel(_) => tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
            channel_id: packed.id,
            access_hash: packed.access_hash.unwrap_or(0),
        }),
        Chat::Group(group) => match &group.raw {
            tl::enums::Chat::Channel(c) => {
                tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
                    channel_id: c.id,
                    access_hash: c.access_hash.unwrap_or(0),
                })
            }
            _ => tl::enums::InputPeer::Chat(tl::types::InputPeerChat {
                chat_id: packed.id,
            }),
        },
    }
}

/// Convert a user to an InputUser for raw API calls.
pub fn user_to_input(user: &User) -> tl::enums::InputUser {
    let packed = user.pack();
    tl::enums::InputUser::User(tl::types::InputUser {
        user_id: packed.id,
        access_hash: packed.access_hash.unwrap_or(0),
    })
}

/// Fetch up to `limit` dialogs.
pub async fn fetch_dialogs(
    client: &Client,
    limit: usize,
) -> Result<Vec<grammers_client::types::Dialog>> {
    let mut dialogs = Vec::new();
    let mut iter = client.iter_dialogs();

    while let Some(dialog) = iter.next().await? {
        dialogs.push(dialog);
        if dialogs.len() >= limit {
            break;
        }
    }

    Ok(dialogs)
}

/// Unread message count for a dialog.
pub fn unread_count(dialog: &grammers_client::types::Dialog) -> i32 {
    match &dialog.raw {
        tl::enums::Dialog::Dialog(d) => d.unread_count,
        tl::enums::Dialog::Folder(folder) => {
            folder.unread_muted_messages_count + folder.unread_unmuted_messages_count
        }
    }
}

/// Unread mention count for a dialog.
pub fn mention_count(dialog: &grammers_client::types::Dialog) -> i32 {
    match &dialog.raw {
        tl::enums::Dialog::Dialog(d) => d.unread_mentions_count,
        tl::enums::Dialog::Folder(_) => 0,
    }
}

/// Whether a dialog sits in the archive folder (folder id 1).
pub fn is_archived(dialog: &grammers_client::types::Dialog) -> bool {
    match &dialog.raw {
        tl::enums::Dialog::Dialog(d) => d.folder_id == Some(1),
        tl::enums::Dialog::Folder(_) => true,
    }
}

/// Pick the best dialog for a name query: exact match, then prefix, then
/// substring, all case-insensitive.
pub fn match_dialog_name<'a, T>(items: &'a [(String, T)], query: &str) -> Option<&'a T> {
    let query = query.to_lowercase();

    for (name, item) in items {
        if name.to_lowercase() == query {
            return Some(item);
        }
    }
    for (name, item) in items {
        if name.to_lowercase().starts_with(&query) {
            return Some(item);
        }
    }
    for (name, item) in items {
        if name.to_lowercase().contains(&query) {
            return Some(item);
        }
    }
    None
}

/// Resolve a chat argument to a Chat.
pub async fn resolve_chat(client: &Client, chat_arg: &str) -> Result<Chat> {
    // Numeric id: match against the dialog list (a bare id cannot be
    // resolved without its access hash).
    if let Ok(chat_id) = chat_arg.parse::<i64>() {
        let dialogs = fetch_dialogs(client, 200).await?;
        for dialog in &dialogs {
            if dialog.chat().id() == chat_id {
                return Ok(dialog.chat().clone());
            }
        }
        return Err(Error::ChatNotFound(chat_arg.to_string()));
    }

    // @username: ask the server.
    if let Some(name) = chat_arg.strip_prefix('@') {
        if let Ok(Some(chat)) = client.resolve_username(name).await {
            return Ok(chat);
        }
        return Err(Error::ChatNotFound(chat_arg.to_string()));
    }

    // Fuzzy match against dialog names.
    let dialogs = fetch_dialogs(client, 200).await?;
    let named: Vec<(String, Chat)> = dialogs
        .iter()
        .map(|d| (display_name(d.chat()), d.chat().clone()))
        .collect();

    match_dialog_name(&named, chat_arg)
        .cloned()
        .ok_or_else(|| Error::ChatNotFound(chat_arg.to_string()))
}

/// Resolve a user argument (numeric id, @username, bare username, or
/// contact name) to a User.
pub async fn resolve_user(client: &Client, user_arg: &str) -> Result<User> {
    // Numeric id: look through dialogs.
    if let Ok(user_id) = user_arg.parse::<i64>() {
        let dialogs = fetch_dialogs(client, 200).await?;
        for dialog in dialogs {
            if let Chat::User(user) = dialog.chat() {
                if user.id() == user_id {
                    return Ok(user.clone());
                }
            }
        }
        return Err(Error::UserNotFound(user_arg.to_string()));
    }

    // Username, with or without the @.
    let name = user_arg.strip_prefix('@').unwrap_or(user_arg);
    if let Ok(Some(Chat::User(user))) = client.resolve_username(name).await {
        return Ok(user);
    }

    // Contact search, preferring exact name/username matches.
    let found = client
        .invoke(&tl::functions::contacts::Search {
            q: user_arg.to_string(),
            limit: 10,
        })
        .await;

    if let Ok(tl::enums::contacts::Found::Found(found)) = found {
        let users: Vec<tl::types::User> = found
            .users
            .into_iter()
            .filter_map(|u| match u {
                tl::enums::User::User(u) => Some(u),
                tl::enums::User::Empty(_) => None,
            })
            .collect();

        let wanted = user_arg.trim_start_matches('@').to_lowercase();
        let mut ordered: Vec<&tl::types::User> = Vec::new();
        // Exact name match first, then exact username, then anything.
        ordered.extend(users.iter().filter(|u| {
            join_name(u.first_name.as_deref(), u.last_name.as_deref()).to_lowercase() == wanted
        }));
        ordered.extend(users.iter().filter(|u| {
            u.username
                .as_deref()
                .map(|un| un.to_lowercase() == wanted)
                .unwrap_or(false)
        }));
        ordered.extend(users.iter());

        for candidate in ordered {
            // Candidates are rehydrated via username so the returned User
            // carries a usable access hash.
            if let Some(un) = candidate.username.as_deref() {
                if let Ok(Some(Chat::User(user))) = client.resolve_username(un).await {
                    return Ok(user);
                }
            }
        }
    }

    Err(Error::UserNotFound(user_arg.to_string()))
}

/// Join optional first/last name parts, skipping blanks.
pub fn join_name(first: Option<&str>, last: Option<&str>) -> String {
    [first, last]
        .iter()
        .filter_map(|part| *part)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_kind_by_bot_flag() {
        assert_eq!(user_kind(true), "bot");
        assert_eq!(user_kind(false), "user");
    }

    #[test]
    fn channel_kind_by_broadcast_flag() {
        assert_eq!(channel_kind(true), "channel");
        assert_eq!(channel_kind(false), "supergroup");
    }

    #[test]
    fn name_match_prefers_exact() {
        let items = vec![
            ("Alpha Team".to_string(), 1),
            ("Alpha".to_string(), 2),
            ("Beta Alpha".to_string(), 3),
        ];
        assert_eq!(match_dialog_name(&items, "alpha"), Some(&2));
    }

    #[test]
    fn name_match_falls_back_to_prefix() {
        let items = vec![
            ("Beta Alpha".to_string(), 1),
            ("Alpha Team".to_string(), 2),
        ];
        assert_eq!(match_dialog_name(&items, "alpha"), Some(&2));
    }

    #[test]
    fn name_match_falls_back_to_substring() {
        let items = vec![
            ("Team Rocket".to_string(), 1),
            ("Core Alpha Group".to_string(), 2),
        ];
        assert_eq!(match_dialog_name(&items, "alpha"), Some(&2));
    }

    #[test]
    fn name_match_is_case_insensitive() {
        let items = vec![("SEED Network".to_string(), 7)];
        assert_eq!(match_dialog_name(&items, "seed network"), Some(&7));
    }

    #[test]
    fn name_match_none_when_absent() {
        let items: Vec<(String, i32)> = vec![("Something".to_string(), 1)];
        assert_eq!(match_dialog_name(&items, "other"), None);
    }

    #[test]
    fn join_name_handles_missing_parts() {
        assert_eq!(join_name(Some("Alice"), Some("Smith")), "Alice Smith");
        assert_eq!(join_name(Some("Bob"), None), "Bob");
        assert_eq!(join_name(None, Some("Smith")), "Smith");
        assert_eq!(join_name(None, None), "");
        assert_eq!(join_name(Some(""), Some("Smith")), "Smith");
    }
}
