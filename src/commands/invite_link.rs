//! Export an invite link for a group or channel.

use chrono::{Duration, Utc};
use grammers_tl_types as tl;
use serde_json::{json, Value};

use crate::chat::{classify, display_name, resolve_chat, to_input_peer};
use crate::client;
use crate::error::{Error, Result};
use crate::lock::SessionLock;
use crate::store::Store;

pub struct InviteLinkArgs {
    pub chat: String,
    pub title: Option<String>,
    pub expire_hours: Option<i64>,
    pub member_limit: Option<i32>,
}

pub async fn run(store: &Store, args: InviteLinkArgs) -> Result<Value> {
    let _lock = SessionLock::acquire(store.dir())?;
    let client = client::connect(store).await?;

    let chat = resolve_chat(&client, &args.chat).await?;

    let chat_type = classify(&chat);
    if !matches!(chat_type, "group" | "supergroup" | "channel") {
        return Err(Error::InvalidChatType(chat_type.to_string()));
    }

    let expire_date = args
        .expire_hours
        .map(|hours| (Utc::now() + Duration::hours(hours)).timestamp() as i32);

    let exported = client
        .invoke(&tl::functions::messages::ExportChatInvite {
            legacy_revoke_permanent: false,
            request_needed: false,
            peer: to_input_peer(&chat),
            expire_date,
            usage_limit: args.member_limit,
            title: args.title.clone(),
            subscription_pricing: None,
        })
        .await
        .map_err(|err| match Error::from(err) {
            Error::AdminRequired(_) => {
                Error::AdminRequired("invite link creation".to_string())
            }
            err @ Error::RateLimited(_) => err,
            other => Error::ExportError(other.to_string()),
        })?;

    let tl::enums::ExportedChatInvite::ChatInviteExported(invite) = exported else {
        return Err(Error::ExportError(
            "Unexpected response to exportChatInvite".to_string(),
        ));
    };

    Ok(json!({
        "success": true,
        "link": invite.link,
        "chatId": chat.id().to_string(),
        "chatName": display_name(&chat),
        "chatType": chat_type,
        "title": invite.title,
        "expireDate": invite.expire_date,
        "usageLimit": invite.usage_limit,
    }))
}
