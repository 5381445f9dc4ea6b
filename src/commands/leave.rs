//! Leave a group or channel, optionally deleting the dialog.

use grammers_client::types::Chat;
use grammers_tl_types as tl;
use serde_json::{json, Value};

use crate::chat::{display_name, resolve_chat};
use crate::client;
use crate::error::{Error, Result};
use crate::lock::SessionLock;
use crate::store::Store;

pub async fn run(store: &Store, chat_arg: &str, delete: bool) -> Result<Value> {
    let _lock = SessionLock::acquire(store.dir())?;
    let client = client::connect(store).await?;

    let chat = resolve_chat(&client, chat_arg).await?;
    let chat_name = display_name(&chat);

    let result = if delete {
        client
            .delete_dialog(&chat)
            .await
            .map(|_| ())
            .map_err(Error::from)
    } else {
        leave_only(&client, &chat).await
    };

    result.map_err(|err| match err {
        err @ Error::RateLimited(_) => err,
        other => Error::LeaveError(other.to_string()),
    })?;

    Ok(json!({
        "success": true,
        "chat": chat_name,
        "action": if delete { "deleted" } else { "left" },
    }))
}

async fn leave_only(client: &grammers_client::Client, chat: &Chat) -> Result<()> {
    match chat {
        Chat::Channel(_) => {
            leave_channel(client, chat).await
        }
        Chat::Group(group) => match &group.raw {
            // Megagroups leave like channels; basic groups drop the dialog.
            tl::enums::Chat::Channel(_) => leave_channel(client, chat).await,
            _ => client
                .delete_dialog(chat)
                .await
                .map(|_| ())
                .map_err(Error::from),
        },
        Chat::User(_) => client
            .delete_dialog(chat)
            .await
            .map(|_| ())
            .map_err(Error::from),
    }
}

async fn leave_channel(client: &grammers_client::Client, chat: &Chat) -> Result<()> {
    let packed = chat.pack();
    client
        .invoke(&tl::functions::channels::LeaveChannel {
            channel: tl::enums::InputChannel::Channel(tl::types::InputChannel {
                channel_id: packed.id,
                access_hash: packed.access_hash.unwrap_or(0),
            }),
        })
        .await
        .map_err(Error::from)?;
    Ok(())
}
