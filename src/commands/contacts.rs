//! List or search contacts.

use grammers_tl_types as tl;
use serde_json::{json, Value};

use crate::chat::join_name;
use crate::client;
use crate::error::{Error, Result};
use crate::lock::SessionLock;
use crate::store::Store;

pub async fn run(store: &Store, search: Option<&str>) -> Result<Value> {
    let _lock = SessionLock::acquire(store.dir())?;
    let client = client::connect(store).await?;

    let users = match search {
        Some(query) => {
            let found = client
                .invoke(&tl::functions::contacts::Search {
                    q: query.to_string(),
                    limit: 50,
                })
                .await
                .map_err(Error::from)?;
            let tl::enums::contacts::Found::Found(found) = found;
            found.users
        }
        None => {
            let contacts = client
                .invoke(&tl::functions::contacts::GetContacts { hash: 0 })
                .await
                .map_err(Error::from)?;
            match contacts {
                tl::enums::contacts::Contacts::Contacts(contacts) => contacts.users,
                tl::enums::contacts::Contacts::NotModified => Vec::new(),
            }
        }
    };

    let contacts: Vec<Value> = users.iter().map(format_raw_user).collect();

    Ok(json!({
        "contacts": contacts,
        "count": contacts.len(),
    }))
}

fn format_raw_user(user: &tl::enums::User) -> Value {
    match user {
        tl::enums::User::User(user) => {
            let name = join_name(user.first_name.as_deref(), user.last_name.as_deref());
            json!({
                "id": user.id.to_string(),
                "name": if name.is_empty() { "Unknown".to_string() } else { name },
                "username": user.username,
                "isBot": user.bot,
            })
        }
        tl::enums::User::Empty(user) => json!({
            "id": user.id.to_string(),
            "name": "Unknown",
            "username": null,
            "isBot": false,
        }),
    }
}
