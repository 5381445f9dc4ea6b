//! Login subcommands: the three phases of authentication.

use serde_json::{json, Value};

use crate::config;
use crate::error::Result;
use crate::lock::SessionLock;
use crate::login::{self, Profile, SignInResult};
use crate::store::Store;

/// Phase 1: send the one-time code to the phone.
pub async fn request_code(
    store: &Store,
    phone: &str,
    api_id: Option<i32>,
    api_hash: Option<String>,
) -> Result<Value> {
    let creds = config::load_app_credentials(store.dir(), api_id, api_hash)?;

    let _lock = SessionLock::acquire(store.dir())?;
    let phone = login::request_code(store, phone, &creds).await?;

    Ok(json!({ "status": "code_sent", "phone": phone }))
}

/// Phase 2: submit the one-time code.
pub async fn sign_in(store: &Store, code: &str) -> Result<Value> {
    let _lock = SessionLock::acquire(store.dir())?;

    match login::submit_code(store, code).await? {
        SignInResult::Authenticated(profile) => Ok(success(profile)),
        SignInResult::TwoFactorRequired => Ok(json!({ "status": "2fa_required" })),
    }
}

/// Phase 3: submit the account password.
pub async fn sign_in_2fa(store: &Store, password: &str) -> Result<Value> {
    let _lock = SessionLock::acquire(store.dir())?;

    let profile = login::submit_password(store, password).await?;
    Ok(success(profile))
}

fn success(profile: Profile) -> Value {
    json!({
        "success": true,
        "phone": profile.phone,
        "name": profile.name,
        "username": profile.username,
        "userId": profile.user_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_payload_shape() {
        let value = success(Profile {
            phone: "+15550001111".to_string(),
            name: "Alice Smith".to_string(),
            username: None,
            user_id: "42".to_string(),
        });

        assert_eq!(value["success"], true);
        assert_eq!(value["phone"], "+15550001111");
        assert_eq!(value["userId"], "42");
        assert_eq!(value["username"], Value::Null);
    }
}
