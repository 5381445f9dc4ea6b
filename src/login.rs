//! Three-phase login state machine.
//!
//! Each phase runs in its own process, so the mid-handshake MTProto state
//! is serialized into the pending file between phases and the connection is
//! resumed from it. The code handshake itself goes through raw API calls
//! (`auth.sendCode` / `auth.signIn`): the high-level login helpers keep the
//! code-hash in memory, which does not survive a process boundary.

use grammers_client::types::PasswordToken;
use grammers_client::{Client, InvocationError, SignInError};
use grammers_session::Session;
use grammers_tl_types as tl;
use serde::Serialize;
use tracing::info;

use crate::chat::join_name;
use crate::client::{connect_with, decode_session, encode_session};
use crate::config::AppCredentials;
use crate::error::{Error, Result};
use crate::store::{PendingLogin, Store};

/// Authenticated profile summary returned by the final phase.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub phone: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub user_id: String,
}

/// Result of submitting the one-time code.
#[derive(Debug)]
pub enum SignInResult {
    Authenticated(Profile),
    TwoFactorRequired,
}

/// What the code-submission outcome does to the pending slot.
#[derive(Debug, PartialEq, Eq)]
pub enum PendingTransition {
    /// Login finished or is unrecoverable; the slot is discarded.
    Clear,
    /// The caller may retry with the same pending state.
    Keep,
    /// The handshake advanced; persist the updated slot.
    Update(PendingLogin),
}

/// Outcome of `auth.signIn`, reduced to what the state machine cares about.
#[derive(Debug)]
pub enum CodeOutcome {
    Success,
    PasswordNeeded { session_string: String },
    InvalidCode,
    CodeExpired,
}

/// Pure transition of the pending slot; the one piece of the login flow
/// that must not depend on a live connection.
pub fn pending_transition(pending: &PendingLogin, outcome: &CodeOutcome) -> PendingTransition {
    match outcome {
        CodeOutcome::Success => PendingTransition::Clear,
        CodeOutcome::CodeExpired => PendingTransition::Clear,
        CodeOutcome::InvalidCode => PendingTransition::Keep,
        CodeOutcome::PasswordNeeded { session_string } => {
            let mut updated = pending.clone();
            updated.session_string = session_string.clone();
            updated.phase = Some("2fa".to_string());
            PendingTransition::Update(updated)
        }
    }
}

/// Phase 1: send the one-time code and persist the pending slot.
///
/// Starting over always overwrites any previous pending login.
pub async fn request_code(
    store: &Store,
    phone: &str,
    creds: &AppCredentials,
) -> Result<String> {
    let client = connect_with(Session::new(), creds.api_id, &creds.api_hash).await?;

    let sent = client
        .invoke(&tl::functions::auth::SendCode {
            phone_number: phone.to_string(),
            api_id: creds.api_id,
            api_hash: creds.api_hash.clone(),
            settings: tl::enums::CodeSettings::Settings(tl::types::CodeSettings {
                allow_flashcall: false,
                current_number: false,
                allow_app_hash: false,
                allow_missed_call: false,
                allow_firebase: false,
                unknown_number: false,
                logout_tokens: None,
                token: None,
                app_sandbox: None,
            }),
        })
        .await
        .map_err(|err| match rpc_name(&err) {
            Some("PHONE_NUMBER_INVALID") => Error::InvalidPhone(phone.to_string()),
            _ => err.into(),
        })?;

    let tl::enums::auth::SentCode::Code(sent) = sent else {
        return Err(Error::ApiError(
            "Unexpected response to auth.sendCode".to_string(),
        ));
    };

    // Keep the DC + auth key so the next phase resumes this handshake
    // instead of re-running the key exchange.
    store.save_pending(&PendingLogin {
        phone: phone.to_string(),
        phone_code_hash: sent.phone_code_hash,
        session_string: encode_session(&client.session()),
        api_id: creds.api_id,
        api_hash: creds.api_hash.clone(),
        phase: None,
    })?;

    info!(phone, "login code sent");
    Ok(phone.to_string())
}

/// Phase 2: submit the one-time code.
pub async fn submit_code(store: &Store, code: &str) -> Result<SignInResult> {
    let pending = store.load_pending()?;
    let session = decode_session(&pending.session_string).map_err(|_| Error::NoPendingLogin)?;
    let client = connect_with(session, pending.api_id, &pending.api_hash).await?;

    let signed_in = client
        .invoke(&tl::functions::auth::SignIn {
            phone_number: pending.phone.clone(),
            phone_code_hash: pending.phone_code_hash.clone(),
            phone_code: Some(code.to_string()),
            email_verification: None,
        })
        .await;

    match signed_in {
        Ok(authorization) => {
            let profile = finish_login(store, &client, &pending, authorization)?;
            apply_transition(store, pending_transition(&pending, &CodeOutcome::Success))?;
            Ok(SignInResult::Authenticated(profile))
        }
        Err(err) => match rpc_name(&err) {
            Some("SESSION_PASSWORD_NEEDED") => {
                let outcome = CodeOutcome::PasswordNeeded {
                    session_string: encode_session(&client.session()),
                };
                apply_transition(store, pending_transition(&pending, &outcome))?;
                Ok(SignInResult::TwoFactorRequired)
            }
            Some("PHONE_CODE_INVALID") => {
                apply_transition(store, pending_transition(&pending, &CodeOutcome::InvalidCode))?;
                Err(Error::InvalidCode)
            }
            Some("PHONE_CODE_EXPIRED") => {
                apply_transition(store, pending_transition(&pending, &CodeOutcome::CodeExpired))?;
                Err(Error::CodeExpired)
            }
            _ => Err(Error::ApiError(err.to_string())),
        },
    }
}

fn apply_transition(store: &Store, transition: PendingTransition) -> Result<()> {
    match transition {
        PendingTransition::Update(updated) => store.save_pending(&updated),
        PendingTransition::Clear => {
            store.clear_pending();
            Ok(())
        }
        PendingTransition::Keep => Ok(()),
    }
}

/// Phase 3: submit the account password.
pub async fn submit_password(store: &Store, password: &str) -> Result<Profile> {
    let pending = store.load_pending()?;
    if !pending.is_two_factor() {
        return Err(Error::NotInTwoFactorPhase);
    }

    let session = decode_session(&pending.session_string).map_err(|_| Error::NoPendingLogin)?;
    let client = connect_with(session, pending.api_id, &pending.api_hash).await?;

    // SRP parameters rotate, so they are re-fetched here rather than
    // persisted from phase 2.
    let password_info = client
        .invoke(&tl::functions::account::GetPassword {})
        .await
        .map_err(Error::from)?;
    let tl::enums::account::Password::Password(password_info) = password_info;

    let token = PasswordToken::new(password_info);
    let user = match client.check_password(token, password.as_bytes()).await {
        Ok(user) => user,
        Err(SignInError::InvalidPassword) => return Err(Error::InvalidPassword),
        Err(err) => return Err(Error::ApiError(err.to_string())),
    };

    let session_string = encode_session(&client.session());
    store.save_session(
        pending.api_id,
        &pending.api_hash,
        &pending.phone,
        &session_string,
    )?;
    store.clear_pending();

    info!(phone = %pending.phone, "two-factor login complete");
    Ok(Profile {
        phone: pending.phone.clone(),
        name: user.full_name(),
        username: user.username().map(str::to_string),
        user_id: user.id().to_string(),
    })
}

fn finish_login(
    store: &Store,
    client: &Client,
    pending: &PendingLogin,
    authorization: tl::enums::auth::Authorization,
) -> Result<Profile> {
    let tl::enums::auth::Authorization::Authorization(authorization) = authorization else {
        return Err(Error::ApiError(
            "Sign-up required for this phone number".to_string(),
        ));
    };

    let session_string = encode_session(&client.session());
    store.save_session(
        pending.api_id,
        &pending.api_hash,
        &pending.phone,
        &session_string,
    )?;

    let (name, username, user_id) = match authorization.user {
        tl::enums::User::User(user) => (
            join_name(user.first_name.as_deref(), user.last_name.as_deref()),
            user.username,
            user.id.to_string(),
        ),
        tl::enums::User::Empty(user) => (String::new(), None, user.id.to_string()),
    };

    info!(phone = %pending.phone, "login complete");
    Ok(Profile {
        phone: pending.phone.clone(),
        name,
        username,
        user_id,
    })
}

fn rpc_name(err: &InvocationError) -> Option<&str> {
    match err {
        InvocationError::Rpc(rpc) => Some(rpc.name.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_fixture() -> PendingLogin {
        PendingLogin {
            phone: "+15550001111".to_string(),
            phone_code_hash: "hash123".to_string(),
            session_string: "b2xk".to_string(),
            api_id: 1234,
            api_hash: "abcd".to_string(),
            phase: None,
        }
    }

    #[test]
    fn password_needed_updates_phase_and_session() {
        let pending = pending_fixture();
        let outcome = CodeOutcome::PasswordNeeded {
            session_string: "bmV3".to_string(),
        };

        match pending_transition(&pending, &outcome) {
            PendingTransition::Update(updated) => {
                assert_eq!(updated.phase.as_deref(), Some("2fa"));
                assert_eq!(updated.session_string, "bmV3");
                // Everything else survives untouched.
                assert_eq!(updated.phone, pending.phone);
                assert_eq!(updated.phone_code_hash, pending.phone_code_hash);
            }
            other => panic!("expected Update, got {:?}", other),
        }
    }

    #[test]
    fn invalid_code_keeps_pending_for_retry() {
        let pending = pending_fixture();
        assert_eq!(
            pending_transition(&pending, &CodeOutcome::InvalidCode),
            PendingTransition::Keep
        );
    }

    #[test]
    fn expired_code_clears_pending() {
        let pending = pending_fixture();
        assert_eq!(
            pending_transition(&pending, &CodeOutcome::CodeExpired),
            PendingTransition::Clear
        );
    }

    #[test]
    fn success_clears_pending() {
        let pending = pending_fixture();
        assert_eq!(
            pending_transition(&pending, &CodeOutcome::Success),
            PendingTransition::Clear
        );
    }
}
