//! Telegram client construction from stored session state.
//!
//! The serialized MTProto session (DC + auth key) is kept base64-encoded in
//! the JSON files, so a later process can resume the connection without
//! repeating the initial key exchange.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use grammers_client::{Client, Config, InitParams};
use grammers_session::Session;

use crate::error::{Error, Result};
use crate::store::{SessionData, Store};

/// Serialize a session to its storable string form.
pub fn encode_session(session: &Session) -> String {
    BASE64.encode(session.save())
}

/// Rebuild a session from its stored string form. An empty string yields a
/// fresh session (phase 1 of login starts from nothing).
pub fn decode_session(session_string: &str) -> Result<Session> {
    if session_string.is_empty() {
        return Ok(Session::new());
    }

    let bytes = BASE64
        .decode(session_string)
        .map_err(|_| Error::InvalidSession)?;
    Session::load(&bytes).map_err(|_| Error::InvalidSession)
}

fn init_params() -> InitParams {
    InitParams {
        // Surface FLOOD_WAIT to the caller instead of sleeping in-process.
        flood_sleep_threshold: 0,
        ..Default::default()
    }
}

/// Connect with an explicit session, api_id and api_hash.
pub async fn connect_with(
    session: Session,
    api_id: i32,
    api_hash: &str,
) -> Result<Client> {
    Client::connect(Config {
        session,
        api_id,
        api_hash: api_hash.to_string(),
        params: init_params(),
    })
    .await
    .map_err(|e| Error::ConnectionFailed(e.to_string()))
}

/// Connect using the persisted authenticated session.
pub async fn connect_stored(data: &SessionData) -> Result<Client> {
    let session = decode_session(&data.session_string)?;
    connect_with(session, data.api_id, &data.api_hash).await
}

/// Load the session file and connect; the path every read/write command
/// takes.
pub async fn connect(store: &Store) -> Result<Client> {
    let data = store.load_session()?;
    connect_stored(&data).await
}
