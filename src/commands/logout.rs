//! Logout: delete the stored session, optionally revoking it server-side.

use serde_json::{json, Value};
use tracing::warn;

use crate::client;
use crate::error::Result;
use crate::lock::SessionLock;
use crate::store::Store;

pub async fn run(store: &Store, revoke: bool) -> Result<Value> {
    if !store.session_exists() {
        return Ok(json!({
            "success": true,
            "note": "No session found, already logged out",
        }));
    }

    if revoke {
        let _lock = SessionLock::acquire(store.dir())?;
        // Local deletion proceeds even if the remote revoke fails; the
        // local file is what controls subsequent command behavior.
        match client::connect(store).await {
            Ok(connected) => {
                if let Err(err) = connected.sign_out().await {
                    warn!("Failed to revoke session remotely: {}", err);
                }
            }
            Err(err) => warn!("Failed to connect for revoke: {}", err),
        }
    }

    store.clear_session();
    Ok(json!({ "success": true, "revoked": revoke }))
}
