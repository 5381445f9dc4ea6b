//! Error types for the Telegram agent CLI.
//!
//! Every variant carries a stable machine-readable code that ends up in the
//! `{"error", "code"}` object printed on failure.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to connect to Telegram: {0}")]
    ConnectionFailed(String),

    #[error("Not connected to Telegram. Run 'login request-code' first.")]
    NotConnected,

    #[error("Invalid session file. Re-run login.")]
    InvalidSession,

    #[error(
        "Telegram app credentials not found. Provide --api-id/--api-hash, \
         set TELEGRAM_API_ID and TELEGRAM_API_HASH, or create app.json."
    )]
    NoAppCredentials,

    #[error("No pending login session found. Run 'login request-code' first.")]
    NoPendingLogin,

    #[error("Not in 2FA state. Run 'login request-code' to start over.")]
    NotInTwoFactorPhase,

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Rate limited. Retry in {0}s")]
    RateLimited(u32),

    #[error("Invalid verification code.")]
    InvalidCode,

    #[error("Verification code expired. Run 'login request-code' again.")]
    CodeExpired,

    #[error("Invalid 2FA password.")]
    InvalidPassword,

    #[error("Chat not found: '{0}'")]
    ChatNotFound(String),

    #[error("User not found: '{0}'")]
    UserNotFound(String),

    #[error("Admin privileges required: {0}")]
    AdminRequired(String),

    #[error("Cannot create invite link for chat type: {0}")]
    InvalidChatType(String),

    #[error("Search query must be at least 2 characters")]
    InvalidQuery,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Session is locked by another process")]
    SessionLocked,

    #[error("Failed to acquire session lock: {0}")]
    LockError(String),

    #[error("Telegram API error: {0}")]
    ApiError(String),

    #[error("Sync API error: {0}")]
    SyncError(String),

    #[error("Failed to send message: {0}")]
    SendError(String),

    #[error("Failed to create group: {0}")]
    CreateError(String),

    #[error("Failed to leave chat: {0}")]
    LeaveError(String),

    #[error("Failed to export: {0}")]
    ExportError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable code string for the JSON error contract.
    pub fn code(&self) -> &'static str {
        match self {
            Error::ConnectionFailed(_) => "CONNECTION_ERROR",
            Error::NotConnected => "NOT_CONNECTED",
            Error::InvalidSession => "INVALID_SESSION",
            Error::NoAppCredentials => "NO_APP_CREDENTIALS",
            Error::NoPendingLogin => "NO_PENDING",
            Error::NotInTwoFactorPhase => "NOT_IN_2FA",
            Error::InvalidPhone(_) => "INVALID_PHONE",
            Error::RateLimited(_) => "FLOOD_WAIT",
            Error::InvalidCode => "INVALID_CODE",
            Error::CodeExpired => "CODE_EXPIRED",
            Error::InvalidPassword => "INVALID_2FA",
            Error::ChatNotFound(_) => "CHAT_NOT_FOUND",
            Error::UserNotFound(_) => "USER_NOT_FOUND",
            Error::AdminRequired(_) => "ADMIN_REQUIRED",
            Error::InvalidChatType(_) => "INVALID_CHAT_TYPE",
            Error::InvalidQuery => "INVALID_QUERY",
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::SessionLocked => "SESSION_LOCKED",
            Error::LockError(_) => "LOCK_ERROR",
            Error::ApiError(_) => "API_ERROR",
            Error::SyncError(_) => "SYNC_ERROR",
            Error::SendError(_) => "SEND_ERROR",
            Error::CreateError(_) => "CREATE_ERROR",
            Error::LeaveError(_) => "LEAVE_ERROR",
            Error::ExportError(_) => "EXPORT_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Flood-wait duration, if this error carries one.
    pub fn flood_wait_seconds(&self) -> Option<u32> {
        match self {
            Error::RateLimited(seconds) => Some(*seconds),
            _ => None,
        }
    }
}

impl From<grammers_client::InvocationError> for Error {
    fn from(err: grammers_client::InvocationError) -> Self {
        use grammers_client::InvocationError;

        if let InvocationError::Rpc(rpc) = &err {
            if rpc.name.starts_with("FLOOD_WAIT") {
                return Error::RateLimited(rpc.value.unwrap_or(0));
            }
            match rpc.name.as_str() {
                "PHONE_NUMBER_INVALID" => return Error::InvalidPhone(String::new()),
                "PHONE_CODE_INVALID" => return Error::InvalidCode,
                "PHONE_CODE_EXPIRED" => return Error::CodeExpired,
                "PASSWORD_HASH_INVALID" => return Error::InvalidPassword,
                "CHAT_ADMIN_REQUIRED" => return Error::AdminRequired(rpc.name.clone()),
                _ => {}
            }
        }

        Error::ApiError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::NotConnected.code(), "NOT_CONNECTED");
        assert_eq!(Error::NoPendingLogin.code(), "NO_PENDING");
        assert_eq!(Error::NotInTwoFactorPhase.code(), "NOT_IN_2FA");
        assert_eq!(Error::InvalidCode.code(), "INVALID_CODE");
        assert_eq!(Error::CodeExpired.code(), "CODE_EXPIRED");
        assert_eq!(Error::InvalidPassword.code(), "INVALID_2FA");
        assert_eq!(Error::RateLimited(30).code(), "FLOOD_WAIT");
        assert_eq!(Error::ChatNotFound("x".into()).code(), "CHAT_NOT_FOUND");
    }

    #[test]
    fn rate_limited_carries_seconds() {
        let err = Error::RateLimited(42);
        assert_eq!(err.flood_wait_seconds(), Some(42));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn non_flood_errors_have_no_wait() {
        assert_eq!(Error::InvalidCode.flood_wait_seconds(), None);
        assert_eq!(Error::NotConnected.flood_wait_seconds(), None);
    }

    #[test]
    fn display_mentions_restart_hint_on_expired_code() {
        assert!(Error::CodeExpired.to_string().contains("request-code"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.code(), "IO_ERROR");
    }

    #[test]
    fn serde_error_converts() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
