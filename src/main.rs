//! Telegram agent CLI - main entry point.
//!
//! Every subcommand is one process invocation: arguments in, exactly one
//! JSON object on stdout (exit 0), or `{"error", "code"}` (exit 1).
//! Diagnostics go to stderr so stdout stays machine-readable.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use telegram_agent::{commands, Error, Store};

#[derive(Parser)]
#[command(name = "telegram_agent")]
#[command(about = "Telegram user-account CLI with JSON output", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with Telegram (three-phase flow)
    Login {
        /// Override Telegram API ID
        #[arg(long, env = "TELEGRAM_API_ID")]
        api_id: Option<i32>,

        /// Override Telegram API Hash
        #[arg(long, env = "TELEGRAM_API_HASH")]
        api_hash: Option<String>,

        #[command(subcommand)]
        phase: LoginPhase,
    },

    /// Logout and remove the stored session
    Logout {
        /// Also terminate the session on Telegram's side
        #[arg(long)]
        revoke: bool,
    },

    /// List dialogs (chats, groups, channels, DMs)
    Chats {
        /// Max chats to return
        #[arg(long, default_value = "50")]
        limit: usize,

        /// Filter by chat type: group, supergroup, channel, user, bot, all
        #[arg(long = "type", default_value = "all")]
        chat_type: String,

        /// Include archived chats
        #[arg(long)]
        archived: bool,

        /// Push chat metadata to the sync API
        #[arg(long)]
        sync: bool,
    },

    /// List chats with unread messages, sorted by unread count
    Unread {
        /// Max chats to return
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Minimum unread count
        #[arg(long, default_value = "1")]
        min_unread: i32,
    },

    /// Read messages from a chat
    Read {
        /// Chat name, @username, or numeric ID
        chat: String,

        /// Max messages to return
        #[arg(long, default_value = "50")]
        limit: usize,

        /// Start from this message ID
        #[arg(long, default_value = "0")]
        offset_id: i32,

        /// Only messages after this date (ISO 8601 or YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Only messages before this date
        #[arg(long)]
        until: Option<String>,

        /// Filter by sender (@username or user ID)
        #[arg(long)]
        from_user: Option<String>,

        /// Push messages to the sync API
        #[arg(long)]
        sync: bool,
    },

    /// Search messages in one chat or across all chats
    Search {
        /// Search query
        query: String,

        /// Limit search to this chat
        #[arg(long)]
        chat: Option<String>,

        /// Max results
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Filter by sender
        #[arg(long)]
        from_user: Option<String>,

        /// Only messages after this date
        #[arg(long)]
        since: Option<String>,
    },

    /// Send a message to a chat
    Send {
        /// Chat name, @username, or numeric ID
        chat: String,

        /// Message text to send
        message: String,

        /// Message ID to reply to
        #[arg(long)]
        reply_to: Option<i32>,
    },

    /// Create a group chat and optionally send a first message
    CreateGroup {
        /// Group chat title
        title: String,

        /// Users to add (@username, ID, or contact name)
        #[arg(long, num_args = 1.., required = true)]
        users: Vec<String>,

        /// First message to send in the group
        #[arg(long)]
        message: Option<String>,
    },

    /// Export an invite link for a group or channel
    InviteLink {
        /// Chat name, @username, or numeric ID
        chat: String,

        /// Custom title for the invite link
        #[arg(long)]
        title: Option<String>,

        /// Link expires after this many hours
        #[arg(long)]
        expire_hours: Option<i64>,

        /// Max number of users who can join via this link
        #[arg(long)]
        member_limit: Option<i32>,
    },

    /// Leave a group chat
    Leave {
        /// Chat name, @username, or numeric ID
        chat: String,

        /// Also delete the chat history
        #[arg(long)]
        delete: bool,
    },

    /// Get metadata about a chat
    Info {
        /// Chat name, @username, or numeric ID
        chat: String,

        /// Fetch up to 200 members (default: 50)
        #[arg(long)]
        all_members: bool,
    },

    /// List or search contacts
    Contacts {
        /// Search by name or username
        #[arg(long)]
        search: Option<String>,
    },

    /// Fetch new messages since the last digest for all active chats
    Digest {
        /// Comma-separated chat names to check (default: all unread)
        #[arg(long)]
        chats: Option<String>,

        /// Max messages per chat
        #[arg(long, default_value = "100")]
        limit: usize,

        /// Also check previously-watermarked chats even if 0 unread
        #[arg(long)]
        include_read: bool,

        /// Fetch messages but don't update watermarks
        #[arg(long)]
        dry_run: bool,
    },

    /// Export full chat history as JSONL
    History {
        /// Chat name, @username, or numeric ID
        chat: String,

        /// Output file path (default: temp file)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Export messages after this date
        #[arg(long)]
        since: Option<String>,

        /// Progress report interval
        #[arg(long, default_value = "100")]
        batch_size: usize,
    },

    /// Sync all chats and messages to the sync API
    SyncAll {
        /// Full backfill (not just recent)
        #[arg(long)]
        full: bool,

        /// Sync specific chat(s)
        #[arg(long = "chat")]
        chats: Vec<String>,

        /// Messages per chat
        #[arg(long, default_value = "200")]
        limit: usize,
    },

    /// Watermark maintenance
    Watermarks {
        #[command(subcommand)]
        action: WatermarksAction,
    },
}

#[derive(Subcommand)]
enum LoginPhase {
    /// Send OTP to phone
    RequestCode {
        /// Phone number (+1234567890)
        #[arg(long)]
        phone: String,
    },

    /// Submit OTP code
    SignIn {
        /// OTP code received on phone
        #[arg(long)]
        code: String,
    },

    /// Submit 2FA password
    #[command(name = "sign-in-2fa")]
    SignIn2fa {
        /// Telegram account 2FA password
        #[arg(long)]
        password: String,
    },
}

#[derive(Subcommand)]
enum WatermarksAction {
    /// Delete all watermarks (next digest processes everything)
    Clear,
}

#[tokio::main]
async fn main() {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Logging goes to stderr; stdout carries the JSON contract.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("telegram_agent=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = Store::open_default();

    match execute_command(&store, cli.command).await {
        Ok(value) => {
            println!("{}", value);
        }
        Err(err) => {
            println!(
                "{}",
                serde_json::json!({ "error": err.to_string(), "code": err.code() })
            );
            std::process::exit(1);
        }
    }
}

async fn execute_command(store: &Store, command: Commands) -> Result<serde_json::Value, Error> {
    match command {
        Commands::Login {
            api_id,
            api_hash,
            phase,
        } => match phase {
            LoginPhase::RequestCode { phone } => {
                commands::login::request_code(store, &phone, api_id, api_hash).await
            }
            LoginPhase::SignIn { code } => commands::login::sign_in(store, &code).await,
            LoginPhase::SignIn2fa { password } => {
                commands::login::sign_in_2fa(store, &password).await
            }
        },
        Commands::Logout { revoke } => commands::logout::run(store, revoke).await,
        Commands::Chats {
            limit,
            chat_type,
            archived,
            sync,
        } => {
            commands::chats::run(
                store,
                commands::chats::ChatsArgs {
                    limit,
                    chat_type,
                    archived,
                    sync,
                },
            )
            .await
        }
        Commands::Unread { limit, min_unread } => {
            commands::unread::run(store, limit, min_unread).await
        }
        Commands::Read {
            chat,
            limit,
            offset_id,
            since,
            until,
            from_user,
            sync,
        } => {
            commands::read::run(
                store,
                commands::read::ReadArgs {
                    chat,
                    limit,
                    offset_id,
                    since,
                    until,
                    from_user,
                    sync,
                },
            )
            .await
        }
        Commands::Search {
            query,
            chat,
            limit,
            from_user,
            since,
        } => {
            commands::search::run(
                store,
                commands::search::SearchArgs {
                    query,
                    chat,
                    limit,
                    from_user,
                    since,
                },
            )
            .await
        }
        Commands::Send {
            chat,
            message,
            reply_to,
        } => commands::send::run(store, &chat, &message, reply_to).await,
        Commands::CreateGroup {
            title,
            users,
            message,
        } => commands::create_group::run(store, &title, &users, message.as_deref()).await,
        Commands::InviteLink {
            chat,
            title,
            expire_hours,
            member_limit,
        } => {
            commands::invite_link::run(
                store,
                commands::invite_link::InviteLinkArgs {
                    chat,
                    title,
                    expire_hours,
                    member_limit,
                },
            )
            .await
        }
        Commands::Leave { chat, delete } => commands::leave::run(store, &chat, delete).await,
        Commands::Info { chat, all_members } => {
            commands::info::run(store, &chat, all_members).await
        }
        Commands::Contacts { search } => {
            commands::contacts::run(store, search.as_deref()).await
        }
        Commands::Digest {
            chats,
            limit,
            include_read,
            dry_run,
        } => {
            commands::digest::run(
                store,
                commands::digest::DigestArgs {
                    chats,
                    limit,
                    include_read,
                    dry_run,
                },
            )
            .await
        }
        Commands::History {
            chat,
            output,
            since,
            batch_size,
        } => {
            commands::history::run(
                store,
                commands::history::HistoryArgs {
                    chat,
                    output,
                    since,
                    batch_size,
                },
            )
            .await
        }
        Commands::SyncAll { full, chats, limit } => {
            commands::sync_all::run(store, commands::sync_all::SyncAllArgs { full, chats, limit })
                .await
        }
        Commands::Watermarks { action } => match action {
            WatermarksAction::Clear => commands::watermarks::clear(store),
        },
    }
}
