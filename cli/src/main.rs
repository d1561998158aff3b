use clap::{Parser, Subcommand};

mod commands;
mod threads;
mod transport;
mod util;
mod widget;

use util::exit_error;

#[derive(Parser)]
#[command(
    name = "merak",
    version,
    about = "Merak CLI: chat with the agent finder and look up agent profiles"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "MERAK_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Path of the chat endpoint on the API
    #[arg(long, env = "MERAK_CHAT_PATH", default_value = "/api/chatkit")]
    chat_path: String,

    /// Access token of the signed-in user, sent as a bearer token
    #[arg(long, env = "MERAK_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Signed-in user ID; keys the stored chat thread
    #[arg(long, env = "MERAK_USER_ID")]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Look up agent profiles by ID
    Profiles {
        /// Agent IDs, in display order
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Send one message to the assistant and stream the reply
    Chat {
        /// Message text
        message: String,
        /// Start a new thread instead of resuming the stored one
        #[arg(long)]
        new_thread: bool,
    },
    /// Inspect or reset the stored chat thread
    Thread {
        #[command(subcommand)]
        command: ThreadCommands,
    },
}

#[derive(Subcommand)]
enum ThreadCommands {
    /// Print the stored thread ID
    Show,
    /// Forget the stored thread ID
    Clear,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("MERAK_LOG")
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url).await,
        Commands::Profiles { ids } => commands::profiles::run(&cli.api_url, &ids).await,
        Commands::Chat {
            message,
            new_thread,
        } => {
            let user_id = require_user_id(cli.user_id.as_deref());
            commands::chat::run(commands::chat::ChatArgs {
                api_url: &cli.api_url,
                chat_path: &cli.chat_path,
                access_token: cli.access_token.as_deref(),
                user_id,
                message: &message,
                new_thread,
            })
            .await
        }
        Commands::Thread { command } => {
            let user_id = require_user_id(cli.user_id.as_deref());
            match command {
                ThreadCommands::Show => commands::thread::show(user_id),
                ThreadCommands::Clear => commands::thread::clear(user_id),
            }
        }
    };

    std::process::exit(code);
}

/// The chat panel only renders for a signed-in user.
fn require_user_id(user_id: Option<&str>) -> &str {
    user_id.unwrap_or_else(|| {
        exit_error(
            "user_id is required for chat and thread operations",
            Some("Set --user-id or MERAK_USER_ID env var"),
        )
    })
}
