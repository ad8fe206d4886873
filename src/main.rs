use chatlog::config::Config;
use chatlog::history::{effective_limit, render_history};
use chatlog::{db, logging, runtime};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(
    name = "chatlog",
    version = VERSION,
    about = "Telegram bot that logs chat messages and serves recent history to owners"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<MainCommand>,
}

#[derive(Debug, Subcommand)]
enum MainCommand {
    /// Start the bot (long polling)
    Start,
    /// Print a chat's recent history from the local database
    History {
        /// Chat id to read
        #[arg(long, allow_hyphen_values = true)]
        chat_id: i64,
        /// Number of messages (falls back to the configured default when not a number)
        #[arg(long)]
        limit: Option<String>,
    },
    /// Show version
    Version,
}

fn print_history(config: &Config, chat_id: i64, limit: Option<&str>) -> anyhow::Result<()> {
    let database = db::Database::new(&config.data_dir)?;
    let limit = effective_limit(limit, config.default_history_limit);
    let entries = database.query(chat_id, limit)?;
    if entries.is_empty() {
        println!("No messages logged for chat {chat_id}.");
    } else {
        let total = database.count_for_chat(chat_id)?;
        eprintln!("Showing {} of {total} logged messages", entries.len());
        println!("{}", render_history(&entries));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(MainCommand::Start) => {}
        Some(MainCommand::History { chat_id, limit }) => {
            let config = Config::load()?;
            return print_history(&config, chat_id, limit.as_deref());
        }
        Some(MainCommand::Version) => {
            println!("chatlog {VERSION}");
            return Ok(());
        }
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
            return Ok(());
        }
    }

    let config = Config::load()?;
    config.require_bot_token()?;

    if config.log_to_file {
        logging::init_logging(&config.data_dir, config.log_retention_days)?;
    } else {
        logging::init_console_logging();
    }
    info!("Starting chatlog bot...");

    let database = db::Database::new(&config.data_dir)?;
    info!("Database initialized");

    runtime::run(config, database).await
}
