use clap::{Parser, Subcommand};

/// Ask natural-language questions of a SQL agent and browse past answers.
#[derive(Debug, Parser)]
#[command(name = "sqlagent", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write the config file
    Configure {
        #[arg(long)]
        api_url: String,
        /// History poll interval in seconds
        #[arg(long, default_value_t = 15)]
        poll_interval: u64,
        /// Request timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
        /// Number of history entries to request
        #[arg(long)]
        history_limit: Option<u32>,
        /// Log as JSON lines
        #[arg(long)]
        log_json: bool,
    },

    /// Check that the API is reachable
    Health,

    /// Submit one question and print the answer
    Ask {
        question: String,
        /// Continue an existing conversation thread
        #[arg(long)]
        thread: Option<String>,
    },

    /// List past queries, newest first
    History,

    /// Show one query in full
    Show { id: String },

    /// Keep the history on screen, refreshed on every poll
    Watch,

    /// Interactive multi-turn session
    Chat,
}
