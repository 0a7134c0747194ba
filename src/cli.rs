//! Command-line interface for the `housing-agent` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "housing-agent")]
#[command(about = "UK housing repairs assistant with an OpenAI-compatible API")]
#[command(version)]
pub struct Cli {
    /// YAML configuration file (without it, config loading checks
    /// HOUSING_AGENT_CONFIG, then ./housing-agent.yaml, then env defaults)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Run the OpenAI-compatible HTTP API")]
    Serve {
        #[arg(long, help = "Listen host (overrides server.host)")]
        host: Option<String>,
        #[arg(long, help = "Listen port (overrides server.port)")]
        port: Option<u16>,
    },
    #[command(about = "Talk to the housing agent in the terminal")]
    Chat {
        #[arg(short, long, help = "Continue an existing thread")]
        thread: Option<String>,
    },
    #[command(about = "Ask a single question and print the answer")]
    Ask {
        message: String,
        #[arg(short, long, help = "Thread to run the question on")]
        thread: Option<String>,
    },
    #[command(about = "Print the keyword intent category of a message")]
    Classify { message: String },
    #[command(subcommand, about = "Inspect stored conversation threads")]
    Threads(ThreadsCommand),
}

#[derive(Subcommand, Debug)]
pub enum ThreadsCommand {
    #[command(about = "List threads, most recent first")]
    List,
    #[command(about = "Print a thread's messages")]
    Show { id: String },
    #[command(about = "Delete a thread and its messages")]
    Delete { id: String },
}
