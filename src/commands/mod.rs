//! Subcommand implementations behind the `housing-agent` CLI.

pub mod chat;
pub mod serve;
pub mod threads;

use std::io::Write;
use std::path::Path;

use crate::agent_core::{classify_text, AgentRuntime, ThreadStore};
use crate::cli::{Cli, Commands, ThreadsCommand};
use crate::config::AgentConfig;

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let config_path = cli.config;

    match cli.command {
        // Classification needs neither credentials nor storage.
        Commands::Classify { message } => {
            writeln!(stdout.lock(), "{}", classify_text(&message))?;
            Ok(())
        }
        Commands::Serve { host, port } => {
            serve::run(load_config(config_path.as_deref())?, host, port).await
        }
        Commands::Chat { thread } => {
            let runtime = AgentRuntime::from_config(load_config(config_path.as_deref())?)?;
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            chat::chat_loop(&runtime, thread, input, &mut stdout.lock()).await?;
            Ok(())
        }
        Commands::Ask { message, thread } => {
            let runtime = AgentRuntime::from_config(load_config(config_path.as_deref())?)?;
            chat::ask(&runtime, &message, thread, &mut stdout.lock()).await?;
            Ok(())
        }
        Commands::Threads(command) => {
            let config = load_config(config_path.as_deref())?;
            let store = ThreadStore::open(&config.storage.resolve_database_path())?;
            let mut out = stdout.lock();
            match command {
                ThreadsCommand::List => threads::print_list(&store, &mut out),
                ThreadsCommand::Show { id } => threads::print_thread(&store, &id, &mut out),
                ThreadsCommand::Delete { id } => threads::delete(&store, &id, &mut out),
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AgentConfig> {
    let config = AgentConfig::load(path)?;
    crate::init_tracing(&config.logging);
    Ok(config)
}
