//! `serve`: run the OpenAI-compatible API.

use std::sync::Arc;

use crate::agent_core::AgentRuntime;
use crate::config::AgentConfig;

/// Apply CLI overrides to the server section and serve until ctrl-c.
pub async fn run(
    mut config: AgentConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let host = config.server.host.clone();
    let port = config.server.port;

    let runtime = Arc::new(AgentRuntime::from_config(config)?);
    crate::server::serve(runtime, &host, port).await
}
