//! `bashbot serve` — Start the HTTP endpoints.

use bashbot_gateway::GatewayState;
use std::sync::Arc;

use super::{CmdResult, load_config, load_tools, open_memory};

pub async fn run(port_override: Option<u16>) -> CmdResult {
    let mut config = load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let tools = load_tools(&config)?;
    let memory = open_memory(&config).await?;

    println!("bashbot gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Tools:     {}", tools.names().join(", "));

    let state = Arc::new(GatewayState {
        tools,
        memory: Some(memory),
    });
    bashbot_gateway::serve(&config.gateway, state).await
}
