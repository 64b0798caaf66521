//! `bashbot run-tool` — Run one tool by hand.

use bashbot_core::memory::MemoryBackend;

use super::{CmdResult, load_config, load_tools, open_memory};

pub async fn run(name: &str, value: &str) -> CmdResult {
    let config = load_config()?;
    let tools = load_tools(&config)?;
    let memory = open_memory(&config).await?;

    let store: &dyn MemoryBackend = &*memory;
    let output = tools.run_single(name, value, Some(store)).await;
    println!("{output}");

    memory.close().await;
    Ok(())
}
