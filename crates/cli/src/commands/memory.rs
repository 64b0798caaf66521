//! `bashbot memory` — Inspect the conversation log.

use bashbot_core::memory::MemoryBackend;

use super::{CmdResult, load_config, open_memory};

pub async fn search(term: &str) -> CmdResult {
    let config = load_config()?;
    let memory = open_memory(&config).await?;

    println!("{}", memory.text_search(term).await?);

    memory.close().await;
    Ok(())
}

pub async fn stats() -> CmdResult {
    let config = load_config()?;
    let memory = open_memory(&config).await?;
    let stats = memory.stats().await?;

    println!("Memory Statistics");
    println!("=================");
    println!("  Database:   {}", config.memory.db_path.display());
    println!("  Messages:   {}", stats.messages);
    println!(
        "  Embedded:   {} (dimension {})",
        stats.embedded,
        memory.dimension()
    );
    match stats.latest_turn_id {
        Some(turn) => println!("  Last turn:  {turn}"),
        None => println!("  Last turn:  (none yet)"),
    }

    memory.close().await;
    Ok(())
}
