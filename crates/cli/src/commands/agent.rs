//! `bashbot agent` — Interactive or single-message chat mode.

use bashbot_agent::{AgentEvent, AgentLoop, TurnOutcome, TurnStatus};
use bashbot_core::memory::MemoryBackend;
use bashbot_providers::OllamaProvider;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use super::{CmdResult, load_config, load_tools, open_memory};

const EXIT_WORDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

/// Whether an input line ends the interactive session.
pub fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    EXIT_WORDS.iter().any(|w| line.eq_ignore_ascii_case(w))
}

pub async fn run(message: Option<String>) -> CmdResult {
    let config = load_config()?;
    let provider = Arc::new(OllamaProvider::from_config(&config)?);
    let memory = open_memory(&config).await?;
    let tools = load_tools(&config)?;

    let (tx, mut events) = tokio::sync::mpsc::unbounded_channel();
    let agent = AgentLoop::from_config(&config, provider, memory.clone(), tools.clone())
        .with_events(tx);

    if let Some(msg) = message {
        // Single message mode
        let result = run_rendered(&agent, &mut events, &msg).await;
        memory.close().await;
        report(result?);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  bashbot — interactive mode");
    println!();
    println!("  Model:     {}", config.model);
    println!("  Memory:    {}", config.memory.db_path.display());
    println!("  Tools:     {}", tools.names().join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or press Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        if is_exit_command(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        println!();
        tokio::select! {
            result = run_rendered(&agent, &mut events, &line) => match result {
                Ok(outcome) => report(outcome),
                Err(e) => {
                    println!();
                    eprintln!("  [Error] {e}");
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
        println!();
    }

    memory.close().await;
    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

/// Run one turn while printing its events as they arrive.
async fn run_rendered(
    agent: &AgentLoop,
    events: &mut UnboundedReceiver<AgentEvent>,
    input: &str,
) -> Result<TurnOutcome, bashbot_core::Error> {
    let mut renderer = Renderer::default();
    let turn = agent.run_turn(input);
    tokio::pin!(turn);

    loop {
        tokio::select! {
            Some(event) = events.recv() => renderer.render(&event),
            result = &mut turn => {
                while let Ok(event) = events.try_recv() {
                    renderer.render(&event);
                }
                return result;
            }
        }
    }
}

/// Console presentation of agent events. Reasoning goes to stderr so piped
/// output carries only the answer.
#[derive(Default)]
struct Renderer {
    in_thinking: bool,
}

impl Renderer {
    fn render(&mut self, event: &AgentEvent) {
        match event {
            AgentEvent::Thinking { content } => {
                if !self.in_thinking {
                    eprint!("  (thinking) ");
                    self.in_thinking = true;
                }
                eprint!("{content}");
            }
            AgentEvent::Content { content } => {
                if self.in_thinking {
                    eprintln!();
                    self.in_thinking = false;
                }
                print!("{content}");
                let _ = std::io::stdout().flush();
            }
            AgentEvent::ToolCall { name, arguments } => {
                self.in_thinking = false;
                eprintln!();
                eprintln!("  [tool] {name} {arguments}");
            }
            AgentEvent::ToolResult { name, output, success } => {
                let marker = if *success { "ok" } else { "failed" };
                eprintln!("  [tool] {name} {marker}: {}", preview(output, 160));
            }
            AgentEvent::RoundComplete { round, usage } => {
                if let Some(usage) = usage {
                    tracing::debug!(
                        round,
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        tokens_per_second = usage.tokens_per_second(),
                        "Round finished"
                    );
                }
            }
            AgentEvent::TurnComplete { .. } => {
                self.in_thinking = false;
                println!();
            }
        }
    }
}

fn report(outcome: TurnOutcome) {
    if outcome.status == TurnStatus::RoundLimitReached {
        eprintln!(
            "  [stopped after {} rounds without a final answer]",
            outcome.rounds
        );
    }
}

/// First `max` characters on one line.
fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_words_end_session() {
        for word in ["exit", "quit", "/exit", "/quit", ":q", "  EXIT  "] {
            assert!(is_exit_command(word), "{word} should exit");
        }
    }

    #[test]
    fn ordinary_input_does_not_exit() {
        for line in ["exit now", "how do I quit vim?", "", "q"] {
            assert!(!is_exit_command(line), "{line} should not exit");
        }
    }

    #[test]
    fn preview_truncates_and_flattens() {
        assert_eq!(preview("a\nb", 10), "a b");
        assert_eq!(preview("abcdef", 3), "abc…");
    }
}
