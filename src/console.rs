//! Console REPL: reads lines from stdin and answers them through the
//! [`Learner`], the same way `POST /api/respond` does for an anonymous caller.
//!
//! Runs until stdin closes, the user types `exit`, or the shutdown token is
//! cancelled.

use std::io::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::learning::{Learner, TeachRequest};
use crate::runtime::{Component, ComponentFuture};

const HELP: &str = "\
Commands:
  /help                          show this help
  /teach <trigger> => <response> teach a shared pattern
  /patterns                      list the patterns you can see
  /stats                         learning statistics
  exit, /exit                    leave the console
Anything else is answered from the learned patterns.";

/// One parsed console line.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Help,
    Exit,
    Teach { trigger: &'a str, response: &'a str },
    Patterns,
    Stats,
    Say(&'a str),
    Usage(&'static str),
}

pub fn parse(line: &str) -> Command<'_> {
    let line = line.trim();
    match line {
        "exit" | "/exit" | "/quit" => Command::Exit,
        "/help" | "/?" => Command::Help,
        "/patterns" => Command::Patterns,
        "/stats" => Command::Stats,
        _ => match line.strip_prefix("/teach") {
            Some(rest) => match rest.split_once("=>") {
                Some((trigger, response)) if !trigger.trim().is_empty() && !response.trim().is_empty() => {
                    Command::Teach { trigger: trigger.trim(), response: response.trim() }
                }
                _ => Command::Usage("usage: /teach <trigger> => <response>"),
            },
            None => Command::Say(line),
        },
    }
}

pub struct Console {
    learner: Learner,
}

impl Console {
    pub fn new(learner: Learner) -> Self {
        Self { learner }
    }

    /// Answer one line. `None` means the session should end.
    pub async fn handle(&self, line: &str) -> Result<Option<String>, AppError> {
        let out = match parse(line) {
            Command::Exit => return Ok(None),
            Command::Help => HELP.to_string(),
            Command::Usage(text) => text.to_string(),
            Command::Teach { trigger, response } => {
                let req = TeachRequest {
                    trigger: trigger.to_string(),
                    response: response.to_string(),
                    taught_by: Some("console".to_string()),
                    is_public: false,
                };
                self.learner.teach(None, req).await?.message
            }
            Command::Patterns => {
                let patterns = self.learner.list(None).await?;
                if patterns.is_empty() {
                    "no patterns yet".to_string()
                } else {
                    patterns
                        .iter()
                        .map(|p| format!("#{} \"{}\" → \"{}\" ({}, used {})", p.id, p.trigger, p.response, p.taught_by, p.use_count))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Command::Stats => {
                let s = self.learner.stats(None).await?;
                format!(
                    "patterns: {}  teachers: {}  uses: {}  chats: {}",
                    s.total_patterns, s.total_teachers, s.total_uses, s.total_chats
                )
            }
            Command::Say(text) => format!("LLM: {}", self.learner.respond(None, text).await?.response),
        };
        Ok(Some(out))
    }
}

impl Component for Console {
    fn id(&self) -> &str {
        "console"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_console(*self, shutdown))
    }
}

async fn run_console(console: Console, shutdown: CancellationToken) -> Result<(), AppError> {
    info!("console started");
    println!("─────────────────────────────────");
    println!(" learnbot console  (/help, exit)");
    println!("─────────────────────────────────");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You: ");
        let _ = std::io::stdout().flush();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("console shutting down");
                break;
            }

            line = lines.next_line() => {
                let input = match line {
                    Err(e) => {
                        warn!("console read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("console stdin closed");
                        break;
                    }
                    Ok(Some(input)) => input,
                };
                if input.trim().is_empty() {
                    continue;
                }
                debug!(input = %input.trim(), "console line");

                match console.handle(&input).await {
                    Ok(Some(out)) => println!("{out}"),
                    Ok(None) => {
                        println!("Goodbye!");
                        break;
                    }
                    Err(e) => println!("error: {e}"),
                }
            }
        }
    }

    Ok(())
}
