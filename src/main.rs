//! learnbot entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI flags, load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config), init logger
//!   4. Open the SQLite store and seed defaults
//!   5. Build the learner (priming the starter engine with shared patterns),
//!      knowledge base and assistant provider chain
//!   6. Spawn Ctrl-C → shutdown signal watcher
//!   7. Run the HTTP server and, with `-i`, the console until shutdown

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use learnbot::assistant::Assistant;
use learnbot::config::{self, Config};
use learnbot::engine::StarterEngine;
use learnbot::error::AppError;
use learnbot::events::EventHub;
use learnbot::knowledge::KnowledgeBase;
use learnbot::learning::Learner;
use learnbot::llm::providers;
use learnbot::logger;
use learnbot::runtime::{Component, spawn_components};
use learnbot::store::Store;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let mut config = config::load(args.config_path.as_deref())?;
    if let Some(bind) = args.bind {
        config.http.bind = bind;
    }
    if args.no_http {
        config.http.enabled = false;
    }

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some(), config.log_file.as_deref())?;

    info!(
        name = %config.name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        interactive = %args.interactive,
        "config loaded"
    );

    let store = Store::open(&config.db_path())?;
    if config.store.seed_defaults {
        store.seed_defaults()?;
    }
    info!(db = %store.db_path().display(), "store ready");

    let events = EventHub::new();
    let starter = Arc::new(StarterEngine::new(config.engine.max_context));
    let learner = Learner::new(store.clone(), starter, events, config.engine.clone());
    let primed = learner.prime_starter().await?;
    info!(primed, "starter engine ready");
    let knowledge = KnowledgeBase::new(store.clone());

    let chain = providers::build_chain(&config).map_err(|e| AppError::Llm(e.to_string()))?;
    let assistant = Assistant::new(store.clone(), knowledge.clone(), chain, config.assistant.clone());

    // Shared shutdown token: Ctrl-C cancels it, every component watches it.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let mut components: Vec<Box<dyn Component>> = Vec::new();

    #[cfg(feature = "channel-http")]
    if config.http.enabled {
        let state = learnbot::http::AppState {
            name: config.name.clone(),
            store: store.clone(),
            learner: learner.clone(),
            assistant: assistant.clone(),
            knowledge: knowledge.clone(),
        };
        components.push(Box::new(learnbot::http::HttpServer::new(&config.http, state)));
    }

    #[cfg(feature = "channel-console")]
    if args.interactive {
        components.push(Box::new(learnbot::console::Console::new(learner.clone())));
    }

    if components.is_empty() {
        warn!("nothing to run: http is disabled and the console was not requested (-i)");
    }

    print_startup_summary(&config, &assistant, args.interactive);

    let handle = spawn_components(components, shutdown.clone());
    let result = handle.join().await;

    // Console EOF ends the run even when the server is still up.
    shutdown.cancel();

    if args.interactive {
        use std::io::Write as _;
        println!("\nBye :) ...");
        let _ = std::io::stdout().flush();
    }

    result
}

fn print_startup_summary(config: &Config, assistant: &Assistant, interactive: bool) {
    let fit = |text: String| -> String {
        const WIDTH: usize = 58;
        let char_count = text.chars().count();
        if char_count >= WIDTH {
            let mut out = text.chars().take(WIDTH - 1).collect::<String>();
            out.push('…');
            out
        } else {
            format!("{text:<WIDTH$}")
        }
    };

    let mode_text = if interactive { "interactive" } else { "server" };

    let mut comms_lines = Vec::new();
    #[cfg(feature = "channel-http")]
    {
        if config.http.enabled {
            comms_lines.push(format!("🌐 http: {}", config.http.bind));
        } else {
            comms_lines.push("🌐 http: disabled".to_string());
        }
    }
    #[cfg(not(feature = "channel-http"))]
    comms_lines.push("🌐 http: not compiled in".to_string());

    #[cfg(feature = "channel-console")]
    comms_lines.push(format!("⌨️  console: {}", if interactive { "enabled" } else { "disabled" }));
    #[cfg(not(feature = "channel-console"))]
    comms_lines.push("⌨️  console: not compiled in".to_string());

    let names = assistant.provider_names();
    let chain_line = if names.is_empty() {
        "chain: none".to_string()
    } else {
        format!("chain: {}", names.join(" → "))
    };
    let fallback_line = format!("template fallback: {}", if config.assistant.fallback { "on" } else { "off" });
    let engine_line = format!(
        "context={} miss={}",
        config.engine.max_context,
        if config.engine.builtin_fallback { "starter" } else { "fixed reply" }
    );

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ 🤖 learnbot                                                  ║");
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 🧾 Name: {:<51}║", config.name);
    println!("║ 🧠 PID: {:<52}║", std::process::id());
    println!("║ 🛰️  Mode: {:<51}║", mode_text);
    println!("║   {}║", fit(format!("🗄️  DB: {}", config.db_path().display())));
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 📡 Comms                                                     ║");
    for line in comms_lines {
        println!("║   {}║", fit(line));
    }
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 📚 Engine                                                    ║");
    println!("║   {}║", fit(engine_line));
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 🧠 LLM                                                       ║");
    println!("║   {}║", fit(chain_line));
    println!("║   {}║", fit(fallback_line));
    println!("╚══════════════════════════════════════════════════════════════╝");

    if interactive {
        println!("💡 Type /help for help");
    }
}

struct CliArgs {
    log_level: Option<&'static str>,
    interactive: bool,
    no_http: bool,
    config_path: Option<String>,
    bind: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut interactive = false;
    let mut no_http = false;
    let mut config_path = None;
    let mut bind = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: learnbot [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -i, --interactive          Run the console REPL alongside the HTTP server");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -b, --bind <ADDR>          HTTP bind address (overrides config)");
                println!("      --no-http              Do not start the HTTP server");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-i" | "--interactive" => interactive = true,
            "--no-http" => no_http = true,
            "-f" | "--config" => match iter.next() {
                Some(path) => config_path = Some(path),
                None => {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            },
            "-b" | "--bind" => match iter.next() {
                Some(addr) => bind = Some(addr),
                None => {
                    eprintln!("error: -b/--bind requires an address argument");
                    std::process::exit(1);
                }
            },
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            other => eprintln!("warning: ignoring unknown argument '{other}'"),
        }
    }

    // -v warn, -vv info, -vvv debug, -vvvv+ trace.
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, interactive, no_http, config_path, bind }
}
