use anyhow::{Context, Result};
use clap::Parser;
use command_core::assistant::{Assistant, Speaker, REPEAT_ACTION};
use command_core::config::Config;
use command_core::persistence::default_state_path;
use command_core::plugins::{CommandPlugin, PluginManager};
use command_core::registry::ActionRegistry;
use command_core::{CommandDefinition, CommandEngine};
use crossterm::style::Stylize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "command_engine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Type utterances as if they were spoken and watch them turn into commands")]
struct Cli {
    /// Configuration file (defaults to the user config dir)
    #[arg(short, long, env = "STEWART_CONFIG")]
    config: Option<PathBuf>,

    /// Plugin status file
    #[arg(short, long, env = "STEWART_STATE")]
    state: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Prints what the assistant would say.
struct ConsoleSpeaker;

impl Speaker for ConsoleSpeaker {
    fn say(&self, text: &str) {
        println!("{} {}", "stewart:".cyan().bold(), text);
    }
}

/// Commands every installation has.
struct BuiltinPlugin;

impl CommandPlugin for BuiltinPlugin {
    fn name(&self) -> &str {
        "builtin"
    }

    fn commands(&self) -> Vec<CommandDefinition> {
        vec![
            CommandDefinition::new(["say"], "say").with_inside_speech(true),
            CommandDefinition::new(["repeat"], REPEAT_ACTION).with_equivalent(["once", "more"]),
        ]
    }

    fn register_handlers(&self, registry: &mut ActionRegistry) {
        registry.register("say", |ctx| {
            let words = ctx.command.get(1..).unwrap_or_default();
            (!words.is_empty()).then(|| words.join(" "))
        });
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("command_core={},command_engine={},warn", log_level, log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("could not load configuration from {}", config_path.display()))?;

    let mut engine = CommandEngine::new(config.segmentation_config());
    engine.add_hook("trace", |phrase, definition| {
        debug!(phrase = %phrase.join(" "), action = %definition.action, "phrase registered");
        Ok(())
    });
    let definitions = config.definitions();
    engine.load(&definitions).context("invalid command in configuration")?;

    // Configured actions without a real handler just report what they would do.
    let mut registry = ActionRegistry::new();
    for definition in &definitions {
        let action = definition.action.clone();
        if action == REPEAT_ACTION {
            continue;
        }
        registry.register(definition.action.clone(), move |ctx| {
            println!("{} {} {:?}", "run".green(), action, ctx.parameters);
            None
        });
    }

    let state_path = cli.state.unwrap_or_else(default_state_path);
    let mut plugins = PluginManager::with_state_file(&state_path)
        .with_context(|| format!("could not read plugin state from {}", state_path.display()))?;
    plugins.install(&BuiltinPlugin, &mut engine, &mut registry)?;

    let engine = Arc::new(RwLock::new(engine));
    let speaker: Arc<dyn Speaker> = Arc::new(ConsoleSpeaker);
    let mut assistant = Assistant::new(Arc::clone(&engine), registry, speaker, &config);

    println!("{}", "Voice command simulator. Type ':list', ':enable NAME', ':disable NAME' or 'exit'.".bold());
    println!("---------------------------------------------------------------");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print!("> ");
    stdout.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let input = line.trim();
        match input.split_once(' ').map_or((input, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("exit", _) => break,
            ("", _) => {}
            (":list", _) => {
                let engine = engine.read().unwrap_or_else(PoisonError::into_inner);
                for (phrase, terminal) in engine.trie().phrases() {
                    println!("  {} -> {}", phrase.join(" ").yellow(), terminal.action);
                }
                for name in plugins.names() {
                    let status = if plugins.is_enabled(name) == Some(true) { "enabled" } else { "disabled" };
                    println!("  plugin {} ({})", name.bold(), status);
                }
            }
            (cmd @ (":enable" | ":disable"), name) => {
                let mut engine = engine.write().unwrap_or_else(PoisonError::into_inner);
                let result = if cmd == ":enable" {
                    plugins.enable(name, &mut engine)
                } else {
                    plugins.disable(name, &mut engine)
                };
                match result {
                    Ok(true) => println!("{} {}", "ok".green(), name),
                    Ok(false) => println!("{} is already in that state", name),
                    Err(e) => eprintln!("{} {}", "[ERROR]".red(), e),
                }
            }
            _ => {
                let outcome = assistant.hear(input);
                let commands = outcome.wait();
                for command in &commands {
                    debug!(action = %command.action, tokens = ?command.matched_tokens, "handled");
                }
            }
        }
        print!("> ");
        stdout.flush()?;
    }

    println!("\nbye");
    Ok(())
}
