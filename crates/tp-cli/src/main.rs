//! Tracking-protection shim CLI
//!
//! CLI tool for validating consumer rule files, dry-running a single
//! block decision, and replaying event traces.

use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};

use tp_core::{ClassificationManager, DetachedHub, Topic};

mod replay;
mod rules;

use replay::Replay;
use rules::RulesFile;

#[derive(Parser)]
#[command(name = "tp-cli")]
#[command(about = "Tracking-protection shim rule tools")]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every pattern in a rules file
    Validate {
        /// Rules file (JSON)
        #[arg(short, long)]
        rules: String,
    },

    /// Decide a single blocked request against a rules file
    Check {
        /// Rules file (JSON)
        #[arg(short, long)]
        rules: String,

        /// Request URL
        #[arg(short, long)]
        url: String,

        /// Top-level document URL
        #[arg(short, long)]
        top_level_url: String,
    },

    /// Replay a JSON-lines trace of commands and events
    Replay {
        /// Trace file (JSON lines)
        #[arg(short = 'i', long)]
        trace: String,

        /// Rules file applied before the trace
        #[arg(short, long)]
        rules: Option<String>,

        /// Print outcomes as JSON lines
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let result = match cli.command {
        Commands::Validate { rules } => cmd_validate(&rules),
        Commands::Check {
            rules,
            url,
            top_level_url,
        } => cmd_check(&rules, &url, &top_level_url),
        Commands::Replay { trace, rules, json } => cmd_replay(&trace, rules.as_deref(), json),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_manager(rules_path: &str) -> Result<(RulesFile, ClassificationManager<DetachedHub>), String> {
    let rules = RulesFile::load(Path::new(rules_path))?;
    let mut manager = ClassificationManager::new(DetachedHub);
    rules.apply(&mut manager)?;
    Ok((rules, manager))
}

fn cmd_validate(rules_path: &str) -> Result<(), String> {
    let (rules, manager) = load_manager(rules_path)?;

    println!("Rules file '{}' is valid", rules_path);
    println!("  Consumers:   {}", rules.consumers.len());
    for id in manager.consumers() {
        let list = match manager.allow_list(id) {
            Some(list) => list,
            None => continue,
        };
        let shims = list.shim_rules().map_or(0, |r| r.patterns().len());
        let allows = list.allow_rules().map_or(0, |r| r.patterns().len());
        let hosts = list.allow_rules().map_or(0, |r| r.hosts().len());
        println!(
            "  {:<12} shim patterns: {}, allow patterns: {} on {} host(s)",
            id, shims, allows, hosts
        );
    }

    Ok(())
}

fn cmd_check(rules_path: &str, url: &str, top_level_url: &str) -> Result<(), String> {
    let (_, manager) = load_manager(rules_path)?;

    match manager.decide(url, top_level_url) {
        Some(verdict) => println!("{} -> {}", url, verdict.as_str()),
        None => println!("{} -> blocked", url),
    }

    Ok(())
}

fn cmd_replay(trace_path: &str, rules_path: Option<&str>, json: bool) -> Result<(), String> {
    let trace = fs::read_to_string(trace_path)
        .map_err(|e| format!("Failed to read '{}': {}", trace_path, e))?;

    let mut replay = match rules_path {
        Some(path) => Replay::with_rules(&RulesFile::load(Path::new(path))?)?,
        None => Replay::new(),
    };

    let outcomes = replay.run(&trace)?;
    for outcome in &outcomes {
        if json {
            let line = serde_json::to_string(outcome)
                .map_err(|e| format!("Failed to serialize outcome: {}", e))?;
            println!("{}", line);
        } else {
            println!("{}", outcome);
        }
    }

    if !json {
        let stats = replay.stats();
        println!();
        println!("Replayed {} op(s) from '{}'", stats.ops, trace_path);
        println!("  Blocks:      {} (replaced {}, allowed {})", stats.blocks, stats.replaced, stats.allowed);
        println!("  Errors:      {}", stats.errors);
        println!("  In flight:   {}", replay.engine().manager().unblocked_count());
        println!(
            "  Subscribed:  {}",
            replay.engine().manager().hub().is_listening(Topic::BeforeBlockChannel)
        );
    }

    Ok(())
}
