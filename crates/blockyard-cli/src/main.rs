//! Blockyard command line.
//!
//! Works on hydration seeds (a JSON array of nested block records) using the
//! stock block registry.
//!
//! ## Usage
//!
//! ```bash
//! blockyard check page.json                 # validate and print an outline
//! blockyard fields page.json                # persisted form fields
//! blockyard replay page.json edits.json     # apply a JSON array of commands
//! blockyard render page.json --url 'https://cms/admin/blocks/{type}/render'
//! blockyard --config editor.ron render page.json
//! ```
//!
//! Logging goes to stderr; set `RUST_LOG=debug` to see every transaction.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use blockyard_editor::{
    Block, BlockRegistry, Command, EditorConfig, Engine, EngineEvent, HttpFragmentSource, Mount,
    RenderBridge, Topic, form_fields,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Block-tree tooling for Blockyard pages.
#[derive(Parser, Debug)]
#[command(name = "blockyard")]
#[command(about = "Validate, inspect, replay and render Blockyard block trees")]
struct Args {
    /// Editor config (RON). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Validate a seed and print its outline
    Check { seed: PathBuf },
    /// Print the hidden form fields the page would persist
    Fields { seed: PathBuf },
    /// Apply a JSON array of commands and print the resulting tree and events
    Replay { seed: PathBuf, commands: PathBuf },
    /// Fetch every block's editing fragment and report per block
    Render {
        seed: PathBuf,
        /// Render endpoint template; overrides the config's render_url
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = match &args.config {
        Some(path) => EditorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EditorConfig::default(),
    };

    match args.command {
        Cmd::Check { seed } => cmd_check(&config, &seed),
        Cmd::Fields { seed } => cmd_fields(&config, &seed),
        Cmd::Replay { seed, commands } => cmd_replay(&config, &seed, &commands),
        Cmd::Render { seed, url } => cmd_render(&config, &seed, url).await,
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn load_engine(config: &EditorConfig, seed: &Path) -> Result<Engine> {
    let blocks: Vec<Block> = read_json(seed)?;
    let engine = Engine::hydrate(Arc::new(BlockRegistry::builtin()), &blocks)
        .with_context(|| format!("invalid block tree in {}", seed.display()))?;
    Ok(engine.with_align_version(config.align_version))
}

fn cmd_check(config: &EditorConfig, seed: &Path) -> Result<ExitCode> {
    let engine = load_engine(config, seed)?;
    let units = engine.units();
    units.check_invariants()?;

    let mut unknown = 0;
    for id in units.document_order() {
        let Some(node) = units.get(&id) else {
            continue;
        };
        let known = engine.registry().contains(&node.kind);
        if !known {
            unknown += 1;
        }
        println!(
            "{:indent$}{} ({}) {} {}{}",
            "",
            node.id,
            node.kind,
            node.status,
            node.align,
            if known { "" } else { "  [placeholder]" },
            indent = engine.depth(&id) * 2
        );
    }
    println!("{} blocks, {} unknown types", units.len(), unknown);
    Ok(ExitCode::SUCCESS)
}

fn cmd_fields(config: &EditorConfig, seed: &Path) -> Result<ExitCode> {
    let engine = load_engine(config, seed)?;
    for field in form_fields(engine.units()) {
        println!("{}={}", field.name, field.value);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_replay(config: &EditorConfig, seed: &Path, commands: &Path) -> Result<ExitCode> {
    let mut engine = load_engine(config, seed)?;
    let commands: Vec<Command> = read_json(commands)?;

    let log = Rc::new(RefCell::new(Vec::new()));
    for topic in [Topic::Transaction, Topic::Error] {
        let log = Rc::clone(&log);
        engine.subscribe(topic, move |event| {
            let entry = match event {
                EngineEvent::Transaction { command, seq, state } => serde_json::json!({
                    "event": "transaction",
                    "seq": seq,
                    "command": command,
                    "blocks": state.units.len(),
                    "selection": state.selection,
                }),
                EngineEvent::Error { command, error } => serde_json::json!({
                    "event": "error",
                    "command": command,
                    "error": error.to_string(),
                }),
                _ => return,
            };
            log.borrow_mut().push(entry);
        });
    }

    let mut rejected = 0;
    for command in commands {
        if engine.dispatch(command).is_rejected() {
            rejected += 1;
        }
    }
    tracing::info!(transactions = engine.seq(), rejected, "replay finished");

    let output = serde_json::json!({
        "units": engine.units().to_blocks(),
        "events": *log.borrow(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_render(config: &EditorConfig, seed: &Path, url: Option<String>) -> Result<ExitCode> {
    let Some(url) = url.or_else(|| config.render_url.clone()) else {
        bail!("no render endpoint: pass --url or set render_url in the config");
    };
    let mut engine = load_engine(config, seed)?;
    let source = HttpFragmentSource::new(url, config.request_timeout());
    let mut bridge = RenderBridge::new(Arc::new(source));
    bridge.attach(&mut engine);

    let order = engine.document_order();
    for id in &order {
        match bridge.mount(&mut engine, id) {
            Some(Mount::Seeded(sig)) => println!("{id}\tseeded\t{}", sig.short()),
            Some(Mount::Cached(sig)) => println!("{id}\tcached\t{}", sig.short()),
            Some(Mount::NeedsFetch) | None => {}
        }
    }

    let mut failed = 0;
    for (id, result) in bridge.refresh_stale(&engine).await {
        match result {
            Ok(Some(sig)) => {
                let bytes = bridge.fragment(&id).map_or(0, str::len);
                println!("{id}\tfetched\t{}\t{bytes} bytes", sig.short());
            }
            Ok(None) => {}
            Err(e) => {
                failed += 1;
                println!("{id}\tfailed\t{e}");
            }
        }
    }

    let stats = bridge.cache_stats();
    tracing::info!(
        blocks = order.len(),
        requests = stats.requests,
        hits = stats.hits,
        failed,
        "render finished"
    );
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
