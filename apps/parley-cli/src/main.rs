//! `parley`: chat with a local GGUF model from the terminal.

mod logging;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use parley_core::{ChatSession, CompletionEnd, SessionConfig, StopReason};
use parley_llama::LlamaEngine;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "parley", version, about = "Multi-turn chat with a local llama.cpp model")]
struct Cli {
    /// TOML config file; PARLEY_* env vars and the flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to a GGUF model.
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Context window in tokens.
    #[arg(long = "ctx")]
    n_ctx: Option<u32>,

    #[arg(long)]
    min_p: Option<f32>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long)]
    seed: Option<u32>,

    #[arg(long = "gpu-layers")]
    n_gpu_layers: Option<i32>,

    /// System prompt placed at the top of the transcript.
    #[arg(short, long)]
    system: Option<String>,

    /// Stop a reply after this many pieces.
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    log: String,
}

impl Cli {
    fn apply(&self, config: &mut SessionConfig) {
        if let Some(m) = &self.model {
            config.model.path = m.clone();
        }
        if let Some(n) = self.n_ctx {
            config.model.n_ctx = n;
        }
        if let Some(n) = self.n_gpu_layers {
            config.model.n_gpu_layers = n;
        }
        if let Some(p) = self.min_p {
            config.sampling.min_p = p;
        }
        if let Some(t) = self.temperature {
            config.sampling.temperature = t;
        }
        if let Some(s) = self.seed {
            config.sampling.seed = s;
        }
        if let Some(sys) = &self.system {
            config.chat.system_prompt = Some(sys.clone());
        }
    }
}

/// Emit one streamed piece immediately.
fn write_piece<W: Write>(out: &mut W, piece: &str) -> io::Result<()> {
    out.write_all(piece.as_bytes())?;
    out.flush()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log);

    let mut config = SessionConfig::load(cli.config.as_deref()).context("reading config")?;
    cli.apply(&mut config);

    let mut session = ChatSession::<LlamaEngine>::load(&config)
        .with_context(|| format!("loading model {}", config.model.path.display()))?;
    info!(capacity = session.context_capacity(), "session ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim_end_matches(['\r', '\n']);
        if query.is_empty() {
            continue;
        }

        let completion = session.complete(query, cli.max_tokens, |piece| {
            if let Err(e) = write_piece(&mut io::stdout(), piece) {
                warn!(error = %e, "failed to write reply piece");
            }
        })?;
        println!();

        match completion.end {
            CompletionEnd::Finished(StopReason::EndOfGeneration) => {}
            CompletionEnd::Finished(StopReason::ContextExhausted) => {
                warn!(
                    used = session.context_used(),
                    capacity = session.context_capacity(),
                    "context window is full; start a new session to continue"
                );
                break;
            }
            CompletionEnd::Capped => {
                info!("reply cut at --max-tokens; partial reply not kept in history");
            }
        }
    }
    Ok(())
}
