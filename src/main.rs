//! sdkwork-voiceclone CLI - inspect a voice cloning installation
//!
//! Model backends are linked in by the embedding application; this binary
//! checks that the assets the pipeline needs are in place.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sdkwork_voiceclone::config::VoiceCloneConfig;
use sdkwork_voiceclone::engine::ConverterCheckpoint;
use sdkwork_voiceclone::voice::{list_store_speakers, normalize, Language};
use sdkwork_voiceclone::VERSION;

/// Voice cloning orchestration for OpenVoice-style tone color conversion
#[derive(Parser, Debug)]
#[command(name = "sdkwork-voiceclone")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the YAML configuration file
    #[arg(short, long, global = true, default_value = "voiceclone.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List supported languages and their model codes
    Languages,

    /// Verify the converter checkpoint, output directory and embedding store
    Check {
        /// TTS speaker keys expected to have a source embedding (e.g. EN-US, EN_INDIA)
        #[arg(long = "speaker")]
        speakers: Vec<String>,
    },

    /// List base speakers available in the embedding store
    Speakers {
        /// Show where a raw TTS speaker key is looked up
        #[arg(long)]
        key: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let filter = log_filter(
        cli.verbose,
        std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
        &config.logging.level,
    );
    setup_logging(filter);

    info!("sdkwork-voiceclone v{}", VERSION);

    match &cli.command {
        Commands::Languages => {
            println!("{:<22} {}", "Label", "Code");
            for lang in Language::all() {
                let marker = if *lang == config.default_language { " (default)" } else { "" };
                println!("{:<22} {}{}", lang.label(), lang.code(), marker);
            }
            Ok(())
        }

        Commands::Check { speakers } => run_check(&config, speakers),

        Commands::Speakers { key } => {
            let available = list_store_speakers(&config.embedding_store_dir, config.embedding_format)?;
            if available.is_empty() {
                warn!("No embeddings found in {:?}", config.embedding_store_dir);
            }
            for speaker in &available {
                println!("{}", speaker);
            }

            if let Some(raw) = key {
                let normalized = normalize(raw);
                let path = config
                    .embedding_format
                    .file_path(&config.embedding_store_dir, &normalized);
                let status = if path.is_file() { "found" } else { "missing" };
                println!("\n{} -> {} ({}: {})", raw, normalized, status, path.display());
            }
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<VoiceCloneConfig> {
    if path.exists() {
        VoiceCloneConfig::load(path).with_context(|| format!("Failed to load config {:?}", path))
    } else {
        Ok(VoiceCloneConfig::default())
    }
}

fn run_check(config: &VoiceCloneConfig, speakers: &[String]) -> Result<()> {
    let mut problems = 0;

    let device = config.device.resolve()?;
    println!("Device:            {:?}", device);

    config.ensure_output_dir()?;
    println!("Output directory:  {}", config.output_dir.display());

    match ConverterCheckpoint::locate(&config.converter_checkpoint_dir) {
        Ok(checkpoint) => println!(
            "Converter:         {} (version {})",
            checkpoint.dir.display(),
            checkpoint.version.as_deref().unwrap_or("unknown")
        ),
        Err(e) => {
            problems += 1;
            println!("Converter:         MISSING - {:#}", e);
        }
    }

    let available = list_store_speakers(&config.embedding_store_dir, config.embedding_format)?;
    println!(
        "Embedding store:   {} ({} {} files)",
        config.embedding_store_dir.display(),
        available.len(),
        config.embedding_format.extension()
    );
    if available.is_empty() {
        problems += 1;
        println!("                   no base speaker embeddings installed");
    }

    for raw in speakers {
        let normalized = normalize(raw);
        if available.contains(&normalized) {
            println!("  {:<16} -> {}", raw, normalized);
        } else {
            problems += 1;
            println!("  {:<16} -> {} MISSING", raw, normalized);
        }
    }

    if problems > 0 {
        anyhow::bail!("{} problem(s) found", problems);
    }
    println!("\nInstallation looks complete.");
    Ok(())
}

/// `--verbose` wins over `RUST_LOG`, which wins over the configured level.
/// Unparseable directives fall back to `info`.
fn log_filter(verbose: bool, env_directives: Option<&str>, config_level: &str) -> EnvFilter {
    let directives = if verbose {
        "debug"
    } else {
        env_directives
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(config_level)
    };
    EnvFilter::try_new(directives).unwrap_or_else(|e| {
        eprintln!("invalid log filter '{}': {}, using info", directives, e);
        EnvFilter::new("info")
    })
}

fn setup_logging(filter: EnvFilter) {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already set");
    }
}
