use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use voice_rag::commands::{
    ask_question, build_pipeline, converse_audio, run_chat, search_chunks, speak_text,
    transcribe_audio,
};
use voice_rag::config::{Config, get_config_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "voice-rag")]
#[command(about = "Ask questions about your documents by voice or text")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct DocumentArgs {
    /// Document to index before answering (txt, csv, json or pdf); repeatable
    #[arg(short, long = "document", value_name = "PATH")]
    documents: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the API connection and models
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Answer a single typed question
    Ask {
        #[command(flatten)]
        documents: DocumentArgs,
        /// The question to answer
        question: String,
    },
    /// Interactive question loop with conversation memory
    Chat {
        #[command(flatten)]
        documents: DocumentArgs,
    },
    /// Show the chunks closest to a query
    Search {
        #[command(flatten)]
        documents: DocumentArgs,
        /// Number of chunks to show (defaults to the configured top_k)
        #[arg(long)]
        top_k: Option<usize>,
        query: String,
    },
    /// Transcribe a spoken question, answer it and speak the answer
    Converse {
        #[command(flatten)]
        documents: DocumentArgs,
        /// Recorded question
        audio: PathBuf,
        /// Where to write the spoken answer
        #[arg(short, long, default_value = "response.mp3")]
        output: PathBuf,
    },
    /// Transcribe an audio file
    Transcribe { audio: PathBuf },
    /// Synthesize speech from text
    Speak {
        text: String,
        #[arg(short, long, default_value = "speech.mp3")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    run(cli.command, &config_dir)
}

fn load_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).context("Failed to load configuration")
}

fn run(command: Commands, config_dir: &Path) -> Result<()> {
    match command {
        Commands::Config { show } => {
            if show {
                show_config(config_dir)?;
            } else {
                run_interactive_config(config_dir)?;
            }
        }
        Commands::Ask {
            documents,
            question,
        } => {
            let pipeline = build_pipeline(&load_config(config_dir)?, &documents.documents)?;
            ask_question(&pipeline, &question)?;
        }
        Commands::Chat { documents } => {
            let pipeline = build_pipeline(&load_config(config_dir)?, &documents.documents)?;
            run_chat(&pipeline, io::stdin().lock(), io::stdout().lock())?;
        }
        Commands::Search {
            documents,
            top_k,
            query,
        } => {
            let config = load_config(config_dir)?;
            let pipeline = build_pipeline(&config, &documents.documents)?;
            let top_k = top_k.unwrap_or(config.retrieval.top_k);
            search_chunks(pipeline.knowledge(), &query, top_k)?;
        }
        Commands::Converse {
            documents,
            audio,
            output,
        } => {
            let pipeline = build_pipeline(&load_config(config_dir)?, &documents.documents)?;
            converse_audio(&pipeline, &audio, &output)?;
        }
        Commands::Transcribe { audio } => {
            transcribe_audio(&load_config(config_dir)?, &audio)?;
        }
        Commands::Speak { text, output } => {
            speak_text(&load_config(config_dir)?, &text, &output)?;
        }
    }

    Ok(())
}
