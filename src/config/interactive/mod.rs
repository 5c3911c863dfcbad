
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};

use super::settings::API_KEY_ENV_VAR;
use super::{Config, ConfigError, OpenAiConfig};
use crate::openai::OpenAiClient;

const VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Voice RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("API Configuration").bold().yellow());
    eprintln!("Configure the OpenAI-compatible endpoint used for embeddings, chat and speech.");
    eprintln!();

    configure_api(&mut config.openai)?;

    eprintln!();
    eprintln!("{}", style("Models").bold().yellow());
    configure_models(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_api_connection(&config) {
        eprintln!("{}", style("✓ API connection successful!").green());
    } else {
        eprintln!("{}", style("⚠ Warning: Could not reach the API").yellow());
        eprintln!(
            "You can continue, but check the base URL and {} before asking questions.",
            API_KEY_ENV_VAR
        );
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("API Settings:").bold().yellow());
    match config.api_url() {
        Ok(url) => eprintln!("  Base URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Base URL: {} ({})", style("Invalid").red(), e),
    }
    let key_status = match config.api_key() {
        Ok(_) => style("set").green(),
        Err(_) => style("missing").red(),
    };
    eprintln!("  API key: {}", key_status);
    eprintln!("  Timeout: {}s", style(config.openai.timeout_seconds).cyan());
    eprintln!("  Attempts: {}", style(config.openai.retry_attempts).cyan());

    eprintln!();
    eprintln!("{}", style("Models:").bold().yellow());
    eprintln!("  Embedding: {}", style(&config.embedding.model).cyan());
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());
    eprintln!("  Chat: {}", style(&config.chat.model).cyan());
    eprintln!(
        "  Transcription: {}",
        style(&config.speech.transcription_model).cyan()
    );
    eprintln!("  Speech: {}", style(&config.speech.synthesis_model).cyan());
    eprintln!("  Voice: {}", style(&config.speech.voice).cyan());

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!("  Chunk Overlap: {}", style(config.chunking.chunk_overlap).cyan());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            if config.config_file_path().exists() {
                eprintln!("{}", style("Found existing configuration.").green());
            }
            Ok(config)
        },
    )
}

fn configure_api(openai: &mut OpenAiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(openai.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let candidate = OpenAiConfig {
                base_url: input.clone(),
                ..OpenAiConfig::default()
            };
            candidate.api_url().map(|_| ())
        })
        .interact_text()?;

    let store_key = Confirm::new()
        .with_prompt(format!(
            "Store an API key in the config file? ({} takes precedence)",
            API_KEY_ENV_VAR
        ))
        .default(openai.api_key.is_some())
        .interact()?;

    if store_key {
        let key = Password::new()
            .with_prompt("API key")
            .allow_empty_password(openai.api_key.is_some())
            .interact()?;
        if !key.trim().is_empty() {
            openai.api_key = Some(key.trim().to_string());
        }
    } else {
        openai.api_key = None;
    }

    let timeout_seconds: u64 = Input::new()
        .with_prompt("Request timeout (seconds)")
        .default(openai.timeout_seconds)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=600).contains(input) {
                Ok(())
            } else {
                Err("Timeout must be between 1 and 600 seconds")
            }
        })
        .interact_text()?;

    let retry_attempts: u32 = Input::new()
        .with_prompt("Attempts per request (1 = no retry)")
        .default(openai.retry_attempts)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (1..=10).contains(input) {
                Ok(())
            } else {
                Err("Attempts must be between 1 and 10")
            }
        })
        .interact_text()?;

    openai.set_base_url(base_url)?;
    openai.set_timeout_seconds(timeout_seconds)?;
    openai.set_retry_attempts(retry_attempts)?;

    Ok(())
}

fn configure_models(config: &mut Config) -> Result<()> {
    let not_empty = |input: &String| -> Result<(), &str> {
        if input.trim().is_empty() {
            Err("Model name cannot be empty")
        } else {
            Ok(())
        }
    };

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(config.embedding.model.clone())
        .validate_with(not_empty)
        .interact_text()?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(config.embedding.dimension)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (64..=4096).contains(input) {
                Ok(())
            } else {
                Err("Dimension must be between 64 and 4096")
            }
        })
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(config.chat.model.clone())
        .validate_with(not_empty)
        .interact_text()?;

    let default_voice = VOICES
        .iter()
        .position(|&v| v == config.speech.voice)
        .unwrap_or(0);
    let voice_index = Select::new()
        .with_prompt("Voice")
        .default(default_voice)
        .items(VOICES)
        .interact()?;

    config.embedding.set_model(embedding_model)?;
    config.embedding.set_dimension(dimension)?;
    config.chat.set_model(chat_model)?;
    config.speech.set_voice(VOICES[voice_index].to_string())?;

    Ok(())
}

fn test_api_connection(config: &Config) -> bool {
    OpenAiClient::new(config)
        .map(|client| client.with_timeout(Duration::from_secs(5)))
        .and_then(|client| client.ping())
        .is_ok()
}
