use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::assistant::{Assistant, OpenAiChat};
use crate::config::Config;
use crate::embeddings::OpenAiEmbeddings;
use crate::openai::OpenAiClient;
use crate::pipeline::ConversePipeline;
use crate::rag::KnowledgeBase;
use crate::speech::{OpenAiSpeech, SpeechToText, speak_to_file, transcribe_file};

/// Wire the OpenAI-backed providers together and index the given documents
#[inline]
pub fn build_pipeline(config: &Config, documents: &[PathBuf]) -> Result<ConversePipeline> {
    let client = OpenAiClient::new(config).context("Failed to create API client")?;

    let embedder = Arc::new(OpenAiEmbeddings::new(client.clone(), config));
    let knowledge = Arc::new(KnowledgeBase::new(
        embedder,
        config.chunking.clone(),
        config.embedding.dimension as usize,
    )?);
    index_documents(&knowledge, documents)?;

    let chat = Arc::new(OpenAiChat::new(client.clone(), config));
    let speech = Arc::new(OpenAiSpeech::new(client, config));

    Ok(ConversePipeline::new(
        knowledge,
        Assistant::new(chat),
        Arc::clone(&speech) as Arc<dyn SpeechToText>,
        speech,
    )
    .with_top_k(config.retrieval.top_k))
}

/// Index every document in order, stopping at the first failure.
///
/// Returns the total number of chunks added.
#[inline]
pub fn index_documents(knowledge: &KnowledgeBase, documents: &[PathBuf]) -> Result<usize> {
    if documents.is_empty() {
        warn!("No documents given; answers will fail until something is indexed");
        return Ok(0);
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .context("Invalid progress template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut total = 0;
    for path in documents {
        spinner.set_message(format!("Indexing {}", path.display()));

        let indexed = knowledge.index_document(path).map_err(|e| {
            spinner.abandon_with_message(format!("Failed to index {}", path.display()));
            anyhow::Error::new(e).context(format!("Failed to index {}", path.display()))
        })?;

        total += indexed.chunks_added;
        spinner.println(format!(
            "{} {} ({}, {} chunks)",
            style("✓").green(),
            indexed.source,
            indexed.document_type,
            indexed.chunks_added
        ));
    }

    spinner.finish_with_message(format!(
        "Indexed {} documents into {} chunks",
        documents.len(),
        total
    ));
    info!("Knowledge base holds {} chunks", knowledge.len());

    Ok(total)
}

/// Answer one typed question
#[inline]
pub fn ask_question(pipeline: &ConversePipeline, question: &str) -> Result<()> {
    let answer = pipeline.ask(question)?;
    println!("{}", answer);
    Ok(())
}

/// Interactive question loop. `/reset` clears the conversation, `/quit` exits.
#[inline]
pub fn run_chat<R: BufRead, W: Write>(
    pipeline: &ConversePipeline,
    input: R,
    mut output: W,
) -> Result<()> {
    writeln!(output, "Ask a question. /reset clears the conversation, /quit exits.")?;

    for line in input.lines() {
        let line = line.context("Failed to read input")?;
        let question = line.trim();

        match question {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                pipeline.assistant().reset_conversation();
                writeln!(output, "Conversation memory cleared.")?;
            }
            _ => match pipeline.ask(question) {
                Ok(answer) => writeln!(output, "{}", answer)?,
                Err(e) => {
                    warn!("Question failed: {}", e);
                    writeln!(output, "Error: {}", e)?;
                }
            },
        }
    }

    Ok(())
}

/// Print the nearest chunks for `query` with their distances
#[inline]
pub fn search_chunks(knowledge: &KnowledgeBase, query: &str, top_k: usize) -> Result<()> {
    let hits = knowledge.search(query, top_k)?;

    if hits.is_empty() {
        println!("No matching chunks.");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{}. {} {}",
            rank + 1,
            style(&hit.chunk.source).cyan(),
            style(format!("(distance {:.4})", hit.distance)).dim()
        );
        for line in hit.chunk.text.lines() {
            println!("   {}", line);
        }
        println!();
    }

    Ok(())
}

/// Full voice round trip; prints the outcome as JSON
#[inline]
pub fn converse_audio(
    pipeline: &ConversePipeline,
    audio_path: &Path,
    output_path: &Path,
) -> Result<()> {
    let outcome = pipeline.converse(audio_path, output_path)?;
    let json = serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?;
    println!("{}", json);
    Ok(())
}

#[inline]
pub fn transcribe_audio(config: &Config, audio_path: &Path) -> Result<()> {
    let client = OpenAiClient::new(config).context("Failed to create API client")?;
    let speech = OpenAiSpeech::new(client, config);

    let transcription = transcribe_file(&speech, audio_path)?;

    println!("{}", transcription.text);
    eprintln!(
        "{}",
        style(format!(
            "Transcribed in {:.2}s",
            transcription.elapsed.as_secs_f64()
        ))
        .dim()
    );
    Ok(())
}

#[inline]
pub fn speak_text(config: &Config, text: &str, output_path: &Path) -> Result<()> {
    let client = OpenAiClient::new(config).context("Failed to create API client")?;
    let speech = OpenAiSpeech::new(client, config);

    let output = speak_to_file(&speech, text, output_path)?;

    println!("{}", output.path.display());
    eprintln!(
        "{}",
        style(format!("Synthesized in {:.2}s", output.elapsed.as_secs_f64())).dim()
    );
    Ok(())
}
