// Speech module
// Audio transcription and synthesis around the assistant


pub mod openai;

pub use openai::OpenAiSpeech;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::info;

use crate::{RagError, Result};

pub trait SpeechToText: Send + Sync {
    /// Transcribe encoded audio; `file_name` tells the provider the container format
    fn transcribe(&self, audio: &[u8], file_name: &str) -> Result<String>;
}

pub trait TextToSpeech: Send + Sync {
    /// Synthesize `text` into encoded audio bytes
    fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcription {
    pub text: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechOutput {
    pub path: PathBuf,
    pub elapsed: Duration,
}

/// Read an audio file and transcribe it
#[inline]
pub fn transcribe_file(stt: &dyn SpeechToText, path: &Path) -> Result<Transcription> {
    let started = Instant::now();

    let audio = fs::read(path).map_err(|e| {
        RagError::Speech(format!("Failed to read audio file {}: {}", path.display(), e))
    })?;
    let file_name = path.file_name().map_or_else(
        || "audio.mp3".to_string(),
        |name| name.to_string_lossy().into_owned(),
    );

    let text = stt.transcribe(&audio, &file_name)?;
    let elapsed = started.elapsed();
    info!("Transcription finished in {:.2?}", elapsed);

    Ok(Transcription { text, elapsed })
}

/// Synthesize `text` and write the audio to `path`
#[inline]
pub fn speak_to_file(tts: &dyn TextToSpeech, text: &str, path: &Path) -> Result<SpeechOutput> {
    let started = Instant::now();

    let audio = tts.synthesize(text)?;
    fs::write(path, &audio).map_err(|e| {
        RagError::Speech(format!("Failed to write audio file {}: {}", path.display(), e))
    })?;

    let elapsed = started.elapsed();
    info!(
        "Synthesized {} bytes of audio to {} in {:.2?}",
        audio.len(),
        path.display(),
        elapsed
    );

    Ok(SpeechOutput {
        path: path.to_path_buf(),
        elapsed,
    })
}
