
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;
use ureq::unversioned::multipart::{Form, Part};

use super::{SpeechToText, TextToSpeech};
use crate::config::Config;
use crate::openai::OpenAiClient;
use crate::{RagError, Result};

/// Speech provider backed by `/audio/transcriptions` and `/audio/speech`
#[derive(Debug, Clone)]
pub struct OpenAiSpeech {
    client: OpenAiClient,
    transcription_model: String,
    synthesis_model: String,
    voice: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl OpenAiSpeech {
    #[inline]
    pub fn new(client: OpenAiClient, config: &Config) -> Self {
        Self {
            client,
            transcription_model: config.speech.transcription_model.clone(),
            synthesis_model: config.speech.synthesis_model.clone(),
            voice: config.speech.voice.clone(),
        }
    }

    #[inline]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    #[inline]
    pub fn voice(&self) -> &str {
        &self.voice
    }

    fn transcription_form<'a>(
        &'a self,
        audio: &'a [u8],
        file_name: &str,
    ) -> std::result::Result<Form<'a>, ureq::Error> {
        let file = Part::bytes(audio)
            .file_name(file_name)
            .mime_str(audio_content_type(file_name))?;

        Ok(Form::new()
            .text("model", &self.transcription_model)
            .part("file", file))
    }
}

/// MIME type for the audio containers the transcription endpoint accepts
fn audio_content_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp3" | "mpga" | "mpeg" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

impl SpeechToText for OpenAiSpeech {
    fn transcribe(&self, audio: &[u8], file_name: &str) -> Result<String> {
        debug!("Transcribing {} ({} bytes)", file_name, audio.len());

        let response_text = self
            .client
            .post_multipart("audio/transcriptions", || {
                self.transcription_form(audio, file_name)
            })
            .context("Transcription request failed")
            .map_err(|e| RagError::Speech(format!("{:#}", e)))?;

        let response: TranscriptionResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Speech(format!("Failed to parse transcription response: {}", e)))?;

        Ok(response.text)
    }
}

impl TextToSpeech for OpenAiSpeech {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        debug!("Synthesizing {} chars with voice {}", text.chars().count(), self.voice);

        let request = SpeechRequest {
            model: &self.synthesis_model,
            voice: &self.voice,
            input: text,
            response_format: "mp3",
        };

        let audio = self
            .client
            .post_json_for_bytes("audio/speech", &request)
            .context("Speech synthesis request failed")
            .map_err(|e| RagError::Speech(format!("{:#}", e)))?;

        if audio.is_empty() {
            return Err(RagError::Speech(
                "Speech synthesis returned no audio".to_string(),
            ));
        }

        Ok(audio)
    }
}
