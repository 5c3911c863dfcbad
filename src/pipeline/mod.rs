//! Voice round trip: transcribe a question, answer it from the knowledge
//! base, and speak the answer.


use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::RagError;
use crate::assistant::Assistant;
use crate::rag::{DEFAULT_TOP_K, KnowledgeBase, join_context};
use crate::speech::{SpeechToText, TextToSpeech, speak_to_file, transcribe_file};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverseStage {
    Transcription,
    Retrieval,
    Generation,
    Synthesis,
}

impl fmt::Display for ConverseStage {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Transcription => "Transcription",
            Self::Retrieval => "Retrieval",
            Self::Generation => "Generation",
            Self::Synthesis => "Synthesis",
        };
        f.write_str(name)
    }
}

/// A pipeline failure tagged with the stage that produced it
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: ConverseStage,
    #[source]
    pub source: RagError,
}

impl PipelineError {
    fn at(stage: ConverseStage) -> impl FnOnce(RagError) -> Self {
        move |source| Self { stage, source }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConverseOutcome {
    pub transcription: String,
    pub response: String,
    pub audio_file: PathBuf,
}

pub struct ConversePipeline {
    knowledge: Arc<KnowledgeBase>,
    assistant: Assistant,
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn TextToSpeech>,
    top_k: usize,
}

impl fmt::Debug for ConversePipeline {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversePipeline")
            .field("knowledge", &self.knowledge)
            .field("assistant", &self.assistant)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl ConversePipeline {
    #[inline]
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        assistant: Assistant,
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn TextToSpeech>,
    ) -> Self {
        Self {
            knowledge,
            assistant,
            stt,
            tts,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    #[inline]
    pub fn assistant(&self) -> &Assistant {
        &self.assistant
    }

    /// Answer a typed question from the knowledge base
    #[inline]
    pub fn ask(&self, question: &str) -> Result<String, PipelineError> {
        let chunks = self
            .knowledge
            .retrieve_relevant_chunks(question, self.top_k)
            .map_err(PipelineError::at(ConverseStage::Retrieval))?;
        debug!("Retrieved {} context chunks", chunks.len());

        self.assistant
            .chat_with_memory(question, &join_context(&chunks))
            .map_err(PipelineError::at(ConverseStage::Generation))
    }

    /// Transcribe `audio_path`, answer it, and write the spoken reply to `output_path`.
    ///
    /// Stops at the first failing stage; later stages are not attempted.
    #[inline]
    pub fn converse(
        &self,
        audio_path: &Path,
        output_path: &Path,
    ) -> Result<ConverseOutcome, PipelineError> {
        info!("Step 1: transcribing {}", audio_path.display());
        let transcription = transcribe_file(self.stt.as_ref(), audio_path)
            .map_err(PipelineError::at(ConverseStage::Transcription))?;
        debug!("Transcription: {}", transcription.text);

        info!("Step 2 and 3: retrieving context and generating a reply");
        let response = self.ask(&transcription.text)?;

        info!("Step 4: synthesizing audio");
        let speech = speak_to_file(self.tts.as_ref(), &response, output_path)
            .map_err(PipelineError::at(ConverseStage::Synthesis))?;

        Ok(ConverseOutcome {
            transcription: transcription.text,
            response,
            audio_file: speech.path,
        })
    }
}
