//! Deterministic port implementations shared by unit tests.

use async_trait::async_trait;
use futures::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::{
    ports::{EmbeddingService, LlmService, TextStream},
    DomainError, Embedding,
};

const DIMENSION: usize = 512;

/// Bag-of-words hashing embedder that counts its batch calls.
pub struct KeywordEmbedding {
    pub batch_calls: AtomicUsize,
    model: String,
    dimension: usize,
    /// What `dimension()` reports, when it differs from the real vectors.
    reported_dimension: Option<usize>,
}

impl Default for KeywordEmbedding {
    fn default() -> Self {
        Self {
            batch_calls: AtomicUsize::new(0),
            model: "keyword-test".to_string(),
            dimension: DIMENSION,
            reported_dimension: None,
        }
    }
}

impl KeywordEmbedding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..Self::default()
        }
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    /// Produces vectors of the usual size but claims another one.
    pub fn misreporting(reported_dimension: usize) -> Self {
        Self {
            reported_dimension: Some(reported_dimension),
            ..Self::default()
        }
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
                    (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
                });
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }
        Embedding::new(vector)
    }
}

#[async_trait]
impl EmbeddingService for KeywordEmbedding {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.reported_dimension.unwrap_or(self.dimension)
    }
}

#[derive(Clone)]
pub enum Script {
    Reply(Vec<&'static str>),
    /// Waits before the first chunk.
    Delayed(Duration, Vec<&'static str>),
    FailOnStart(&'static str),
    FailMidStream(Vec<&'static str>, &'static str),
}

/// LLM double that plays back a fixed script and records every prompt.
pub struct ScriptedLlm {
    script: Script,
    pub prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedLlm {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(chunks: Vec<&'static str>) -> Self {
        Self::new(Script::Reply(chunks))
    }

    pub fn last_prompt(&self) -> Option<(String, String)> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmService for ScriptedLlm {
    async fn stream_with_system(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<TextStream, DomainError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));

        let items: Vec<Result<String, DomainError>> = match &self.script {
            Script::Reply(chunks) => chunks.iter().map(|c| Ok(c.to_string())).collect(),
            Script::Delayed(delay, chunks) => {
                let delay = *delay;
                let chunks = chunks.clone();
                return Ok(Box::pin(async_stream::stream! {
                    tokio::time::sleep(delay).await;
                    for chunk in chunks {
                        yield Ok(chunk.to_string());
                    }
                }));
            }
            Script::FailOnStart(msg) => return Err(DomainError::external(*msg)),
            Script::FailMidStream(chunks, msg) => chunks
                .iter()
                .map(|c| Ok(c.to_string()))
                .chain(std::iter::once(Err(DomainError::external(*msg))))
                .collect(),
        };

        Ok(Box::pin(stream::iter(items)))
    }
}
