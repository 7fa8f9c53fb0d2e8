use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub content_type: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            content_type: "text/plain".to_string(),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A source document together with its full text, as read from the corpus.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: Document,
    pub text: String,
}

impl LoadedDocument {
    pub fn new(document: Document, text: impl Into<String>) -> Self {
        Self {
            document,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub chunk_index: usize,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    pub fn new(document_id: Uuid, content: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            content: content.into(),
            chunk_index,
            metadata: ChunkMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: Option<String>,
    pub word_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Splits `content` into sentence-aligned chunks of at most `chunk_size` words.
///
/// Sentences are packed greedily. Each chunk after the first starts with the
/// last `chunk_overlap` words of its predecessor. A sentence longer than
/// `chunk_size` is cut on word boundaries.
pub fn split_into_chunks(
    document_id: Uuid,
    content: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<DocumentChunk> {
    let size = chunk_size.max(1);
    let overlap = chunk_overlap.min(size - 1);

    let mut windows: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut fresh = 0usize;

    for sentence in sentences(content) {
        let words: Vec<&str> = sentence.split_whitespace().collect();

        for piece in words.chunks(size) {
            if current.len() + piece.len() > size {
                if fresh > 0 {
                    let tail = current[current.len().saturating_sub(overlap)..].to_vec();
                    windows.push(std::mem::replace(&mut current, tail));
                    fresh = 0;
                }
                let excess = (current.len() + piece.len()).saturating_sub(size);
                current.drain(..excess.min(current.len()));
            }
            current.extend_from_slice(piece);
            fresh += piece.len();
        }
    }

    if fresh > 0 {
        windows.push(current);
    }

    windows
        .into_iter()
        .enumerate()
        .map(|(index, words)| {
            let metadata = ChunkMetadata {
                source: None,
                word_count: words.len(),
            };
            DocumentChunk::new(document_id, words.join(" "), index).with_metadata(metadata)
        })
        .collect()
}

/// Paragraphs split on blank lines, then on sentence-ending punctuation
/// followed by whitespace.
/// Text between blank lines, for both `\n` and `\r\n` line endings.
fn paragraphs(content: &str) -> impl Iterator<Item = &str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        if line.trim().is_empty() {
            out.push(&content[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    out.push(&content[start..]);

    out.into_iter().map(str::trim).filter(|p| !p.is_empty())
}

fn sentences(content: &str) -> Vec<&str> {
    let mut out = Vec::new();

    for paragraph in paragraphs(content) {
        let mut start = 0;
        let mut chars = paragraph.char_indices().peekable();

        while let Some((_, c)) = chars.next() {
            if matches!(c, '.' | '!' | '?') {
                if let Some(&(next_i, next_c)) = chars.peek() {
                    if next_c.is_whitespace() {
                        let sentence = paragraph[start..next_i].trim();
                        if !sentence.is_empty() {
                            out.push(sentence);
                        }
                        start = next_i;
                    }
                }
            }
        }

        let rest = paragraph[start..].trim();
        if !rest.is_empty() {
            out.push(rest);
        }
    }

    out
}
