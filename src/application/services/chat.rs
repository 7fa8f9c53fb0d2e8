use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::application::services::{IndexService, RagService};
use crate::domain::{
    ports::{LlmService, SessionStore},
    ChatSession, DomainError, Message, SearchResult, TravelPreferences,
};

/// Marks assistant messages that report a failed turn.
pub const ERROR_INDICATOR: &str = "❌";

const EVENT_BUFFER: usize = 64;

/// Prompt texts used for every turn.
#[derive(Debug, Clone)]
pub struct ChatPrompts {
    pub system: String,
    /// Contains `{context}` and `{query}`.
    pub context_template: String,
    pub no_context: String,
    pub sign_off: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// Next piece of the answer.
    Delta(String),
    /// The stored assistant message of a successful turn.
    Done(Message),
    /// The stored error message of a failed turn.
    Failed(Message),
}

/// Runs chat turns: record the user message, retrieve context, stream the
/// model's answer and record it.
pub struct ChatService {
    sessions: Arc<dyn SessionStore>,
    index: Arc<IndexService>,
    rag: Arc<RagService>,
    llm: Arc<dyn LlmService>,
    prompts: ChatPrompts,
}

impl ChatService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        index: Arc<IndexService>,
        rag: Arc<RagService>,
        llm: Arc<dyn LlmService>,
        prompts: ChatPrompts,
    ) -> Self {
        Self {
            sessions,
            index,
            rag,
            llm,
            prompts,
        }
    }

    pub async fn start_session(&self) -> Result<ChatSession, DomainError> {
        let session = self.sessions.create().await?;
        info!(session_id = %session.id, "session started");
        Ok(session)
    }

    pub async fn session(&self, session_id: Uuid) -> Result<ChatSession, DomainError> {
        self.sessions
            .get(session_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("session {session_id}")))
    }

    pub async fn clear_history(&self, session_id: Uuid) -> Result<(), DomainError> {
        self.sessions.clear(session_id).await?;
        info!(%session_id, "chat history cleared");
        Ok(())
    }

    pub async fn end_session(&self, session_id: Uuid) -> Result<(), DomainError> {
        self.sessions.delete(session_id).await
    }

    /// Starts a turn and returns its events. The turn runs on its own task, so
    /// it is recorded even if the caller stops reading.
    #[instrument(skip(self, message, preferences), fields(%session_id))]
    pub async fn stream_reply(
        self: &Arc<Self>,
        session_id: Uuid,
        message: &str,
        preferences: &TravelPreferences,
    ) -> Result<ReceiverStream<ChatEvent>, DomainError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(DomainError::validation("message must not be empty"));
        }

        let generation = self
            .sessions
            .append(session_id, Message::user(message))
            .await?;

        let query = preferences.compose_query(message);
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_turn(session_id, generation, query, tx).await
        });

        Ok(ReceiverStream::new(rx))
    }

    /// Runs a full turn and returns the stored assistant message.
    pub async fn reply(
        self: &Arc<Self>,
        session_id: Uuid,
        message: &str,
        preferences: &TravelPreferences,
    ) -> Result<Message, DomainError> {
        let mut events = self.stream_reply(session_id, message, preferences).await?;
        while let Some(event) = events.next().await {
            match event {
                ChatEvent::Done(message) | ChatEvent::Failed(message) => return Ok(message),
                ChatEvent::Delta(_) => {}
            }
        }
        Err(DomainError::internal("chat turn ended without a reply"))
    }

    async fn run_turn(
        &self,
        session_id: Uuid,
        generation: u64,
        query: String,
        tx: mpsc::Sender<ChatEvent>,
    ) {
        let (message, event) = match self.generate(&query, &tx).await {
            Ok(mut reply) => {
                if !self.prompts.sign_off.is_empty() {
                    reply.push_str(&self.prompts.sign_off);
                    let _ = tx.send(ChatEvent::Delta(self.prompts.sign_off.clone())).await;
                }
                let message = Message::assistant(reply);
                (message.clone(), ChatEvent::Done(message))
            }
            Err(e) => {
                error!(%session_id, error = %e, "chat turn failed");
                let message = Message::assistant(error_reply(&e));
                (message.clone(), ChatEvent::Failed(message))
            }
        };

        match self
            .sessions
            .append_if_generation(session_id, generation, message)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!(%session_id, "history cleared during the turn, reply not recorded")
            }
            Err(e) => error!(%session_id, error = %e, "failed to record assistant reply"),
        }
        // The receiver may be gone; the turn is already recorded.
        let _ = tx.send(event).await;
    }

    async fn generate(
        &self,
        query: &str,
        tx: &mpsc::Sender<ChatEvent>,
    ) -> Result<String, DomainError> {
        self.index.ensure_ready().await?;

        let context = self.rag.retrieve(query).await?;
        let prompt = self.render_prompt(query, &context);

        let mut stream = self
            .llm
            .stream_with_system(&self.prompts.system, &prompt)
            .await?;

        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            reply.push_str(&chunk);
            let _ = tx.send(ChatEvent::Delta(chunk)).await;
        }

        Ok(reply)
    }

    fn render_prompt(&self, query: &str, context: &[SearchResult]) -> String {
        let context = if context.is_empty() {
            self.prompts.no_context.clone()
        } else {
            context
                .iter()
                .map(|r| r.chunk.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        fill_template(
            &self.prompts.context_template,
            &[("{context}", &context), ("{query}", query)],
        )
    }
}

pub fn error_reply(error: &DomainError) -> String {
    format!("{ERROR_INDICATOR} Oops, something went wrong: {error}")
}

/// Single left-to-right pass, so substituted text is never rescanned.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while !rest.is_empty() {
        let next = values
            .iter()
            .filter_map(|(key, value)| rest.find(key).map(|pos| (pos, *key, *value)))
            .min_by_key(|(pos, _, _)| *pos);

        match next {
            Some((pos, key, value)) => {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + key.len()..];
            }
            None => {
                out.push_str(rest);
                break;
            }
        }
    }

    out
}
