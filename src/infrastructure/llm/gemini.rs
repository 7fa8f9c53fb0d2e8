use async_trait::async_trait;
use futures::StreamExt;
use rig::agent::MultiTurnStreamItem;
use rig::client::{CompletionClient, ProviderClient};
use rig::providers::gemini;
use rig::streaming::{StreamedAssistantContent, StreamingPrompt};
use std::time::Duration;

use crate::domain::{
    ports::{LlmService, TextStream},
    DomainError,
};
use crate::infrastructure::config::LlmConfig;

/// Gemini generation endpoint. Reads `GEMINI_API_KEY` on construction.
pub struct GeminiLlm {
    client: gemini::Client,
    model: String,
    temperature: Option<f64>,
    timeout: Duration,
}

impl GeminiLlm {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            client: gemini::Client::from_env(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

#[async_trait]
impl LlmService for GeminiLlm {
    async fn stream_with_system(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<TextStream, DomainError> {
        let client = self.client.clone();
        let model = self.model.clone();
        let temperature = self.temperature;
        let timeout = self.timeout;
        let system = system.to_string();
        let prompt = prompt.to_string();

        let stream = async_stream::stream! {
            let mut builder = client.agent(&model).preamble(&system);
            if let Some(temperature) = temperature {
                builder = builder.temperature(temperature);
            }
            let agent = builder.build();

            let mut response = agent.stream_prompt(prompt).await;

            loop {
                let item = match tokio::time::timeout(timeout, response.next()).await {
                    Ok(Some(item)) => item,
                    Ok(None) => break,
                    Err(_) => {
                        yield Err(DomainError::timeout(format!(
                            "no output from Gemini within {}s",
                            timeout.as_secs()
                        )));
                        break;
                    }
                };

                match item {
                    Ok(MultiTurnStreamItem::StreamAssistantItem(content)) => {
                        if let StreamedAssistantContent::Text(text) = content {
                            if !text.text.is_empty() {
                                yield Ok(text.text);
                            }
                        }
                    }
                    Ok(MultiTurnStreamItem::FinalResponse(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        yield Err(DomainError::external(format!("Gemini stream failed: {e}")));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
