use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message of the conversation history replayed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    /// The provider could not be reached or rejected the request. The turn
    /// fails before any command runs.
    #[error("model provider unavailable: {0}")]
    Unavailable(String),
    /// The provider answered but the response carried no usable text.
    #[error("model returned no content")]
    NoContent,
}

/// The opaque "generate text" capability the orchestration core runs
/// against. Any backend that can take a history plus a system prompt and
/// return text satisfies it.
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn generate(
        &self,
        history: &[ChatMessage],
        system_prompt: &str,
        temperature: f32,
    ) -> Result<String, LLMError>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The specific model identifier to use for chat completions (e.g., "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn generate(
        &self,
        history: &[ChatMessage],
        system_prompt: &str,
        temperature: f32,
    ) -> Result<String, LLMError> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() + 1);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(|e| LLMError::Unavailable(e.to_string()))?
                .into(),
        );
        for msg in history {
            let message = match msg.role {
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.text.clone())
                    .build()
                    .map_err(|e| LLMError::Unavailable(e.to_string()))?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(msg.text.clone())
                    .build()
                    .map_err(|e| LLMError::Unavailable(e.to_string()))?
                    .into(),
            };
            messages.push(message);
        }

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(temperature)
            .build()
            .map_err(|e| LLMError::Unavailable(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LLMError::Unavailable(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(LLMError::NoContent)
    }
}

/// A scripted `LLMClient` for development and testing: returns its canned
/// responses in order and fails once the script runs out.
pub struct MockLLMClient {
    responses: Mutex<VecDeque<String>>,
}

impl MockLLMClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(
        &self,
        _history: &[ChatMessage],
        _system_prompt: &str,
        _temperature: f32,
    ) -> Result<String, LLMError> {
        self.responses
            .lock()
            .expect("mock response queue poisoned")
            .pop_front()
            .ok_or_else(|| LLMError::Unavailable("mock script exhausted".to_string()))
    }
}
