//! Turn Processing
//!
//! One conversational turn: load or create the student and chat, replay the
//! history to the model under the active persona's system prompt, resolve
//! the commands embedded in the reply, dispatch them in order, then persist
//! the mutated student with a single write. The model call and the
//! repository calls are the only await points; a model failure aborts the
//! turn before any command runs.

use crate::command::{Command, CommandResult, resolve_model_output};
use crate::experts::{ExpertRegistry, ExpertType};
use crate::llm_client::{ChatMessage, LLMClient, LLMError, Role};
use crate::prompt::PromptGenerator;
use crate::repo::{ChatRepo, StudentRepo};
use crate::student::Student;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// How many recent messages are replayed to the model each turn.
const HISTORY_LIMIT: usize = 50;

/// Why a turn failed as a whole. Individual command failures are not turn
/// failures; they ride along inside the response.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("model call failed: {0}")]
    ModelUnavailable(#[from] LLMError),
    #[error("failed to load conversation state: {0}")]
    Load(#[source] anyhow::Error),
    #[error("failed to build system prompt: {0}")]
    Prompt(#[source] anyhow::Error),
    #[error("failed to persist student state: {0}")]
    Persistence(#[source] anyhow::Error),
}

/// Everything the transport layer needs to answer a turn.
#[derive(Debug, Clone, Serialize)]
pub struct ExpertResponse {
    pub expert: ExpertType,
    pub message: String,
    pub commands: Vec<Command>,
    pub results: Vec<CommandResult>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

pub struct TurnProcessor {
    student_repo: Arc<dyn StudentRepo>,
    chat_repo: Arc<dyn ChatRepo>,
    llm_client: Arc<dyn LLMClient>,
    prompts: Arc<dyn PromptGenerator>,
    registry: ExpertRegistry,
}

impl TurnProcessor {
    pub fn new(
        student_repo: Arc<dyn StudentRepo>,
        chat_repo: Arc<dyn ChatRepo>,
        llm_client: Arc<dyn LLMClient>,
        prompts: Arc<dyn PromptGenerator>,
        registry: ExpertRegistry,
    ) -> Self {
        Self {
            student_repo,
            chat_repo,
            llm_client,
            prompts,
            registry,
        }
    }

    /// Processes one turn for `student_id` under the given persona.
    ///
    /// The caller must guarantee at most one in-flight turn per student;
    /// the processor itself takes no locks over the student record.
    pub async fn process_turn(
        &self,
        student_id: i64,
        expert: ExpertType,
        user_text: &str,
    ) -> Result<ExpertResponse, TurnError> {
        let mut student = self
            .get_or_create_student(student_id)
            .await
            .map_err(TurnError::Load)?;
        let chat = self
            .chat_repo
            .get_or_create_chat(student.id)
            .await
            .map_err(TurnError::Load)?;

        self.chat_repo
            .save_message(chat.id, Role::User, user_text)
            .await
            .map_err(TurnError::Load)?;
        let history = self
            .chat_repo
            .get_history(student.id, HISTORY_LIMIT)
            .await
            .map_err(TurnError::Load)?;

        let system_prompt = self
            .prompts
            .expert_prompt(expert, &student)
            .await
            .map_err(TurnError::Prompt)?;

        // The only all-or-nothing boundary: a failure here leaves the
        // student untouched.
        let raw_reply = self
            .llm_client
            .generate(&history, &system_prompt, 0.7)
            .await?;

        let output = resolve_model_output(&raw_reply);
        info!(
            student_id = student.id,
            expert = %expert,
            commands = output.commands.len(),
            "model reply resolved"
        );

        let results = self
            .registry
            .execute_all(expert, &output.commands, &mut student, chat.id)
            .await;

        self.chat_repo
            .save_message(chat.id, Role::Assistant, &output.message)
            .await
            .map_err(TurnError::Persistence)?;
        self.student_repo
            .update(&student)
            .await
            .map_err(TurnError::Persistence)?;

        let mut metadata = HashMap::new();
        metadata.insert("student_id".to_string(), serde_json::json!(student.id));
        metadata.insert("chat_id".to_string(), serde_json::json!(chat.id));
        metadata.insert(
            "interview_stage".to_string(),
            serde_json::json!(student.interview_stage.as_str()),
        );
        // The hand-off: the last switch (or interview completion) wins.
        if let Some(next_expert) = results
            .iter()
            .rev()
            .filter(|r| r.success)
            .find_map(|r| r.data.get("next_expert").cloned())
        {
            metadata.insert("next_expert".to_string(), next_expert);
        }

        Ok(ExpertResponse {
            expert,
            message: output.message,
            commands: output.commands,
            results,
            metadata,
            timestamp: Utc::now(),
        })
    }

    /// First contact creates the student at the start of the interview.
    async fn get_or_create_student(&self, student_id: i64) -> anyhow::Result<Student> {
        if let Some(student) = self.student_repo.get_by_id(student_id).await? {
            return Ok(student);
        }
        let mut student = Student::new(0, student_id);
        student.id = self.student_repo.create(&student).await?;
        info!(student_id = student.id, account_id = student.account_id, "student created");
        Ok(student)
    }
}
