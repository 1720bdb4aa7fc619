//! Prompt Generation
//!
//! The core does not compose prompt bodies itself; it consumes strings from
//! a `PromptGenerator`. The template implementation loads one markdown file
//! per prompt at startup and fills in placeholders with the student profile,
//! dialogue, and content catalogue.

use crate::content::Topic;
use crate::experts::ExpertType;
use crate::llm_client::ChatMessage;
use crate::student::Student;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait PromptGenerator: Send + Sync {
    /// The system prompt for a persona's conversational turn.
    async fn expert_prompt(&self, expert: ExpertType, student: &Student) -> Result<String>;
    /// Prompt asking the model to distill profile facts from the interview
    /// dialogue as strict JSON.
    async fn dialogue_analysis_prompt(&self, history: &[ChatMessage]) -> Result<String>;
    /// Prompt asking the model to produce a personal learning plan as
    /// strict JSON over the available topics.
    async fn plan_generation_prompt(&self, student: &Student, topics: &[Topic]) -> Result<String>;
    /// Prompt asking the model to produce quiz questions as strict JSON.
    async fn test_generation_prompt(
        &self,
        student: &Student,
        topic: Option<&Topic>,
        test_type: &str,
    ) -> Result<String>;
}

/// Template-file driven generator. Templates are plain text with
/// `{placeholder}` slots:
///
/// - persona templates (`interview_expert`, `teacher`, `test_expert`,
///   `career_consultant`, `progress_analyst`): `{student_profile}`,
///   `{interview_stage}`
/// - `dialogue_analysis`: `{dialogue}`
/// - `plan_generation`: `{student_profile}`, `{topics}`
/// - `test_generation`: `{student_profile}`, `{topic}`, `{test_type}`
pub struct TemplatePromptGenerator {
    templates: HashMap<String, String>,
}

impl TemplatePromptGenerator {
    pub fn new(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }

    fn template(&self, key: &str) -> Result<&String> {
        self.templates
            .get(key)
            .with_context(|| format!("Missing prompt template: '{}'", key))
    }

    fn profile_json(student: &Student) -> Result<String> {
        serde_json::to_string_pretty(student).context("Failed to serialize student profile")
    }

    fn format_dialogue(history: &[ChatMessage]) -> String {
        history
            .iter()
            .map(|msg| format!("{}: {}", msg.role, msg.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn format_topics(topics: &[Topic]) -> String {
        topics
            .iter()
            .map(|t| format!("- [{}] {}: {}", t.id, t.name, t.intro))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl PromptGenerator for TemplatePromptGenerator {
    async fn expert_prompt(&self, expert: ExpertType, student: &Student) -> Result<String> {
        let template = self.template(expert.as_str())?;
        Ok(template
            .replace("{student_profile}", &Self::profile_json(student)?)
            .replace("{interview_stage}", student.interview_stage.as_str()))
    }

    async fn dialogue_analysis_prompt(&self, history: &[ChatMessage]) -> Result<String> {
        let template = self.template("dialogue_analysis")?;
        Ok(template.replace("{dialogue}", &Self::format_dialogue(history)))
    }

    async fn plan_generation_prompt(&self, student: &Student, topics: &[Topic]) -> Result<String> {
        let template = self.template("plan_generation")?;
        Ok(template
            .replace("{student_profile}", &Self::profile_json(student)?)
            .replace("{topics}", &Self::format_topics(topics)))
    }

    async fn test_generation_prompt(
        &self,
        student: &Student,
        topic: Option<&Topic>,
        test_type: &str,
    ) -> Result<String> {
        let template = self.template("test_generation")?;
        let topic_context = topic
            .map(|t| format!("[{}] {}: {}", t.id, t.name, t.intro))
            .unwrap_or_else(|| "unknown content".to_string());
        Ok(template
            .replace("{student_profile}", &Self::profile_json(student)?)
            .replace("{topic}", &topic_context)
            .replace("{test_type}", test_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::Role;

    fn generator() -> TemplatePromptGenerator {
        let mut templates = HashMap::new();
        templates.insert(
            "interview_expert".to_string(),
            "Stage: {interview_stage}\nProfile: {student_profile}".to_string(),
        );
        templates.insert("dialogue_analysis".to_string(), "Analyze:\n{dialogue}".to_string());
        TemplatePromptGenerator::new(templates)
    }

    #[tokio::test]
    async fn test_expert_prompt_fills_placeholders() {
        let student = Student::new(1, 1);
        let prompt = generator()
            .expert_prompt(ExpertType::InterviewExpert, &student)
            .await
            .unwrap();
        assert!(prompt.starts_with("Stage: WELCOME"));
        assert!(prompt.contains("\"account_id\": 1"));
    }

    #[tokio::test]
    async fn test_missing_template_is_an_error() {
        let student = Student::new(1, 1);
        let err = generator()
            .expert_prompt(ExpertType::Teacher, &student)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("teacher"));
    }

    #[tokio::test]
    async fn test_dialogue_formatting() {
        let history = vec![
            ChatMessage::new(Role::User, "hi"),
            ChatMessage::new(Role::Assistant, "hello"),
        ];
        let prompt = generator().dialogue_analysis_prompt(&history).await.unwrap();
        assert!(prompt.contains("user: hi"));
        assert!(prompt.contains("assistant: hello"));
    }
}
