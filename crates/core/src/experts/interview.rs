//! Interview Expert
//!
//! Runs the profiling interview: advances the stage machine, applies
//! profile-field updates, distills the dialogue into profile facts through
//! an analysis model call, generates the personal learning plan, and
//! completes the interview, which is also the hand-off point to the
//! teacher persona.

use crate::command::{Command, CommandKind, CommandResult};
use crate::experts::{ExpertHandler, ExpertType};
use crate::llm_client::LLMClient;
use crate::prompt::PromptGenerator;
use crate::repo::{ChatRepo, ContentRepo};
use crate::student::{InterviewStage, PlanEntry, ProfileUpdates, Student};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How much of the dialogue the analysis call sees.
const ANALYSIS_HISTORY_LIMIT: usize = 30;

pub struct InterviewExpert {
    chat_repo: Arc<dyn ChatRepo>,
    content_repo: Arc<dyn ContentRepo>,
    llm_client: Arc<dyn LLMClient>,
    prompts: Arc<dyn PromptGenerator>,
}

/// Commands the interview expert understands.
enum InterviewCommand {
    SetStage,
    AnalyzeDialogue,
    UpdateProfile(String),
    GenerateLearningPlan,
    CompleteInterview,
    Unknown,
}

impl InterviewCommand {
    fn parse(command: &Command) -> Self {
        match command.name.as_str() {
            "set_interview_stage" => InterviewCommand::SetStage,
            "analyze_dialogue" => InterviewCommand::AnalyzeDialogue,
            "generate_learning_plan" => InterviewCommand::GenerateLearningPlan,
            "complete_interview" => InterviewCommand::CompleteInterview,
            name if command.kind == CommandKind::ProfileUpdate => {
                InterviewCommand::UpdateProfile(name.trim_start_matches("update_").to_string())
            }
            _ => InterviewCommand::Unknown,
        }
    }
}

/// Strict-JSON response of the dialogue-analysis call.
#[derive(Debug, Deserialize)]
struct DialogueAnalysis {
    #[serde(default)]
    updates: ProfileUpdates,
    #[serde(default)]
    confidence_score: i32,
    #[serde(default)]
    ready_for_teaching: bool,
}

/// Strict-JSON response of the plan-generation call.
#[derive(Debug, Deserialize)]
struct LearningPlan {
    #[serde(default)]
    skip_topics: BTreeMap<i64, String>,
    #[serde(default)]
    recommended_topics: BTreeMap<i64, String>,
    #[serde(default)]
    recommended_blocks: BTreeMap<i64, String>,
    #[serde(default)]
    focus_areas: Vec<String>,
    #[serde(default)]
    learning_path: Vec<PlanEntry>,
    #[serde(default)]
    welcome_message: String,
    #[serde(default)]
    total_estimated_time: Option<String>,
}

impl InterviewExpert {
    pub fn new(
        chat_repo: Arc<dyn ChatRepo>,
        content_repo: Arc<dyn ContentRepo>,
        llm_client: Arc<dyn LLMClient>,
        prompts: Arc<dyn PromptGenerator>,
    ) -> Self {
        Self {
            chat_repo,
            content_repo,
            llm_client,
            prompts,
        }
    }

    fn set_stage(&self, command: &Command, student: &mut Student) -> CommandResult {
        let Some(raw) = command.params.first() else {
            return CommandResult::failed(
                &command.name,
                "interview_control",
                "no interview stage provided",
            );
        };
        let stage: InterviewStage = match raw.parse() {
            Ok(stage) => stage,
            Err(err) => {
                return CommandResult::failed(&command.name, "interview_control", err.to_string());
            }
        };
        student.set_interview_stage(stage);
        CommandResult::ok(
            &command.name,
            "interview_control",
            serde_json::json!({ "stage": stage.as_str() }),
        )
    }

    async fn analyze_dialogue(&self, command: &Command, student: &mut Student) -> CommandResult {
        let history = match self
            .chat_repo
            .get_history(student.id, ANALYSIS_HISTORY_LIMIT)
            .await
        {
            Ok(history) => history,
            Err(err) => {
                return CommandResult::failed(
                    &command.name,
                    "interview_control",
                    format!("failed to load dialogue history: {}", err),
                );
            }
        };

        let prompt = match self.prompts.dialogue_analysis_prompt(&history).await {
            Ok(prompt) => prompt,
            Err(err) => {
                return CommandResult::failed(&command.name, "interview_control", err.to_string());
            }
        };

        let raw = match self.llm_client.generate(&[], &prompt, 0.3).await {
            Ok(raw) => raw,
            Err(err) => {
                return CommandResult::failed(&command.name, "interview_control", err.to_string());
            }
        };

        // Validate the whole payload before touching the profile, so a bad
        // analysis applies nothing.
        let analysis: DialogueAnalysis = match serde_json::from_str(&raw) {
            Ok(analysis) => analysis,
            Err(err) => {
                return CommandResult::failed(
                    &command.name,
                    "interview_control",
                    format!("failed to parse analysis result: {}", err),
                );
            }
        };

        student.apply_updates(&analysis.updates);

        CommandResult::ok(
            &command.name,
            "interview_control",
            serde_json::json!({
                "updates_applied": analysis.updates,
                "confidence_score": analysis.confidence_score,
                "ready_for_teaching": analysis.ready_for_teaching,
            }),
        )
    }

    fn update_profile(
        &self,
        command: &Command,
        student: &mut Student,
        field: &str,
    ) -> CommandResult {
        let Some(raw) = command.params.first() else {
            return CommandResult::failed(
                &command.name,
                "profile_update",
                "no value provided for profile update",
            );
        };
        match student.apply_profile_update(field, raw) {
            Ok(value) => CommandResult::ok(
                &command.name,
                "profile_update",
                serde_json::json!({ "field": field, "value": value }),
            ),
            Err(err) => CommandResult::failed(&command.name, "profile_update", err.to_string()),
        }
    }

    async fn generate_learning_plan(
        &self,
        command: &Command,
        student: &mut Student,
    ) -> CommandResult {
        let topics = match self.content_repo.get_all_topics().await {
            Ok(topics) => topics,
            Err(err) => {
                return CommandResult::failed(
                    &command.name,
                    "interview_control",
                    format!("failed to load topics: {}", err),
                );
            }
        };

        let prompt = match self.prompts.plan_generation_prompt(student, &topics).await {
            Ok(prompt) => prompt,
            Err(err) => {
                return CommandResult::failed(&command.name, "interview_control", err.to_string());
            }
        };

        let raw = match self.llm_client.generate(&[], &prompt, 0.5).await {
            Ok(raw) => raw,
            Err(err) => {
                return CommandResult::failed(&command.name, "interview_control", err.to_string());
            }
        };

        let plan: LearningPlan = match serde_json::from_str(&raw) {
            Ok(plan) => plan,
            Err(err) => {
                return CommandResult::failed(
                    &command.name,
                    "interview_control",
                    format!("failed to parse learning plan: {}", err),
                );
            }
        };

        student.skip_topics = plan.skip_topics;
        student.recommended_topics = plan.recommended_topics;
        student.recommended_blocks = plan.recommended_blocks;
        student.focus_areas = plan.focus_areas;
        student.learning_path = plan.learning_path;
        if let Some(first) = student.learning_path.first() {
            student.current_topic_id = Some(first.topic_id);
        }

        CommandResult::ok(
            &command.name,
            "interview_control",
            serde_json::json!({
                "plan_created": true,
                "topics_count": student.recommended_topics.len(),
                "estimated_time": plan.total_estimated_time.as_deref().unwrap_or("unspecified"),
                "welcome_message": plan.welcome_message,
            }),
        )
    }

    fn complete_interview(&self, command: &Command, student: &mut Student) -> CommandResult {
        student.complete_interview();
        CommandResult::ok(
            &command.name,
            "interview_control",
            serde_json::json!({
                "interview_completed": true,
                "ready_for_learning": student.is_ready_for_learning(),
                // Completing the interview hands the student to the teacher.
                "next_expert": ExpertType::Teacher.as_str(),
            }),
        )
    }
}

#[async_trait]
impl ExpertHandler for InterviewExpert {
    fn expert_type(&self) -> ExpertType {
        ExpertType::InterviewExpert
    }

    async fn handle(
        &self,
        command: &Command,
        student: &mut Student,
        _chat_id: i64,
    ) -> CommandResult {
        match InterviewCommand::parse(command) {
            InterviewCommand::SetStage => self.set_stage(command, student),
            InterviewCommand::AnalyzeDialogue => self.analyze_dialogue(command, student).await,
            InterviewCommand::UpdateProfile(field) => {
                self.update_profile(command, student, &field)
            }
            InterviewCommand::GenerateLearningPlan => {
                self.generate_learning_plan(command, student).await
            }
            InterviewCommand::CompleteInterview => self.complete_interview(command, student),
            InterviewCommand::Unknown => CommandResult::failed(
                &command.name,
                &command.kind.to_string(),
                format!("unsupported command for the interview expert: {}", command.name),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::extract_commands;
    use crate::llm_client::MockLLMClient;
    use crate::prompt::TemplatePromptGenerator;
    use crate::repo::{MockChatRepo, MockContentRepo};
    use std::collections::HashMap;

    fn prompts() -> Arc<TemplatePromptGenerator> {
        let mut templates = HashMap::new();
        templates.insert("dialogue_analysis".to_string(), "{dialogue}".to_string());
        templates.insert(
            "plan_generation".to_string(),
            "{student_profile}\n{topics}".to_string(),
        );
        Arc::new(TemplatePromptGenerator::new(templates))
    }

    fn expert(llm: MockLLMClient) -> InterviewExpert {
        let mut chat_repo = MockChatRepo::new();
        chat_repo
            .expect_get_history()
            .returning(|_, _| Ok(Vec::new()));
        let mut content_repo = MockContentRepo::new();
        content_repo.expect_get_all_topics().returning(|| Ok(Vec::new()));
        InterviewExpert::new(
            Arc::new(chat_repo),
            Arc::new(content_repo),
            Arc::new(llm),
            prompts(),
        )
    }

    fn command(text: &str) -> Command {
        let (mut commands, _) = extract_commands(text);
        commands.remove(0)
    }

    #[tokio::test]
    async fn test_set_stage_transitions_and_rejects_unknown() {
        let expert = expert(MockLLMClient::new(Vec::new()));
        let mut student = Student::new(1, 1);

        let result = expert
            .handle(&command("#set_interview_stage:PREFERENCES"), &mut student, 1)
            .await;
        assert!(result.success);
        assert_eq!(student.interview_stage, InterviewStage::Preferences);

        let result = expert
            .handle(&command("#set_interview_stage:LUNCH"), &mut student, 1)
            .await;
        assert!(!result.success);
        assert_eq!(student.interview_stage, InterviewStage::Preferences);
    }

    #[tokio::test]
    async fn test_profile_update_applies_free_text_value() {
        let expert = expert(MockLLMClient::new(Vec::new()));
        let mut student = Student::new(1, 1);

        let result = expert
            .handle(
                &command("#update_career_goals:Fullstack Developer"),
                &mut student,
                1,
            )
            .await;
        assert!(result.success);
        assert_eq!(student.career_goals.as_deref(), Some("Fullstack Developer"));
    }

    #[tokio::test]
    async fn test_profile_update_unknown_field_fails() {
        let expert = expert(MockLLMClient::new(Vec::new()));
        let mut student = Student::new(1, 1);

        let result = expert
            .handle(&command("#update_favourite_meal:pizza"), &mut student, 1)
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("unknown profile field"));
    }

    #[tokio::test]
    async fn test_analyze_dialogue_applies_updates_atomically() {
        let analysis = serde_json::json!({
            "updates": {
                "programming_experience": "beginner",
                "known_languages": ["Python"],
                "learning_goals": ["Backend"]
            },
            "confidence_score": 90,
            "ready_for_teaching": false
        });
        let expert = expert(MockLLMClient::new(vec![analysis.to_string()]));
        let mut student = Student::new(1, 1);

        let result = expert.handle(&command("#analyze_dialogue"), &mut student, 1).await;
        assert!(result.success);
        assert_eq!(student.programming_experience.as_deref(), Some("beginner"));
        assert_eq!(student.known_languages, vec!["Python"]);
        assert_eq!(result.data["confidence_score"], 90);
    }

    #[tokio::test]
    async fn test_analyze_dialogue_malformed_json_changes_nothing() {
        let expert = expert(MockLLMClient::new(vec!["not json at all".to_string()]));
        let mut student = Student::new(1, 1);

        let result = expert.handle(&command("#analyze_dialogue"), &mut student, 1).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("parse"));
        assert!(student.programming_experience.is_none());
    }

    #[tokio::test]
    async fn test_generate_learning_plan_sets_first_topic_current() {
        let plan = serde_json::json!({
            "skip_topics": {"1": "already known"},
            "recommended_topics": {"2": "Web development", "3": "Databases"},
            "focus_areas": ["portfolio projects"],
            "learning_path": [
                {"topic_id": 2, "topic_name": "Web development"},
                {"topic_id": 3, "topic_name": "Databases"}
            ],
            "welcome_message": "Let's begin!",
            "total_estimated_time": "3 months"
        });
        let expert = expert(MockLLMClient::new(vec![plan.to_string()]));
        let mut student = Student::new(1, 1);

        let result = expert
            .handle(&command("#generate_learning_plan"), &mut student, 1)
            .await;
        assert!(result.success);
        assert_eq!(student.current_topic_id, Some(2));
        assert_eq!(student.recommended_topics.len(), 2);
        assert_eq!(student.skip_topics.get(&1).map(String::as_str), Some("already known"));
        assert_eq!(result.data["topics_count"], 2);
        assert_eq!(result.data["estimated_time"], "3 months");
    }

    #[tokio::test]
    async fn test_complete_interview_hands_off_to_teacher() {
        let expert = expert(MockLLMClient::new(Vec::new()));
        let mut student = Student::new(1, 1);

        let result = expert.handle(&command("#complete_interview"), &mut student, 1).await;
        assert!(result.success);
        assert!(student.interview_completed);
        assert_eq!(student.interview_stage, InterviewStage::Complete);
        assert_eq!(result.data["next_expert"], "teacher");
    }

    #[tokio::test]
    async fn test_unknown_command_is_reported_not_thrown() {
        let expert = expert(MockLLMClient::new(Vec::new()));
        let mut student = Student::new(1, 1);

        let result = expert.handle(&command("#do_a_dance"), &mut student, 1).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("do_a_dance"));
    }
}
