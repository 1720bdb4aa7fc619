//! API Models
//!
//! Request/response DTOs for the HTTP surface, decoupled from the core
//! entities so the wire format can evolve independently. Conversions from
//! the core types live here.

use chrono::{DateTime, Utc};
use mentor_core::command::{Command, CommandResult};
use mentor_core::orchestrator::ExpertResponse;
use mentor_core::student::Student;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct SendMessagePayload {
    #[schema(example = "I want to become a backend developer")]
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct CommandOut {
    pub name: String,
    pub kind: String,
    pub params: Vec<String>,
}

impl From<&Command> for CommandOut {
    fn from(command: &Command) -> Self {
        Self {
            name: command.name.clone(),
            kind: command.kind.to_string(),
            params: command.params.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CommandResultOut {
    pub command_name: String,
    pub success: bool,
    pub kind: String,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    pub error: Option<String>,
}

impl From<&CommandResult> for CommandResultOut {
    fn from(result: &CommandResult) -> Self {
        Self {
            command_name: result.command_name.clone(),
            success: result.success,
            kind: result.kind.clone(),
            data: result.data.clone(),
            error: result.error.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TurnResponse {
    #[schema(example = "interview_expert")]
    pub expert: String,
    pub message: String,
    pub commands: Vec<CommandOut>,
    pub results: Vec<CommandResultOut>,
    #[schema(value_type = Object)]
    pub metadata: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl From<ExpertResponse> for TurnResponse {
    fn from(response: ExpertResponse) -> Self {
        Self {
            expert: response.expert.to_string(),
            message: response.message,
            commands: response.commands.iter().map(CommandOut::from).collect(),
            results: response.results.iter().map(CommandResultOut::from).collect(),
            metadata: response.metadata,
            timestamp: response.timestamp,
        }
    }
}

/// Read model of a student profile for the dashboard.
#[derive(Serialize, ToSchema)]
pub struct StudentOut {
    pub id: i64,
    pub account_id: i64,
    #[schema(example = "GOALS")]
    pub interview_stage: String,
    pub interview_completed: bool,
    pub programming_experience: Option<String>,
    pub known_languages: Vec<String>,
    pub learning_goals: Vec<String>,
    pub career_goals: Option<String>,
    pub assessment_score: Option<i32>,
    pub current_topic_id: Option<i64>,
    pub current_block_id: Option<i64>,
    pub current_chapter_id: Option<i64>,
    pub topics_completed: usize,
    pub blocks_completed: usize,
    pub chapters_completed: usize,
    pub profile_completion: i32,
    pub ready_for_learning: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<&Student> for StudentOut {
    fn from(student: &Student) -> Self {
        Self {
            id: student.id,
            account_id: student.account_id,
            interview_stage: student.interview_stage.to_string(),
            interview_completed: student.interview_completed,
            programming_experience: student.programming_experience.clone(),
            known_languages: student.known_languages.clone(),
            learning_goals: student.learning_goals.clone(),
            career_goals: student.career_goals.clone(),
            assessment_score: student.assessment_score,
            current_topic_id: student.current_topic_id,
            current_block_id: student.current_block_id,
            current_chapter_id: student.current_chapter_id,
            topics_completed: student.approved_topics.len(),
            blocks_completed: student.approved_blocks.len(),
            chapters_completed: student.approved_chapters.len(),
            profile_completion: student.profile_completion_percentage(),
            ready_for_learning: student.is_ready_for_learning(),
            updated_at: student.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ReinterviewOut {
    pub student_id: i64,
    #[schema(example = "WELCOME")]
    pub interview_stage: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentor_core::student::{ContentLevel, InterviewStage};

    #[test]
    fn test_student_out_reflects_progress() {
        let mut student = Student::new(5, 42);
        student.set_interview_stage(InterviewStage::Goals);
        student.recommended_topics.insert(1, "Web".to_string());
        student.mark_completed(ContentLevel::Topic, 1, None);

        let out = StudentOut::from(&student);
        assert_eq!(out.id, 5);
        assert_eq!(out.interview_stage, "GOALS");
        assert_eq!(out.topics_completed, 1);
        assert!(!out.ready_for_learning);
    }

    #[test]
    fn test_turn_response_serializes_results() {
        let result = CommandResult::ok(
            "set_interview_stage",
            "interview_control",
            serde_json::json!({ "stage": "GOALS" }),
        );
        let out = CommandResultOut::from(&result);
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("set_interview_stage"));
        assert!(json.contains("\"success\":true"));
    }

    #[test]
    fn test_send_message_payload_requires_text() {
        let payload: SendMessagePayload =
            serde_json::from_str(r#"{"text": "hello"}"#).unwrap();
        assert_eq!(payload.text, "hello");

        let missing: Result<SendMessagePayload, _> = serde_json::from_str("{}");
        assert!(missing.is_err());
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Student not found".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"Student not found"}"#);
    }
}
