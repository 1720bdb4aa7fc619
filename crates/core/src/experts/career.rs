//! Career Consultant
//!
//! Stateless, data-producing persona: resume work, interview preparation,
//! and job-market overviews layered over the student read model. It owns no
//! state machine of its own.

use crate::command::{Command, CommandResult};
use crate::experts::{ExpertHandler, ExpertType};
use crate::student::Student;
use async_trait::async_trait;

pub struct CareerConsultant;

enum CareerCommand {
    Resume,
    InterviewPrep,
    JobMarket,
    Unknown,
}

impl CareerCommand {
    fn parse(name: &str) -> Self {
        if name.contains("resume") {
            CareerCommand::Resume
        } else if name.contains("interview") && name.contains("prep") {
            CareerCommand::InterviewPrep
        } else if name == "analyze_job_market" {
            CareerCommand::JobMarket
        } else {
            CareerCommand::Unknown
        }
    }
}

impl CareerConsultant {
    pub fn new() -> Self {
        Self
    }

    fn resume(&self, command: &Command) -> CommandResult {
        CommandResult::ok(
            &command.name,
            "career_control",
            serde_json::json!({
                "action": command.name,
                "resume_status": "draft",
                "sections_completed": ["personal_info", "skills", "education"],
            }),
        )
    }

    fn interview_prep(&self, command: &Command) -> CommandResult {
        let position = command
            .params
            .first()
            .cloned()
            .unwrap_or_else(|| "Junior Developer".to_string());
        CommandResult::ok(
            &command.name,
            "career_control",
            serde_json::json!({
                "prep_started": true,
                "position": position,
                "topics_to_cover": ["algorithms", "system_design", "behavioral"],
            }),
        )
    }

    fn job_market(&self, command: &Command, student: &Student) -> CommandResult {
        let location = command
            .params
            .first()
            .cloned()
            .unwrap_or_else(|| "Remote".to_string());
        let field = command
            .params
            .get(1)
            .cloned()
            .or_else(|| student.career_goals.clone())
            .unwrap_or_else(|| "Software Development".to_string());
        CommandResult::ok(
            &command.name,
            "career_control",
            serde_json::json!({
                "market_analyzed": true,
                "location": location,
                "field": field,
                "average_salary": "$60,000 - $80,000",
                "demand": "High",
                "required_skills": ["Python", "JavaScript", "SQL"],
            }),
        )
    }
}

impl Default for CareerConsultant {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExpertHandler for CareerConsultant {
    fn expert_type(&self) -> ExpertType {
        ExpertType::CareerConsultant
    }

    async fn handle(
        &self,
        command: &Command,
        student: &mut Student,
        _chat_id: i64,
    ) -> CommandResult {
        match CareerCommand::parse(&command.name) {
            CareerCommand::Resume => self.resume(command),
            CareerCommand::InterviewPrep => self.interview_prep(command),
            CareerCommand::JobMarket => self.job_market(command, student),
            CareerCommand::Unknown => CommandResult::failed(
                &command.name,
                &command.kind.to_string(),
                format!(
                    "unsupported command for the career consultant: {}",
                    command.name
                ),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::extract_commands;

    fn command(text: &str) -> Command {
        let (mut commands, _) = extract_commands(text);
        commands.remove(0)
    }

    #[tokio::test]
    async fn test_resume_and_prep_produce_data_only() {
        let expert = CareerConsultant::new();
        let mut student = Student::new(1, 1);
        let before = student.clone();

        let result = expert.handle(&command("#generate_resume"), &mut student, 1).await;
        assert!(result.success);
        assert_eq!(result.data["resume_status"], "draft");

        let result = expert
            .handle(&command("#interview_prep:Backend Engineer"), &mut student, 1)
            .await;
        assert!(result.success);
        assert_eq!(result.data["position"], "Backend Engineer");
        assert_eq!(student.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn test_job_market_defaults_to_career_goal() {
        let expert = CareerConsultant::new();
        let mut student = Student::new(1, 1);
        student.career_goals = Some("Data Engineer".to_string());

        let result = expert
            .handle(&command("#analyze_job_market:Berlin"), &mut student, 1)
            .await;
        assert!(result.success);
        assert_eq!(result.data["location"], "Berlin");
        assert_eq!(result.data["field"], "Data Engineer");
    }
}
