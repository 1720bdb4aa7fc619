//! Progress Analyst
//!
//! Stateless metrics over the student read model: completion rates, periodic
//! reports, and study recommendations.

use crate::command::{Command, CommandResult};
use crate::experts::{ExpertHandler, ExpertType};
use crate::student::Student;
use async_trait::async_trait;
use serde::Serialize;

pub struct ProgressAnalyst;

enum ProgressCommand {
    AnalyzeProgress,
    Report,
    Recommend,
    Unknown,
}

impl ProgressCommand {
    fn parse(name: &str) -> Self {
        if name == "analyze_learning_progress" {
            ProgressCommand::AnalyzeProgress
        } else if name.contains("report") {
            ProgressCommand::Report
        } else if name.starts_with("suggest_") || name.starts_with("recommend_") {
            ProgressCommand::Recommend
        } else {
            ProgressCommand::Unknown
        }
    }
}

/// A periodic progress summary assembled for the student.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    pub student_id: i64,
    pub period: String,
    pub metrics: serde_json::Value,
    pub achievements: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ProgressAnalyst {
    pub fn new() -> Self {
        Self
    }

    fn analyze_progress(&self, command: &Command, student: &Student) -> CommandResult {
        let total_topics = student.recommended_topics.len() + student.approved_topics.len();
        let completed_topics = student.approved_topics.len();
        let completion_rate = if total_topics > 0 {
            completed_topics as f64 / total_topics as f64 * 100.0
        } else {
            0.0
        };

        CommandResult::ok(
            &command.name,
            "analytics_control",
            serde_json::json!({
                "analysis_complete": true,
                "completion_rate": completion_rate,
                "completed_topics": completed_topics,
                "total_topics": total_topics,
                "current_level": student.programming_experience,
                "assessment_score": student.assessment_score,
            }),
        )
    }

    fn generate_report(&self, command: &Command, student: &Student) -> CommandResult {
        let period = command
            .params
            .first()
            .cloned()
            .unwrap_or_else(|| "weekly".to_string());

        let report = ProgressReport {
            student_id: student.id,
            period: period.clone(),
            metrics: serde_json::json!({
                "topics_completed": student.approved_topics.len(),
                "blocks_completed": student.approved_blocks.len(),
                "chapters_completed": student.approved_chapters.len(),
                "assessment_score": student.assessment_score,
                "profile_completion": student.profile_completion_percentage(),
            }),
            achievements: vec![
                format!("{} topics completed", student.approved_topics.len()),
                format!("Current score: {}", student.assessment_score.unwrap_or(0)),
            ],
            recommendations: vec![
                "Keep up the current pace".to_string(),
                "Give the weak areas some attention".to_string(),
            ],
        };

        CommandResult::ok(
            &command.name,
            "analytics_control",
            serde_json::json!({
                "report_generated": true,
                "period": period,
                "metrics": report.metrics,
                "achievements": report.achievements,
            }),
        )
    }

    fn make_recommendations(&self, command: &Command, student: &Student) -> CommandResult {
        let mut recommendations = Vec::new();

        if student.assessment_score.is_some_and(|score| score < 60) {
            recommendations.push("Revisit the material covered so far".to_string());
        }
        if !student.weak_areas.is_empty() {
            recommendations.push(format!(
                "Focus on the weak areas: {}",
                student.weak_areas.join(", ")
            ));
        }
        if student.current_topic_id.is_none() {
            recommendations.push("Pick a topic to study".to_string());
        }

        CommandResult::ok(
            &command.name,
            "analytics_control",
            serde_json::json!({
                "recommendations": recommendations,
                "priority": "medium",
                "estimated_time": "1-2 weeks",
            }),
        )
    }
}

impl Default for ProgressAnalyst {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExpertHandler for ProgressAnalyst {
    fn expert_type(&self) -> ExpertType {
        ExpertType::ProgressAnalyst
    }

    async fn handle(
        &self,
        command: &Command,
        student: &mut Student,
        _chat_id: i64,
    ) -> CommandResult {
        match ProgressCommand::parse(&command.name) {
            ProgressCommand::AnalyzeProgress => self.analyze_progress(command, student),
            ProgressCommand::Report => self.generate_report(command, student),
            ProgressCommand::Recommend => self.make_recommendations(command, student),
            ProgressCommand::Unknown => CommandResult::failed(
                &command.name,
                &command.kind.to_string(),
                format!(
                    "unsupported command for the progress analyst: {}",
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
    async fn test_completion_rate_counts_approved_against_plan() {
        let expert = ProgressAnalyst::new();
        let mut student = Student::new(1, 1);
        student.recommended_topics.insert(2, "Databases".to_string());
        student.approved_topics.insert(1, "Web".to_string());

        let result = expert
            .handle(&command("#analyze_learning_progress"), &mut student, 1)
            .await;
        assert!(result.success);
        assert_eq!(result.data["completed_topics"], 1);
        assert_eq!(result.data["total_topics"], 2);
        assert_eq!(result.data["completion_rate"], 50.0);
    }

    #[tokio::test]
    async fn test_report_includes_metrics_for_period() {
        let expert = ProgressAnalyst::new();
        let mut student = Student::new(1, 1);
        student.assessment_score = Some(70);

        let result = expert
            .handle(&command("#generate_monthly_report:monthly"), &mut student, 1)
            .await;
        assert!(result.success);
        assert_eq!(result.data["period"], "monthly");
        assert_eq!(result.data["metrics"]["assessment_score"], 70);
    }

    #[tokio::test]
    async fn test_recommendations_reflect_student_state() {
        let expert = ProgressAnalyst::new();
        let mut student = Student::new(1, 1);
        student.assessment_score = Some(40);
        student.weak_areas = vec!["recursion".to_string()];

        let result = expert
            .handle(&command("#suggest_next_steps"), &mut student, 1)
            .await;
        assert!(result.success);
        let recommendations = result.data["recommendations"].as_array().unwrap();
        assert_eq!(recommendations.len(), 3);
    }
}
