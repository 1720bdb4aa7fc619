//! Teacher Expert
//!
//! Walks the student through the content hierarchy: navigation and
//! completion marking against the plan, data-producing teaching actions
//! (explanations, examples, analogies), and in-lesson student feedback that
//! tunes the adaptation maps.

use crate::command::{Command, CommandResult};
use crate::content::summarize;
use crate::experts::{ExpertHandler, ExpertType};
use crate::repo::ContentRepo;
use crate::student::{ContentLevel, Student};
use async_trait::async_trait;
use std::sync::Arc;

pub struct TeacherExpert {
    content_repo: Arc<dyn ContentRepo>,
}

enum TeacherCommand {
    Navigate(ContentLevel),
    MarkCompleted(ContentLevel),
    Teaching,
    KnowsTopic,
    StrugglingWith,
    InterestedIn,
    Unknown,
}

impl TeacherCommand {
    fn parse(name: &str) -> Self {
        if let Some(level) = name.strip_prefix("nav_to_").and_then(ContentLevel::parse) {
            return TeacherCommand::Navigate(level);
        }
        if let Some(level) = name
            .strip_prefix("mark_")
            .and_then(|rest| rest.strip_suffix("_completed"))
            .and_then(ContentLevel::parse)
        {
            return TeacherCommand::MarkCompleted(level);
        }
        match name {
            "explain_concept" | "give_example" | "provide_analogy" => TeacherCommand::Teaching,
            "student_knows_topic" => TeacherCommand::KnowsTopic,
            "student_struggling_with" => TeacherCommand::StrugglingWith,
            "student_interested_in" => TeacherCommand::InterestedIn,
            _ => TeacherCommand::Unknown,
        }
    }
}

impl TeacherExpert {
    pub fn new(content_repo: Arc<dyn ContentRepo>) -> Self {
        Self { content_repo }
    }

    /// Name and short description of a piece of content, with graceful
    /// fallbacks when the repo has nothing.
    async fn content_info(&self, level: ContentLevel, id: i64) -> (String, String) {
        let info = match level {
            ContentLevel::Topic => self
                .content_repo
                .get_topic(id)
                .await
                .ok()
                .flatten()
                .map(|t| (t.name, t.intro)),
            ContentLevel::Block => self
                .content_repo
                .get_block(id)
                .await
                .ok()
                .flatten()
                .map(|b| (b.name, summarize(&b.content))),
            ContentLevel::Chapter => self
                .content_repo
                .get_chapter(id)
                .await
                .ok()
                .flatten()
                .map(|c| (c.name, summarize(&c.content))),
        };
        info.unwrap_or_else(|| ("Unknown".to_string(), String::new()))
    }

    fn parse_content_id(command: &Command, kind: &str) -> Result<i64, CommandResult> {
        let Some(raw) = command.params.first() else {
            return Err(CommandResult::failed(
                &command.name,
                kind,
                "no content id provided",
            ));
        };
        raw.trim().parse().map_err(|_| {
            CommandResult::failed(
                &command.name,
                kind,
                format!("'{}' is not a valid content id", raw),
            )
        })
    }

    async fn navigate(
        &self,
        command: &Command,
        student: &mut Student,
        level: ContentLevel,
    ) -> CommandResult {
        let id = match Self::parse_content_id(command, "navigation") {
            Ok(id) => id,
            Err(result) => return result,
        };

        student.navigate(level, id);
        let (name, description) = self.content_info(level, id).await;

        CommandResult::ok(
            &command.name,
            "navigation",
            serde_json::json!({
                "content_type": level.as_str(),
                "content_id": id,
                "content_name": name,
                "content_description": description,
            }),
        )
    }

    async fn mark_completed(
        &self,
        command: &Command,
        student: &mut Student,
        level: ContentLevel,
    ) -> CommandResult {
        let id = match Self::parse_content_id(command, "progress") {
            Ok(id) => id,
            Err(result) => return result,
        };

        let chapter_name = if level == ContentLevel::Chapter {
            Some(self.content_info(level, id).await.0)
                .filter(|name| name != "Unknown")
        } else {
            None
        };
        student.mark_completed(level, id, chapter_name);

        CommandResult::ok(
            &command.name,
            "progress",
            serde_json::json!({
                "content_type": level.as_str(),
                "content_id": id,
                "completed": true,
                "total_completed": {
                    "topics": student.approved_topics.len(),
                    "blocks": student.approved_blocks.len(),
                    "chapters": student.approved_chapters.len(),
                },
            }),
        )
    }

    fn teaching_action(&self, command: &Command, student: &Student) -> CommandResult {
        let concept = command
            .params
            .first()
            .cloned()
            .unwrap_or_else(|| "the current topic".to_string());
        CommandResult::ok(
            &command.name,
            "teaching",
            serde_json::json!({
                "action": command.name,
                "concept": concept,
                "learning_style": student.learning_style,
            }),
        )
    }

    fn knows_topic(&self, command: &Command, student: &mut Student) -> CommandResult {
        let id = match Self::parse_content_id(command, "student_feedback") {
            Ok(id) => id,
            Err(result) => return result,
        };
        student.skip_topic(id, "The student already knows this topic");
        Self::feedback_result(command, "knows_topic")
    }

    fn struggling_with(&self, command: &Command, student: &mut Student) -> CommandResult {
        let Some(concept) = command.params.first() else {
            return CommandResult::failed(&command.name, "student_feedback", "no concept provided");
        };
        student.add_weak_area(concept);
        Self::feedback_result(command, "struggling_with")
    }

    fn interested_in(&self, command: &Command, student: &mut Student) -> CommandResult {
        let Some(area) = command.params.first() else {
            return CommandResult::failed(&command.name, "student_feedback", "no area provided");
        };
        student.add_focus_area(area);
        Self::feedback_result(command, "interested_in")
    }

    fn feedback_result(command: &Command, feedback_type: &str) -> CommandResult {
        CommandResult::ok(
            &command.name,
            "student_feedback",
            serde_json::json!({ "feedback_type": feedback_type, "processed": true }),
        )
    }
}

#[async_trait]
impl ExpertHandler for TeacherExpert {
    fn expert_type(&self) -> ExpertType {
        ExpertType::Teacher
    }

    async fn handle(
        &self,
        command: &Command,
        student: &mut Student,
        _chat_id: i64,
    ) -> CommandResult {
        match TeacherCommand::parse(&command.name) {
            TeacherCommand::Navigate(level) => self.navigate(command, student, level).await,
            TeacherCommand::MarkCompleted(level) => {
                self.mark_completed(command, student, level).await
            }
            TeacherCommand::Teaching => self.teaching_action(command, student),
            TeacherCommand::KnowsTopic => self.knows_topic(command, student),
            TeacherCommand::StrugglingWith => self.struggling_with(command, student),
            TeacherCommand::InterestedIn => self.interested_in(command, student),
            TeacherCommand::Unknown => CommandResult::failed(
                &command.name,
                &command.kind.to_string(),
                format!("unsupported command for the teacher: {}", command.name),
            ),
        }
    }
}
