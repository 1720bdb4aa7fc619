//! Expert Personas
//!
//! Each conversational persona has a handler implementing the shared
//! `ExpertHandler` contract. The registry owns one handler per persona,
//! validated at construction, and dispatches extracted commands to the
//! active persona. Expert-switch commands are persona-independent and are
//! resolved by the registry itself: they mutate nothing, they only record
//! which persona should answer the next turn.

pub mod career;
pub mod interview;
pub mod progress;
pub mod teacher;
pub mod test_expert;

use crate::command::{Command, CommandKind, CommandResult};
use crate::student::Student;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// The five conversational personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertType {
    InterviewExpert,
    Teacher,
    TestExpert,
    CareerConsultant,
    ProgressAnalyst,
}

impl ExpertType {
    pub const ALL: [ExpertType; 5] = [
        ExpertType::InterviewExpert,
        ExpertType::Teacher,
        ExpertType::TestExpert,
        ExpertType::CareerConsultant,
        ExpertType::ProgressAnalyst,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpertType::InterviewExpert => "interview_expert",
            ExpertType::Teacher => "teacher",
            ExpertType::TestExpert => "test_expert",
            ExpertType::CareerConsultant => "career_consultant",
            ExpertType::ProgressAnalyst => "progress_analyst",
        }
    }

    /// Parses persona names as they appear in routes and switch commands.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "interview" | "interview_expert" => Some(ExpertType::InterviewExpert),
            "teacher" => Some(ExpertType::Teacher),
            "test_expert" => Some(ExpertType::TestExpert),
            "career_consultant" => Some(ExpertType::CareerConsultant),
            "progress_analyst" => Some(ExpertType::ProgressAnalyst),
            _ => None,
        }
    }
}

impl fmt::Display for ExpertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The uniform execution contract. Implementations must convert their
/// internal failures into failed `CommandResult`s rather than propagating,
/// so one bad command never aborts the rest of the turn.
#[async_trait]
pub trait ExpertHandler: Send + Sync {
    fn expert_type(&self) -> ExpertType;

    async fn handle(&self, command: &Command, student: &mut Student, chat_id: i64)
    -> CommandResult;
}

/// One handler per persona, checked at construction time.
pub struct ExpertRegistry {
    handlers: HashMap<ExpertType, Arc<dyn ExpertHandler>>,
}

impl ExpertRegistry {
    pub fn new(handlers: Vec<Arc<dyn ExpertHandler>>) -> anyhow::Result<Self> {
        let mut map: HashMap<ExpertType, Arc<dyn ExpertHandler>> = HashMap::new();
        for handler in handlers {
            let expert = handler.expert_type();
            if map.insert(expert, handler).is_some() {
                anyhow::bail!("duplicate handler registered for expert '{}'", expert);
            }
        }
        for expert in ExpertType::ALL {
            if !map.contains_key(&expert) {
                anyhow::bail!("no handler registered for expert '{}'", expert);
            }
        }
        Ok(Self { handlers: map })
    }

    /// Executes one command against the active persona.
    pub async fn execute(
        &self,
        expert: ExpertType,
        command: &Command,
        student: &mut Student,
        chat_id: i64,
    ) -> CommandResult {
        if command.kind == CommandKind::SwitchExpert {
            return switch_expert_result(command);
        }
        // Present for every persona by construction.
        match self.handlers.get(&expert) {
            Some(handler) => handler.handle(command, student, chat_id).await,
            None => CommandResult::failed(
                &command.name,
                &command.kind.to_string(),
                format!("no handler for expert '{}'", expert),
            ),
        }
    }

    /// Executes a turn's commands strictly in extraction order. Individual
    /// failures are recorded and do not stop the remaining commands; a
    /// switch command does not stop trailing commands either.
    pub async fn execute_all(
        &self,
        expert: ExpertType,
        commands: &[Command],
        student: &mut Student,
        chat_id: i64,
    ) -> Vec<CommandResult> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            let result = self.execute(expert, command, student, chat_id).await;
            if result.success {
                info!(
                    command = %command.name,
                    student_id = student.id,
                    expert = %expert,
                    "command executed"
                );
            } else {
                error!(
                    command = %command.name,
                    student_id = student.id,
                    expert = %expert,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "command failed"
                );
            }
            results.push(result);
        }
        results
    }
}

/// Shared handling for `switch_to_<persona>`: advisory hand-off metadata,
/// no state mutation.
fn switch_expert_result(command: &Command) -> CommandResult {
    let target = command.name.trim_start_matches("switch_to_");
    CommandResult::ok(
        &command.name,
        "expert_switch",
        serde_json::json!({
            "next_expert": target,
            "message": format!("Handing over to {}", target),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expert_names_round_trip() {
        for expert in ExpertType::ALL {
            assert_eq!(ExpertType::parse(expert.as_str()), Some(expert));
        }
        assert_eq!(ExpertType::parse("interview"), Some(ExpertType::InterviewExpert));
        assert_eq!(ExpertType::parse("registrar"), None);
    }

    #[test]
    fn test_switch_command_records_target_without_mutation() {
        let command = Command::new("switch_to_teacher", Vec::new(), "#switch_to_teacher");
        let result = switch_expert_result(&command);
        assert!(result.success);
        assert_eq!(result.data["next_expert"], "teacher");
    }
}
