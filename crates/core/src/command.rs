//! Command Protocol
//!
//! The model embeds instructions for the backend inside its free-form replies
//! as `#command` tokens (or, in the structured protocol revision, as a JSON
//! envelope with an `actions` array). This module recognizes both forms,
//! classifies each command by name, and strips the tokens out of the
//! user-visible message.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use tracing::warn;

/// Matches the leading `#name` part of a command token. Parameters are
/// consumed by hand because their extent depends on whether the command is
/// multi-parameter or free-text (see [`extract_commands`]).
static COMMAND_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9_]+)").expect("command token pattern"));

/// Semantic category of a command, assigned by name heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    SwitchExpert,
    Navigation,
    ProfileUpdate,
    InterviewControl,
    TestControl,
    CareerControl,
    AnalyticsControl,
    System,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CommandKind::SwitchExpert => "expert_switch",
            CommandKind::Navigation => "navigation",
            CommandKind::ProfileUpdate => "profile_update",
            CommandKind::InterviewControl => "interview_control",
            CommandKind::TestControl => "test_control",
            CommandKind::CareerControl => "career_control",
            CommandKind::AnalyticsControl => "analytics_control",
            CommandKind::System => "system",
        };
        write!(f, "{}", label)
    }
}

/// Classifies a command name into its [`CommandKind`].
///
/// Ordered first-match-wins rules. This is a coarse heuristic by design:
/// unknown or ambiguous names still land in some bucket (possibly the wrong
/// one) rather than failing extraction; the per-expert handlers make the
/// final call.
pub fn classify(name: &str) -> CommandKind {
    if name.starts_with("switch_to_") {
        CommandKind::SwitchExpert
    } else if name.starts_with("nav_to_") || name.contains("topic") || name.contains("block") {
        CommandKind::Navigation
    } else if name.starts_with("update_") || name.contains("profile") {
        CommandKind::ProfileUpdate
    } else if name.contains("interview") || name.contains("stage") {
        CommandKind::InterviewControl
    } else if name.contains("test") || name.contains("assessment") {
        CommandKind::TestControl
    } else if name.contains("career") || name.contains("resume") {
        CommandKind::CareerControl
    } else if name.contains("analytics") || name.contains("progress") {
        CommandKind::AnalyticsControl
    } else {
        CommandKind::System
    }
}

/// A single instruction extracted from model output. Lives only for the
/// duration of one turn.
#[derive(Debug, Clone, Serialize)]
pub struct Command {
    pub name: String,
    pub kind: CommandKind,
    pub params: Vec<String>,
    /// The matched source text (or the action's command string in the
    /// envelope form), kept for logging.
    pub raw: String,
    pub timestamp: DateTime<Utc>,
}

impl Command {
    pub fn new(name: impl Into<String>, params: Vec<String>, raw: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: classify(&name),
            name,
            params,
            raw: raw.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of executing one command. Returned to the orchestrator for
/// response assembly; not persisted on its own.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub command_name: String,
    pub success: bool,
    pub kind: String,
    pub data: serde_json::Value,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CommandResult {
    pub fn ok(command_name: &str, kind: &str, data: serde_json::Value) -> Self {
        Self {
            command_name: command_name.to_string(),
            success: true,
            kind: kind.to_string(),
            data,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(command_name: &str, kind: &str, error: impl Into<String>) -> Self {
        Self {
            command_name: command_name.to_string(),
            success: false,
            kind: kind.to_string(),
            data: serde_json::Value::Null,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Extracts all `#command` tokens from `text`, in order of appearance, and
/// returns them together with the residual text (whitespace-normalized).
///
/// Grammar: `#name` where name is `[A-Za-z0-9_]+`, optionally followed by
/// `:` and a parameter blob. The first whitespace-delimited token of the
/// blob decides its shape:
///
/// - if it contains a further `:`, the command is multi-parameter and that
///   token is split on `:` (`#evaluate_answer:correct:typo` → two params);
///   anything after it stays in the residual text;
/// - otherwise the whole blob up to the next `#`, newline, or end of text is
///   one free-text parameter (`#update_career_goals:Fullstack Developer`).
///
/// A literal `:` inside a free-text value therefore cannot be expressed; the
/// trade-off is documented rather than patched with an escaping scheme the
/// model would misuse.
pub fn extract_commands(text: &str) -> (Vec<Command>, String) {
    let mut commands = Vec::new();
    let mut stripped = String::with_capacity(text.len());
    let mut cursor = 0usize;

    for caps in COMMAND_TOKEN.captures_iter(text) {
        let Some(token) = caps.get(0) else { continue };
        if token.start() < cursor {
            continue;
        }
        stripped.push_str(&text[cursor..token.start()]);

        let name = &caps[1];
        let mut end = token.end();
        let mut params = Vec::new();

        if let Some(tail) = text[token.end()..].strip_prefix(':') {
            let stop = tail.find(['#', '\n']).unwrap_or(tail.len());
            let region = &tail[..stop];

            if region.is_empty() || region.starts_with(char::is_whitespace) {
                // A parameter must start right after the colon; a dangling
                // colon is dropped and the command is treated as bare.
                end = token.end() + 1;
            } else {
                let compact = region.split_whitespace().next().unwrap_or(region);
                if compact.contains(':') {
                    params = compact
                        .split(':')
                        .filter(|segment| !segment.is_empty())
                        .map(str::to_string)
                        .collect();
                    end = token.end() + 1 + compact.len();
                } else {
                    params = vec![region.trim().to_string()];
                    end = token.end() + 1 + region.len();
                }
            }
        }

        commands.push(Command::new(name, params, &text[token.start()..end]));
        cursor = end;
    }
    stripped.push_str(&text[cursor..]);

    let clean = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    (commands, clean)
}

/// Model output resolved into a user-visible message plus the commands it
/// carried, regardless of which protocol form the model chose.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub message: String,
    pub commands: Vec<Command>,
}

#[derive(Deserialize)]
struct Envelope {
    user_message: String,
    #[serde(default)]
    metadata: EnvelopeMetadata,
}

#[derive(Deserialize, Default)]
struct EnvelopeMetadata {
    #[serde(default)]
    actions: Vec<EnvelopeAction>,
}

#[derive(Deserialize)]
struct EnvelopeAction {
    command: String,
    #[serde(default)]
    parameters: Vec<String>,
}

/// Resolves raw model output into a [`ModelOutput`].
///
/// Text that starts with `{` is treated as the JSON envelope form
/// (`user_message` + `metadata.actions`); a malformed envelope degrades to
/// the whole text as the message with zero commands. Everything else goes
/// through inline `#command` extraction.
pub fn resolve_model_output(text: &str) -> ModelOutput {
    if text.trim_start().starts_with('{') {
        match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) => {
                let commands = envelope
                    .metadata
                    .actions
                    .into_iter()
                    .map(|action| {
                        let raw = action.command.clone();
                        Command::new(action.command, action.parameters, raw)
                    })
                    .collect();
                return ModelOutput {
                    message: envelope.user_message,
                    commands,
                };
            }
            Err(err) => {
                warn!(error = %err, "model output looked like an envelope but did not parse; treating as plain text");
                return ModelOutput {
                    message: text.to_string(),
                    commands: Vec::new(),
                };
            }
        }
    }

    let (commands, message) = extract_commands(text);
    ModelOutput { message, commands }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_without_tokens_passes_through() {
        let input = "Просто текст with  mixed   whitespace, no tokens.";
        let (commands, clean) = extract_commands(input);
        assert!(commands.is_empty());
        assert_eq!(clean, "Просто текст with mixed whitespace, no tokens.");
    }

    #[test]
    fn test_two_commands_in_order_with_params() {
        let (commands, clean) = extract_commands("#foo:a:b text #bar");
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].name, "foo");
        assert_eq!(commands[0].params, vec!["a", "b"]);
        assert_eq!(commands[1].name, "bar");
        assert!(commands[1].params.is_empty());
        assert_eq!(clean, "text");
        assert!(!clean.contains("foo") && !clean.contains("bar"));
    }

    #[test]
    fn test_free_text_parameter_keeps_spaces() {
        let (commands, clean) = extract_commands(
            "Great! #update_career_goals:Fullstack Developer #set_interview_stage:PREFERENCES",
        );
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].params, vec!["Fullstack Developer"]);
        assert_eq!(commands[1].params, vec!["PREFERENCES"]);
        assert_eq!(clean, "Great!");
    }

    #[test]
    fn test_bare_command_and_dangling_colon() {
        let (commands, clean) = extract_commands("#complete_interview done #ping: ok");
        assert_eq!(commands.len(), 2);
        assert!(commands[0].params.is_empty());
        assert!(commands[1].params.is_empty());
        assert_eq!(clean, "done ok");
    }

    #[test]
    fn test_json_array_parameter_survives() {
        let (commands, _) = extract_commands(r#"#update_known_languages:["Python", "Go"]"#);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].params, vec![r#"["Python", "Go"]"#]);
    }

    #[test]
    fn test_classifier_is_deterministic() {
        assert_eq!(classify("update_learning_goals"), CommandKind::ProfileUpdate);
        assert_eq!(classify("switch_to_teacher"), CommandKind::SwitchExpert);
        assert_eq!(classify("nav_to_chapter"), CommandKind::Navigation);
        assert_eq!(classify("mark_topic_completed"), CommandKind::Navigation);
        assert_eq!(classify("set_interview_stage"), CommandKind::InterviewControl);
        assert_eq!(classify("create_chapter_test"), CommandKind::TestControl);
        assert_eq!(classify("evaluate_answer"), CommandKind::System);
        assert_eq!(classify("analyze_job_market"), CommandKind::System);
        assert_eq!(classify("generate_weekly_report"), CommandKind::System);
        assert_eq!(classify("analyze_learning_progress"), CommandKind::AnalyticsControl);
    }

    #[test]
    fn test_envelope_resolves_to_commands() {
        let payload = r#"{
            "user_message": "Let's move on.",
            "metadata": {
                "actions": [
                    {"description": "advance", "command": "set_interview_stage", "parameters": ["GOALS"]},
                    {"description": "note", "command": "update_timeline", "parameters": ["3 months"]}
                ]
            }
        }"#;
        let output = resolve_model_output(payload);
        assert_eq!(output.message, "Let's move on.");
        assert_eq!(output.commands.len(), 2);
        assert_eq!(output.commands[0].name, "set_interview_stage");
        assert_eq!(output.commands[0].kind, CommandKind::InterviewControl);
        assert_eq!(output.commands[1].params, vec!["3 months"]);
    }

    #[test]
    fn test_malformed_envelope_degrades_to_plain_message() {
        let payload = r#"{"user_message": "broken"#;
        let output = resolve_model_output(payload);
        assert!(output.commands.is_empty());
        assert_eq!(output.message, payload);
    }

    #[test]
    fn test_inline_form_resolves_like_extraction() {
        let output = resolve_model_output("Sure. #nav_to_topic:4");
        assert_eq!(output.message, "Sure.");
        assert_eq!(output.commands.len(), 1);
        assert_eq!(output.commands[0].kind, CommandKind::Navigation);
    }
}
