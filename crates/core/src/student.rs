//! Student State
//!
//! The durable per-learner record. Everything the experts know about a
//! student lives here: interview progress, background facts, goals and
//! preferences, the adapted content plan, and the current position in the
//! content hierarchy. The struct is mutated in memory by command execution
//! and written back by the orchestrator exactly once per turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Stages of the profiling interview, in their conventional order. The
/// machine does not forbid skipping or moving backwards; the interview
/// expert decides when enough has been gathered and issues explicit
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterviewStage {
    Welcome,
    Background,
    Goals,
    Preferences,
    Assessment,
    PlanGeneration,
    Complete,
}

impl InterviewStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStage::Welcome => "WELCOME",
            InterviewStage::Background => "BACKGROUND",
            InterviewStage::Goals => "GOALS",
            InterviewStage::Preferences => "PREFERENCES",
            InterviewStage::Assessment => "ASSESSMENT",
            InterviewStage::PlanGeneration => "PLAN_GENERATION",
            InterviewStage::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for InterviewStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown interview stage: {0}")]
pub struct UnknownStage(pub String);

impl FromStr for InterviewStage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WELCOME" => Ok(InterviewStage::Welcome),
            "BACKGROUND" => Ok(InterviewStage::Background),
            "GOALS" => Ok(InterviewStage::Goals),
            "PREFERENCES" => Ok(InterviewStage::Preferences),
            "ASSESSMENT" => Ok(InterviewStage::Assessment),
            "PLAN_GENERATION" => Ok(InterviewStage::PlanGeneration),
            "COMPLETE" => Ok(InterviewStage::Complete),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

/// Levels of the content hierarchy: topic ⊇ block ⊇ chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentLevel {
    Topic,
    Block,
    Chapter,
}

impl ContentLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "topic" => Some(ContentLevel::Topic),
            "block" => Some(ContentLevel::Block),
            "chapter" => Some(ContentLevel::Chapter),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentLevel::Topic => "topic",
            ContentLevel::Block => "block",
            ContentLevel::Chapter => "chapter",
        }
    }
}

/// One step of the personal learning plan, as produced by the planning
/// model call. Only `topic_id` is required; the rest defaults when the
/// model omits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    pub topic_id: i64,
    #[serde(default)]
    pub topic_name: String,
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub prerequisites: Vec<i64>,
    #[serde(default)]
    pub learning_approach: Option<String>,
    #[serde(default)]
    pub key_projects: Vec<String>,
    #[serde(default)]
    pub success_criteria: Option<String>,
}

/// Errors from typed profile updates.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("unknown profile field: {0}")]
    UnknownField(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// The set of profile fields a model command may update. Parsing an unknown
/// name is an error, which is how typo'd `update_*` commands get rejected
/// instead of silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    ProgrammingExperience,
    KnownLanguages,
    WorkExperience,
    EducationBackground,
    LearningGoals,
    CareerGoals,
    Timeline,
    LearningStyle,
    TimeAvailability,
    PreferredDifficulty,
    AssessmentScore,
    StrongAreas,
    WeakAreas,
    FocusAreas,
}

impl ProfileField {
    pub fn parse(name: &str) -> Result<Self, ProfileError> {
        match name {
            "programming_experience" => Ok(ProfileField::ProgrammingExperience),
            "known_languages" => Ok(ProfileField::KnownLanguages),
            "work_experience" => Ok(ProfileField::WorkExperience),
            "education_background" => Ok(ProfileField::EducationBackground),
            "learning_goals" => Ok(ProfileField::LearningGoals),
            "career_goals" => Ok(ProfileField::CareerGoals),
            "timeline" => Ok(ProfileField::Timeline),
            "learning_style" => Ok(ProfileField::LearningStyle),
            "time_availability" => Ok(ProfileField::TimeAvailability),
            "preferred_difficulty" => Ok(ProfileField::PreferredDifficulty),
            "assessment_score" => Ok(ProfileField::AssessmentScore),
            "strong_areas" => Ok(ProfileField::StrongAreas),
            "weak_areas" => Ok(ProfileField::WeakAreas),
            "focus_areas" => Ok(ProfileField::FocusAreas),
            other => Err(ProfileError::UnknownField(other.to_string())),
        }
    }
}

/// Profile facts extracted by the dialogue-analysis model call. Scalar
/// fields apply only when present; list fields only when non-empty, so a
/// sparse analysis never erases what earlier turns established.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdates {
    pub programming_experience: Option<String>,
    #[serde(default)]
    pub known_languages: Vec<String>,
    pub work_experience: Option<String>,
    pub education_background: Option<String>,
    #[serde(default)]
    pub learning_goals: Vec<String>,
    pub career_goals: Option<String>,
    pub timeline: Option<String>,
    pub learning_style: Option<String>,
    pub time_availability: Option<String>,
    pub preferred_difficulty: Option<String>,
    pub assessment_score: Option<i32>,
    #[serde(default)]
    pub strong_areas: Vec<String>,
    #[serde(default)]
    pub weak_areas: Vec<String>,
}

/// One record per learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub account_id: i64,

    pub interview_stage: InterviewStage,
    pub interview_completed: bool,

    // Background
    pub programming_experience: Option<String>,
    pub known_languages: Vec<String>,
    pub work_experience: Option<String>,
    pub education_background: Option<String>,

    // Goals
    pub learning_goals: Vec<String>,
    pub career_goals: Option<String>,
    pub timeline: Option<String>,

    // Preferences
    pub learning_style: Option<String>,
    pub time_availability: Option<String>,
    pub preferred_difficulty: Option<String>,

    // Content adaptation: id → reason for skip-maps, id → name elsewhere.
    pub skip_topics: BTreeMap<i64, String>,
    pub skip_blocks: BTreeMap<i64, String>,
    pub focus_areas: Vec<String>,
    pub recommended_topics: BTreeMap<i64, String>,
    pub recommended_blocks: BTreeMap<i64, String>,

    // Progress
    pub approved_topics: BTreeMap<i64, String>,
    pub approved_blocks: BTreeMap<i64, String>,
    pub approved_chapters: BTreeMap<i64, String>,

    // Assessment
    pub assessment_score: Option<i32>,
    pub strong_areas: Vec<String>,
    pub weak_areas: Vec<String>,

    // Plan and position
    pub learning_path: Vec<PlanEntry>,
    pub current_topic_id: Option<i64>,
    pub current_block_id: Option<i64>,
    pub current_chapter_id: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// A fresh student at the start of the interview.
    pub fn new(id: i64, account_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            account_id,
            interview_stage: InterviewStage::Welcome,
            interview_completed: false,
            programming_experience: None,
            known_languages: Vec::new(),
            work_experience: None,
            education_background: None,
            learning_goals: Vec::new(),
            career_goals: None,
            timeline: None,
            learning_style: None,
            time_availability: None,
            preferred_difficulty: None,
            skip_topics: BTreeMap::new(),
            skip_blocks: BTreeMap::new(),
            focus_areas: Vec::new(),
            recommended_topics: BTreeMap::new(),
            recommended_blocks: BTreeMap::new(),
            approved_topics: BTreeMap::new(),
            approved_blocks: BTreeMap::new(),
            approved_chapters: BTreeMap::new(),
            assessment_score: None,
            strong_areas: Vec::new(),
            weak_areas: Vec::new(),
            learning_path: Vec::new(),
            current_topic_id: None,
            current_block_id: None,
            current_chapter_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Moves the student's position in the content hierarchy. Navigating to
    /// a coarser level clears every finer one: a new topic resets block and
    /// chapter, a new block resets the chapter.
    pub fn navigate(&mut self, level: ContentLevel, id: i64) {
        match level {
            ContentLevel::Topic => {
                self.current_topic_id = Some(id);
                self.current_block_id = None;
                self.current_chapter_id = None;
            }
            ContentLevel::Block => {
                self.current_block_id = Some(id);
                self.current_chapter_id = None;
            }
            ContentLevel::Chapter => {
                self.current_chapter_id = Some(id);
            }
        }
        self.touch();
    }

    /// Records a piece of content as studied, moving it from the level's
    /// recommended map into the approved map. Idempotent: re-marking an
    /// already-approved id changes nothing. Chapters have no recommended
    /// map, so the caller supplies a display name (falling back to
    /// `Chapter {id}`).
    pub fn mark_completed(&mut self, level: ContentLevel, id: i64, chapter_name: Option<String>) {
        match level {
            ContentLevel::Topic => {
                if self.approved_topics.contains_key(&id) {
                    return;
                }
                if let Some(name) = self.recommended_topics.remove(&id) {
                    self.approved_topics.insert(id, name);
                    self.touch();
                }
            }
            ContentLevel::Block => {
                if self.approved_blocks.contains_key(&id) {
                    return;
                }
                if let Some(name) = self.recommended_blocks.remove(&id) {
                    self.approved_blocks.insert(id, name);
                    self.touch();
                }
            }
            ContentLevel::Chapter => {
                if self.approved_chapters.contains_key(&id) {
                    return;
                }
                let name = chapter_name.unwrap_or_else(|| format!("Chapter {}", id));
                self.approved_chapters.insert(id, name);
                self.touch();
            }
        }
    }

    /// Applies a single `update_<field>` command value. List-shaped fields
    /// accept either a JSON array or a bare value treated as one element.
    /// Returns the value as applied, for the command result.
    pub fn apply_profile_update(
        &mut self,
        field_name: &str,
        raw: &str,
    ) -> Result<serde_json::Value, ProfileError> {
        let field = ProfileField::parse(field_name)?;
        let applied = match field {
            ProfileField::ProgrammingExperience => {
                self.programming_experience = Some(raw.to_string());
                serde_json::Value::String(raw.to_string())
            }
            ProfileField::WorkExperience => {
                self.work_experience = Some(raw.to_string());
                serde_json::Value::String(raw.to_string())
            }
            ProfileField::EducationBackground => {
                self.education_background = Some(raw.to_string());
                serde_json::Value::String(raw.to_string())
            }
            ProfileField::CareerGoals => {
                self.career_goals = Some(raw.to_string());
                serde_json::Value::String(raw.to_string())
            }
            ProfileField::Timeline => {
                self.timeline = Some(raw.to_string());
                serde_json::Value::String(raw.to_string())
            }
            ProfileField::LearningStyle => {
                self.learning_style = Some(raw.to_string());
                serde_json::Value::String(raw.to_string())
            }
            ProfileField::TimeAvailability => {
                self.time_availability = Some(raw.to_string());
                serde_json::Value::String(raw.to_string())
            }
            ProfileField::PreferredDifficulty => {
                self.preferred_difficulty = Some(raw.to_string());
                serde_json::Value::String(raw.to_string())
            }
            ProfileField::AssessmentScore => {
                let score: i32 =
                    raw.trim()
                        .parse()
                        .map_err(|_| ProfileError::InvalidValue {
                            field: "assessment_score",
                            reason: format!("'{}' is not a number", raw),
                        })?;
                self.assessment_score = Some(score);
                serde_json::json!(score)
            }
            ProfileField::KnownLanguages => {
                self.known_languages = parse_list_value(raw);
                serde_json::json!(self.known_languages)
            }
            ProfileField::LearningGoals => {
                self.learning_goals = parse_list_value(raw);
                serde_json::json!(self.learning_goals)
            }
            ProfileField::StrongAreas => {
                self.strong_areas = parse_list_value(raw);
                serde_json::json!(self.strong_areas)
            }
            ProfileField::WeakAreas => {
                self.weak_areas = parse_list_value(raw);
                serde_json::json!(self.weak_areas)
            }
            ProfileField::FocusAreas => {
                self.focus_areas = parse_list_value(raw);
                serde_json::json!(self.focus_areas)
            }
        };
        self.touch();
        Ok(applied)
    }

    /// Applies a validated batch of analysis updates in one go.
    pub fn apply_updates(&mut self, updates: &ProfileUpdates) {
        if let Some(v) = &updates.programming_experience {
            self.programming_experience = Some(v.clone());
        }
        if !updates.known_languages.is_empty() {
            self.known_languages = updates.known_languages.clone();
        }
        if let Some(v) = &updates.work_experience {
            self.work_experience = Some(v.clone());
        }
        if let Some(v) = &updates.education_background {
            self.education_background = Some(v.clone());
        }
        if !updates.learning_goals.is_empty() {
            self.learning_goals = updates.learning_goals.clone();
        }
        if let Some(v) = &updates.career_goals {
            self.career_goals = Some(v.clone());
        }
        if let Some(v) = &updates.timeline {
            self.timeline = Some(v.clone());
        }
        if let Some(v) = &updates.learning_style {
            self.learning_style = Some(v.clone());
        }
        if let Some(v) = &updates.time_availability {
            self.time_availability = Some(v.clone());
        }
        if let Some(v) = &updates.preferred_difficulty {
            self.preferred_difficulty = Some(v.clone());
        }
        if let Some(v) = updates.assessment_score {
            self.assessment_score = Some(v);
        }
        if !updates.strong_areas.is_empty() {
            self.strong_areas = updates.strong_areas.clone();
        }
        if !updates.weak_areas.is_empty() {
            self.weak_areas = updates.weak_areas.clone();
        }
        self.touch();
    }

    /// The only place `interview_completed` is set, so the flag can never
    /// disagree with the stage.
    pub fn complete_interview(&mut self) {
        self.interview_completed = true;
        self.interview_stage = InterviewStage::Complete;
        self.touch();
    }

    pub fn set_interview_stage(&mut self, stage: InterviewStage) {
        self.interview_stage = stage;
        self.touch();
    }

    pub fn set_assessment_score(&mut self, score: i32) {
        self.assessment_score = Some(score);
        self.touch();
    }

    /// Marks a topic as skippable with the reason the student gave.
    pub fn skip_topic(&mut self, topic_id: i64, reason: impl Into<String>) {
        self.skip_topics.insert(topic_id, reason.into());
        self.touch();
    }

    /// Appends a weak area unless it is already recorded.
    pub fn add_weak_area(&mut self, concept: &str) {
        if !self.weak_areas.iter().any(|c| c == concept) {
            self.weak_areas.push(concept.to_string());
            self.touch();
        }
    }

    /// Appends a focus area unless it is already recorded.
    pub fn add_focus_area(&mut self, area: &str) {
        if !self.focus_areas.iter().any(|a| a == area) {
            self.focus_areas.push(area.to_string());
            self.touch();
        }
    }

    pub fn is_ready_for_learning(&self) -> bool {
        self.interview_completed
            && self.programming_experience.is_some()
            && !self.learning_goals.is_empty()
            && !self.recommended_topics.is_empty()
    }

    /// How much of the profile the interview has filled in, over the twelve
    /// tracked facts.
    pub fn profile_completion_percentage(&self) -> i32 {
        let scalars = [
            &self.programming_experience,
            &self.work_experience,
            &self.education_background,
            &self.career_goals,
            &self.timeline,
            &self.learning_style,
            &self.time_availability,
            &self.preferred_difficulty,
        ];
        let mut filled = scalars.iter().filter(|f| f.is_some()).count();
        filled += usize::from(!self.known_languages.is_empty());
        filled += usize::from(!self.learning_goals.is_empty());
        filled += usize::from(self.assessment_score.is_some());
        filled += usize::from(!self.recommended_topics.is_empty());

        (filled as f64 / 12.0 * 100.0) as i32
    }
}

/// `["a", "b"]` parses as a JSON list; anything else is a one-element list.
fn parse_list_value(raw: &str) -> Vec<String> {
    if raw.trim_start().starts_with('[') {
        serde_json::from_str(raw).unwrap_or_else(|_| vec![raw.to_string()])
    } else {
        vec![raw.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigating_to_topic_clears_finer_levels() {
        let mut student = Student::new(1, 1);
        student.navigate(ContentLevel::Topic, 1);
        student.navigate(ContentLevel::Block, 10);
        student.navigate(ContentLevel::Chapter, 100);
        assert_eq!(student.current_chapter_id, Some(100));

        student.navigate(ContentLevel::Topic, 2);
        assert_eq!(student.current_topic_id, Some(2));
        assert_eq!(student.current_block_id, None);
        assert_eq!(student.current_chapter_id, None);
    }

    #[test]
    fn test_navigating_to_block_clears_chapter_only() {
        let mut student = Student::new(1, 1);
        student.navigate(ContentLevel::Topic, 1);
        student.navigate(ContentLevel::Block, 10);
        student.navigate(ContentLevel::Chapter, 100);

        student.navigate(ContentLevel::Block, 11);
        assert_eq!(student.current_topic_id, Some(1));
        assert_eq!(student.current_block_id, Some(11));
        assert_eq!(student.current_chapter_id, None);
    }

    #[test]
    fn test_mark_completed_is_idempotent() {
        let mut student = Student::new(1, 1);
        student.recommended_topics.insert(5, "Ownership".to_string());

        student.mark_completed(ContentLevel::Topic, 5, None);
        let after_first = student.approved_topics.clone();
        student.mark_completed(ContentLevel::Topic, 5, None);

        assert_eq!(student.approved_topics, after_first);
        assert_eq!(student.approved_topics.get(&5).map(String::as_str), Some("Ownership"));
        assert!(!student.recommended_topics.contains_key(&5));
    }

    #[test]
    fn test_mark_completed_ignores_unrecommended_topic() {
        let mut student = Student::new(1, 1);
        student.mark_completed(ContentLevel::Topic, 9, None);
        assert!(student.approved_topics.is_empty());
    }

    #[test]
    fn test_chapter_completion_uses_fallback_name() {
        let mut student = Student::new(1, 1);
        student.mark_completed(ContentLevel::Chapter, 3, None);
        assert_eq!(student.approved_chapters.get(&3).map(String::as_str), Some("Chapter 3"));
    }

    #[test]
    fn test_profile_update_rejects_unknown_field() {
        let mut student = Student::new(1, 1);
        let err = student.apply_profile_update("shoe_size", "42").unwrap_err();
        assert!(matches!(err, ProfileError::UnknownField(_)));
    }

    #[test]
    fn test_profile_update_parses_json_list_and_bare_value() {
        let mut student = Student::new(1, 1);
        student
            .apply_profile_update("known_languages", r#"["Python", "Go"]"#)
            .unwrap();
        assert_eq!(student.known_languages, vec!["Python", "Go"]);

        student.apply_profile_update("learning_goals", "Backend").unwrap();
        assert_eq!(student.learning_goals, vec!["Backend"]);
    }

    #[test]
    fn test_complete_interview_keeps_invariant() {
        let mut student = Student::new(1, 1);
        student.set_interview_stage(InterviewStage::PlanGeneration);
        student.complete_interview();
        assert!(student.interview_completed);
        assert_eq!(student.interview_stage, InterviewStage::Complete);
    }

    #[test]
    fn test_stage_parses_case_insensitively() {
        assert_eq!("plan_generation".parse::<InterviewStage>().unwrap(), InterviewStage::PlanGeneration);
        assert!("HANDOFF".parse::<InterviewStage>().is_err());
    }

    #[test]
    fn test_weak_and_focus_areas_deduplicate() {
        let mut student = Student::new(1, 1);
        student.add_weak_area("recursion");
        student.add_weak_area("recursion");
        student.add_focus_area("web");
        student.add_focus_area("web");
        assert_eq!(student.weak_areas.len(), 1);
        assert_eq!(student.focus_areas.len(), 1);
    }

    #[test]
    fn test_profile_completion_percentage() {
        let mut student = Student::new(1, 1);
        assert_eq!(student.profile_completion_percentage(), 0);
        student.programming_experience = Some("beginner".to_string());
        student.known_languages = vec!["Python".to_string()];
        student.learning_goals = vec!["Backend".to_string()];
        assert_eq!(student.profile_completion_percentage(), 25);
    }
}
