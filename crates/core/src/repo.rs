//! Repository Seams
//!
//! The orchestration core never talks to a database directly; it depends on
//! these traits, which the service crate implements over Postgres and tests
//! implement with mocks. Content repositories are read-only from the core's
//! point of view.

use crate::content::{Block, Chapter, Topic};
use crate::llm_client::{ChatMessage, Role};
use crate::student::{InterviewStage, Student};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A student's conversation container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EduChat {
    pub id: i64,
    pub student_id: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StudentRepo: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<Student>>;
    /// Inserts the student and returns the assigned id.
    async fn create(&self, student: &Student) -> Result<i64>;
    /// Writes the full student record. The orchestrator calls this exactly
    /// once per turn, after all commands have been applied in memory.
    async fn update(&self, student: &Student) -> Result<()>;
    /// Direct stage write, used outside the turn pipeline (re-interview).
    async fn set_interview_stage(&self, id: i64, stage: InterviewStage) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepo: Send + Sync {
    async fn get_or_create_chat(&self, student_id: i64) -> Result<EduChat>;
    async fn save_message(&self, chat_id: i64, role: Role, text: &str) -> Result<()>;
    /// The most recent `limit` messages for the student, oldest first.
    async fn get_history(&self, student_id: i64, limit: usize) -> Result<Vec<ChatMessage>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentRepo: Send + Sync {
    async fn get_topic(&self, id: i64) -> Result<Option<Topic>>;
    async fn get_block(&self, id: i64) -> Result<Option<Block>>;
    async fn get_chapter(&self, id: i64) -> Result<Option<Chapter>>;
    async fn get_all_topics(&self) -> Result<Vec<Topic>>;
}
