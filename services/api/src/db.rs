//! Data Access Layer
//!
//! Postgres implementations of the core repository traits using `sqlx`.
//! List- and map-shaped profile fields are stored as JSONB columns; this is
//! the single serialization boundary for them; the core works with typed
//! fields only.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mentor_core::content::{Block, Chapter, Topic};
use mentor_core::llm_client::{ChatMessage, Role};
use mentor_core::repo::{ChatRepo, ContentRepo, EduChat, StudentRepo};
use mentor_core::student::{InterviewStage, PlanEntry, Student};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeMap;
use tracing::warn;

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

#[derive(FromRow)]
struct StudentRow {
    id: i64,
    account_id: i64,
    interview_stage: String,
    interview_completed: bool,
    programming_experience: Option<String>,
    known_languages: Json<Vec<String>>,
    work_experience: Option<String>,
    education_background: Option<String>,
    learning_goals: Json<Vec<String>>,
    career_goals: Option<String>,
    timeline: Option<String>,
    learning_style: Option<String>,
    time_availability: Option<String>,
    preferred_difficulty: Option<String>,
    skip_topics: Json<BTreeMap<i64, String>>,
    skip_blocks: Json<BTreeMap<i64, String>>,
    focus_areas: Json<Vec<String>>,
    recommended_topics: Json<BTreeMap<i64, String>>,
    recommended_blocks: Json<BTreeMap<i64, String>>,
    approved_topics: Json<BTreeMap<i64, String>>,
    approved_blocks: Json<BTreeMap<i64, String>>,
    approved_chapters: Json<BTreeMap<i64, String>>,
    assessment_score: Option<i32>,
    strong_areas: Json<Vec<String>>,
    weak_areas: Json<Vec<String>>,
    learning_path: Json<Vec<PlanEntry>>,
    current_topic_id: Option<i64>,
    current_block_id: Option<i64>,
    current_chapter_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        let interview_stage = row.interview_stage.parse().unwrap_or_else(|_| {
            warn!(student_id = row.id, stage = %row.interview_stage, "unknown stage in storage, resetting to WELCOME");
            InterviewStage::Welcome
        });
        Student {
            id: row.id,
            account_id: row.account_id,
            interview_stage,
            interview_completed: row.interview_completed,
            programming_experience: row.programming_experience,
            known_languages: row.known_languages.0,
            work_experience: row.work_experience,
            education_background: row.education_background,
            learning_goals: row.learning_goals.0,
            career_goals: row.career_goals,
            timeline: row.timeline,
            learning_style: row.learning_style,
            time_availability: row.time_availability,
            preferred_difficulty: row.preferred_difficulty,
            skip_topics: row.skip_topics.0,
            skip_blocks: row.skip_blocks.0,
            focus_areas: row.focus_areas.0,
            recommended_topics: row.recommended_topics.0,
            recommended_blocks: row.recommended_blocks.0,
            approved_topics: row.approved_topics.0,
            approved_blocks: row.approved_blocks.0,
            approved_chapters: row.approved_chapters.0,
            assessment_score: row.assessment_score,
            strong_areas: row.strong_areas.0,
            weak_areas: row.weak_areas.0,
            learning_path: row.learning_path.0,
            current_topic_id: row.current_topic_id,
            current_block_id: row.current_block_id,
            current_chapter_id: row.current_chapter_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TopicRow {
    id: i64,
    name: String,
    intro: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TopicRow> for Topic {
    fn from(row: TopicRow) -> Self {
        Topic {
            id: row.id,
            name: row.name,
            intro: row.intro,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct BlockRow {
    id: i64,
    topic_id: i64,
    name: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BlockRow> for Block {
    fn from(row: BlockRow) -> Self {
        Block {
            id: row.id,
            topic_id: row.topic_id,
            name: row.name,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ChapterRow {
    id: i64,
    block_id: i64,
    name: String,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ChapterRow> for Chapter {
    fn from(row: ChapterRow) -> Self {
        Chapter {
            id: row.id,
            block_id: row.block_id,
            name: row.name,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRow {
    role: String,
    content: String,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl StudentRepo for Db {
    async fn get_by_id(&self, id: i64) -> Result<Option<Student>> {
        let row = sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Student::from))
    }

    async fn create(&self, student: &Student) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO students (
                account_id, interview_stage, interview_completed,
                programming_experience, known_languages, work_experience,
                education_background, learning_goals, career_goals, timeline,
                learning_style, time_availability, preferred_difficulty,
                skip_topics, skip_blocks, focus_areas,
                recommended_topics, recommended_blocks,
                approved_topics, approved_blocks, approved_chapters,
                assessment_score, strong_areas, weak_areas, learning_path,
                current_topic_id, current_block_id, current_chapter_id
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                $27, $28
            )
            RETURNING id
            "#,
        )
        .bind(student.account_id)
        .bind(student.interview_stage.as_str())
        .bind(student.interview_completed)
        .bind(&student.programming_experience)
        .bind(Json(&student.known_languages))
        .bind(&student.work_experience)
        .bind(&student.education_background)
        .bind(Json(&student.learning_goals))
        .bind(&student.career_goals)
        .bind(&student.timeline)
        .bind(&student.learning_style)
        .bind(&student.time_availability)
        .bind(&student.preferred_difficulty)
        .bind(Json(&student.skip_topics))
        .bind(Json(&student.skip_blocks))
        .bind(Json(&student.focus_areas))
        .bind(Json(&student.recommended_topics))
        .bind(Json(&student.recommended_blocks))
        .bind(Json(&student.approved_topics))
        .bind(Json(&student.approved_blocks))
        .bind(Json(&student.approved_chapters))
        .bind(student.assessment_score)
        .bind(Json(&student.strong_areas))
        .bind(Json(&student.weak_areas))
        .bind(Json(&student.learning_path))
        .bind(student.current_topic_id)
        .bind(student.current_block_id)
        .bind(student.current_chapter_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update(&self, student: &Student) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE students SET
                interview_stage = $2, interview_completed = $3,
                programming_experience = $4, known_languages = $5,
                work_experience = $6, education_background = $7,
                learning_goals = $8, career_goals = $9, timeline = $10,
                learning_style = $11, time_availability = $12,
                preferred_difficulty = $13, skip_topics = $14,
                skip_blocks = $15, focus_areas = $16,
                recommended_topics = $17, recommended_blocks = $18,
                approved_topics = $19, approved_blocks = $20,
                approved_chapters = $21, assessment_score = $22,
                strong_areas = $23, weak_areas = $24, learning_path = $25,
                current_topic_id = $26, current_block_id = $27,
                current_chapter_id = $28, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(student.id)
        .bind(student.interview_stage.as_str())
        .bind(student.interview_completed)
        .bind(&student.programming_experience)
        .bind(Json(&student.known_languages))
        .bind(&student.work_experience)
        .bind(&student.education_background)
        .bind(Json(&student.learning_goals))
        .bind(&student.career_goals)
        .bind(&student.timeline)
        .bind(&student.learning_style)
        .bind(&student.time_availability)
        .bind(&student.preferred_difficulty)
        .bind(Json(&student.skip_topics))
        .bind(Json(&student.skip_blocks))
        .bind(Json(&student.focus_areas))
        .bind(Json(&student.recommended_topics))
        .bind(Json(&student.recommended_blocks))
        .bind(Json(&student.approved_topics))
        .bind(Json(&student.approved_blocks))
        .bind(Json(&student.approved_chapters))
        .bind(student.assessment_score)
        .bind(Json(&student.strong_areas))
        .bind(Json(&student.weak_areas))
        .bind(Json(&student.learning_path))
        .bind(student.current_topic_id)
        .bind(student.current_block_id)
        .bind(student.current_chapter_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_interview_stage(&self, id: i64, stage: InterviewStage) -> Result<()> {
        sqlx::query("UPDATE students SET interview_stage = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(stage.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatRepo for Db {
    async fn get_or_create_chat(&self, student_id: i64) -> Result<EduChat> {
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM edu_chats WHERE student_id = $1")
                .bind(student_id)
                .fetch_optional(&self.pool)
                .await?;
        if let Some(id) = existing {
            return Ok(EduChat { id, student_id });
        }

        let id: i64 =
            sqlx::query_scalar("INSERT INTO edu_chats (student_id) VALUES ($1) RETURNING id")
                .bind(student_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(EduChat { id, student_id })
    }

    async fn save_message(&self, chat_id: i64, role: Role, text: &str) -> Result<()> {
        sqlx::query("INSERT INTO edu_messages (chat_id, role, content) VALUES ($1, $2, $3)")
            .bind(chat_id)
            .bind(role.to_string())
            .bind(text)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_history(&self, student_id: i64, limit: usize) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.role, m.content
            FROM edu_messages m
            JOIN edu_chats c ON m.chat_id = c.id
            WHERE c.student_id = $1
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $2
            "#,
        )
        .bind(student_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        // Newest-first from the query, oldest-first for the model.
        let mut messages: Vec<ChatMessage> = rows
            .into_iter()
            .map(|row| {
                let role = if row.role == "assistant" {
                    Role::Assistant
                } else {
                    Role::User
                };
                ChatMessage::new(role, row.content)
            })
            .collect();
        messages.reverse();
        Ok(messages)
    }
}

#[async_trait]
impl ContentRepo for Db {
    async fn get_topic(&self, id: i64) -> Result<Option<Topic>> {
        let row = sqlx::query_as::<_, TopicRow>(
            "SELECT id, name, intro, created_at, updated_at FROM topics WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Topic::from))
    }

    async fn get_block(&self, id: i64) -> Result<Option<Block>> {
        let row = sqlx::query_as::<_, BlockRow>(
            "SELECT id, topic_id, name, content, created_at, updated_at FROM blocks WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Block::from))
    }

    async fn get_chapter(&self, id: i64) -> Result<Option<Chapter>> {
        let row = sqlx::query_as::<_, ChapterRow>(
            "SELECT id, block_id, name, content, created_at, updated_at FROM chapters WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Chapter::from))
    }

    async fn get_all_topics(&self) -> Result<Vec<Topic>> {
        let rows = sqlx::query_as::<_, TopicRow>(
            "SELECT id, name, intro, created_at, updated_at FROM topics ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Topic::from).collect())
    }
}
