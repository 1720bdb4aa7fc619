//! Test Sessions
//!
//! A `TestSession` lives only while the test expert is running a quiz with a
//! student: created by `create_*_test`, advanced by `evaluate_answer`,
//! destroyed by `complete_test`. Sessions are held in a store injected into
//! the handler, keyed by student id, so the backing can be swapped for a
//! durable one without touching handler logic. The in-memory reference
//! implementation is neither durable nor shared across processes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestQuestion {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestAnswer {
    pub question_index: usize,
    pub is_correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSession {
    pub id: i64,
    pub student_id: i64,
    pub test_type: String,
    pub questions: Vec<TestQuestion>,
    pub current_index: usize,
    pub answers: Vec<TestAnswer>,
    pub score: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TestSession {
    pub fn new(id: i64, student_id: i64, test_type: String, questions: Vec<TestQuestion>) -> Self {
        Self {
            id,
            student_id,
            test_type,
            questions,
            current_index: 0,
            answers: Vec::new(),
            score: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Share of questions answered so far, in whole percent.
    pub fn progress_percentage(&self) -> u32 {
        if self.questions.is_empty() {
            return 0;
        }
        (self.current_index * 100 / self.questions.len()) as u32
    }

    pub fn current_question(&self) -> Option<&TestQuestion> {
        self.questions.get(self.current_index)
    }

    /// Records an evaluated answer and advances to the next question.
    /// Returns the next question, or `None` when the quiz is exhausted.
    pub fn record_answer(&mut self, is_correct: bool, explanation: String) -> Option<&TestQuestion> {
        self.answers.push(TestAnswer {
            question_index: self.current_index,
            is_correct,
            explanation,
        });
        self.current_index += 1;
        self.questions.get(self.current_index)
    }

    /// Computes and stores the final score (`round(correct / total * 100)`)
    /// and stamps completion.
    pub fn finalize(&mut self) -> i32 {
        let total = self.questions.len();
        let correct = self.answers.iter().filter(|a| a.is_correct).count();
        let score = if total == 0 {
            0
        } else {
            (correct as f64 / total as f64 * 100.0).round() as i32
        };
        self.score = Some(score);
        self.completed_at = Some(Utc::now());
        score
    }

    pub fn correct_answers(&self) -> usize {
        self.answers.iter().filter(|a| a.is_correct).count()
    }
}

/// Keyed by student id: one active session per student at most.
#[async_trait]
pub trait TestSessionStore: Send + Sync {
    async fn get(&self, student_id: i64) -> Option<TestSession>;
    async fn put(&self, session: TestSession);
    async fn remove(&self, student_id: i64) -> Option<TestSession>;
}

/// Process-local store. Sessions do not survive a restart.
#[derive(Default)]
pub struct InMemoryTestSessionStore {
    sessions: Mutex<HashMap<i64, TestSession>>,
}

impl InMemoryTestSessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TestSessionStore for InMemoryTestSessionStore {
    async fn get(&self, student_id: i64) -> Option<TestSession> {
        self.sessions.lock().await.get(&student_id).cloned()
    }

    async fn put(&self, session: TestSession) {
        self.sessions.lock().await.insert(session.student_id, session);
    }

    async fn remove(&self, student_id: i64) -> Option<TestSession> {
        self.sessions.lock().await.remove(&student_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(n: usize) -> Vec<TestQuestion> {
        (0..n)
            .map(|i| TestQuestion {
                id: i as i64 + 1,
                kind: "multiple_choice".to_string(),
                question: format!("Question {}", i + 1),
                options: vec!["A".to_string(), "B".to_string()],
                correct_answer: "A".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_score_rounds_from_correct_ratio() {
        let mut session = TestSession::new(1, 1, "topic".to_string(), questions(5));
        for i in 0..5 {
            session.record_answer(i != 4, String::new());
        }
        assert_eq!(session.finalize(), 80);
        assert!(session.is_completed());
    }

    #[test]
    fn test_score_of_empty_test_is_zero() {
        let mut session = TestSession::new(1, 1, "topic".to_string(), Vec::new());
        assert_eq!(session.finalize(), 0);
    }

    #[test]
    fn test_record_answer_advances_and_signals_exhaustion() {
        let mut session = TestSession::new(1, 1, "block".to_string(), questions(2));
        assert_eq!(session.progress_percentage(), 0);
        assert!(session.record_answer(true, "ok".to_string()).is_some());
        assert_eq!(session.progress_percentage(), 50);
        assert!(session.record_answer(false, "typo".to_string()).is_none());
        assert_eq!(session.progress_percentage(), 100);
    }

    #[tokio::test]
    async fn test_store_round_trip_and_removal() {
        let store = InMemoryTestSessionStore::new();
        store.put(TestSession::new(9, 42, "topic".to_string(), questions(1))).await;
        assert!(store.get(42).await.is_some());
        assert!(store.remove(42).await.is_some());
        assert!(store.get(42).await.is_none());
        assert!(store.remove(42).await.is_none());
    }
}
