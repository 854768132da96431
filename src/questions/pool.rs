//! Pre-seeded question pool
//!
//! Backs ranked matches and serves as the fallback for on-demand requests
//! when no generation backend is configured.

use crate::error::Result;
use crate::questions::model::{normalize_questions, Question, RawQuestion};
use crate::questions::source::{QuestionRequest, QuestionSource};
use anyhow::Context;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, info};

/// In-memory pool of ready-made questions
#[derive(Debug)]
pub struct QuestionPool {
    questions: RwLock<Vec<Question>>,
}

impl QuestionPool {
    /// Create a pool from already-normalized questions
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions: RwLock::new(questions),
        }
    }

    /// Create a pool with the built-in seed set
    pub fn seeded() -> Self {
        Self::new(seed_questions())
    }

    /// Load a JSON array of raw questions from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read question pool {}", path.display()))?;
        let raw: Vec<RawQuestion> =
            serde_json::from_str(&content).context("Question pool is not valid JSON")?;
        let questions = normalize_questions(&raw);
        info!(
            "Loaded {} questions from {}",
            questions.len(),
            path.display()
        );
        Ok(Self::new(questions))
    }

    /// Add more questions to the pool
    pub fn extend(&self, more: Vec<Question>) -> Result<()> {
        let mut questions = self
            .questions
            .write()
            .map_err(|_| anyhow::anyhow!("Failed to acquire question pool lock"))?;
        questions.extend(more);
        Ok(())
    }

    /// Take the questions out of the pool
    pub fn into_questions(self) -> Vec<Question> {
        self.questions
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of questions in the pool
    pub fn len(&self) -> usize {
        self.questions.read().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matches(question: &Question, request: &QuestionRequest) -> bool {
        let category_ok = request.category.eq_ignore_ascii_case("general")
            || request.category.eq_ignore_ascii_case("any")
            || question
                .category
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(&request.category));
        let difficulty = request.difficulty.to_string();
        let difficulty_ok = question
            .difficulty
            .as_deref()
            .map_or(true, |d| d.eq_ignore_ascii_case(&difficulty));
        category_ok && difficulty_ok
    }
}

impl Default for QuestionPool {
    fn default() -> Self {
        Self::seeded()
    }
}

#[async_trait]
impl QuestionSource for QuestionPool {
    async fn fetch(&self, request: &QuestionRequest) -> Result<Vec<Question>> {
        let questions = self
            .questions
            .read()
            .map_err(|_| anyhow::anyhow!("Failed to acquire question pool lock"))?;

        let mut candidates: Vec<&Question> = questions
            .iter()
            .filter(|q| Self::matches(q, request))
            .collect();

        // Not enough on-topic questions: widen to the whole pool
        if candidates.len() < request.count {
            debug!(
                "Only {} pool questions match {:?}, widening to the full pool",
                candidates.len(),
                request
            );
            candidates = questions.iter().collect();
        }

        let mut rng = rand::thread_rng();
        candidates.shuffle(&mut rng);

        Ok(candidates
            .into_iter()
            .take(request.count)
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "pool"
    }
}

fn seed(prompt: &str, options: &[&str], correct: &str, category: &str, difficulty: &str) -> Question {
    Question {
        prompt: prompt.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_answer: correct.to_string(),
        explanation: None,
        category: Some(category.to_string()),
        difficulty: Some(difficulty.to_string()),
    }
}

fn seed_questions() -> Vec<Question> {
    vec![
        seed("What is the capital of France?", &["Paris", "London", "Berlin", "Madrid"], "Paris", "geography", "easy"),
        seed("Which planet is known as the Red Planet?", &["Venus", "Mars", "Jupiter", "Saturn"], "Mars", "science", "easy"),
        seed("How many continents are there?", &["5", "6", "7", "8"], "7", "geography", "easy"),
        seed("What is the chemical symbol for gold?", &["Ag", "Au", "Gd", "Go"], "Au", "science", "medium"),
        seed("Who painted the Mona Lisa?", &["Michelangelo", "Raphael", "Leonardo da Vinci", "Donatello"], "Leonardo da Vinci", "art", "easy"),
        seed("What is the largest ocean on Earth?", &["Atlantic", "Indian", "Arctic", "Pacific"], "Pacific", "geography", "easy"),
        seed("In which year did the Berlin Wall fall?", &["1987", "1989", "1991", "1993"], "1989", "history", "medium"),
        seed("What is the square root of 144?", &["10", "11", "12", "14"], "12", "math", "easy"),
        seed("Which element has atomic number 1?", &["Helium", "Hydrogen", "Oxygen", "Lithium"], "Hydrogen", "science", "easy"),
        seed("What is the longest river in the world?", &["Amazon", "Nile", "Yangtze", "Mississippi"], "Nile", "geography", "medium"),
        seed("Who wrote 'Pride and Prejudice'?", &["Charlotte Bronte", "Jane Austen", "Mary Shelley", "George Eliot"], "Jane Austen", "literature", "medium"),
        seed("What is the hardest natural substance?", &["Quartz", "Diamond", "Topaz", "Corundum"], "Diamond", "science", "easy"),
        seed("Which country hosted the 2016 Summer Olympics?", &["China", "United Kingdom", "Brazil", "Japan"], "Brazil", "sports", "medium"),
        seed("What is the smallest prime number?", &["0", "1", "2", "3"], "2", "math", "easy"),
        seed("Which language has the most native speakers?", &["English", "Spanish", "Hindi", "Mandarin Chinese"], "Mandarin Chinese", "general", "medium"),
        seed("What is the speed of light in vacuum, approximately?", &["300,000 km/s", "150,000 km/s", "1,000,000 km/s", "30,000 km/s"], "300,000 km/s", "science", "hard"),
    ]
}
