/// Course payload types and topic normalization.
///
/// A `Course` is the generator's output for one topic: a title, ordered
/// sections of prose paragraphs, and (typically two) branch choices that
/// lead to follow-up topics. Courses are immutable once generated — the
/// cache hands out `Arc<Course>` and revisits share the same instance.
use serde::{Deserialize, Serialize};

// ── Wire/payload types ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub course_title: String,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub paragraphs: Vec<String>,
}

/// One branch choice offered at the bottom of a course.
/// `key` distinguishes the offered branches (conventionally "1" and "2");
/// `text` is both the display label and the prompt sent when followed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub key: String,
    pub text: String,
}

// ── Selection ─────────────────────────────────────────────────────────────────

/// Which action was taken from a node: one of its branch choices, or the
/// "go deeper" elaboration. Kept as an enum so the deepen marker can never
/// collide with a branch key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Branch(String),
    Deeper,
}

impl Selection {
    /// True if this selection matches a given branch choice key.
    pub fn is_branch(&self, key: &str) -> bool {
        matches!(self, Selection::Branch(k) if k == key)
    }
}

// ── Topic normalization ───────────────────────────────────────────────────────

/// Normalize raw prompt text into the cache/dedup identity.
/// Prompts differing only in surrounding whitespace or letter case are the
/// same node and share cached content.
pub fn topic_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}
