/// Generated-course cache keyed by normalized topic.
///
/// Every course generated this session is cached. If the user navigates to
/// a topic that normalizes to a previously seen key we hand back the cached
/// course instantly — zero network calls, no loading state. Content is
/// small and sessions are short-lived, so there is no eviction, TTL, or
/// size bound.
use std::collections::HashMap;
use std::sync::Arc;

use crate::course::Course;

#[derive(Default)]
pub struct CourseCache {
    entries: HashMap<String, Arc<Course>>,
}

impl CourseCache {
    /// Look up a course by normalized topic key.
    pub fn get(&self, key: &str) -> Option<Arc<Course>> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Store a freshly generated course. Inserting the same key again
    /// overwrites, which for equal content is a no-op in effect.
    pub fn insert(&mut self, key: &str, course: Arc<Course>) {
        self.entries.insert(key.to_string(), course);
    }

    /// Number of cached topics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
