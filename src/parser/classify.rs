use std::sync::LazyLock;

use regex::Regex;

static FOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^topic_(\d+)_question_(\d+)").unwrap());

/// Ordering key of one question folder. Unique per exam; the assembled
/// sequence sorts ascending by `(topic, question)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FolderKey {
    pub topic: u32,
    pub question: u32,
}

impl FolderKey {
    pub fn display_name(&self) -> String {
        format!("Topic {} - Question {}", self.topic, self.question)
    }
}

/// Parse a scrape folder name of the form `topic_<n>_question_<m>` (trailing
/// characters ignored). Non-matching folders are silently skipped upstream;
/// that is policy, not an error.
pub fn classify(folder_name: &str) -> Option<FolderKey> {
    let caps = FOLDER_RE.captures(folder_name)?;
    Some(FolderKey {
        topic: caps[1].parse().ok()?,
        question: caps[2].parse().ok()?,
    })
}

// ── Tests ──
