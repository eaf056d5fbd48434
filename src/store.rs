//! On-disk exam catalog: one directory per exam under the data root, holding
//! a single structured JSON document plus a flat image directory. Records are
//! written once per import and read back verbatim; a re-import replaces the
//! exam wholesale.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DATA_DIR: &str = "exam_data";
const EXAM_FILE: &str = "exam_data.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    /// No choice list in any known format: hot-area, drag-drop, simulation
    /// and other descriptive items.
    Descriptive,
}

/// One normalized question, assembled from a scrape folder.
/// `(topic_index, question_index)` is unique within an exam and the exam's
/// question sequence is sorted ascending by that pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub topic_index: u32,
    pub question_index: u32,
    pub display_name: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub question_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_html: Option<String>,
    /// Letter -> choice body. Empty for descriptive items.
    #[serde(default)]
    pub choices: BTreeMap<String, String>,
    /// Author-marked ground truth from the hidden "correct" marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    /// Letter, or the "See Discussion" sentinel; absent when the answer
    /// document was missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_answer_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discussion_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_recommendation_html: Option<String>,
    #[serde(default)]
    pub ai_citations: Vec<String>,
    /// Saved image file names (`<folder>_<original name>`), partitioned by
    /// inferred owner.
    #[serde(default)]
    pub question_images: Vec<String>,
    #[serde(default)]
    pub answer_images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamData {
    pub exam_name: String,
    pub created_at: DateTime<Utc>,
    pub question_count: usize,
    pub questions: Vec<QuestionRecord>,
}

pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Catalog at the default data root.
    pub fn open() -> Self {
        Self::at(DATA_DIR)
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Store { root: root.into() }
    }

    pub fn exam_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn images_dir(&self, name: &str) -> PathBuf {
        self.exam_dir(name).join("images")
    }

    /// Empty staging directory for an import's images. The live image
    /// directory stays untouched until [`Store::commit_images`], so a failed
    /// or empty import never destroys the exam it would have replaced.
    pub fn stage_images_dir(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        let dir = self.staging_dir(name);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("cannot clear {}", dir.display()))?;
        }
        fs::create_dir_all(&dir).with_context(|| format!("cannot create {}", dir.display()))?;
        Ok(dir)
    }

    /// Swap the staged images in as the exam's live image directory.
    pub fn commit_images(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let staged = self.staging_dir(name);
        let live = self.images_dir(name);
        if live.exists() {
            fs::remove_dir_all(&live)
                .with_context(|| format!("cannot clear {}", live.display()))?;
        }
        fs::rename(&staged, &live)
            .with_context(|| format!("cannot move {} into place", staged.display()))?;
        Ok(())
    }

    /// Drop a staged image directory without touching the live one.
    pub fn discard_staged_images(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let staged = self.staging_dir(name);
        if staged.exists() {
            fs::remove_dir_all(&staged)
                .with_context(|| format!("cannot remove {}", staged.display()))?;
        }
        Ok(())
    }

    fn staging_dir(&self, name: &str) -> PathBuf {
        self.exam_dir(name).join("images.tmp")
    }

    /// Persist the assembled sequence as the exam's single catalog document.
    /// Written to a temp file and renamed, so a concurrent reader sees either
    /// the old exam or the new one, never a torn write.
    pub fn save_exam(&self, name: &str, questions: Vec<QuestionRecord>) -> Result<ExamData> {
        validate_name(name)?;
        let dir = self.exam_dir(name);
        fs::create_dir_all(&dir).with_context(|| format!("cannot create {}", dir.display()))?;

        let data = ExamData {
            exam_name: name.to_string(),
            created_at: Utc::now(),
            question_count: questions.len(),
            questions,
        };
        let json = serde_json::to_string_pretty(&data)?;
        let tmp = dir.join(format!("{EXAM_FILE}.tmp"));
        fs::write(&tmp, json).with_context(|| format!("cannot write {}", tmp.display()))?;
        fs::rename(&tmp, dir.join(EXAM_FILE))?;
        Ok(data)
    }

    pub fn load_exam(&self, name: &str) -> Result<ExamData> {
        validate_name(name)?;
        let path = self.exam_dir(name).join(EXAM_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("no exam named '{name}' in {}", self.root.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("malformed exam document {}", path.display()))
    }

    /// Exam names in the catalog, sorted.
    pub fn list_exams(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("cannot read {}", self.root.display()))
            }
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() && entry.path().join(EXAM_FILE).is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Remove an exam and its images wholesale. Returns false if it did not
    /// exist.
    pub fn delete_exam(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        let dir = self.exam_dir(name);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).with_context(|| format!("cannot delete {}", dir.display()))?;
        Ok(true)
    }

    /// Number of saved image files for an exam.
    pub fn image_count(&self, name: &str) -> usize {
        fs::read_dir(self.images_dir(name))
            .map(|entries| entries.filter_map(|e| e.ok()).count())
            .unwrap_or(0)
    }
}

/// Exam names become directory names; keep them path-safe.
fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("exam name is empty");
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        bail!("exam name '{name}' contains path separators");
    }
    Ok(())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn record(topic: u32, question: u32) -> QuestionRecord {
        QuestionRecord {
            topic_index: topic,
            question_index: question,
            display_name: format!("Topic {topic} - Question {question}"),
            kind: QuestionKind::MultipleChoice,
            question_text: "text".into(),
            question_html: None,
            choices: BTreeMap::new(),
            correct_answer: None,
            suggested_answer: None,
            suggested_answer_html: None,
            discussion_html: None,
            ai_recommendation_html: None,
            ai_citations: Vec::new(),
            question_images: Vec::new(),
            answer_images: Vec::new(),
        }
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());
        store.save_exam("AZ-104", vec![record(1, 1), record(1, 2)]).unwrap();

        let loaded = store.load_exam("AZ-104").unwrap();
        assert_eq!(loaded.exam_name, "AZ-104");
        assert_eq!(loaded.question_count, 2);
        assert_eq!(loaded.questions[1].display_name, "Topic 1 - Question 2");
    }

    #[test]
    fn list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());
        store.save_exam("b-exam", vec![record(1, 1)]).unwrap();
        store.save_exam("a-exam", vec![record(1, 1)]).unwrap();
        assert_eq!(store.list_exams().unwrap(), vec!["a-exam", "b-exam"]);

        assert!(store.delete_exam("a-exam").unwrap());
        assert!(!store.delete_exam("a-exam").unwrap());
        assert_eq!(store.list_exams().unwrap(), vec!["b-exam"]);
    }

    #[test]
    fn resave_replaces_exam() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());
        store.save_exam("x", vec![record(1, 1), record(1, 2)]).unwrap();
        store.save_exam("x", vec![record(2, 1)]).unwrap();

        let loaded = store.load_exam("x").unwrap();
        assert_eq!(loaded.question_count, 1);
        assert_eq!(loaded.questions[0].topic_index, 2);
    }

    #[test]
    fn staged_images_go_live_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());
        let staged = store.stage_images_dir("x").unwrap();
        fs::write(staged.join("a.png"), b"a").unwrap();

        store.commit_images("x").unwrap();
        assert!(store.images_dir("x").join("a.png").is_file());
        assert_eq!(store.image_count("x"), 1);
    }

    #[test]
    fn live_images_survive_a_discarded_staging() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());
        let staged = store.stage_images_dir("x").unwrap();
        fs::write(staged.join("a.png"), b"a").unwrap();
        store.commit_images("x").unwrap();

        let staged = store.stage_images_dir("x").unwrap();
        fs::write(staged.join("b.png"), b"b").unwrap();
        store.discard_staged_images("x").unwrap();

        assert!(store.images_dir("x").join("a.png").is_file());
        assert!(!store.images_dir("x").join("b.png").exists());
        assert!(!store.exam_dir("x").join("images.tmp").exists());
    }

    #[test]
    fn restaging_clears_leftover_staging() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());
        let staged = store.stage_images_dir("x").unwrap();
        fs::write(staged.join("old.png"), b"old").unwrap();

        let staged = store.stage_images_dir("x").unwrap();
        assert_eq!(fs::read_dir(staged).unwrap().count(), 0);
    }

    #[test]
    fn unsafe_names_rejected() {
        let store = Store::at("unused");
        assert!(store.load_exam("../etc").is_err());
        assert!(store.save_exam("", Vec::new()).is_err());
    }
}
