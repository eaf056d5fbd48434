//! One assembly pass: folder map in, ordered `QuestionRecord` sequence out.
//! Folders that fail classification or lack a fragment document are skipped
//! silently; undecodable fragment bytes abort the whole batch.

use std::fs;
use std::path::Path;
use std::str;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use tracing::debug;

use crate::parser::{self, classify};
use crate::store::{QuestionKind, QuestionRecord};
use crate::unpack::FolderMap;

/// Fixed per-folder file names, by contract with the upstream scraper.
pub const QUESTION_FILE: &str = "summary_question.html";
pub const ANSWER_FILE: &str = "summary_discussion_ai.html";

static IMAGE_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^image_\d+\.(?:png|jpe?g)$").unwrap());

/// Process every folder in the batch and return the records sorted by
/// `(topic_index, question_index)`. An empty result is valid and reportable,
/// not an error. Image payloads are written under `images_dir`, prefixed
/// with the folder name to avoid collisions across folders.
pub fn assemble(folders: &FolderMap, images_dir: &Path) -> Result<Vec<QuestionRecord>> {
    let pb = ProgressBar::new(folders.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut records = Vec::new();
    for (folder_name, files) in folders {
        pb.inc(1);
        let Some(key) = classify::classify(folder_name) else {
            debug!(folder = %folder_name, "folder name does not match pattern, skipping");
            continue;
        };

        let question_html = decode(files.get(QUESTION_FILE), folder_name, QUESTION_FILE)?;
        let answer_html = decode(files.get(ANSWER_FILE), folder_name, ANSWER_FILE)?;
        let extract = parser::parse_fragments(question_html, answer_html);

        let mut saved = Vec::new();
        for (file_name, bytes) in files {
            if !IMAGE_FILE_RE.is_match(file_name) {
                continue;
            }
            let saved_name = format!("{folder_name}_{file_name}");
            let path = images_dir.join(&saved_name);
            fs::write(&path, bytes)
                .with_context(|| format!("cannot save image {}", path.display()))?;
            saved.push(saved_name);
        }

        records.push(build_record(key, extract, &saved));
    }
    pb.finish_and_clear();

    records.sort_by_key(|r| (r.topic_index, r.question_index));
    Ok(records)
}

/// Fragment bytes must be UTF-8 text; anything else is a fatal batch error
/// (the caller reports it and retries with different input).
fn decode<'a>(
    bytes: Option<&'a Vec<u8>>,
    folder: &str,
    file: &str,
) -> Result<Option<&'a str>> {
    match bytes {
        Some(bytes) => {
            let text = str::from_utf8(bytes)
                .with_context(|| format!("{folder}/{file} is not valid UTF-8 text"))?;
            Ok(Some(text))
        }
        None => Ok(None),
    }
}

fn build_record(
    key: classify::FolderKey,
    extract: parser::FolderExtract,
    saved_images: &[String],
) -> QuestionRecord {
    let q = extract.question.unwrap_or_default();
    let a = extract.answer;

    let (question_images, answer_images) = partition_images(
        saved_images,
        &q.image_refs,
        a.as_ref().map(|a| a.image_refs.as_slice()).unwrap_or(&[]),
    );

    let kind = if q.choices.is_empty() {
        QuestionKind::Descriptive
    } else {
        QuestionKind::MultipleChoice
    };

    let (suggested, suggested_html, discussion_html, ai_html, citations) = match a {
        Some(a) => (
            Some(a.suggested),
            a.answer_html,
            a.discussion_html,
            a.ai_html,
            a.citations,
        ),
        None => (None, None, None, None, Vec::new()),
    };

    QuestionRecord {
        topic_index: key.topic,
        question_index: key.question,
        display_name: key.display_name(),
        kind,
        question_text: q.text,
        question_html: q.html,
        choices: q.choices,
        correct_answer: q.correct,
        suggested_answer: suggested,
        suggested_answer_html: suggested_html,
        discussion_html,
        ai_recommendation_html: ai_html,
        ai_citations: citations,
        question_images,
        answer_images,
    }
}

/// Assign each saved image to the question and/or answer bucket by substring
/// matching against the fragments' `src` reference lists. With no answer-side
/// references everything stays on the question side (single-image legacy
/// behavior), and an image matching neither list defaults to the question.
fn partition_images(
    saved: &[String],
    question_refs: &[String],
    answer_refs: &[String],
) -> (Vec<String>, Vec<String>) {
    let matches = |name: &str, refs: &[String]| {
        refs.iter()
            .map(|r| ref_base(r))
            .any(|r| !r.is_empty() && name.contains(r))
    };

    let mut question_images = Vec::new();
    let mut answer_images = Vec::new();
    for name in saved {
        let question_hit = matches(name, question_refs);
        let answer_hit = matches(name, answer_refs);
        if question_hit || answer_refs.is_empty() || !answer_hit {
            question_images.push(name.clone());
        }
        if answer_hit {
            answer_images.push(name.clone());
        }
    }
    (question_images, answer_images)
}

/// Trailing path segment of an `src` reference, query string dropped, so
/// `images/image_0.png?v=2` still matches the saved file name.
fn ref_base(reference: &str) -> &str {
    let reference = reference.split(['?', '#']).next().unwrap_or(reference);
    reference.rsplit('/').next().unwrap_or(reference)
}

// ── Tests ──
