//! Offline bundle generator: one exam in, one self-contained HTML document
//! out. Images are inlined as data URIs, rich fragments are embedded with
//! their `<img>` tags stripped, and the document carries its own navigation,
//! answer-reveal and progress logic so it works from a `file://` open with no
//! network at all.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use tracing::warn;

use crate::dedup;
use crate::parser::surgery;
use crate::store::{ExamData, QuestionRecord};

static SUGGESTED_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Suggested Answer:\s*").unwrap());

/// Download name for an exam's bundle.
pub fn bundle_file_name(exam_name: &str) -> String {
    format!("{}_offline.html", exam_name.replace(' ', "_"))
}

pub fn generate(exam: &ExamData, images_dir: &Path) -> Result<String> {
    let total = exam.questions.len();
    let mut body = String::new();
    for (i, record) in exam.questions.iter().enumerate() {
        render_question(&mut body, i, record, images_dir);
    }

    let title = surgery::escape(&exam.exam_name);
    let storage_key = serde_json::to_string(&format!("examforge:{}", exam.exam_name))?;
    let script = SCRIPT
        .replace("__TOTAL__", &total.to_string())
        .replace("__KEY__", &storage_key);

    let mut out = String::with_capacity(body.len() + STYLE.len() + script.len() + 1024);
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = write!(out, "<title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n");
    let _ = write!(
        out,
        "<header><h1>{title}</h1>\
         <div class=\"jump\">Question <input id=\"jump\" type=\"number\" min=\"1\" max=\"{total}\" value=\"1\"> of {total}</div>\
         </header>\n<main>\n{body}</main>\n"
    );
    let _ = write!(
        out,
        "<footer>\
         <button id=\"prev\"{}>&#8592; Previous</button>\
         <span id=\"pos\">1 / {total}</span>\
         <button id=\"next\"{}>Next &#8594;</button>\
         </footer>\n",
        disabled_attr(step(0, total, -1) == 0),
        disabled_attr(step(0, total, 1) == 0),
    );
    let _ = write!(out, "<script>{script}</script>\n</body>\n</html>\n");
    Ok(out)
}

/// Clamped navigation step: moving past either end stays put, no wraparound.
/// The embedded script applies the same arithmetic at runtime; this side
/// decides the initial disabled state of the prev/next affordances.
pub fn step(index: usize, total: usize, delta: i64) -> usize {
    if total == 0 {
        return 0;
    }
    (index as i64 + delta).clamp(0, total as i64 - 1) as usize
}

fn disabled_attr(disabled: bool) -> &'static str {
    if disabled {
        " disabled"
    } else {
        ""
    }
}

fn render_question(out: &mut String, index: usize, record: &QuestionRecord, images_dir: &Path) {
    let hidden = if index == 0 { "" } else { " hidden" };
    let _ = write!(out, "<section class=\"question\" id=\"q{index}\"{hidden}>\n");
    let _ = write!(out, "<h2>{}</h2>\n", surgery::escape(&record.display_name));

    // Stored text may predate the dedup heuristics; run them again here.
    let text = dedup::dedup(&record.question_text);
    out.push_str("<div class=\"question-text\">");
    for para in text.split("\n\n").filter(|p| !p.trim().is_empty()) {
        let _ = write!(out, "<p>{}</p>", surgery::escape(para.trim()));
    }
    out.push_str("</div>\n");

    render_images(out, "question-images", &record.question_images, images_dir);
    render_choices(out, record);
    render_answer_panel(out, record, images_dir);

    out.push_str("</section>\n");
}

fn render_choices(out: &mut String, record: &QuestionRecord) {
    if record.choices.is_empty() {
        return;
    }
    // One letter carries the highlight: the author-marked ground truth when
    // present, otherwise the community's suggested letter.
    let key_letter = record
        .correct_answer
        .clone()
        .or_else(|| record.suggested_answer.clone().filter(|s| s.len() == 1));

    out.push_str("<ul class=\"choices\">\n");
    for (letter, text) in &record.choices {
        let correct = key_letter.as_deref() == Some(letter.as_str());
        let _ = write!(
            out,
            "<li class=\"choice\" data-letter=\"{}\" data-correct=\"{}\"><span class=\"letter\">{}.</span> {}</li>\n",
            surgery::escape(letter),
            correct,
            surgery::escape(letter),
            surgery::escape(text),
        );
    }
    out.push_str("</ul>\n");
}

fn render_answer_panel(out: &mut String, record: &QuestionRecord, images_dir: &Path) {
    out.push_str("<button class=\"toggle\">Show answer</button>\n");
    out.push_str("<div class=\"answer-panel\" hidden>\n");

    out.push_str("<h3>Suggested Answer</h3>\n");
    let shown = record
        .suggested_answer
        .as_deref()
        .or(record.correct_answer.as_deref())
        .unwrap_or("See Discussion");
    let _ = write!(out, "<p class=\"suggested\">{}</p>\n", surgery::escape(shown));
    if let Some(html) = &record.suggested_answer_html {
        // The heading above already says "Suggested Answer"; drop the label
        // from the fragment and show images via the image blocks only.
        let stripped = surgery::strip_img_tags(html);
        let cleaned = SUGGESTED_LABEL_RE.replacen(&stripped, 1, "");
        let _ = write!(out, "<div class=\"fragment\">{cleaned}</div>\n");
    }

    render_images(out, "answer-images", &record.answer_images, images_dir);

    if let Some(html) = &record.discussion_html {
        out.push_str("<h3>Discussion Summary</h3>\n");
        let _ = write!(out, "<div class=\"fragment\">{}</div>\n", surgery::strip_img_tags(html));
    }
    if let Some(html) = &record.ai_recommendation_html {
        out.push_str("<h3>AI Recommendation</h3>\n");
        let _ = write!(out, "<div class=\"fragment\">{}</div>\n", surgery::strip_img_tags(html));
    }
    if !record.ai_citations.is_empty() {
        out.push_str("<h3>References</h3>\n<ul class=\"citations\">\n");
        for citation in &record.ai_citations {
            let _ = write!(out, "<li>{}</li>\n", surgery::escape(citation));
        }
        out.push_str("</ul>\n");
    }

    out.push_str("</div>\n");
}

fn render_images(out: &mut String, class: &str, names: &[String], images_dir: &Path) {
    let mut block = String::new();
    for name in names {
        if let Some(uri) = data_uri(images_dir, name) {
            let _ = write!(block, "<img src=\"{uri}\" alt=\"{}\">\n", surgery::escape(name));
        }
    }
    if !block.is_empty() {
        let _ = write!(out, "<div class=\"{class}\">\n{block}</div>\n");
    }
}

/// Inline a saved image as a data URI; unreadable files are skipped so one
/// missing image never fails the whole export.
fn data_uri(images_dir: &Path, name: &str) -> Option<String> {
    match fs::read(images_dir.join(name)) {
        Ok(bytes) => Some(format!("data:{};base64,{}", mime_for(name), STANDARD.encode(bytes))),
        Err(err) => {
            warn!(image = %name, %err, "skipping unreadable image");
            None
        }
    }
}

fn mime_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        // .jpg/.jpeg and anything unrecognized
        _ => "image/jpeg",
    }
}

const STYLE: &str = "\
body{font-family:sans-serif;max-width:860px;margin:0 auto;padding:0 16px;color:#262730}\
header{display:flex;justify-content:space-between;align-items:center;border-bottom:2px solid #1f77b4}\
h1{color:#1f77b4}\
section.question{padding:16px 0}\
.question-text p{line-height:1.5}\
.question-images img,.answer-images img{max-width:100%;display:block;margin:8px 0}\
ul.choices{list-style:none;padding:0}\
.choice{padding:8px 12px;margin:4px 0;border:1px solid #ccc;border-radius:6px;cursor:pointer}\
.choice.picked-right,.choice.reveal-right{background:#d4edda;border-color:#28a745}\
.choice.picked-wrong{background:#f8d7da;border-color:#dc3545}\
.answer-panel{border:2px solid #1f77b4;border-radius:10px;padding:12px;margin-top:12px;background:#f7fbff}\
button{padding:8px 16px;border:1px solid #1f77b4;border-radius:6px;background:#fff;cursor:pointer}\
button:disabled{opacity:.4;cursor:default}\
footer{display:flex;justify-content:space-between;align-items:center;padding:16px 0;border-top:1px solid #ccc}\
.jump input{width:4em}";

const SCRIPT: &str = r#"
'use strict';
const TOTAL = __TOTAL__;
const KEY = __KEY__;
let state = { index: 0, picks: {} };
let answerShown = false;

try {
  const raw = localStorage.getItem(KEY);
  if (raw) {
    const saved = JSON.parse(raw);
    if (saved && typeof saved.index === 'number') state.index = saved.index;
    if (saved && typeof saved.picks === 'object' && saved.picks) state.picks = saved.picks;
  }
} catch (e) { /* corrupted or unavailable storage: start fresh */ }
if (!(Number.isInteger(state.index) && state.index >= 0 && state.index < TOTAL)) state.index = 0;

function save() {
  try { localStorage.setItem(KEY, JSON.stringify(state)); } catch (e) {}
}
function section(i) { return document.getElementById('q' + i); }
function panel(i) { return section(i).querySelector('.answer-panel'); }
function setShown(shown) {
  answerShown = shown;
  panel(state.index).hidden = !shown;
  section(state.index).querySelector('.toggle').textContent = shown ? 'Hide answer' : 'Show answer';
}
function show(i) {
  state.index = Math.min(Math.max(i, 0), TOTAL - 1);
  for (let j = 0; j < TOTAL; j++) section(j).hidden = j !== state.index;
  setShown(false);
  applyPick();
  document.getElementById('prev').disabled = state.index === 0;
  document.getElementById('next').disabled = state.index === TOTAL - 1;
  document.getElementById('pos').textContent = (state.index + 1) + ' / ' + TOTAL;
  document.getElementById('jump').value = state.index + 1;
  save();
}
function next() { if (state.index < TOTAL - 1) show(state.index + 1); }
function prev() { if (state.index > 0) show(state.index - 1); }
function toggle() { setShown(!answerShown); }
function mark(li) {
  const choices = section(state.index).querySelectorAll('.choice');
  choices.forEach(c => c.classList.remove('picked-right', 'picked-wrong', 'reveal-right'));
  if (!li) return;
  if (li.dataset.correct === 'true') {
    li.classList.add('picked-right');
  } else {
    li.classList.add('picked-wrong');
    const right = section(state.index).querySelector('.choice[data-correct="true"]');
    if (right) right.classList.add('reveal-right');
  }
}
function applyPick() {
  const letter = state.picks[state.index];
  const li = letter
    ? section(state.index).querySelector('.choice[data-letter="' + letter + '"]')
    : null;
  mark(li);
}
function pick(li) {
  state.picks[state.index] = li.dataset.letter;
  mark(li);
  save();
  if (!answerShown) setTimeout(() => { if (!answerShown) setShown(true); }, 600);
}

if (TOTAL > 0) {
  document.getElementById('prev').addEventListener('click', prev);
  document.getElementById('next').addEventListener('click', next);
  document.getElementById('jump').addEventListener('change', e => {
    const k = parseInt(e.target.value, 10);
    if (k >= 1 && k <= TOTAL) show(k - 1);
  });
  document.querySelectorAll('.toggle').forEach(b => b.addEventListener('click', toggle));
  document.querySelectorAll('.choice').forEach(li => li.addEventListener('click', () => pick(li)));
  document.addEventListener('keydown', e => {
    if (e.key === 'ArrowRight') next();
    else if (e.key === 'ArrowLeft') prev();
    else if (e.key === ' ') { e.preventDefault(); toggle(); }
  });
  show(state.index);
}
"#;

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::QuestionKind;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn record() -> QuestionRecord {
        let mut choices = BTreeMap::new();
        choices.insert("A".to_string(), "First".to_string());
        choices.insert("B".to_string(), "Second".to_string());
        QuestionRecord {
            topic_index: 1,
            question_index: 1,
            display_name: "Topic 1 - Question 1".to_string(),
            kind: QuestionKind::MultipleChoice,
            question_text: "Pick one.".to_string(),
            question_html: None,
            choices,
            correct_answer: Some("B".to_string()),
            suggested_answer: Some("B".to_string()),
            suggested_answer_html: Some("<p>Suggested Answer: B is right</p>".to_string()),
            discussion_html: Some("<p>Voters agree.</p>".to_string()),
            ai_recommendation_html: Some(
                r#"<p>B.</p><img src="https://cdn.example.com/x.png">"#.to_string(),
            ),
            ai_citations: vec!["https://learn.example.com/a".to_string()],
            question_images: vec!["topic_1_question_1_image_0.png".to_string()],
            answer_images: Vec::new(),
        }
    }

    fn exam(questions: Vec<QuestionRecord>) -> ExamData {
        ExamData {
            exam_name: "AZ 104".to_string(),
            created_at: Utc::now(),
            question_count: questions.len(),
            questions,
        }
    }

    #[test]
    fn step_clamps_at_both_ends() {
        assert_eq!(step(0, 5, -1), 0);
        assert_eq!(step(4, 5, 1), 4);
        assert_eq!(step(2, 5, 1), 3);
        assert_eq!(step(2, 5, -1), 1);
        assert_eq!(step(0, 0, 1), 0);
    }

    #[test]
    fn file_name_replaces_spaces() {
        assert_eq!(bundle_file_name("AZ 104 Admin"), "AZ_104_Admin_offline.html");
    }

    #[test]
    fn mime_lookup() {
        assert_eq!(mime_for("a.png"), "image/png");
        assert_eq!(mime_for("a.JPG"), "image/jpeg");
        assert_eq!(mime_for("a.jpeg"), "image/jpeg");
        assert_eq!(mime_for("a.webp"), "image/webp");
        assert_eq!(mime_for("a.gif"), "image/gif");
        assert_eq!(mime_for("a.bin"), "image/jpeg");
    }

    #[test]
    fn bundle_is_self_contained() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("topic_1_question_1_image_0.png"), [1, 2, 3]).unwrap();

        let html = generate(&exam(vec![record()]), dir.path()).unwrap();
        // Every image is an inline data URI; the CDN img from the rich
        // fragment was stripped.
        for (pos, _) in html.match_indices("<img") {
            assert_eq!(&html[pos..pos + 15], "<img src=\"data:");
        }
        assert!(!html.contains("cdn.example.com"));
        assert!(html.contains("data:image/png;base64,"));
    }

    #[test]
    fn choice_tagged_with_correct_letter() {
        let dir = tempfile::tempdir().unwrap();
        let html = generate(&exam(vec![record()]), dir.path()).unwrap();
        assert!(html.contains(r#"data-letter="B" data-correct="true""#));
        assert!(html.contains(r#"data-letter="A" data-correct="false""#));
    }

    #[test]
    fn suggested_label_removed_from_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let html = generate(&exam(vec![record()]), dir.path()).unwrap();
        assert!(html.contains("<p>B is right</p>"));
    }

    #[test]
    fn missing_image_degrades_gracefully() {
        let dir = tempfile::tempdir().unwrap();
        // Image file never written.
        let html = generate(&exam(vec![record()]), dir.path()).unwrap();
        // No image block is emitted (the stylesheet still names the class).
        assert!(!html.contains(r#"<div class="question-images">"#));
        assert!(html.contains("Topic 1 - Question 1"));
    }

    #[test]
    fn initial_nav_state_respects_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let html = generate(&exam(vec![record()]), dir.path()).unwrap();
        // Single question: both affordances start disabled.
        assert!(html.contains(r#"<button id="prev" disabled>"#));
        assert!(html.contains(r#"<button id="next" disabled>"#));

        let two = generate(&exam(vec![record(), record()]), dir.path()).unwrap();
        assert!(two.contains(r#"<button id="prev" disabled>"#));
        assert!(two.contains(r#"<button id="next">"#));
    }

    #[test]
    fn progress_key_is_per_exam() {
        let dir = tempfile::tempdir().unwrap();
        let html = generate(&exam(vec![record()]), dir.path()).unwrap();
        assert!(html.contains(r#"const KEY = "examforge:AZ 104";"#));
    }
}
