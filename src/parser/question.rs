//! Question fragment extraction: question text/markup, answer choices, the
//! author's hidden correct marker, and image references.
//!
//! Choice markup changed shape several times over the life of the upstream
//! scraper, so parsing is an ordered list of format strategies; the first one
//! that yields any choices wins. No match means a descriptive item (HOTSPOT,
//! Hot Area, simulations) and is not an error.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::dedup;
use crate::parser::surgery;

static QUESTION_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.question").unwrap());
static CHOICE_ITEM_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.multi-choice-item").unwrap());
static LETTER_SPAN_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.multi-choice-letter").unwrap());
static OPTIONS_ITEM_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".options li").unwrap());
static IMG_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

static LEAD_LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Z])[.)]\s*(.+)$").unwrap());

pub type Choices = BTreeMap<String, String>;

#[derive(Debug, Default)]
pub struct QuestionExtract {
    /// Deduplicated plain text of the question body.
    pub text: String,
    /// Verbatim inner markup of the question container, for rich rendering.
    pub html: Option<String>,
    pub choices: Choices,
    /// Letter carried by the scrape's hidden "correct" marker, when present.
    pub correct: Option<String>,
    /// `img src` references inside the question container, in document order.
    pub image_refs: Vec<String>,
}

pub fn extract(html: &str) -> QuestionExtract {
    let doc = Html::parse_document(html);
    let container = doc.select(&QUESTION_SEL).next();

    let text = container
        .map(|el| dedup::dedup(&surgery::collapsed_text(el, "\n\n")))
        .unwrap_or_default();
    let rich = container
        .map(|el| el.inner_html().trim().to_string())
        .filter(|h| !h.is_empty());
    let image_refs = container.map(image_refs).unwrap_or_default();

    let (choices, correct) = parse_choices(&doc);

    QuestionExtract {
        text,
        html: rich,
        choices,
        correct,
        image_refs,
    }
}

pub fn image_refs(el: ElementRef) -> Vec<String> {
    el.select(&IMG_SEL)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| !src.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Choice formats ──

type ChoiceParse = (Choices, Option<String>);

/// Historical choice-list shapes, tried in order. A: per-item letter
/// attribute. B: letter in an inline label span. C: classed items with a bare
/// leading letter. D: a generic options container with plain list items.
const FORMATS: &[fn(&Html) -> ChoiceParse] = &[
    format_letter_attr,
    format_letter_span,
    format_bare_item,
    format_options_container,
];

fn parse_choices(doc: &Html) -> ChoiceParse {
    for format in FORMATS {
        let (choices, correct) = format(doc);
        if !choices.is_empty() {
            return (choices, correct);
        }
    }
    (Choices::new(), None)
}

fn is_correct_hidden(item: &ElementRef) -> bool {
    item.value().classes().any(|c| c == "correct-hidden")
}

/// Format A: `li.multi-choice-item > span.multi-choice-letter[data-choice-letter]`.
fn format_letter_attr(doc: &Html) -> ChoiceParse {
    let mut choices = Choices::new();
    let mut correct = None;
    for item in doc.select(&CHOICE_ITEM_SEL) {
        let Some(span) = item.select(&LETTER_SPAN_SEL).next() else {
            continue;
        };
        let Some(letter) = span.value().attr("data-choice-letter") else {
            continue;
        };
        let letter = letter.trim().to_string();
        if letter.is_empty() {
            continue;
        }
        let text = surgery::collapsed_text(item, " ")
            .replacen(&format!("{letter}."), "", 1)
            .trim()
            .to_string();
        if is_correct_hidden(&item) {
            correct = Some(letter.clone());
        }
        choices.insert(letter, text);
    }
    (choices, correct)
}

/// Format B: same items, but the letter is the label span's text content
/// ("A" or "A." spellings) instead of an attribute.
fn format_letter_span(doc: &Html) -> ChoiceParse {
    let mut choices = Choices::new();
    let mut correct = None;
    for item in doc.select(&CHOICE_ITEM_SEL) {
        let Some(span) = item.select(&LETTER_SPAN_SEL).next() else {
            continue;
        };
        let label = surgery::collapsed_text(span, " ");
        let letter = label.trim_end_matches('.').trim().to_string();
        if letter.len() != 1 || !letter.chars().all(|c| c.is_ascii_uppercase()) {
            continue;
        }
        let text = surgery::collapsed_text(item, " ")
            .replacen(&label, "", 1)
            .trim()
            .to_string();
        if is_correct_hidden(&item) {
            correct = Some(letter.clone());
        }
        choices.insert(letter, text);
    }
    (choices, correct)
}

/// Format C: classed items with no label element at all; the letter is baked
/// into the raw item text ("A. some choice").
fn format_bare_item(doc: &Html) -> ChoiceParse {
    let mut choices = Choices::new();
    let mut correct = None;
    for item in doc.select(&CHOICE_ITEM_SEL) {
        if item.select(&LETTER_SPAN_SEL).next().is_some() {
            continue;
        }
        let raw = surgery::collapsed_text(item, " ");
        let Some(caps) = LEAD_LETTER_RE.captures(&raw) else {
            continue;
        };
        let letter = caps[1].to_string();
        if is_correct_hidden(&item) {
            correct = Some(letter.clone());
        }
        choices.insert(letter, caps[2].trim().to_string());
    }
    (choices, correct)
}

/// Format D: fallback for the oldest pages, a generically-named options
/// container with plain list items and no choice classes anywhere.
fn format_options_container(doc: &Html) -> ChoiceParse {
    let mut choices = Choices::new();
    for item in doc.select(&OPTIONS_ITEM_SEL) {
        let raw = surgery::collapsed_text(item, " ");
        if let Some(caps) = LEAD_LETTER_RE.captures(&raw) {
            choices.insert(caps[1].to_string(), caps[2].trim().to_string());
        }
    }
    (choices, None)
}

// ── Tests ──
