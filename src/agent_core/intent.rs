//! Intent classification for the latest user message.
//!
//! The keyword classifier is the default: deterministic, no I/O. The model
//! strategy asks the language model for a single category name and falls
//! back to keywords on any failure, so classification never errors.

use serde::Deserialize;

use crate::inference::types::{ChatMessage, Role, SamplingOverrides};
use crate::inference::ChatModel;

use super::types::IntentCategory;

const HEATING_KEYWORDS: &[&str] = &[
    "boiler",
    "radiator",
    "heating",
    "thermostat",
    "hot water",
    "pilot light",
    "central heating",
    "temperature",
    "warm",
    "cold",
    "freezing",
];

const DAMP_KEYWORDS: &[&str] = &[
    "damp",
    "mold",
    "mould",
    "condensation",
    "moisture",
    "wet",
    "leak stain",
    "black spots",
    "musty",
];

const REPAIRS_KEYWORDS: &[&str] = &[
    "tap",
    "pipe",
    "leak",
    "broken",
    "crack",
    "window",
    "door",
    "electric",
    "socket",
    "fuse",
    "roof",
    "brick",
    "paint",
    "plumbing",
    "toilet",
];

/// Checked in this order; the first category with a hit wins.
const KEYWORD_TABLE: &[(IntentCategory, &[&str])] = &[
    (IntentCategory::Heating, HEATING_KEYWORDS),
    (IntentCategory::Damp, DAMP_KEYWORDS),
    (IntentCategory::Repairs, REPAIRS_KEYWORDS),
];

const CLASSIFIER_PROMPT: &str = "Classify the user message into EXACTLY ONE category:
- heating: boiler errors, radiator issues, temperature, heating problems
- damp: damp, mold, mould, condensation, moisture, wet issues
- repairs: broken taps/pipes, cracked windows, electrical faults, doors, brickwork, roofing, painting
- general: other housing issues

Answer with ONLY the category name in lowercase, nothing else.";

/// How the turn's intent is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStrategy {
    #[default]
    Keyword,
    Model,
}

impl IntentStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Model => "model",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntentClassifier {
    strategy: IntentStrategy,
}

impl IntentClassifier {
    pub fn new(strategy: IntentStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> IntentStrategy {
        self.strategy
    }

    /// Classify the conversation by its latest user message.
    pub async fn classify(&self, messages: &[ChatMessage], model: &dyn ChatModel) -> IntentCategory {
        match self.strategy {
            IntentStrategy::Keyword => classify_messages(messages),
            IntentStrategy::Model => classify_with_model(messages, model).await,
        }
    }
}

/// Keyword classification of the latest user message; `General` when there
/// is none or nothing matches.
pub fn classify_messages(messages: &[ChatMessage]) -> IntentCategory {
    latest_user_text(messages)
        .map(classify_text)
        .unwrap_or(IntentCategory::General)
}

/// Keyword classification of a single piece of text.
pub fn classify_text(text: &str) -> IntentCategory {
    let words = tokenize(text);
    KEYWORD_TABLE
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| contains_phrase(&words, kw)))
        .map(|(category, _)| *category)
        .unwrap_or(IntentCategory::General)
}

async fn classify_with_model(messages: &[ChatMessage], model: &dyn ChatModel) -> IntentCategory {
    let Some(latest) = latest_user_text(messages) else {
        return IntentCategory::General;
    };

    let request = vec![
        ChatMessage::system(CLASSIFIER_PROMPT),
        ChatMessage::user(latest),
    ];
    let sampling = SamplingOverrides {
        temperature: Some(0.0),
        top_p: None,
        max_tokens: Some(5),
    };

    match model.complete(request, None, sampling).await {
        Ok(response) => {
            let raw = response.content.unwrap_or_default();
            match IntentCategory::parse(&raw) {
                Some(category) => category,
                None => {
                    let fallback = classify_text(latest);
                    tracing::debug!(answer = %raw, %fallback, "model intent unrecognized, using keywords");
                    fallback
                }
            }
        }
        Err(e) => {
            let fallback = classify_text(latest);
            tracing::warn!(error = %e, %fallback, "intent model call failed, using keywords");
            fallback
        }
    }
}

fn latest_user_text(messages: &[ChatMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.text_content())
}

/// Lowercased alphanumeric words. Apostrophes are dropped so "boiler's"
/// yields "boilers" rather than splitting.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace(['\'', '\u{2019}'], "")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Word-boundary match of a (possibly multi-word) keyword. A keyword also
/// matches its simple plural ("radiators", "taps", "pipes").
fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let parts: Vec<&str> = phrase.split_whitespace().collect();
    if parts.is_empty() || parts.len() > words.len() {
        return false;
    }
    words.windows(parts.len()).any(|window| {
        window
            .iter()
            .zip(&parts)
            .enumerate()
            .all(|(i, (word, part))| {
                word == part
                    || (i == parts.len() - 1
                        && (word.strip_suffix('s') == Some(part)
                            || word.strip_suffix("es") == Some(part)))
            })
    })
}
