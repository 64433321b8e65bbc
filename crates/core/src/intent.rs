use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::{LyraError, LyraResult};
use crate::models::Intent;

/// Priority order of the built-in groups. The first group with a hit wins,
/// regardless of how many keywords other groups match.
const BUILTIN_RULES: &[(Intent, &[&str])] = &[
    (
        Intent::Greeting,
        &[
            r"\b(hello|hi|hey|hiya|howdy|greetings|yo)\b",
            r"\bgood (morning|afternoon|evening)\b",
        ],
    ),
    (
        Intent::Sad,
        &[
            r"\b(sad|depressed|lonely|alone|unhappy|miserable|heartbroken|upset|down)\b",
            r"\b(cry|crying|cried|tears|grief|grieving|hopeless|empty|hurt|anxious)\b",
        ],
    ),
    (
        Intent::Happy,
        &[
            r"\b(happy|excited|grateful|thrilled|joy|joyful|amazing|wonderful|great)\b",
            r"\b(celebrate|celebrating|good news|blessed|proud)\b",
        ],
    ),
    (
        Intent::Love,
        &[
            r"\b(love|loving|relationship|partner|boyfriend|girlfriend|husband|wife)\b",
            r"\b(crush|dating|date|romance|romantic|soulmate|marriage|breakup|ex)\b",
        ],
    ),
    (
        Intent::Career,
        &[
            r"\b(career|work|working|job|jobs|boss|promotion|interview|office)\b",
            r"\b(colleague|coworker|business|project|hired|fired|resign)\b",
        ],
    ),
    (
        Intent::Money,
        &[
            r"\b(money|finance|finances|financial|salary|debt|rich|budget|rent|bills?)\b",
            r"\b(invest|investing|investment|savings|afford|income|paycheck)\b",
        ],
    ),
    (
        Intent::Health,
        &[
            r"\b(health|healthy|sick|ill|illness|tired|exhausted|sleep|insomnia)\b",
            r"\b(exercise|diet|stress|stressed|pain|doctor|energy|body|wellness)\b",
        ],
    ),
    (
        Intent::Question,
        &[
            r"\?",
            r"\b(what|why|how|when|where|who|which|should i|will i|can you|could you)\b",
        ],
    ),
];

static BUILTIN_CLASSIFIER: Lazy<RegexIntentClassifier> = Lazy::new(|| {
    let groups = BUILTIN_RULES
        .iter()
        .map(|(intent, patterns)| IntentGroup {
            intent: *intent,
            patterns: patterns
                .iter()
                .map(|pattern| Regex::new(pattern).expect("valid built-in intent regex"))
                .collect(),
        })
        .collect();
    RegexIntentClassifier { groups }
});

pub trait IntentClassifier: Send + Sync {
    fn classify(&self, message: &str) -> Intent;
}

#[derive(Debug, Clone)]
struct IntentGroup {
    intent: Intent,
    patterns: Vec<Regex>,
}

/// One entry of a rule file: `{ "intent": "sad", "patterns": ["\\bsad\\b"] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct IntentRule {
    pub intent: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RegexIntentClassifier {
    groups: Vec<IntentGroup>,
}

impl RegexIntentClassifier {
    pub fn builtin() -> Self {
        BUILTIN_CLASSIFIER.clone()
    }

    /// Rules keep the order they are given in; that order is the priority.
    pub fn from_rules(rules: Vec<IntentRule>) -> LyraResult<Self> {
        let mut groups = Vec::with_capacity(rules.len());
        for rule in rules {
            let intent = rule.intent.parse::<Intent>()?;
            let patterns = rule
                .patterns
                .iter()
                .map(|pattern| {
                    Regex::new(pattern).map_err(|source| LyraError::InvalidPattern {
                        intent: rule.intent.clone(),
                        source,
                    })
                })
                .collect::<LyraResult<Vec<_>>>()?;
            groups.push(IntentGroup { intent, patterns });
        }

        Ok(Self { groups })
    }

    pub fn from_json(raw: &str) -> LyraResult<Self> {
        let rules: Vec<IntentRule> = serde_json::from_str(raw)?;
        Self::from_rules(rules)
    }

    pub fn priority(&self) -> Vec<Intent> {
        self.groups.iter().map(|group| group.intent).collect()
    }
}

impl Default for RegexIntentClassifier {
    fn default() -> Self {
        Self::builtin()
    }
}

impl IntentClassifier for RegexIntentClassifier {
    fn classify(&self, message: &str) -> Intent {
        let lower = message.to_lowercase();

        self.groups
            .iter()
            .find(|group| group.patterns.iter().any(|pattern| pattern.is_match(&lower)))
            .map(|group| group.intent)
            .unwrap_or(Intent::Fallback)
    }
}

pub fn classify_intent(message: &str) -> Intent {
    BUILTIN_CLASSIFIER.classify(message)
}

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}
