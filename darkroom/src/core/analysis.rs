use async_trait::async_trait;
use bincode::{Decode, Encode};
use std::collections::HashSet;
use thiserror::Error;

const MAX_DESCRIPTION_WORDS: usize = 200;
const MAX_TAG_CHARS: usize = 50;
const MAX_EXTRACTED_TAGS: usize = 5;
const STOP_WORDS: [&str; 12] = [
    "this", "that", "with", "from", "they", "have", "been", "were", "will", "would", "could",
    "should",
];

/// Payload of an analysis job: where the analyzer can fetch the artifact from.
#[derive(Encode, Decode, Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPayload {
    pub locator: String,
}

impl AnalysisPayload {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
        }
    }
}

/// Descriptive metadata produced for an artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub description: String,
    pub category: String,
    /// In `[0, 1]` once normalized.
    pub confidence: f32,
    pub tags: Vec<String>,
}

impl Analysis {
    /// Clean up whatever the analyzer returned so it is safe to store.
    ///
    /// Blank fields get placeholders, confidence is clamped, the description is capped at 200
    /// words and, when the analyzer produced no tags, a handful are pulled out of the description.
    pub fn normalized(self) -> Self {
        let description = match self.description.trim() {
            "" => String::from("Unable to generate description"),
            text => truncate_words(text, MAX_DESCRIPTION_WORDS),
        };
        let category = match self.category.trim() {
            "" => String::from("Uncategorized"),
            label => label.to_string(),
        };
        let confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.5
        };
        let mut tags = clean_tags(self.tags);
        if tags.is_empty() {
            tags = extract_tags(&description);
        }
        Self {
            description,
            category,
            confidence,
            tags,
        }
    }
}

fn truncate_words(text: &str, limit: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= limit {
        text.to_string()
    } else {
        words[..limit].join(" ")
    }
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|tag| tag.trim().chars().take(MAX_TAG_CHARS).collect::<String>())
        .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
        .collect()
}

/// Pick up to five meaningful words out of a description.
pub fn extract_tags(description: &str) -> Vec<String> {
    let cleaned: String = description
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_whitespace())
        .collect();
    cleaned
        .split_whitespace()
        .filter(|word| word.len() > 3 && !STOP_WORDS.contains(word))
        .take(MAX_EXTRACTED_TAGS)
        .map(String::from)
        .collect()
}

/// The content analysis capability. Implementations usually wrap a remote model.
///
/// ## Example
/// ```rust,ignore
/// use darkroom::prelude::{Analysis, AnalysisError, Analyzer};
///
/// struct Fixed;
///
/// #[async_trait::async_trait]
/// impl Analyzer for Fixed {
///     async fn analyze(&self, _locator: &str) -> Result<Analysis, AnalysisError> {
///         Ok(Analysis {
///             description: "A red bicycle leaning against a brick wall".into(),
///             category: "vehicle".into(),
///             confidence: 0.9,
///             tags: vec![],
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze the artifact found at `locator`.
    async fn analyze(&self, locator: &str) -> Result<Analysis, AnalysisError>;
}

#[async_trait]
impl<A> Analyzer for std::sync::Arc<A>
where
    A: Analyzer + ?Sized,
{
    async fn analyze(&self, locator: &str) -> Result<Analysis, AnalysisError> {
        (**self).analyze(locator).await
    }
}

/// Why an analysis attempt failed. Every variant is considered transient by the dispatcher.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to reach the analysis service: {0}")]
    Transport(String),
    #[error("Analysis service returned an unusable response: {0}")]
    InvalidResponse(String),
    #[error("Analysis service rejected the request: {0}")]
    Rejected(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
