// Classifier traits: the seams between the labeling stage and whatever
// answers the question "is this cyberhate?".
//
// `CompletionClient` is the raw text-completion capability the labeling
// stage prompts. `TextClassifier` is the direct scoring path used by
// `hatewatch classify`, backed by the trained model artifact.

use anyhow::Result;
use async_trait::async_trait;

use crate::db::models::Label;

/// A text-completion API that takes one prompt and returns one completion.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Return the raw completion text. Callers do their own parsing.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Output of a direct classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: Label,
    /// Posterior probability of the chosen label (0.5..=1.0 for two classes).
    pub confidence: f64,
}

#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification>;
}
