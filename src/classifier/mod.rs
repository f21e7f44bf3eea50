// Classification: the LLM labeling stage and the local trained classifier.
//
// The labeling stage talks to any `CompletionClient`; production uses the
// OpenAI-compatible chat-completions client. Direct classification
// (`hatewatch classify`) goes through `TextClassifier`, backed by the
// ONNX export of the fine-tuned RoBERTa model.

pub mod labeler;
pub mod onnx;
pub mod openai;
pub mod prompt;
pub mod rate_limiter;
pub mod traits;

pub use traits::{Classification, CompletionClient, TextClassifier};
