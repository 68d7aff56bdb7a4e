//! Document-type classification: vocabulary, normalization and the model-backed classifier.

mod classifier;
pub mod types;

pub use classifier::{CLASSIFICATION_EXCERPT_CHARS, ClassificationMemo, Classifier};
pub use types::{DocumentType, KnownType, is_procurement_notice_part, normalize_text};
