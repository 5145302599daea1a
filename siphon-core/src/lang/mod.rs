//! Language detection and semantic field translation.

pub mod detect;
pub mod fields;

pub use detect::{detect_language, DetectionSource, LanguageDetection};
pub use fields::{aliases_for, categories, extract_field_by_category};
