//! Cross-site pattern transfer.

pub mod engine;
pub mod groups;
pub mod similarity;

pub use engine::{TransferEngine, TransferOutcome};
pub use groups::{group_of, DomainGroup};
pub use similarity::{score_similarity, SimilarityScore};
