//! Market matching for the paper-arb engine.
//!
//! This crate turns free-form market questions into matchable features and
//! clusters: normalization, threshold/entity/expiry extraction,
//! fingerprints, title similarity (lexical or semantic), duplicate pairing,
//! and related-market grouping with optional external verification.

pub mod extract;
pub mod fingerprint;
pub mod grouping;
pub mod normalize;
pub mod similarity;
pub mod verify;

pub use extract::{extract_entity, extract_expiry, extract_threshold};
pub use fingerprint::Fingerprint;
pub use grouping::{cluster_duplicates, group_related};
pub use normalize::{normalize_text, stable_key, tokenize};
pub use similarity::{lexical_similarity, EmbeddingBackend, SimilarityScorer};
pub use verify::{verify_groups, GroupVerifier};
