//! Approximate nearest-neighbor search over embeddings

pub mod index;

pub use index::{cosine_similarity, CosineDistance, VectorError, VectorHit, VectorIndex, VectorResult};
