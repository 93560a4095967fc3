//! Vector index over passage and concept embeddings
//!
//! HNSW (via hnsw_rs) generates candidates; an exact cosine pass over the
//! candidate set produces the final ranking so that top-k results are
//! deterministic for a fixed index state, with ties broken by id
//! ascending.

use hnsw_rs::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Vector index errors
#[derive(Error, Debug)]
pub enum VectorError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("index error: {0}")]
    IndexError(String),
}

pub type VectorResult<T> = Result<T, VectorError>;

/// A scored hit from the index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    pub id: u64,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Cosine similarity between two equal-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Cosine distance implementation for hnsw_rs
#[derive(Clone, Copy, Debug, Default)]
pub struct CosineDistance;

impl Distance<f32> for CosineDistance {
    fn eval(&self, va: &[f32], vb: &[f32]) -> f32 {
        1.0 - cosine_similarity(va, vb)
    }
}

/// ANN index with exact rescoring
pub struct VectorIndex {
    dimension: usize,
    hnsw: Hnsw<'static, f32, CosineDistance>,
    /// Exact vectors keyed by stable id; also the source of truth for
    /// `get` and filtered search
    points: BTreeMap<u64, Vec<f32>>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimension", &self.dimension)
            .field("points", &self.points.len())
            .finish()
    }
}

impl VectorIndex {
    /// Create a new index for vectors of the given dimension
    pub fn new(dimension: usize) -> Self {
        let max_elements = 100_000;
        let m = 16;
        let ef_construction = 200;

        let hnsw = Hnsw::new(m, max_elements, 16, ef_construction, CosineDistance);

        Self {
            dimension,
            hnsw,
            points: BTreeMap::new(),
        }
    }

    /// Dimension all stored vectors must share
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Insert or replace the vector stored under `id` (ingestion only)
    pub fn upsert(&mut self, id: u64, vector: Vec<f32>) -> VectorResult<()> {
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }

        self.hnsw.insert((&vector, id as usize));
        self.points.insert(id, vector);
        Ok(())
    }

    /// Exact vector stored under `id`
    pub fn get(&self, id: u64) -> Option<&[f32]> {
        self.points.get(&id).map(Vec::as_slice)
    }

    /// Top-k by cosine similarity; ties break by id ascending
    pub fn search(&self, query: &[f32], k: usize) -> VectorResult<Vec<VectorHit>> {
        self.check_query(query)?;
        if k == 0 || self.points.is_empty() {
            return Ok(Vec::new());
        }

        // Over-fetch from HNSW, then rescore exactly against the stored
        // vectors. Replaced vectors keep stale HNSW entries; the rescore
        // pass reads only `points`, so results stay correct.
        let fetch = (k * 4).max(16).min(self.points.len() * 2);
        let ef_search = fetch.max(2 * k);
        let neighbours = self.hnsw.search(query, fetch, ef_search);

        let mut candidate_ids: BTreeSet<u64> = neighbours.iter().map(|n| n.d_id as u64).collect();
        // small corpora: rescoring everything costs nothing and protects
        // recall
        if self.points.len() <= fetch {
            candidate_ids.extend(self.points.keys().copied());
        }

        let mut hits: Vec<VectorHit> = candidate_ids
            .into_iter()
            .filter_map(|id| {
                self.points.get(&id).map(|v| VectorHit {
                    id,
                    score: cosine_similarity(query, v),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Top-k restricted to the given id set (exact scan over the filter)
    pub fn search_filtered(&self, query: &[f32], k: usize, allow: &BTreeSet<u64>) -> VectorResult<Vec<VectorHit>> {
        self.check_query(query)?;
        if k == 0 || allow.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<VectorHit> = allow
            .iter()
            .filter_map(|id| {
                self.points.get(id).map(|v| VectorHit {
                    id: *id,
                    score: cosine_similarity(query, v),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    fn check_query(&self, query: &[f32]) -> VectorResult<()> {
        if query.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_and_search() {
        let mut index = VectorIndex::new(3);
        index.upsert(1, vec![1.0, 0.0, 0.0]).unwrap();
        index.upsert(2, vec![0.0, 1.0, 0.0]).unwrap();
        index.upsert(3, vec![0.0, 0.1, 0.9]).unwrap();

        let results = index.search(&[1.0, 0.1, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);
    }

    #[test]
    fn test_dimension_checked_on_upsert() {
        let mut index = VectorIndex::new(3);
        let err = index.upsert(1, vec![1.0, 0.0]).unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { expected: 3, got: 2 }));
    }

    #[test]
    fn test_ties_break_by_id_ascending() {
        let mut index = VectorIndex::new(2);
        index.upsert(9, vec![1.0, 0.0]).unwrap();
        index.upsert(4, vec![1.0, 0.0]).unwrap();
        index.upsert(7, vec![0.0, 1.0]).unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(results[0].id, 4);
        assert_eq!(results[1].id, 9);
        assert_eq!(results[2].id, 7);
    }

    #[test]
    fn test_deterministic_given_same_state() {
        let mut index = VectorIndex::new(4);
        for i in 0..50u64 {
            let f = i as f32;
            index.upsert(i, vec![f.sin(), f.cos(), (f * 0.5).sin(), 1.0]).unwrap();
        }

        let query = [0.3, 0.7, 0.1, 0.5];
        let first = index.search(&query, 10).unwrap();
        let second = index.search(&query, 10).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_filtered_search() {
        let mut index = VectorIndex::new(2);
        index.upsert(1, vec![1.0, 0.0]).unwrap();
        index.upsert(2, vec![0.9, 0.1]).unwrap();
        index.upsert(3, vec![0.0, 1.0]).unwrap();

        let allow: BTreeSet<u64> = [2, 3].into_iter().collect();
        let results = index.search_filtered(&[1.0, 0.0], 2, &allow).unwrap();
        assert_eq!(results[0].id, 2);
        assert_eq!(results[1].id, 3);
    }

    #[test]
    fn test_upsert_replaces_vector() {
        let mut index = VectorIndex::new(2);
        index.upsert(1, vec![1.0, 0.0]).unwrap();
        index.upsert(1, vec![0.0, 1.0]).unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.get(1), Some(&[0.0, 1.0][..]));

        let results = index.search(&[0.0, 1.0], 1).unwrap();
        assert_eq!(results[0].id, 1);
        assert!(results[0].score > 0.99);
    }
}
