//! Property graph of passages, entity nodes, and concepts
//!
//! The graph holds `Passage`, `Node`, and `Concept` vertices connected by
//! `RELATES`, `MENTIONS`, and `HAS_CONCEPT` edges. The analyzer treats the
//! store as read-only; population happens in the external ingestion
//! pipeline.

pub mod concept;
pub mod edge;
pub mod fulltext;
pub mod node;
pub mod passage;
pub mod store;
pub mod types;

pub use concept::{normalize_concept_text, Concept};
pub use edge::Relation;
pub use fulltext::{is_stopword, tokenize, FulltextIndex};
pub use node::Node;
pub use passage::Passage;
pub use store::{CorpusSnapshot, GraphError, GraphResult, GraphStats, GraphStore, MemoryGraph};
pub use types::{ConceptId, Label, NodeId, PassageId, RelationType};
