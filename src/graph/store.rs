//! Knowledge-graph store: trait contract and in-memory implementation
//!
//! The analyzer only ever reads from the store. Write operations exist for
//! the external ingestion pipeline (and tests) that populate the graph.

use super::concept::{normalize_concept_text, Concept};
use super::edge::Relation;
use super::fulltext::FulltextIndex;
use super::node::Node;
use super::passage::Passage;
use super::types::{ConceptId, Label, NodeId, PassageId, RelationType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;
use thiserror::Error;
use tracing::info;

/// Errors that can occur during graph operations
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    #[error("passage {0} not found")]
    PassageNotFound(PassageId),

    #[error("invalid traversal depth {0}, maximum is 2")]
    InvalidDepth(u8),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Corpus-level counts for operational endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub passages: usize,
    pub nodes: usize,
    pub concepts: usize,
    pub relations: usize,
}

/// Read contract required by the retrievers
///
/// Every operation observes a read-consistent snapshot. Implementations
/// backed by a remote engine surface connection loss as
/// [`GraphError::StoreUnavailable`]; callers retry with exponential
/// backoff.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Full-text search over node names and labels
    async fn fulltext_node_search(&self, query: &str, k: usize) -> GraphResult<Vec<(Node, f32)>>;

    /// Full-text search over passage texts
    async fn fulltext_passage_search(&self, query: &str, k: usize) -> GraphResult<Vec<(Passage, f32)>>;

    /// Nodes reachable from `node_id` within `depth` hops (depth ≤ 2),
    /// optionally restricted to one relation type. The start node is not
    /// included; visited ids are deduplicated.
    async fn neighbors(&self, node_id: NodeId, depth: u8, type_filter: Option<&RelationType>) -> GraphResult<Vec<Node>>;

    /// Passages mentioning the given node (MENTIONS edges)
    async fn passages_for_node(&self, node_id: NodeId) -> GraphResult<Vec<Passage>>;

    /// Concept vertices whose normalized text matches the given text
    async fn concepts_for_text(&self, text: &str) -> GraphResult<Vec<Concept>>;

    /// Nodes attached to a concept via HAS_CONCEPT edges
    async fn nodes_for_concept(&self, concept_id: ConceptId) -> GraphResult<Vec<Node>>;

    /// Look up a passage by id
    async fn get_passage(&self, id: PassageId) -> GraphResult<Option<Passage>>;

    /// Corpus statistics
    async fn stats(&self) -> GraphResult<GraphStats>;

    /// Logical database names served by this store
    fn list_databases(&self) -> Vec<String>;
}

#[derive(Debug, Default)]
struct GraphInner {
    passages: BTreeMap<PassageId, Passage>,
    nodes: BTreeMap<NodeId, Node>,
    concepts: BTreeMap<ConceptId, Concept>,
    concepts_by_text: HashMap<String, ConceptId>,
    relations: Vec<Relation>,

    /// node -> indices into `relations`, both directions
    adjacency: BTreeMap<NodeId, Vec<usize>>,

    /// MENTIONS edges, both directions
    node_passages: BTreeMap<NodeId, BTreeSet<PassageId>>,
    passage_nodes: BTreeMap<PassageId, BTreeSet<NodeId>>,

    /// HAS_CONCEPT edges, both directions
    node_concepts: BTreeMap<NodeId, BTreeSet<ConceptId>>,
    concept_nodes: BTreeMap<ConceptId, BTreeSet<NodeId>>,

    passage_index: FulltextIndex,
    node_index: FulltextIndex,
}

/// In-memory graph store
///
/// Holds the corpus produced by the external ingestion pipeline. A single
/// `RwLock` around the whole graph gives each operation a read-consistent
/// snapshot; the analyzer never takes the write lock.
#[derive(Debug)]
pub struct MemoryGraph {
    inner: RwLock<GraphInner>,
    database: String,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(GraphInner::default()),
            database: "contracts".to_string(),
        }
    }

    pub fn with_database(database: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(GraphInner::default()),
            database: database.into(),
        }
    }



    fn read(&self) -> GraphResult<std::sync::RwLockReadGuard<'_, GraphInner>> {
        self.inner
            .read()
            .map_err(|e| GraphError::StoreUnavailable(e.to_string()))
    }

    fn write(&self) -> GraphResult<std::sync::RwLockWriteGuard<'_, GraphInner>> {
        self.inner
            .write()
            .map_err(|e| GraphError::StoreUnavailable(e.to_string()))
    }

    // --- ingestion-side write path (never called by the analyzer) ---

    pub fn add_passage(&self, passage: Passage) -> GraphResult<()> {
        let mut inner = self.write()?;
        inner.passage_index.insert(passage.id.as_u64(), &passage.text);
        inner.passages.insert(passage.id, passage);
        Ok(())
    }

    pub fn add_node(&self, node: Node) -> GraphResult<()> {
        let mut inner = self.write()?;
        let label_text = node
            .labels
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let indexed = format!("{} {}", node.name, label_text);
        inner.node_index.insert(node.id.as_u64(), &indexed);
        inner.nodes.insert(node.id, node);
        Ok(())
    }

    /// Insert a concept, deduplicating by normalized text
    pub fn add_concept(&self, concept: Concept) -> GraphResult<ConceptId> {
        let mut inner = self.write()?;
        let key = concept.normalized_text();
        if let Some(&existing) = inner.concepts_by_text.get(&key) {
            return Ok(existing);
        }
        let id = concept.id;
        inner.concepts_by_text.insert(key, id);
        inner.concepts.insert(id, concept);
        Ok(id)
    }

    pub fn add_relation(&self, relation: Relation) -> GraphResult<()> {
        let mut inner = self.write()?;
        if !inner.nodes.contains_key(&relation.source) {
            return Err(GraphError::NodeNotFound(relation.source));
        }
        if !inner.nodes.contains_key(&relation.target) {
            return Err(GraphError::NodeNotFound(relation.target));
        }
        let idx = inner.relations.len();
        inner.adjacency.entry(relation.source).or_default().push(idx);
        inner.adjacency.entry(relation.target).or_default().push(idx);
        inner.relations.push(relation);
        Ok(())
    }

    pub fn link_mention(&self, node_id: NodeId, passage_id: PassageId) -> GraphResult<()> {
        let mut inner = self.write()?;
        if !inner.nodes.contains_key(&node_id) {
            return Err(GraphError::NodeNotFound(node_id));
        }
        if !inner.passages.contains_key(&passage_id) {
            return Err(GraphError::PassageNotFound(passage_id));
        }
        inner.node_passages.entry(node_id).or_default().insert(passage_id);
        inner.passage_nodes.entry(passage_id).or_default().insert(node_id);
        Ok(())
    }

    pub fn link_concept(&self, node_id: NodeId, concept_id: ConceptId) -> GraphResult<()> {
        let mut inner = self.write()?;
        if !inner.nodes.contains_key(&node_id) {
            return Err(GraphError::NodeNotFound(node_id));
        }
        inner.node_concepts.entry(node_id).or_default().insert(concept_id);
        inner.concept_nodes.entry(concept_id).or_default().insert(node_id);
        Ok(())
    }

    /// Load a full corpus snapshot produced by the ingestion pipeline
    pub fn load_snapshot(&self, snapshot: CorpusSnapshot) -> GraphResult<()> {
        let passage_count = snapshot.passages.len();
        let node_count = snapshot.nodes.len();

        for passage in snapshot.passages {
            self.add_passage(passage)?;
        }
        for node in snapshot.nodes {
            self.add_node(node)?;
        }
        for concept in snapshot.concepts {
            self.add_concept(concept)?;
        }
        for relation in snapshot.relations {
            self.add_relation(relation)?;
        }
        for (node_id, passage_id) in snapshot.mentions {
            self.link_mention(node_id, passage_id)?;
        }
        for (node_id, concept_id) in snapshot.node_concepts {
            self.link_concept(node_id, concept_id)?;
        }

        info!(passages = passage_count, nodes = node_count, "corpus snapshot loaded");
        Ok(())
    }

    /// All concept embeddings, for seeding the concept vector index
    pub fn concept_embeddings(&self) -> GraphResult<Vec<(ConceptId, Vec<f32>)>> {
        let inner = self.read()?;
        Ok(inner
            .concepts
            .values()
            .map(|c| (c.id, c.embedding.clone()))
            .collect())
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn fulltext_node_search(&self, query: &str, k: usize) -> GraphResult<Vec<(Node, f32)>> {
        let inner = self.read()?;
        let hits = inner.node_index.search(query, k);
        Ok(hits
            .into_iter()
            .filter_map(|(id, score)| inner.nodes.get(&NodeId::new(id)).map(|n| (n.clone(), score)))
            .collect())
    }

    async fn fulltext_passage_search(&self, query: &str, k: usize) -> GraphResult<Vec<(Passage, f32)>> {
        let inner = self.read()?;
        let hits = inner.passage_index.search(query, k);
        Ok(hits
            .into_iter()
            .filter_map(|(id, score)| {
                inner.passages.get(&PassageId::new(id)).map(|p| (p.clone(), score))
            })
            .collect())
    }

    async fn neighbors(&self, node_id: NodeId, depth: u8, type_filter: Option<&RelationType>) -> GraphResult<Vec<Node>> {
        if depth == 0 || depth > 2 {
            return Err(GraphError::InvalidDepth(depth));
        }
        let inner = self.read()?;
        if !inner.nodes.contains_key(&node_id) {
            return Err(GraphError::NodeNotFound(node_id));
        }

        // Concepts and nodes form cycles, so traversal dedupes visited ids
        // and never exceeds two hops.
        let mut visited: BTreeSet<NodeId> = BTreeSet::new();
        visited.insert(node_id);
        let mut frontier = vec![node_id];
        let mut found: BTreeSet<NodeId> = BTreeSet::new();

        for _ in 0..depth {
            let mut next = Vec::new();
            for current in frontier {
                if let Some(edge_indices) = inner.adjacency.get(&current) {
                    for &idx in edge_indices {
                        let relation = &inner.relations[idx];
                        if let Some(filter) = type_filter {
                            if &relation.rel_type != filter {
                                continue;
                            }
                        }
                        let other = if relation.source == current {
                            relation.target
                        } else {
                            relation.source
                        };
                        if visited.insert(other) {
                            found.insert(other);
                            next.push(other);
                        }
                    }
                }
            }
            frontier = next;
        }

        Ok(found
            .into_iter()
            .filter_map(|id| inner.nodes.get(&id).cloned())
            .collect())
    }

    async fn passages_for_node(&self, node_id: NodeId) -> GraphResult<Vec<Passage>> {
        let inner = self.read()?;
        let Some(passage_ids) = inner.node_passages.get(&node_id) else {
            return Ok(Vec::new());
        };
        Ok(passage_ids
            .iter()
            .filter_map(|id| inner.passages.get(id).cloned())
            .collect())
    }

    async fn concepts_for_text(&self, text: &str) -> GraphResult<Vec<Concept>> {
        let inner = self.read()?;
        let key = normalize_concept_text(text);
        Ok(inner
            .concepts_by_text
            .get(&key)
            .and_then(|id| inner.concepts.get(id))
            .cloned()
            .into_iter()
            .collect())
    }

    async fn nodes_for_concept(&self, concept_id: ConceptId) -> GraphResult<Vec<Node>> {
        let inner = self.read()?;
        let Some(node_ids) = inner.concept_nodes.get(&concept_id) else {
            return Ok(Vec::new());
        };
        Ok(node_ids
            .iter()
            .filter_map(|id| inner.nodes.get(id).cloned())
            .collect())
    }

    async fn get_passage(&self, id: PassageId) -> GraphResult<Option<Passage>> {
        let inner = self.read()?;
        Ok(inner.passages.get(&id).cloned())
    }

    async fn stats(&self) -> GraphResult<GraphStats> {
        let inner = self.read()?;
        Ok(GraphStats {
            passages: inner.passages.len(),
            nodes: inner.nodes.len(),
            concepts: inner.concepts.len(),
            relations: inner.relations.len(),
        })
    }

    fn list_databases(&self) -> Vec<String> {
        vec![self.database.clone()]
    }
}

/// Serialized corpus produced by the external ingestion pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    #[serde(default)]
    pub passages: Vec<Passage>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub concepts: Vec<Concept>,
    #[serde(default)]
    pub relations: Vec<Relation>,
    /// (node, passage) MENTIONS pairs
    #[serde(default)]
    pub mentions: Vec<(NodeId, PassageId)>,
    /// (node, concept) HAS_CONCEPT pairs
    #[serde(default)]
    pub node_concepts: Vec<(NodeId, ConceptId)>,
    /// Passage embeddings destined for the vector index
    #[serde(default)]
    pub passage_embeddings: Vec<(PassageId, Vec<f32>)>,
}

impl CorpusSnapshot {
    pub fn from_json(json: &str) -> GraphResult<Self> {
        serde_json::from_str(json).map_err(|e| GraphError::Snapshot(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> MemoryGraph {
        let graph = MemoryGraph::new();
        graph
            .add_passage(Passage::new(
                PassageId::new(1),
                "Seller shall indemnify Buyer against third-party claims.",
                "contract-a",
                0,
            ))
            .unwrap();
        graph
            .add_passage(Passage::new(
                PassageId::new(2),
                "This agreement terminates upon thirty days notice.",
                "contract-a",
                1,
            ))
            .unwrap();
        graph
            .add_node(Node::new(NodeId::new(10), "indemnification", "Entity", 10))
            .unwrap();
        graph
            .add_node(Node::new(NodeId::new(11), "termination", "Entity", 11))
            .unwrap();
        graph
            .add_node(Node::new(NodeId::new(12), "notice period", "Entity", 12))
            .unwrap();
        graph
            .add_relation(Relation::new(NodeId::new(11), NodeId::new(12), "REQUIRES"))
            .unwrap();
        graph.link_mention(NodeId::new(10), PassageId::new(1)).unwrap();
        graph.link_mention(NodeId::new(11), PassageId::new(2)).unwrap();
        graph
    }

    #[tokio::test]
    async fn test_fulltext_node_search() {
        let graph = sample_graph();
        let hits = graph.fulltext_node_search("termination", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, NodeId::new(11));
    }

    #[tokio::test]
    async fn test_fulltext_passage_search() {
        let graph = sample_graph();
        let hits = graph.fulltext_passage_search("indemnify claims", 5).await.unwrap();
        assert_eq!(hits[0].0.id, PassageId::new(1));
    }

    #[tokio::test]
    async fn test_neighbors_one_hop() {
        let graph = sample_graph();
        let neighbors = graph.neighbors(NodeId::new(11), 1, None).await.unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].id, NodeId::new(12));
    }

    #[tokio::test]
    async fn test_neighbors_depth_capped() {
        let graph = sample_graph();
        let err = graph.neighbors(NodeId::new(11), 3, None).await.unwrap_err();
        assert!(matches!(err, GraphError::InvalidDepth(3)));
    }

    #[tokio::test]
    async fn test_neighbors_cycle_safe() {
        let graph = sample_graph();
        // close the cycle 11 <-> 12
        graph
            .add_relation(Relation::new(NodeId::new(12), NodeId::new(11), "PART_OF"))
            .unwrap();
        let neighbors = graph.neighbors(NodeId::new(11), 2, None).await.unwrap();
        // the start node never reappears in its own neighborhood
        assert!(!neighbors.iter().any(|n| n.id == NodeId::new(11)));
    }

    #[tokio::test]
    async fn test_passages_for_node() {
        let graph = sample_graph();
        let passages = graph.passages_for_node(NodeId::new(10)).await.unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].id, PassageId::new(1));
    }

    #[tokio::test]
    async fn test_concept_dedup_by_normalized_text() {
        let graph = sample_graph();
        let a = graph
            .add_concept(Concept::new(ConceptId::new(100), "Liability Cap", vec![1.0]))
            .unwrap();
        let b = graph
            .add_concept(Concept::new(ConceptId::new(101), "liability   cap", vec![2.0]))
            .unwrap();
        assert_eq!(a, b);

        let found = graph.concepts_for_text("LIABILITY CAP").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a);
    }

    #[tokio::test]
    async fn test_stats() {
        let graph = sample_graph();
        let stats = graph.stats().await.unwrap();
        assert_eq!(stats.passages, 2);
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.relations, 1);
    }
}
