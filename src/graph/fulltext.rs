//! Inverted full-text index over passage texts and node names
//!
//! Postings are kept in `BTreeMap`s so scoring and tie-breaking are
//! deterministic across runs.

use std::collections::BTreeMap;

/// English function words plus the Korean particles that survive
/// tokenization as standalone tokens. Queries are filtered against this
/// list; indexed documents are not.
pub const STOPWORDS: &[&str] = &[
    "of", "in", "to", "by", "on", "at", "is", "as", "be", "or", "an", "it", "if", "no", "so",
    "do", "we", "he", "the", "and", "for", "are", "was", "were", "that", "this", "with", "from",
    "have", "has", "had", "not", "its", "any", "all", "such", "shall", "will", "may", "can",
    "does", "been", "being", "which", "what", "when", "where", "who", "whom", "how", "why",
    "into", "under", "upon", "per", "each", "other", "than", "then", "there", "here", "they",
    "them", "their", "his", "her", "our", "your", "you", "but", "nor", "either", "whether",
    "would", "should", "could", "must", "also", "only", "more", "most", "some", "these",
    "those", "herein", "hereof", "hereto", "thereof", "thereto",
    "이는", "있는", "있나요", "인가요", "어떻게", "무엇", "언제", "어디서", "어떤", "한다면",
    "경우", "대한", "대해", "위한", "통해", "관련",
];

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Split text into lowercased alphanumeric tokens
///
/// Runs of letters and digits (any script) form tokens; everything else is
/// a separator. Single-character tokens are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens.retain(|t| t.chars().count() >= 2);
    tokens
}

/// Inverted index: token -> (document id -> term frequency)
#[derive(Debug, Default)]
pub struct FulltextIndex {
    postings: BTreeMap<String, BTreeMap<u64, u32>>,
    doc_lengths: BTreeMap<u64, u32>,
}

impl FulltextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a document under the given id, replacing any previous entry
    pub fn insert(&mut self, doc_id: u64, text: &str) {
        self.remove(doc_id);

        let tokens = tokenize(text);
        self.doc_lengths.insert(doc_id, tokens.len() as u32);
        for token in tokens {
            *self.postings.entry(token).or_default().entry(doc_id).or_insert(0) += 1;
        }
    }

    pub fn remove(&mut self, doc_id: u64) {
        if self.doc_lengths.remove(&doc_id).is_none() {
            return;
        }
        self.postings.retain(|_, docs| {
            docs.remove(&doc_id);
            !docs.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    /// Top-k documents matching the query
    ///
    /// Stopwords are dropped from the query. Matching documents score by
    /// term frequency dampened with `1 + ln(tf)`, summed over distinct
    /// query tokens and normalized to (0, 1]; ties break by document id
    /// ascending.
    pub fn search(&self, query: &str, k: usize) -> Vec<(u64, f32)> {
        let query_tokens: Vec<String> = {
            let mut seen = Vec::new();
            for t in tokenize(query) {
                if !is_stopword(&t) && !seen.contains(&t) {
                    seen.push(t);
                }
            }
            seen
        };
        if query_tokens.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut scores: BTreeMap<u64, f32> = BTreeMap::new();
        for token in &query_tokens {
            if let Some(docs) = self.postings.get(token) {
                for (&doc_id, &tf) in docs {
                    let weight = 1.0 + (tf as f32).ln();
                    *scores.entry(doc_id).or_insert(0.0) += weight;
                }
            }
        }

        if scores.is_empty() {
            return Vec::new();
        }

        let max_score = scores.values().cloned().fold(f32::MIN, f32::max);
        let mut ranked: Vec<(u64, f32)> = scores
            .into_iter()
            .map(|(id, s)| (id, s / max_score))
            .collect();

        // BTreeMap iteration gives ascending ids, so a stable sort by
        // descending score keeps the id-ascending tie-break.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);
        ranked
    }
}
