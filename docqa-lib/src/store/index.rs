use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::embed::Embedding;
use crate::store::{IndexEntry, SearchResult};
use crate::{Error, Result};

/// Exact nearest-neighbour index over unit vectors.
///
/// Brute-force cosine similarity. A single uploaded document stays well
/// within the range where a linear scan beats building a graph index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Build a fresh index from `(text, vector)` pairs, in order.
    ///
    /// Fails with [`Error::IndexBuild`] when there are no entries, vectors
    /// disagree on dimension, or a vector is empty or non-finite. A zero
    /// vector is kept and scores 0.0 against every query.
    pub fn build(model: impl Into<String>, entries: Vec<(String, Embedding)>) -> Result<Self> {
        let Some((_, first)) = entries.first() else {
            return Err(Error::IndexBuild("no chunks to index".to_string()));
        };
        let dimension = first.len();
        if dimension == 0 {
            return Err(Error::IndexBuild("embeddings have zero dimensions".to_string()));
        }

        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(id, (text, vector))| {
                if vector.len() != dimension {
                    return Err(Error::IndexBuild(format!(
                        "entry {id} has dimension {}, expected {dimension}",
                        vector.len()
                    )));
                }
                let vector = normalize(vector).ok_or_else(|| {
                    Error::IndexBuild(format!("entry {id} has a non-finite vector"))
                })?;
                Ok(IndexEntry { text, vector })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            model: model.into(),
            dimension,
            entries,
        })
    }

    /// Reassemble an index from already-normalised entries.
    pub(crate) fn from_parts(model: String, dimension: usize, entries: Vec<IndexEntry>) -> Self {
        Self {
            model,
            dimension,
            entries,
        }
    }

    /// Top `k` entries by cosine similarity to `query`, best first.
    ///
    /// Returns `min(k, len)` results; equal scores keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(Error::InvalidInput("k must be greater than 0".to_string()));
        }
        if query.len() != self.dimension {
            return Err(Error::InvalidInput(format!(
                "query has dimension {}, index expects {}",
                query.len(),
                self.dimension
            )));
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidInput("query vector is not finite".to_string()));
        }

        // a zero query scores everything 0.0 and falls back to insertion order
        let norm = l2_norm(query);
        let scale = if norm > 0.0 { 1.0 / norm } else { 0.0 };

        // min-heap holding the best k seen so far
        let mut best = BinaryHeap::with_capacity(k.min(self.entries.len()).saturating_add(1));
        for (id, entry) in self.entries.iter().enumerate() {
            let dot: f32 = entry.vector.iter().zip(query).map(|(x, y)| x * y).sum();
            // + 0.0 folds -0.0 into 0.0 so equal scores tie on id
            best.push(Reverse(Scored {
                score: dot * scale + 0.0,
                id,
            }));
            if best.len() > k {
                best.pop();
            }
        }

        Ok(best
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(s)| SearchResult {
                id: s.id,
                text: self.entries[s.id].text.clone(),
                score: s.score,
            })
            .collect())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn get(&self, id: usize) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ranking key: higher score first, then lower id.
struct Scored {
    score: f32,
    id: usize,
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scored {}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale to unit length; `None` for non-finite vectors.
fn normalize(mut v: Embedding) -> Option<Embedding> {
    let norm = l2_norm(&v);
    if !norm.is_finite() {
        return None;
    }
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    Some(v)
}
