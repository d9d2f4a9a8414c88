//! Vector similarity index over trajectory records.
//!
//! Records are embedded on insert and stored as little-endian f32 blobs.
//! Search is an exhaustive cosine scan; per-task stores hold a handful of
//! records, so no ANN structure is needed.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use socsim_llm::Embedder;

use crate::db::Database;
use crate::error::StoreResult;

/// Metadata kept next to each embedded record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryMetadata {
    pub task_name: Option<String>,
    pub task_description: Option<String>,
    pub task_trajectory: Option<String>,
}

/// A record to insert: `content` is what gets embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryDocument {
    pub content: String,
    pub metadata: TrajectoryMetadata,
}

impl TrajectoryDocument {
    /// The non-empty trajectory, if the record carries one.
    pub fn trajectory(&self) -> Option<&str> {
        self.metadata
            .task_trajectory
            .as_deref()
            .filter(|t| !t.is_empty())
    }
}

/// A search hit with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub id: i64,
    pub document: TrajectoryDocument,
    pub score: f32,
}

/// Embedding-backed index over the `trajectories` table.
#[derive(Clone)]
pub struct VectorIndex {
    db: Database,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimension", &self.embedder.dimension())
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    pub fn new(db: Database, embedder: Arc<dyn Embedder>) -> Self {
        Self { db, embedder }
    }

    /// Embed `doc.content` and store the record. Returns the new row id.
    #[instrument(skip(self, doc), fields(content_len = doc.content.len()))]
    pub async fn add(&self, doc: TrajectoryDocument) -> StoreResult<i64> {
        let blob = embedding_to_blob(&self.embedder.embed(&doc.content).await?);
        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO trajectories \
                     (content, embedding, task_name, task_description, task_trajectory, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![
                        doc.content,
                        blob,
                        doc.metadata.task_name,
                        doc.metadata.task_description,
                        doc.metadata.task_trajectory,
                        now,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    /// Number of stored records.
    pub async fn count(&self) -> StoreResult<usize> {
        self.db
            .execute(|conn| {
                let n: i64 = conn.query_row("SELECT count(*) FROM trajectories", [], |r| r.get(0))?;
                Ok(usize::try_from(n).unwrap_or_default())
            })
            .await
    }

    /// The `k` records most similar to `query`, best first.
    ///
    /// Equal scores keep insertion order.
    #[instrument(skip(self, query))]
    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> StoreResult<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query).await?;

        let mut hits = self
            .db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, content, embedding, task_name, task_description, task_trajectory \
                     FROM trajectories ORDER BY id",
                )?;
                let rows = stmt.query_map([], |row| {
                    let blob: Vec<u8> = row.get(2)?;
                    Ok(ScoredDocument {
                        id: row.get(0)?,
                        document: TrajectoryDocument {
                            content: row.get(1)?,
                            metadata: TrajectoryMetadata {
                                task_name: row.get(3)?,
                                task_description: row.get(4)?,
                                task_trajectory: row.get(5)?,
                            },
                        },
                        score: cosine_similarity(&query_vec, &blob_to_embedding(&blob)),
                    })
                })?;
                let hits = rows.collect::<Result<Vec<_>, _>>()?;
                Ok(hits)
            })
            .await?;

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

// ── vector helpers ───────────────────────────────────────────────────

/// Cosine similarity. Zero-norm or mismatched vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
