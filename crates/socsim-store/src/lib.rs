//! Storage layer for SocSim agents.
//!
//! Provides an SQLite-backed [`VectorIndex`] of embedded trajectories and the
//! [`EpisodicMemory`] variants built on top of it. Every memory store is
//! created empty and only grows.

pub mod db;
pub mod error;
pub mod index;
pub mod memory;
pub mod migration;

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use index::{ScoredDocument, TrajectoryDocument, TrajectoryMetadata, VectorIndex, cosine_similarity};
pub use memory::{EpisodicMemory, MemoryKind, MemoryStoreConfig, PLAN_BANNER, REVIEW_MARKER, leading_score};
