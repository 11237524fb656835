//! Leaderboard persistence
//!
//! The admission pipeline only talks to storage through [`LeaderboardStore`].
//! Ordering of ranked queries (score descending, earlier admission first on
//! ties) is the store's job and is never recomputed by the caller.

use log::debug;
use shared::LeaderboardEntry;
use std::cmp::Ordering;
use std::fmt;

/// Identifier assigned by a store to an inserted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A normalized, admitted submission. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardRecord {
    pub name: String,
    pub score: i64,
    pub run_ms: i64,
    pub events_count: usize,
    pub client_id: String,
    /// Admission time in milliseconds since the Unix epoch
    pub created_at: u64,
}

impl LeaderboardRecord {
    pub fn to_entry(&self) -> LeaderboardEntry {
        LeaderboardEntry {
            name: self.name.clone(),
            score: self.score,
            run_ms: self.run_ms,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store full: capacity {0} reached")]
    Full(usize),
}

pub trait LeaderboardStore {
    fn insert(&mut self, record: LeaderboardRecord) -> Result<RecordId, StoreError>;

    /// Best `limit` records, score descending, earliest `created_at` first on ties.
    fn query_top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError>;
}

/// In-memory store keeping records sorted by rank at all times
#[derive(Debug, Default)]
pub struct MemoryStore {
    ranked: Vec<(RecordId, LeaderboardRecord)>,
    next_id: u64,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses inserts once `capacity` records are held
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ranked: Vec::with_capacity(capacity),
            next_id: 0,
            capacity: Some(capacity),
        }
    }

    pub fn get(&self, id: RecordId) -> Option<&LeaderboardRecord> {
        self.ranked
            .iter()
            .find(|(record_id, _)| *record_id == id)
            .map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

/// Rank order: higher score first, then earlier admission, then lower id
fn rank(a: &(RecordId, LeaderboardRecord), b: &(RecordId, LeaderboardRecord)) -> Ordering {
    b.1.score
        .cmp(&a.1.score)
        .then(a.1.created_at.cmp(&b.1.created_at))
        .then(a.0.cmp(&b.0))
}

impl LeaderboardStore for MemoryStore {
    fn insert(&mut self, record: LeaderboardRecord) -> Result<RecordId, StoreError> {
        if let Some(capacity) = self.capacity {
            if self.ranked.len() >= capacity {
                return Err(StoreError::Full(capacity));
            }
        }

        self.next_id += 1;
        let id = RecordId(self.next_id);
        let row = (id, record);

        let position = self
            .ranked
            .partition_point(|existing| rank(existing, &row) == Ordering::Less);
        debug!("Inserting record {} at rank {}", id, position + 1);
        self.ranked.insert(position, row);

        Ok(id)
    }

    fn query_top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        Ok(self
            .ranked
            .iter()
            .take(limit)
            .map(|(_, record)| record.to_entry())
            .collect())
    }
}
