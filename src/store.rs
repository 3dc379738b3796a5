//! # Measurement Store Module
//!
//! The seam between the decoding pipeline and persistence. Decoded samples
//! leave as [`MeasurementRecord`]s through a [`MeasurementSink`]; the sweep
//! chart pulls [`MeasurementRow`]s back through a [`MeasurementSource`], newest
//! first and bounded by a cursor.
//!
//! [`MemoryStore`] implements both sides in memory. It backs the replay binary
//! and the tests; durable storage lives outside this crate.

use crate::error::StoreError;
use crate::timeseries::RawPoint;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Which channel a measurement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementKind {
    Pressure,
    Flow,
}

impl MeasurementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementKind::Pressure => "pressure",
            MeasurementKind::Flow => "flow",
        }
    }
}

/// One sample ready to be stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementRecord {
    /// Local receipt time (ms since epoch)
    pub timestamp: i64,
    /// Device-relative sample time (ms)
    pub external_timestamp: i64,
    pub kind: MeasurementKind,
    pub value: f64,
}

/// One stored measurement as returned by a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementRow {
    pub id: i64,
    pub timestamp: i64,
    pub external_timestamp: i64,
    pub value: f64,
}

impl From<MeasurementRow> for RawPoint {
    fn from(row: MeasurementRow) -> Self {
        Self {
            id: row.id,
            ts: row.timestamp,
            millis: row.external_timestamp,
            y: row.value,
        }
    }
}

/// A page request: rows of one device and channel with `id >= cursor`,
/// newest first, at most `first` of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementQuery {
    pub device_id: i64,
    pub kind: MeasurementKind,
    pub cursor: Option<i64>,
    pub first: usize,
}

/// Receives decoded measurements for storage.
pub trait MeasurementSink: Send {
    fn insert(&self, device_id: i64, records: &[MeasurementRecord]) -> Result<(), StoreError>;
}

/// Serves stored measurements to the chart.
#[async_trait]
pub trait MeasurementSource: Send + Sync {
    /// Rows ordered by id descending. No rows is not an error.
    async fn query(&self, query: &MeasurementQuery) -> Result<Vec<MeasurementRow>, StoreError>;
}

#[derive(Debug, Default)]
struct StoreState {
    next_id: i64,
    rows: HashMap<(i64, MeasurementKind), Vec<MeasurementRow>>,
}

/// Thread-safe in-memory store. Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows for one device and channel
    pub fn len(&self, device_id: i64, kind: MeasurementKind) -> Result<usize, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(state.rows.get(&(device_id, kind)).map_or(0, Vec::len))
    }

    fn select(&self, query: &MeasurementQuery) -> Result<Vec<MeasurementRow>, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        let Some(rows) = state.rows.get(&(query.device_id, query.kind)) else {
            return Ok(Vec::new());
        };

        // Rows are appended with increasing ids
        Ok(rows
            .iter()
            .rev()
            .take_while(|row| query.cursor.map_or(true, |cursor| row.id >= cursor))
            .take(query.first)
            .copied()
            .collect())
    }
}

impl MeasurementSink for MemoryStore {
    fn insert(&self, device_id: i64, records: &[MeasurementRecord]) -> Result<(), StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;

        for record in records {
            state.next_id += 1;
            let row = MeasurementRow {
                id: state.next_id,
                timestamp: record.timestamp,
                external_timestamp: record.external_timestamp,
                value: record.value,
            };
            state
                .rows
                .entry((device_id, record.kind))
                .or_default()
                .push(row);
        }

        Ok(())
    }
}

#[async_trait]
impl MeasurementSource for MemoryStore {
    async fn query(&self, query: &MeasurementQuery) -> Result<Vec<MeasurementRow>, StoreError> {
        self.select(query)
    }
}
