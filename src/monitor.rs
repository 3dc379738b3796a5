//! # Sweep Monitor Module
//!
//! Drives the sweep chart for one device channel by polling the store:
//! fetch rows since the cursor, rebuild absolute timestamps, split into
//! background and foreground, move the cursor to the oldest row still shown.
//!
//! ## Polling
//! `run` ticks on a Tokio interval and awaits each poll before the next one,
//! so polls for one monitor never overlap; a tick that comes due while a poll
//! is still running is skipped.
//!
//! ## Cancellation
//! [`MonitorHandle::stop`] clears a shared liveness flag. A fetch that finishes
//! after the flag was cleared is dropped before any state is touched.
//!
//! ## Re-fetched Rows
//! Every poll re-reads the rows still on screen. Their corrected timestamps are
//! remembered by row id, so only rows seen for the first time go through the
//! timestamp corrector and the correction anchor moves only on new data.

use crate::config::Config;
use crate::correction::CorrectionContext;
use crate::error::StoreError;
use crate::store::{MeasurementKind, MeasurementQuery, MeasurementRow, MeasurementSource};
use crate::sweep::{self, SweepContext, SweepLines};
use crate::timeseries::{RawPoint, TimedPoint};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Which rows to chart and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub device_id: i64,
    pub kind: MeasurementKind,
    pub period: Duration,
    pub page_size: usize,
}

impl MonitorSettings {
    pub fn from_config(device_id: i64, kind: MeasurementKind, config: &Config) -> Self {
        Self {
            device_id,
            kind,
            period: config.sweep_period(),
            page_size: config.page_size,
        }
    }
}

/// Stops a running [`SweepMonitor`] from another task.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    alive: Arc<AtomicBool>,
}

impl MonitorHandle {
    pub fn stop(&self) {
        self.alive.store(false, Ordering::Relaxed);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }
}

/// Pull-based sweep state for one device channel.
#[derive(Debug)]
pub struct SweepMonitor {
    settings: MonitorSettings,
    correction: CorrectionContext,
    sweep: SweepContext,
    cursor: Option<i64>,
    // row id -> corrected timestamp, for rows at or after the cursor
    corrected: BTreeMap<i64, i64>,
    alive: Arc<AtomicBool>,
}

impl SweepMonitor {
    pub fn new(settings: MonitorSettings) -> Self {
        Self {
            settings,
            correction: CorrectionContext::new(),
            sweep: SweepContext::new(),
            cursor: None,
            corrected: BTreeMap::new(),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle {
            alive: self.alive.clone(),
        }
    }

    pub fn cursor(&self) -> Option<i64> {
        self.cursor
    }

    pub fn correction_context(&self) -> &CorrectionContext {
        &self.correction
    }

    pub fn sweep_context(&self) -> &SweepContext {
        &self.sweep
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    fn timed_point(&mut self, row: MeasurementRow) -> TimedPoint {
        let ts = match self.corrected.get(&row.id) {
            Some(&ts) => ts,
            None => {
                let corrected = self.correction.correct_point(RawPoint::from(row));
                self.corrected.insert(row.id, corrected.ts);
                corrected.ts
            }
        };

        TimedPoint {
            id: row.id,
            ts,
            y: row.value,
        }
    }

    /// Poll once. Returns `None` when the monitor was stopped, leaving every
    /// context as it was; a store error leaves them untouched as well.
    pub async fn tick<S>(&mut self, source: &S) -> Result<Option<SweepLines>, StoreError>
    where
        S: MeasurementSource + ?Sized,
    {
        if !self.is_alive() {
            return Ok(None);
        }

        let query = MeasurementQuery {
            device_id: self.settings.device_id,
            kind: self.settings.kind,
            cursor: self.cursor,
            first: self.settings.page_size,
        };
        let mut rows = source.query(&query).await?;

        if !self.is_alive() {
            log::debug!(
                "Discarding {} rows fetched after device {} monitor stopped",
                rows.len(),
                self.settings.device_id
            );
            return Ok(None);
        }

        rows.reverse();
        let data: Vec<TimedPoint> = rows.into_iter().map(|row| self.timed_point(row)).collect();
        let lines = sweep::get_lines(&data, self.settings.period, &mut self.sweep);

        if let Some(cursor) = lines.next_cursor() {
            self.cursor = Some(cursor);
            self.corrected = self.corrected.split_off(&cursor);
        }

        Ok(Some(lines))
    }

    /// Poll every `every` and send each frame to `lines_tx` until stopped or
    /// the receiver goes away.
    pub async fn run<S>(mut self, source: S, every: Duration, lines_tx: mpsc::Sender<SweepLines>)
    where
        S: MeasurementSource,
    {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.is_alive() {
            ticker.tick().await;

            match self.tick(&source).await {
                Ok(Some(lines)) => {
                    if lines_tx.send(lines).await.is_err() {
                        log::debug!("Sweep receiver for device {} dropped", self.settings.device_id);
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Sweep poll for device {} failed: {}", self.settings.device_id, e);
                }
            }
        }

        log::info!("Sweep monitor for device {} stopped", self.settings.device_id);
    }
}
