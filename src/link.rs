//! # Link Ingest Module
//!
//! Receives raw text from the device link and turns it into stored
//! measurements and parameter updates.
//!
//! ## Key Components
//! - `LinkSession`: Per-connection decoder, cache and current parameters
//! - `LinkWorker`: Background thread that owns a session, fed over a channel
//! - `LinkEvent`: Updates sent from the worker to the application
//!
//! ## Data Flow
//! ```text
//! transport callback → send_chunk → worker thread → LinkSession::on_chunk
//!                                        ├── records    → MeasurementSink
//!                                        └── parameters → LinkEvent channel
//! ```
//!
//! The decoder mutates its cache without synchronisation, so each session is
//! owned by exactly one thread and chunks reach it in arrival order.

use crate::decoder::{Decoder, ParameterSet, Sample, TrailingFragment};
use crate::error::LinkError;
use crate::store::{MeasurementKind, MeasurementRecord, MeasurementSink};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread;

/// What one chunk produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkOutput {
    pub records: Vec<MeasurementRecord>,
    /// The parameters reported in this chunk, if any
    pub parameters: Option<ParameterSet>,
}

/// Decoding state of one connection. Dropped when the connection ends.
#[derive(Debug)]
pub struct LinkSession {
    device_id: i64,
    decoder: Decoder,
    parameters: ParameterSet,
}

impl LinkSession {
    pub fn new(device_id: i64, policy: TrailingFragment) -> Self {
        Self {
            device_id,
            decoder: Decoder::with_policy(policy),
            parameters: ParameterSet::default(),
        }
    }

    pub fn device_id(&self) -> i64 {
        self.device_id
    }

    /// Parameters accumulated over the whole connection
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Decode one chunk received at `received_at` (ms since epoch).
    pub fn on_chunk(&mut self, chunk: &str, received_at: i64) -> LinkOutput {
        let decoded = self.decoder.decode(chunk);

        let to_record = move |kind: MeasurementKind| {
            move |sample: &Sample| MeasurementRecord {
                timestamp: received_at,
                external_timestamp: sample.t,
                kind,
                value: sample.p,
            }
        };

        let records = decoded
            .pressure
            .iter()
            .map(to_record(MeasurementKind::Pressure))
            .chain(decoded.flow.iter().map(to_record(MeasurementKind::Flow)))
            .collect();

        let parameters = if decoded.parameters.is_empty() {
            None
        } else {
            self.parameters.merge(&decoded.parameters);
            Some(decoded.parameters)
        };

        LinkOutput {
            records,
            parameters,
        }
    }
}

/// Updates sent from the worker thread
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Current parameters after a chunk reported some
    Parameters(ParameterSet),
    /// Records of a chunk could not be stored
    StoreFailed(String),
    /// The worker has stopped
    Closed,
}

#[derive(Debug)]
enum LinkCommand {
    Chunk(String),
    Close,
}

/// Runs a [`LinkSession`] on its own thread.
pub struct LinkWorker {
    command_tx: Sender<LinkCommand>,
    worker_thread: Option<thread::JoinHandle<()>>,
}

impl LinkWorker {
    /// Spawn the worker. Chunks are decoded in the order they are sent.
    pub fn spawn<S>(session: LinkSession, sink: S, events: Sender<LinkEvent>) -> Self
    where
        S: MeasurementSink + 'static,
    {
        let (command_tx, command_rx) = unbounded();

        let worker_thread = thread::spawn(move || {
            Self::worker_loop(session, sink, command_rx, events);
        });

        Self {
            command_tx,
            worker_thread: Some(worker_thread),
        }
    }

    pub fn send_chunk(&self, chunk: impl Into<String>) -> Result<(), LinkError> {
        self.command_tx
            .send(LinkCommand::Chunk(chunk.into()))
            .map_err(|_| LinkError::Closed)
    }

    /// Decode everything already sent, then stop the thread.
    pub fn close(mut self) -> Result<(), LinkError> {
        self.shutdown()
    }

    /// [`close`](Self::close) for async callers; the join runs on the blocking
    /// pool so the runtime thread is never parked.
    pub async fn close_async(self) -> Result<(), LinkError> {
        tokio::task::spawn_blocking(move || self.close())
            .await
            .map_err(|_| LinkError::WorkerPanicked)?
    }

    fn shutdown(&mut self) -> Result<(), LinkError> {
        let Some(handle) = self.worker_thread.take() else {
            return Ok(());
        };
        // The worker may already be gone; joining reports how it ended
        let _ = self.command_tx.send(LinkCommand::Close);
        handle.join().map_err(|_| LinkError::WorkerPanicked)
    }

    fn worker_loop<S: MeasurementSink>(
        mut session: LinkSession,
        sink: S,
        command_rx: Receiver<LinkCommand>,
        events: Sender<LinkEvent>,
    ) {
        log::info!("Link worker started for device {}", session.device_id());

        loop {
            match command_rx.recv() {
                Ok(LinkCommand::Chunk(chunk)) => {
                    let received_at = chrono::Utc::now().timestamp_millis();
                    let output = session.on_chunk(&chunk, received_at);

                    if !output.records.is_empty() {
                        if let Err(e) = sink.insert(session.device_id(), &output.records) {
                            log::warn!("Failed to store {} records: {}", output.records.len(), e);
                            let _ = events.send(LinkEvent::StoreFailed(e.to_string()));
                        }
                    }

                    if output.parameters.is_some() {
                        let _ = events.send(LinkEvent::Parameters(*session.parameters()));
                    }
                }
                Ok(LinkCommand::Close) => {
                    log::info!("Link worker stopped for device {}", session.device_id());
                    break;
                }
                Err(_) => {
                    log::info!("Link worker: command channel closed");
                    break;
                }
            }
        }

        let _ = events.send(LinkEvent::Closed);
    }
}

impl Drop for LinkWorker {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("{}", e);
        }
    }
}
