//! Stream ingestion: transport lines in, parsed samples out to the [`SampleBuffer`].
//!
//! The ingestor pulls lines from a [`LineTransport`], parses each one and stores valid
//! samples. A bad line is counted and dropped; ingestion only ends when the transport
//! reports end of stream, fails, or a stop is requested.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hexapod_telemetry::data::SampleBuffer;
//! use hexapod_telemetry::ingest::{ReaderTransport, StreamIngestor};
//!
//! # async fn run() -> hexapod_telemetry::error::AppResult<()> {
//! let ingestor = StreamIngestor::new(Arc::new(SampleBuffer::default()));
//! let handle = ingestor.spawn(ReaderTransport::open("capture.log").await?);
//! // ... read ingestor.snapshot() periodically ...
//! let exit = handle.stop().await?;
//! println!("{exit:?}: {:?}", ingestor.stats().snapshot());
//! # Ok(())
//! # }
//! ```

pub mod demo;
#[cfg(feature = "serial")]
pub mod serial;
pub mod transport;

pub use demo::DemoTransport;
#[cfg(feature = "serial")]
pub use serial::{SerialTransport, SerialTransportBuilder};
pub use transport::{LineSplitter, LineTransport, ReaderTransport, MAX_LINE_LEN};

use crate::data::SampleBuffer;
use crate::error::AppResult;
use crate::geometry::LegIndex;
use crate::parser::{self, ParseError, ParseFailureKind};
use crate::sample::LegSample;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Line counters, updated by the ingestion task.
///
/// Every counter only increases. `lines_total` is bumped after the outcome counter, so
/// a concurrent reader may see it lag by a line; once ingestion is idle
/// `lines_total == valid + malformed + truncated + invalid_index`.
#[derive(Debug, Default)]
pub struct IngestStats {
    lines_total: AtomicU64,
    valid: AtomicU64,
    malformed: AtomicU64,
    truncated: AtomicU64,
    invalid_index: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    /// Lines read from the transport
    pub lines_total: u64,
    /// Lines that produced a sample
    pub valid: u64,
    /// Structurally wrong lines
    pub malformed: u64,
    /// Lines cut off mid-record
    pub truncated: u64,
    /// Well-formed lines naming a leg outside 0-5
    pub invalid_index: u64,
}

impl IngestStatsSnapshot {
    /// Lines that did not produce a sample.
    pub fn rejected(&self) -> u64 {
        self.malformed + self.truncated + self.invalid_index
    }

    /// True when the outcome counters account for every line.
    pub fn is_balanced(&self) -> bool {
        self.lines_total == self.valid + self.rejected()
    }
}

impl IngestStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, outcome: Result<(), ParseFailureKind>) {
        let counter = match outcome {
            Ok(()) => &self.valid,
            Err(ParseFailureKind::Malformed) => &self.malformed,
            Err(ParseFailureKind::Truncated) => &self.truncated,
            Err(ParseFailureKind::InvalidLegIndex) => &self.invalid_index,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.lines_total.fetch_add(1, Ordering::Release);
    }

    /// Copies the counters.
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        let lines_total = self.lines_total.load(Ordering::Acquire);
        IngestStatsSnapshot {
            lines_total,
            valid: self.valid.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            invalid_index: self.invalid_index.load(Ordering::Relaxed),
        }
    }
}

/// Why an ingestion run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestExit {
    /// The transport has no more lines
    EndOfStream,
    /// A stop was requested
    Stopped,
}

/// Parses transport lines into a shared [`SampleBuffer`].
///
/// Cloning is cheap; clones share the buffer and the counters.
#[derive(Debug, Clone)]
pub struct StreamIngestor {
    buffer: Arc<SampleBuffer>,
    stats: Arc<IngestStats>,
}

impl StreamIngestor {
    /// Creates an ingestor writing into `buffer`.
    pub fn new(buffer: Arc<SampleBuffer>) -> Self {
        Self {
            buffer,
            stats: Arc::new(IngestStats::new()),
        }
    }

    /// Buffer samples are written to.
    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    /// Line counters.
    pub fn stats(&self) -> &Arc<IngestStats> {
        &self.stats
    }

    /// Latest sample of every leg that has reported.
    pub fn snapshot(&self) -> BTreeMap<LegIndex, LegSample> {
        self.buffer.snapshot()
    }

    /// Parses and stores a single line, updating the counters.
    pub fn ingest_line(&self, line: &str) -> Result<LegSample, ParseError> {
        match parser::parse(line) {
            Ok(sample) => {
                self.buffer.put(sample);
                self.stats.record(Ok(()));
                Ok(sample)
            }
            Err(e) => {
                let kind = e.kind();
                self.stats.record(Err(kind));
                match kind {
                    ParseFailureKind::Malformed => trace!(error = %e, line, "Dropped line"),
                    _ => debug!(error = %e, line, "Dropped line"),
                }
                Err(e)
            }
        }
    }

    /// Reads `transport` until it ends, fails, or `stop` completes, then closes it.
    ///
    /// A pending read is abandoned when `stop` fires; a partial line is not parsed.
    pub async fn run<T, S>(&self, transport: &mut T, stop: S) -> AppResult<IngestExit>
    where
        T: LineTransport + ?Sized,
        S: Future<Output = ()>,
    {
        let source = transport.describe();
        info!(%source, "Ingestion started");
        tokio::pin!(stop);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = &mut stop => break Ok(IngestExit::Stopped),
                line = transport.next_line() => match line {
                    Ok(Some(line)) => {
                        let _ = self.ingest_line(&line);
                    }
                    Ok(None) => break Ok(IngestExit::EndOfStream),
                    Err(e) => {
                        error!(%source, error = %e, "Transport failed");
                        break Err(e);
                    }
                },
            }
        };

        if let Err(e) = transport.close().await {
            warn!(%source, error = %e, "Failed to close transport");
        }

        let stats = self.stats.snapshot();
        info!(
            %source,
            exit = ?outcome.as_ref().ok(),
            lines = stats.lines_total,
            valid = stats.valid,
            rejected = stats.rejected(),
            "Ingestion finished"
        );
        outcome
    }

    /// Runs ingestion on its own tokio task.
    ///
    /// Dropping the returned handle also stops the task.
    pub fn spawn<T>(&self, mut transport: T) -> IngestHandle
    where
        T: LineTransport + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let ingestor = self.clone();
        let task = tokio::spawn(async move {
            let stop = async move {
                let _ = shutdown_rx.await;
            };
            ingestor.run(&mut transport, stop).await
        });

        IngestHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
            stats: Arc::clone(&self.stats),
        }
    }
}

/// Handle to a spawned ingestion task.
#[derive(Debug)]
pub struct IngestHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<AppResult<IngestExit>>,
    stats: Arc<IngestStats>,
}

impl IngestHandle {
    /// Counters of the running task.
    pub fn stats(&self) -> &Arc<IngestStats> {
        &self.stats
    }

    /// True once the task has ended on its own or after a stop.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Requests a stop and waits for the task to close its transport.
    pub async fn stop(mut self) -> AppResult<IngestExit> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        self.join().await
    }

    /// Waits for the task to end without requesting a stop.
    pub async fn join(mut self) -> AppResult<IngestExit> {
        // keep the sender alive so waiting does not count as a stop request
        let _shutdown_tx = self.shutdown_tx.take();
        (&mut self.task).await?
    }
}
