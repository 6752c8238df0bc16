//! Hand-off of finished games to statistics storage.

use std::fmt;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::game::machine::GameReport;

/// Receives one report per finished game.
#[async_trait]
pub trait StatsSink: Send + Sync + fmt::Debug {
    /// Stores `report`.
    ///
    /// # Errors
    ///
    /// I/O failures. The registry logs them and moves on.
    async fn record(&self, report: GameReport) -> std::io::Result<()>;
}

/// Drops every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl StatsSink for NullSink {
    async fn record(&self, _report: GameReport) -> std::io::Result<()> {
        Ok(())
    }
}

/// Keeps reports in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<GameReport>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports received so far.
    #[must_use]
    pub fn reports(&self) -> Vec<GameReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of reports received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StatsSink for MemorySink {
    async fn record(&self, report: GameReport) -> std::io::Result<()> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report);
        Ok(())
    }
}

/// Appends each report as one JSON line.
pub struct JsonlSink {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
}

impl fmt::Debug for JsonlSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonlSink").finish_non_exhaustive()
    }
}

impl JsonlSink {
    /// Writes to `writer`.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
        }
    }

    /// Appends to the file at `path`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn append_to(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::new(Box::new(file)))
    }
}

#[async_trait]
impl StatsSink for JsonlSink {
    async fn record(&self, report: GameReport) -> std::io::Result<()> {
        let line = serde_json::to_string(&report)?;
        let mut w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(w, "{line}")?;
        w.flush()
    }
}
