//! Decision sinks
//!
//! The decision pass reports every call site it looks at to a sink passed
//! in by the caller. Sinks never make the pass fail: [`CsvSink`] holds on to
//! the first write error and reports it from [`CsvSink::finish`].

use crate::condition::Condition;
use crate::error::ShadowPriceError;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// What happened to one call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionOutcome {
    /// Rewritten to an inline candidate
    Promoted,
    /// The condition said no
    Declined,
    /// Callee not defined in the unit
    Unresolved,
    /// Callee already promoted earlier in this pass
    Chained,
    /// The condition said yes but the inline chain was full
    ChainFull,
}

impl DecisionOutcome {
    /// Lower-case name used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionOutcome::Promoted => "promoted",
            DecisionOutcome::Declined => "declined",
            DecisionOutcome::Unresolved => "unresolved",
            DecisionOutcome::Chained => "chained",
            DecisionOutcome::ChainFull => "chain_full",
        }
    }
}

/// One decision as reported to a sink
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    /// Active condition
    pub condition: Condition,
    /// Calling function
    pub caller: String,
    /// Called function
    pub callee: String,
    /// Callee body size, when resolved
    pub body_size: Option<usize>,
    /// Callee shadow price
    pub price: f64,
    /// Threshold compared against, for price-driven conditions
    pub threshold: Option<u32>,
    /// Result
    pub outcome: DecisionOutcome,
}

/// Receiver of decision records
pub trait DecisionSink {
    /// Accept one record
    fn record(&mut self, record: &DecisionRecord);
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DecisionSink for NullSink {
    fn record(&mut self, _record: &DecisionRecord) {}
}

/// Keeps every record in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Vec<DecisionRecord>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in arrival order
    pub fn records(&self) -> &[DecisionRecord] {
        &self.records
    }

    /// Take ownership of the records
    pub fn into_records(self) -> Vec<DecisionRecord> {
        self.records
    }

    /// Number of records with the given outcome
    pub fn count(&self, outcome: DecisionOutcome) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Callees promoted, in order
    pub fn promoted(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.outcome == DecisionOutcome::Promoted)
            .map(|r| r.callee.as_str())
            .collect()
    }
}

impl DecisionSink for MemorySink {
    fn record(&mut self, record: &DecisionRecord) {
        self.records.push(record.clone());
    }
}

/// Column names of the decision log
pub const CSV_HEADER: [&str; 7] = ["condition", "caller", "callee", "body_size", "price", "threshold", "outcome"];

/// Writes one CSV row per decision
///
/// Buffered rows are flushed by [`CsvSink::finish`], or when the sink is
/// dropped.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    error: Option<ShadowPriceError>,
}

impl CsvSink<File> {
    /// Create (or truncate) a decision log file
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ShadowPriceError> {
        let file = File::create(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> CsvSink<W> {
    /// Wrap a writer and emit the header row
    pub fn new(inner: W) -> Self {
        let mut writer = csv::Writer::from_writer(inner);
        let error = writer.write_record(CSV_HEADER).err().map(ShadowPriceError::from);
        Self { writer, error }
    }

    /// Flush and return the writer, or the first error seen
    pub fn finish(self) -> Result<W, ShadowPriceError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        self.writer
            .into_inner()
            .map_err(|e| ShadowPriceError::Io(e.into_error()))
    }

    fn write(&mut self, record: &DecisionRecord) -> Result<(), csv::Error> {
        let body_size = record.body_size.map(|s| s.to_string()).unwrap_or_default();
        let threshold = record.threshold.map(|t| t.to_string()).unwrap_or_default();
        let price = format!("{:.6}", record.price);
        self.writer.write_record([
            record.condition.slug(),
            record.caller.as_str(),
            record.callee.as_str(),
            body_size.as_str(),
            price.as_str(),
            threshold.as_str(),
            record.outcome.as_str(),
        ])
    }
}

impl<W: Write> DecisionSink for CsvSink<W> {
    fn record(&mut self, record: &DecisionRecord) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.write(record) {
            self.error = Some(e.into());
        }
    }
}
