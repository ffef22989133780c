//! Progress reporting for a running batch.
//!
//! Observers are informational only: they see a non-decreasing percentage,
//! human readable status lines and record transitions, and can never push
//! back on the pipeline.

use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use crate::models::Status;

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, percent: u8);

    fn on_log(&self, line: &str);

    fn on_transition(&self, _index: usize, _source: &str, _status: Status) {}
}

/// Forwards everything to `tracing`
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_progress(&self, percent: u8) {
        info!(percent, "progress");
    }

    fn on_log(&self, line: &str) {
        info!("{}", line);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Progress(u8),
    Log(String),
    Transition {
        index: usize,
        source: String,
        status: Status,
    },
}

/// Sends events over an unbounded channel, e.g. to a UI task
pub struct ChannelObserver {
    tx: UnboundedSender<ProgressEvent>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressObserver for ChannelObserver {
    // A closed receiver only means nobody is watching any more
    fn on_progress(&self, percent: u8) {
        let _ = self.tx.send(ProgressEvent::Progress(percent));
    }

    fn on_log(&self, line: &str) {
        let _ = self.tx.send(ProgressEvent::Log(line.to_string()));
    }

    fn on_transition(&self, index: usize, source: &str, status: Status) {
        let _ = self.tx.send(ProgressEvent::Transition {
            index,
            source: source.to_string(),
            status,
        });
    }
}

/// Completion percentage of a batch.
///
/// Extraction covers 0-50: every record is worth two half-units, a document
/// earns one on download and one on parse, anything else earns both at
/// once. Enrichment covers 50-100 over the records that reached it.
#[derive(Debug)]
pub(crate) struct ProgressMeter {
    total_half_units: usize,
    done_half_units: usize,
    last: u8,
}

impl ProgressMeter {
    pub(crate) fn new(records: usize) -> Self {
        Self {
            total_half_units: records * 2,
            done_half_units: 0,
            last: 0,
        }
    }

    pub(crate) fn extracted(&mut self, half_units: usize) -> u8 {
        self.done_half_units = (self.done_half_units + half_units).min(self.total_half_units);
        let percent = if self.total_half_units == 0 {
            50
        } else {
            50 * self.done_half_units / self.total_half_units
        };
        self.bump(percent)
    }

    pub(crate) fn enriched(&mut self, done: usize, total: usize) -> u8 {
        let percent = if total == 0 {
            100
        } else {
            50 + 50 * done.min(total) / total
        };
        self.bump(percent)
    }

    pub(crate) fn finish(&mut self) -> u8 {
        self.bump(100)
    }

    fn bump(&mut self, percent: usize) -> u8 {
        let percent = percent.min(100) as u8;
        self.last = self.last.max(percent);
        self.last
    }
}
