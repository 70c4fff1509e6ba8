//! Byte-level progress aggregation across slots.

use crate::upload::types::AssetKind;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileProgress {
    pub sent: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressAggregator {
    files: BTreeMap<AssetKind, FileProgress>,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.files.clear();
    }

    /// Starts tracking a file at zero bytes sent.
    pub fn track(&mut self, kind: AssetKind, total: u64) {
        self.files.insert(kind, FileProgress { sent: 0, total });
    }

    /// Records a chunk progress report. Returns `false` if the report was
    /// ignored.
    ///
    /// A report at 100% is held back until [`complete`](Self::complete):
    /// chunk boundaries can round up to a full file while the last chunk
    /// is still in flight.
    pub fn record(&mut self, kind: AssetKind, sent: u64, total: u64) -> bool {
        if sent >= total {
            return false;
        }
        let entry = self.files.entry(kind).or_insert(FileProgress { sent: 0, total });
        entry.total = total;
        // A retried chunk re-sends bytes already counted.
        entry.sent = entry.sent.max(sent);
        true
    }

    pub fn complete(&mut self, kind: AssetKind) {
        if let Some(entry) = self.files.get_mut(&kind) {
            entry.sent = entry.total;
        }
    }

    pub fn file(&self, kind: AssetKind) -> Option<FileProgress> {
        self.files.get(&kind).copied()
    }

    pub fn bytes_sent(&self) -> u64 {
        self.files.values().map(|p| p.sent).sum()
    }

    pub fn bytes_total(&self) -> u64 {
        self.files.values().map(|p| p.total).sum()
    }

    /// Overall percentage in `0.0..=100.0`.
    pub fn percentage(&self) -> f64 {
        let total = self.bytes_total();
        if total == 0 {
            return 0.0;
        }
        (self.bytes_sent() as f64 / total as f64) * 100.0
    }
}
