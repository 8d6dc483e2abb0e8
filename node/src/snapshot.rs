// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Scan cursor and the single outstanding ledger snapshot.

use serde::{Deserialize, Serialize};

/// Where the next flush resumes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCheckpoint {
    pub next_block: u64,
    pub random_counter: u64,
}

/// Scanner state captured when the ledger took its latest snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPoint {
    pub block: u64,
    pub random_counter: u64,
}

#[derive(Debug, Default)]
pub struct SnapshotLedger {
    checkpoint: ScanCheckpoint,
    snapshot: SnapshotPoint,
}

impl SnapshotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkpoint(&self) -> ScanCheckpoint {
        self.checkpoint
    }

    /// Remembers `(block, current random counter)`, replacing any earlier snapshot.
    pub fn record_snapshot(&mut self, block: u64) {
        self.snapshot = SnapshotPoint { block, random_counter: self.checkpoint.random_counter };
        tracing::debug!("Snapshot recorded at block {} (counter {})", block, self.snapshot.random_counter);
    }

    /// `(block, random counter)` of the latest snapshot.
    pub fn current_snapshot(&self) -> (u64, u64) {
        (self.snapshot.block, self.snapshot.random_counter)
    }

    /// The ledger went back to the latest snapshot.
    pub fn on_revert(&mut self) {
        self.checkpoint = ScanCheckpoint {
            next_block: self.snapshot.block + 1,
            random_counter: self.snapshot.random_counter,
        };
        tracing::info!(
            "Reverted scan cursor to block {} (counter {})",
            self.checkpoint.next_block,
            self.checkpoint.random_counter
        );
    }

    /// Applies the ledger's snapshot marker. Returns whether the cursor moved back.
    pub fn reconcile(&mut self, marker: u64) -> bool {
        let resume = marker.saturating_add(1);
        if resume >= self.checkpoint.next_block {
            return false;
        }
        tracing::info!(
            "Ledger snapshot marker {} precedes scan cursor {}, rescanning",
            marker,
            self.checkpoint.next_block
        );
        self.checkpoint.next_block = resume;
        if self.snapshot.block == marker {
            self.checkpoint.random_counter = self.snapshot.random_counter;
        } else {
            tracing::warn!(
                "No snapshot recorded at block {} (latest is {}), keeping random counter {}",
                marker,
                self.snapshot.block,
                self.checkpoint.random_counter
            );
        }
        true
    }

    pub fn advance(&mut self, checkpoint: ScanCheckpoint) {
        self.checkpoint = checkpoint;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
