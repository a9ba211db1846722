//! Replay of a record's movement log against its stored quantity.

use serde::Serialize;

use stockflow_core::{MovementId, StockRecordId};

use crate::movement::MovementEntry;

/// A point where the log does not chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainBreak {
    pub movement_id: MovementId,
    pub sequence: u64,
    /// Running balance before this entry, as replayed.
    pub expected_before: i64,
    pub recorded_before: i64,
    /// The entry itself violates `stock_after = stock_before + delta`.
    pub malformed: bool,
}

/// Outcome of replaying a record's log from quantity 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub stock_record_id: StockRecordId,
    pub stored_quantity: i64,
    pub replayed_quantity: i64,
    pub entries: usize,
    pub breaks: Vec<ChainBreak>,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.breaks.is_empty() && self.stored_quantity == self.replayed_quantity
    }
}

/// Replay `entries` (insertion order) from 0 and compare with `stored_quantity`.
pub fn replay(
    stock_record_id: StockRecordId,
    stored_quantity: i64,
    entries: &[MovementEntry],
) -> Reconciliation {
    let mut running: i64 = 0;
    let mut breaks = Vec::new();

    for entry in entries {
        let malformed = !entry.is_well_formed();
        if malformed || entry.stock_before != running {
            breaks.push(ChainBreak {
                movement_id: entry.id,
                sequence: entry.sequence,
                expected_before: running,
                recorded_before: entry.stock_before,
                malformed,
            });
        }
        running = running.saturating_add(entry.delta);
    }

    Reconciliation {
        stock_record_id,
        stored_quantity,
        replayed_quantity: running,
        entries: entries.len(),
        breaks,
    }
}
