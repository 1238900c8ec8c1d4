use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::warn;

use stockflow_events::{EventBus, EventEnvelope};
use stockflow_inventory::{MovementQuery, StockMovement};

use super::StoreError;

/// A journaled movement with its assigned position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Monotonically increasing position in the journal (starts at 1).
    pub sequence_number: u64,
    pub movement: StockMovement,
}

impl JournalEntry {
    pub fn to_envelope(&self) -> EventEnvelope<StockMovement> {
        EventEnvelope::wrap(
            *self.movement.id.as_uuid(),
            self.sequence_number,
            self.movement.clone(),
        )
    }
}

/// Append-only audit log of stock movements.
///
/// Entries are never updated or deleted. `append` assigns sequence numbers
/// with no gaps or duplicates, even under concurrent appends.
pub trait MovementJournal: Send + Sync {
    fn append(&self, movement: StockMovement) -> Result<JournalEntry, StoreError>;

    /// Matching entries, newest first, truncated to `query.limit`.
    fn query(&self, query: &MovementQuery) -> Result<Vec<JournalEntry>, StoreError>;
}

impl<J> MovementJournal for Arc<J>
where
    J: MovementJournal + ?Sized,
{
    fn append(&self, movement: StockMovement) -> Result<JournalEntry, StoreError> {
        (**self).append(movement)
    }

    fn query(&self, query: &MovementQuery) -> Result<Vec<JournalEntry>, StoreError> {
        (**self).query(query)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMovementJournal {
    entries: RwLock<Vec<JournalEntry>>,
}

impl InMemoryMovementJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MovementJournal for InMemoryMovementJournal {
    fn append(&self, movement: StockMovement) -> Result<JournalEntry, StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::poisoned())?;
        let next = entries.last().map(|e| e.sequence_number).unwrap_or(0) + 1;
        let entry = JournalEntry {
            sequence_number: next,
            movement,
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    fn query(&self, query: &MovementQuery) -> Result<Vec<JournalEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::poisoned())?;
        let limit = query.limit.filter(|l| *l > 0).unwrap_or(usize::MAX);
        Ok(entries
            .iter()
            .rev()
            .filter(|e| query.matches(&e.movement))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Adapter that publishes each movement to an `EventBus` after a successful append.
///
/// Publish happens only after append succeeds. The journal is the source of
/// truth, so a failed publish is logged and the append still succeeds;
/// consumers can catch up from `query` using the sequence number.
pub struct PublishingJournal<J, B> {
    journal: J,
    bus: B,
}

impl<J, B> PublishingJournal<J, B> {
    pub fn new(journal: J, bus: B) -> Self {
        Self { journal, bus }
    }

    pub fn into_parts(self) -> (J, B) {
        (self.journal, self.bus)
    }
}

impl<J, B> MovementJournal for PublishingJournal<J, B>
where
    J: MovementJournal,
    B: EventBus<EventEnvelope<StockMovement>>,
{
    fn append(&self, movement: StockMovement) -> Result<JournalEntry, StoreError> {
        let entry = self.journal.append(movement)?;

        if let Err(err) = self.bus.publish(entry.to_envelope()) {
            warn!(
                sequence_number = entry.sequence_number,
                movement_id = %entry.movement.id,
                error = ?err,
                "movement journaled but not published"
            );
        }

        Ok(entry)
    }

    fn query(&self, query: &MovementQuery) -> Result<Vec<JournalEntry>, StoreError> {
        self.journal.query(query)
    }
}
