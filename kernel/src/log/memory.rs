// In-Memory Log Store
//
// Entries are held in a vector indexed by position. The same entry
// table backs the file store after a journal replay.

use parking_lot::Mutex;

use super::{LogError, LogStore, Position};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Written(Vec<u8>),
    Trimmed,
}

/// Position-indexed entries with tail and size-limit bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct EntryTable {
    slots: Vec<Slot>,
    max_entry_size: Option<usize>,
}

impl EntryTable {
    pub(crate) fn new(max_entry_size: Option<usize>) -> Self {
        Self {
            slots: Vec::new(),
            max_entry_size,
        }
    }

    pub(crate) fn tail(&self) -> Position {
        self.slots.len() as Position
    }

    pub(crate) fn check_size(&self, data: &[u8]) -> Result<(), LogError> {
        match self.max_entry_size {
            Some(limit) if data.len() > limit => Err(LogError::EntryTooLarge {
                size: data.len(),
                limit,
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn push(&mut self, data: Vec<u8>) -> Position {
        let position = self.tail();
        self.slots.push(Slot::Written(data));
        position
    }

    pub(crate) fn get(&self, position: Position) -> Result<&[u8], LogError> {
        match self.slot(position)? {
            Slot::Written(data) => Ok(data),
            Slot::Trimmed => Err(LogError::Invalidated(position)),
        }
    }

    /// Whether `position` is already trimmed. Fails past the tail.
    pub(crate) fn is_trimmed(&self, position: Position) -> Result<bool, LogError> {
        Ok(matches!(self.slot(position)?, Slot::Trimmed))
    }

    pub(crate) fn invalidate(&mut self, position: Position) -> Result<(), LogError> {
        let index = self.index(position)?;
        self.slots[index] = Slot::Trimmed;
        Ok(())
    }

    fn slot(&self, position: Position) -> Result<&Slot, LogError> {
        let index = self.index(position)?;
        Ok(&self.slots[index])
    }

    fn index(&self, position: Position) -> Result<usize, LogError> {
        usize::try_from(position)
            .ok()
            .filter(|index| *index < self.slots.len())
            .ok_or(LogError::NotWritten(position))
    }
}

/// Log store that keeps every entry in memory.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    entries: Mutex<EntryTable>,
}

impl MemoryLogStore {
    pub fn new(max_entry_size: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(EntryTable::new(max_entry_size)),
        }
    }
}

impl LogStore for MemoryLogStore {
    fn append(&self, data: &[u8]) -> Result<Position, LogError> {
        let mut entries = self.entries.lock();
        entries.check_size(data)?;
        Ok(entries.push(data.to_vec()))
    }

    fn read(&self, position: Position) -> Result<Vec<u8>, LogError> {
        self.entries.lock().get(position).map(<[u8]>::to_vec)
    }

    fn trim(&self, position: Position) -> Result<(), LogError> {
        self.entries.lock().invalidate(position)
    }

    fn tail(&self) -> Position {
        self.entries.lock().tail()
    }
}
