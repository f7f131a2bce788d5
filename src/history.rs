use std::collections::VecDeque;
use std::fmt;

use crate::farcaster::CastId;
use crate::viewport::ViewSnapshot;

pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("history is empty")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    List { fid: u64 },
    Thread(CastId),
    Cast(CastId),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::List { fid } => write!(f, "casts of fid {fid}"),
            Location::Thread(id) => write!(f, "thread {}", id.hash),
            Location::Cast(id) => write!(f, "cast {}", id.hash),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub location: Location,
    pub view: ViewSnapshot,
}

impl Entry {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            view: ViewSnapshot::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<Entry>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    pub fn push(&mut self, entry: Entry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Result<Entry, HistoryError> {
        self.entries.pop_back().ok_or(HistoryError::Empty)
    }

    pub fn peek(&self) -> Result<&Entry, HistoryError> {
        self.entries.back().ok_or(HistoryError::Empty)
    }

    pub fn previous(&self) -> Result<&Entry, HistoryError> {
        let len = self.entries.len();
        if len < 2 {
            return Err(HistoryError::Empty);
        }
        self.entries.get(len - 2).ok_or(HistoryError::Empty)
    }

    pub fn set_view(&mut self, view: ViewSnapshot) -> Result<(), HistoryError> {
        let top = self.entries.back_mut().ok_or(HistoryError::Empty)?;
        top.view = view;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
