//! Control-channel transcript
//!
//! Keeps a timestamped record of every line exchanged with the server and of
//! data-channel negotiation events, for diagnostics and audit collaborators.

use std::collections::VecDeque;
use std::fmt;
use std::time::SystemTime;

/// Entries older than this are dropped.
const MAX_ENTRIES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
    Event,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Sent => write!(f, "OUT"),
            Direction::Received => write!(f, "IN"),
            Direction::Event => write!(f, "EVENT"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub at: SystemTime,
    pub direction: Direction,
    pub line: String,
}

#[derive(Debug, Default)]
pub struct Transcript {
    entries: VecDeque<TranscriptEntry>,
}

impl Transcript {
    pub fn record(&mut self, direction: Direction, line: impl Into<String>) {
        if self.entries.len() == MAX_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(TranscriptEntry {
            at: SystemTime::now(),
            direction,
            line: line.into(),
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent entry in the given direction.
    pub fn last(&self, direction: Direction) -> Option<&TranscriptEntry> {
        self.entries.iter().rev().find(|e| e.direction == direction)
    }
}
