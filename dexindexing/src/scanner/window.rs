/// Windows reach this many blocks back before their start. Some endpoints
/// index block numbers off by one, and the block scanned twice is
/// deduplicated downstream by (transaction hash, log index).
pub const WINDOW_LOWER_BOUND_TOLERANCE: u64 = 1;

/// A fixed-size run of blocks scanned in one iteration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockWindow {
    pub start: u64,
    pub length: u64,
}

impl BlockWindow {
    pub fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    /// First block requested from endpoints
    pub fn from_block(&self) -> u64 {
        self.start.saturating_sub(WINDOW_LOWER_BOUND_TOLERANCE)
    }

    /// Last block requested from endpoints, inclusive
    pub fn to_block(&self) -> u64 {
        (self.start + self.length).saturating_sub(1)
    }

    pub fn next(&self) -> Self {
        Self {
            start: self.start + self.length,
            length: self.length,
        }
    }
}

impl std::fmt::Display for BlockWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.from_block(), self.to_block())
    }
}
