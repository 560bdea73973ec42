use chrono::{DateTime, Utc};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub timestamp: DateTime<Utc>,
}

impl Block {
    pub fn new(number: u64, timestamp_secs: i64) -> Self {
        Self {
            number,
            timestamp: DateTime::from_timestamp(timestamp_secs, 0).unwrap_or_default(),
        }
    }
}
