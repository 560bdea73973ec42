use std::time::Duration;

use crate::scanner::BlockWindow;

/// What one iteration of the indexer got done
#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    pub window: BlockWindow,
    pub new_pairs: usize,
    pub trades: usize,
    pub elapsed: Duration,
    pub chain_head: u64,
}

impl Progress {
    pub fn blocks_per_second(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();

        if seconds > 0.0 {
            self.window.length as f64 / seconds
        } else {
            f64::INFINITY
        }
    }

    pub fn blocks_behind(&self) -> u64 {
        self.chain_head.saturating_sub(self.window.to_block())
    }

    /// Time left to reach the chain head at the current pace
    pub fn eta(&self) -> Duration {
        let blocks_per_second = self.blocks_per_second();

        if blocks_per_second.is_finite() && blocks_per_second > 0.0 {
            Duration::try_from_secs_f64(self.blocks_behind() as f64 / blocks_per_second)
                .unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_time_to_the_chain_head() {
        let progress = Progress {
            window: BlockWindow::new(1_000, 100),
            new_pairs: 0,
            trades: 12,
            elapsed: Duration::from_secs(2),
            chain_head: 2_099,
        };

        assert_eq!(progress.blocks_per_second(), 50.0);
        assert_eq!(progress.blocks_behind(), 1_000);
        assert_eq!(progress.eta(), Duration::from_secs(20));
    }

    #[test]
    fn reports_no_eta_for_instant_iterations() {
        let progress = Progress {
            window: BlockWindow::new(1_000, 100),
            new_pairs: 0,
            trades: 0,
            elapsed: Duration::ZERO,
            chain_head: 5_000,
        };

        assert_eq!(progress.eta(), Duration::ZERO);
    }
}
